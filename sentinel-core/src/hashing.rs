// sentinel-core/src/hashing.rs
// ============================================================================
// Module: Hashing Helpers
// Description: SHA-256 digest helpers shared by chain ids, the vault, and redaction.
// Purpose: Centralize one hashing routine instead of re-deriving it per crate.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Every SHA-256 use in the suite (chain identifiers, vault placeholders,
//! redaction digests) goes through this module so the hex-encoding
//! convention stays uniform.

use sha2::Digest;
use sha2::Sha256;

/// Returns the lowercase hex SHA-256 digest of `input`.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex_encode(&digest)
}

/// Returns the first `len` hex characters of the SHA-256 digest of `input`.
///
/// Used for the conversation-chain identifier (`spec.md` §3: "first 16 hex
/// chars of SHA-256(...)") and for vault placeholder hash slices.
#[must_use]
pub fn sha256_hex_prefix(input: &str, len: usize) -> String {
    let full = sha256_hex(input);
    full.chars().take(len).collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    #[test]
    fn sha256_hex_is_deterministic() {
        assert_eq!(sha256_hex("abc"), sha256_hex("abc"));
        assert_ne!(sha256_hex("abc"), sha256_hex("abd"));
    }

    #[test]
    fn prefix_matches_full_digest_prefix() {
        let full = sha256_hex("hello");
        let prefix = sha256_hex_prefix("hello", 8);
        assert_eq!(prefix.len(), 8);
        assert!(full.starts_with(&prefix));
    }
}
