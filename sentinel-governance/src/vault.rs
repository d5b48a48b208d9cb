// sentinel-governance/src/vault.rs
// ============================================================================
// Module: Redaction Vault
// Description: TTL-bounded, reversible placeholder store for redacted secrets.
// Purpose: Let a trusted caller resolve a placeholder back to its original value.
// Dependencies: sentinel_core
// ============================================================================

//! ## Overview
//! Where [`sentinel_core::redact::StatelessMinter`] throws the original away,
//! [`Vault`] remembers it behind a placeholder keyed by an 8-char SHA-256
//! prefix (escalating to 12 chars on collision with a different original),
//! expiring entries after a configured TTL (`spec.md` §4.10). [`Vault::resolve`]
//! scans text for `[REDACTED:category:hash]` placeholders and substitutes
//! back any still-live entry; expired or unknown placeholders pass through
//! unchanged.

use std::collections::HashMap;
use std::sync::Mutex;

use sentinel_config::VaultSettings;
use sentinel_core::hashing::sha256_hex;
use sentinel_core::redact::PlaceholderMinter;
use sentinel_core::redact::RedactionCategory;

struct VaultEntry {
    original: String,
    expires_at_ms: i64,
}

/// Internal state, guarded by a mutex so [`Vault`] can be shared behind an
/// `Arc` and minted from the (synchronous) redaction hot path.
#[derive(Default)]
struct VaultState {
    entries: HashMap<String, VaultEntry>,
}

/// Reversible, TTL-bounded placeholder store (`spec.md` §4.10).
pub struct Vault {
    ttl_ms: i64,
    state: Mutex<VaultState>,
}

fn placeholder(category: RedactionCategory, key: &str) -> String {
    format!("[REDACTED:{}:{key}]", category.label())
}

impl Vault {
    /// Creates an empty vault using `settings`'s configured TTL.
    #[must_use]
    pub fn new(settings: &VaultSettings) -> Self {
        Self { ttl_ms: i64::try_from(settings.ttl_seconds).unwrap_or(i64::MAX).saturating_mul(1000), state: Mutex::new(VaultState::default()) }
    }

    /// Mints (or reuses, if still live) a placeholder for `original` at `now_ms`.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    pub fn mint_at(&self, original: &str, category: RedactionCategory, now_ms: i64) -> String {
        let digest = sha256_hex(original);
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut key: String = digest.chars().take(8).collect();
        if let Some(existing) = state.entries.get(&key) {
            if existing.original != original && existing.expires_at_ms > now_ms {
                key = digest.chars().take(12).collect();
            }
        }
        state.entries.insert(key.clone(), VaultEntry { original: original.to_string(), expires_at_ms: now_ms + self.ttl_ms });
        placeholder(category, &key)
    }

    /// Replaces every still-live `[REDACTED:category:key]` placeholder in
    /// `text` with its original value. Expired or unrecognized placeholders
    /// are left untouched.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    #[must_use]
    pub fn resolve_at(&self, text: &str, now_ms: i64) -> String {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("[REDACTED:") {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let Some(end) = tail.find(']') else {
                out.push_str(tail);
                rest = "";
                break;
            };
            let token = &tail[..=end];
            let key = token.trim_start_matches("[REDACTED:").trim_end_matches(']').rsplit(':').next().unwrap_or("");
            match state.entries.get(key) {
                Some(entry) if entry.expires_at_ms > now_ms => out.push_str(&entry.original),
                _ => out.push_str(token),
            }
            rest = &tail[end + 1..];
        }
        out.push_str(rest);
        out
    }

    /// Evicts every entry expired as of `now_ms`. Invoked by the governance
    /// orchestrator's eviction ticker (default interval from
    /// [`VaultSettings::evict_interval_seconds`]).
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    pub fn evict_expired(&self, now_ms: i64) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.entries.retain(|_, entry| entry.expires_at_ms > now_ms);
    }

    /// Drops every entry immediately, regardless of expiry. Called on service stop.
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.entries.clear();
    }

    /// Current live entry count, for diagnostics (`cortexstatus`, `sitrep`).
    #[allow(clippy::missing_panics_doc, reason = "mutex is never held across a panic in this module")]
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).entries.len()
    }

    /// True if the vault currently holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A [`PlaceholderMinter`] adapter binding one [`Vault`] to a fixed clock
/// reading, so it can be passed to [`sentinel_core::redact::Redactor`]
/// without threading `now_ms` through every call.
pub struct VaultMinter<'a> {
    vault: &'a Vault,
    now_ms: i64,
}

impl<'a> VaultMinter<'a> {
    /// Binds `vault` to mint placeholders as of `now_ms`.
    #[must_use]
    pub fn new(vault: &'a Vault, now_ms: i64) -> Self {
        Self { vault, now_ms }
    }
}

impl PlaceholderMinter for VaultMinter<'_> {
    fn mint(&mut self, original: &str, category: RedactionCategory) -> String {
        self.vault.mint_at(original, category, self.now_ms)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;
    use sentinel_core::redact::Redactor;

    fn settings() -> VaultSettings {
        VaultSettings { ttl_seconds: 3600, evict_interval_seconds: 300 }
    }

    #[test]
    fn mint_then_resolve_round_trips() {
        let vault = Vault::new(&settings());
        let placeholder = vault.mint_at("sk-ant-supersecret", RedactionCategory::Credential, 0);
        let resolved = vault.resolve_at(&placeholder, 0);
        assert_eq!(resolved, "sk-ant-supersecret");
    }

    #[test]
    fn expired_entries_do_not_resolve() {
        let vault = Vault::new(&settings());
        let placeholder = vault.mint_at("sk-ant-supersecret", RedactionCategory::Credential, 0);
        let resolved = vault.resolve_at(&placeholder, 3_600_001);
        assert_eq!(resolved, placeholder);
    }

    #[test]
    fn evict_expired_removes_stale_entries() {
        let vault = Vault::new(&settings());
        vault.mint_at("sk-ant-supersecret", RedactionCategory::Credential, 0);
        assert_eq!(vault.len(), 1);
        vault.evict_expired(3_600_001);
        assert_eq!(vault.len(), 0);
    }

    #[test]
    fn redactor_integration_resolves_original_text() {
        let vault = Vault::new(&settings());
        let redactor = Redactor::new();
        let mut minter = VaultMinter::new(&vault, 0);
        let text = format!("key is sk-ant-api03-{}", "a".repeat(90));
        let redacted = redactor.redact_text(&text, &mut minter);
        assert_ne!(redacted, text);
        let resolved = vault.resolve_at(&redacted, 0);
        assert_eq!(resolved, text);
    }

    #[test]
    fn clear_drops_all_entries_regardless_of_ttl() {
        let vault = Vault::new(&settings());
        vault.mint_at("a-secret", RedactionCategory::Credential, 0);
        vault.clear();
        assert!(vault.is_empty());
    }
}
