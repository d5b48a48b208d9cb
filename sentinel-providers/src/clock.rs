// sentinel-providers/src/clock.rs
// ============================================================================
// Module: Clock Provider
// Description: Wall-clock access behind a trait, for deterministic tests.
// Purpose: Let audit/trust/trace code stamp records without touching SystemTime directly.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Audit records need both an epoch-millisecond timestamp and an ISO-8601
//! string (`spec.md` §4.11). [`SystemClock`] is the production
//! implementation; tests substitute [`FixedClock`] for deterministic
//! assertions.

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Supplies the current time, abstracted so tests can pin it.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> i64;

    /// Current time as an RFC 3339 / ISO-8601 string.
    fn now_iso(&self) -> String {
        epoch_ms_to_iso(self.now_ms())
    }
}

/// Converts an epoch-millisecond timestamp to an RFC 3339 string.
#[must_use]
pub fn epoch_ms_to_iso(epoch_ms: i64) -> String {
    let nanos = i128::from(epoch_ms) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_default()
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        let now = OffsetDateTime::now_utc();
        now.unix_timestamp() * 1000 + i64::from(now.millisecond())
    }
}

/// A clock pinned to a fixed instant, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    #[test]
    fn fixed_clock_reports_its_pinned_value() {
        let clock = FixedClock(1_700_000_000_000);
        assert_eq!(clock.now_ms(), 1_700_000_000_000);
    }

    #[test]
    fn iso_round_trips_a_known_epoch() {
        let iso = epoch_ms_to_iso(1_700_000_000_000);
        assert!(iso.starts_with("2023-11-14"));
    }

    #[test]
    fn system_clock_reports_a_plausible_recent_timestamp() {
        let clock = SystemClock;
        assert!(clock.now_ms() > 1_700_000_000_000);
    }
}
