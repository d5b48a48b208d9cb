// sentinel-logic/src/tristate.rs
// ============================================================================
// Module: Tri-State Logic
// Description: Tri-state truth values for evaluation over possibly-missing context.
// Purpose: Let predicate evaluation report "unknown" rather than guessing true/false.
// Dependencies: serde::{Deserialize, Serialize}
// ============================================================================

//! ## Overview
//! Policy predicates sometimes have nothing to evaluate against (a frequency
//! scope with no matching events, a context field the caller never set).
//! [`TriState`] keeps that distinct from a hard `false` so callers can decide
//! how to fold it (the policy evaluator folds `Unknown` to `false`, which
//! keeps deny-wins fail-closed).

use serde::Deserialize;
use serde::Serialize;

/// Tri-state truth value for context-aware predicate evaluation.
///
/// # Invariants
/// - Represents a closed set of truth values: true, false, or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriState {
    /// Definitively true.
    True,
    /// Definitively false.
    False,
    /// Indeterminate: the predicate had nothing to evaluate against.
    Unknown,
}

impl TriState {
    /// Returns true if the value is `True`.
    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    /// Folds `Unknown` to `false`, the fail-closed reading used by the policy evaluator.
    #[must_use]
    pub const fn to_bool_fail_closed(self) -> bool {
        matches!(self, Self::True)
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    #[test]
    fn unknown_folds_to_false() {
        assert!(!TriState::Unknown.to_bool_fail_closed());
        assert!(TriState::True.to_bool_fail_closed());
        assert!(!TriState::False.to_bool_fail_closed());
    }

    #[test]
    fn from_bool_round_trips() {
        assert_eq!(TriState::from(true), TriState::True);
        assert_eq!(TriState::from(false), TriState::False);
    }
}
