// sentinel-logic/src/requirement.rs
// ============================================================================
// Module: Requirement Core Types
// Description: Universal boolean algebra over typed predicates.
// Purpose: Define `Requirement<P>` and its short-circuiting evaluator.
// Dependencies: serde::{Deserialize, Serialize}, smallvec::SmallVec
// ============================================================================

//! ## Overview
//! A composable boolean algebra that works over any domain-specific predicate
//! type `P`. The logical combinators (And, Or, Not, `RequireGroup`) are
//! universal; `Predicate` is the boundary where domain semantics are
//! injected. The policy evaluator (`spec.md` §4.7) uses this directly: a
//! rule's ordered condition list is a top-level `And`, and the `composite
//! (any-of)` / `negation (not)` condition kinds map onto `Or` / `Not`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;

use crate::error::RequirementError;
use crate::error::RequirementResult;
use crate::traits::PredicateEval;
use crate::tristate::TriState;

/// Maximum nesting depth a requirement tree may reach before evaluation
/// refuses to continue (stack-overflow protection for adversarial config).
pub const MAX_DEPTH: usize = 64;

// ============================================================================
// SECTION: Requirement Definition
// ============================================================================

/// Universal requirement tree with domain-specific leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Requirement<P> {
    /// Logical AND: all sub-requirements must be satisfied. Empty `And` is
    /// trivially satisfied.
    And(SmallVec<[Box<Self>; 4]>),
    /// Logical OR: at least one sub-requirement must be satisfied. Empty `Or`
    /// is trivially unsatisfiable.
    Or(SmallVec<[Box<Self>; 4]>),
    /// Logical NOT: inverts the result of the sub-requirement.
    Not(Box<Self>),
    /// At least `min` of the sub-requirements must be satisfied.
    RequireGroup {
        /// Minimum number of sub-requirements that must pass.
        min: u8,
        /// The sub-requirements to choose from.
        reqs: SmallVec<[Box<Self>; 8]>,
    },
    /// Domain-specific atomic predicate.
    Predicate(P),
}

impl<P> Requirement<P> {
    /// Wraps `inner` in a logical AND of one.
    pub fn and(reqs: Vec<Self>) -> Self {
        Self::And(reqs.into_iter().map(Box::new).collect())
    }

    /// Wraps `inner` in a logical OR of one.
    pub fn or(reqs: Vec<Self>) -> Self {
        Self::Or(reqs.into_iter().map(Box::new).collect())
    }

    /// Negates `inner`.
    pub fn negate(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Evaluates this requirement tree with short-circuiting, against `ctx`,
    /// where `P: PredicateEval<Ctx>`.
    ///
    /// # Errors
    ///
    /// Returns [`RequirementError::TooDeep`] if the tree is nested beyond
    /// [`MAX_DEPTH`], and propagates [`RequirementError::GroupRequirementFailed`]
    /// is never returned here (that variant is informational for callers
    /// that want the failure count; this method only reports depth errors).
    pub fn eval<Ctx: ?Sized>(&self, ctx: &Ctx) -> RequirementResult<TriState>
    where
        P: PredicateEval<Ctx>,
    {
        self.eval_depth(ctx, 0)
    }

    fn eval_depth<Ctx: ?Sized>(&self, ctx: &Ctx, depth: usize) -> RequirementResult<TriState>
    where
        P: PredicateEval<Ctx>,
    {
        if depth > MAX_DEPTH {
            return Err(RequirementError::TooDeep { max_depth: MAX_DEPTH, actual_depth: depth });
        }
        match self {
            Self::And(reqs) => {
                for req in reqs {
                    if !req.eval_depth(ctx, depth + 1)?.to_bool_fail_closed() {
                        return Ok(TriState::False);
                    }
                }
                Ok(TriState::True)
            }
            Self::Or(reqs) => {
                for req in reqs {
                    if req.eval_depth(ctx, depth + 1)?.to_bool_fail_closed() {
                        return Ok(TriState::True);
                    }
                }
                Ok(TriState::False)
            }
            Self::Not(inner) => {
                Ok(TriState::from(!inner.eval_depth(ctx, depth + 1)?.to_bool_fail_closed()))
            }
            Self::RequireGroup { min, reqs } => {
                let mut passed = 0usize;
                for req in reqs {
                    if req.eval_depth(ctx, depth + 1)?.to_bool_fail_closed() {
                        passed += 1;
                        if passed >= usize::from(*min) {
                            return Ok(TriState::True);
                        }
                    }
                }
                Ok(TriState::False)
            }
            Self::Predicate(p) => Ok(p.eval(ctx)),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    struct Always(bool);
    impl PredicateEval<()> for Always {
        fn eval(&self, _ctx: &()) -> TriState {
            TriState::from(self.0)
        }
    }

    #[test]
    fn and_short_circuits_on_first_false() {
        let req = Requirement::and(vec![
            Requirement::Predicate(Always(true)),
            Requirement::Predicate(Always(false)),
            Requirement::Predicate(Always(true)),
        ]);
        assert_eq!(req.eval(&()).unwrap(), TriState::False);
    }

    #[test]
    fn empty_and_is_true() {
        let req: Requirement<Always> = Requirement::And(SmallVec::new());
        assert_eq!(req.eval(&()).unwrap(), TriState::True);
    }

    #[test]
    fn empty_or_is_false() {
        let req: Requirement<Always> = Requirement::Or(SmallVec::new());
        assert_eq!(req.eval(&()).unwrap(), TriState::False);
    }

    #[test]
    fn not_inverts() {
        let req = Requirement::negate(Requirement::Predicate(Always(true)));
        assert_eq!(req.eval(&()).unwrap(), TriState::False);
    }

    #[test]
    fn require_group_needs_min() {
        let req = Requirement::RequireGroup {
            min: 2,
            reqs: vec![
                Box::new(Requirement::Predicate(Always(true))),
                Box::new(Requirement::Predicate(Always(false))),
                Box::new(Requirement::Predicate(Always(true))),
            ]
            .into(),
        };
        assert_eq!(req.eval(&()).unwrap(), TriState::True);
    }

    #[test]
    fn too_deep_is_rejected() {
        let mut req = Requirement::Predicate(Always(true));
        for _ in 0..MAX_DEPTH + 2 {
            req = Requirement::negate(req);
        }
        assert!(matches!(req.eval(&()), Err(RequirementError::TooDeep { .. })));
    }
}
