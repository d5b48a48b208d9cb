// sentinel-logic/src/error.rs
// ============================================================================
// Module: Requirement Error Definitions
// Description: Structured diagnostics for requirement tree evaluation.
// Purpose: Provide actionable diagnostics without coupling to any one domain.
// Dependencies: std::fmt
// ============================================================================

//! ## Overview
//! Centralizes the requirement evaluation errors so the policy evaluator and
//! any other requirement-tree consumer can report failures uniformly.

use std::fmt;

/// Errors that can occur while evaluating a [`crate::Requirement`] tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementError {
    /// A group requirement failed because not enough sub-requirements passed.
    GroupRequirementFailed {
        /// How many sub-requirements actually passed.
        passed: usize,
        /// How many were required to pass.
        required: usize,
    },
    /// A domain-specific predicate could not be evaluated.
    ConditionError(String),
    /// The requirement tree exceeded the maximum allowed nesting depth.
    TooDeep {
        /// Maximum allowed recursion depth.
        max_depth: usize,
        /// Depth actually encountered.
        actual_depth: usize,
    },
}

impl fmt::Display for RequirementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GroupRequirementFailed { passed, required } => {
                write!(f, "group requirement failed: passed {passed}, needed {required}")
            }
            Self::ConditionError(msg) => write!(f, "condition evaluation error: {msg}"),
            Self::TooDeep { max_depth, actual_depth } => {
                write!(f, "requirement tree too deep: {actual_depth} levels (max {max_depth})")
            }
        }
    }
}

impl std::error::Error for RequirementError {}

/// Convenient result alias for requirement operations.
pub type RequirementResult<T = ()> = Result<T, RequirementError>;
