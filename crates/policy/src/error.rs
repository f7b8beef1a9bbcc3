//! Error taxonomy for the policy engine (spec.md §7).
//!
//! Three classes, matching §7 exactly:
//! 1. [`PolicyError::Config`] — policy-file parse/validation failure; the whole pull
//!    request fails closed, no rule is evaluated.
//! 2. [`PolicyError::Evaluation`] — an IO failure surfaced from a [`crate::context::PullContext`]
//!    getter while evaluating a predicate or fetching candidates.
//! 3. [`PolicyError::Cancelled`] — cooperative cancellation observed at an IO suspension
//!    point; does not produce a status update.

use thiserror::Error;

/// Error produced while loading a policy document or evaluating it against a pull request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Policy-file parsing or validation failed (index-pathed message, see spec.md §6).
    #[error("{0}")]
    Config(String),

    /// A `PullContext` getter failed while evaluating a predicate or fetching candidates.
    #[error("{0}")]
    Evaluation(String),

    /// Evaluation was cancelled cooperatively before it could complete.
    #[error("cancelled")]
    Cancelled,
}

impl PolicyError {
    /// Short reason tag used by `Result.Error` callers that want a `kind` string
    /// distinct from the full message (spec.md §7 calls cancellation out as
    /// `kind = "cancelled"`).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyError::Config(_) => "config",
            PolicyError::Evaluation(_) => "evaluation",
            PolicyError::Cancelled => "cancelled",
        }
    }
}

/// Convenience alias used throughout the crate.
pub type PolicyResult<T> = Result<T, PolicyError>;
