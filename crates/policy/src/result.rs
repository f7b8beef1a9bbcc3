//! The evaluator-node result type shared by predicates, rules, and the composer
//! (spec.md §3 `Result`). Every node in the evaluation tree — a predicate, a rule, an
//! `and`/`or` composition — renders down to one of these.

use crate::actors::Actors;
use crate::candidates::Candidate;
use crate::predicates::PredicateResult;
use serde::Serialize;

/// Terminal status of an evaluator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The rule's preconditions (its `if` predicates) were not satisfied.
    Skipped,
    /// More qualifying candidates are required before this rule is satisfied.
    Pending,
    Approved,
    Disapproved,
    /// An IO error occurred while gathering facts for this node.
    Error,
}

/// How a dismissed [`Candidate`] was disqualified, with a human-readable reason
/// (spec.md §6 dismissal-reason strings).
#[derive(Debug, Clone, Serialize)]
pub struct Dismissal {
    pub candidate: Candidate,
    pub reason: String,
}

/// Reviewer-selection mode for [`ReviewRequestRule`] (spec.md §3 `request_review.mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestReviewMode {
    AllUsers,
    RandomUsers,
    Teams,
}

/// Details a reviewer-selection collaborator needs when a rule is Pending
/// (spec.md §4.E step 7).
#[derive(Debug, Clone, Serialize)]
pub struct ReviewRequestRule {
    pub actors: Actors,
    pub count: u32,
    pub mode: RequestReviewMode,
}

/// Result of evaluating one node in the policy tree: a predicate library call site
/// doesn't produce this directly (it produces [`PredicateResult`]); a rule or an
/// `and`/`or` composition does.
#[derive(Debug, Clone, Serialize)]
pub struct EvalResult {
    pub name: String,
    pub description: String,
    pub status: Status,
    pub status_description: String,
    pub error: Option<String>,
    pub approvers: Vec<Candidate>,
    pub dismissals: Vec<Dismissal>,
    pub review_request_rule: Option<ReviewRequestRule>,
    pub predicate_results: Vec<PredicateResult>,
    pub children: Vec<EvalResult>,
}

impl EvalResult {
    pub fn skipped(name: String, description: String, predicate_results: Vec<PredicateResult>) -> Self {
        EvalResult {
            name,
            description,
            status: Status::Skipped,
            status_description: "The preconditions of this rule are not satisfied".to_string(),
            error: None,
            approvers: vec![],
            dismissals: vec![],
            review_request_rule: None,
            predicate_results,
            children: vec![],
        }
    }

    pub fn error(name: String, description: String, error: String) -> Self {
        EvalResult {
            name,
            description,
            status: Status::Error,
            status_description: error.clone(),
            error: Some(error),
            approvers: vec![],
            dismissals: vec![],
            review_request_rule: None,
            predicate_results: vec![],
            children: vec![],
        }
    }
}

/// Join candidate usernames for the `"Approved by <user-list>"` /
/// `"Disapproved by <user-list>"` status strings, deduplicated and in encounter order.
#[must_use]
pub fn join_users(candidates: &[Candidate]) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for c in candidates {
        if seen.insert(c.user.as_str()) {
            out.push(c.user.as_str());
        }
    }
    out.join(", ")
}

/// Truncate a commit SHA to its first `len` characters for display.
#[must_use]
pub fn short_sha(sha: &str, len: usize) -> &str {
    &sha[..sha.len().min(len)]
}
