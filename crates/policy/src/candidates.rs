//! Candidate Methods (spec.md §4.C) — extracts approval/disapproval candidates from
//! comments, reviews, and the pull-request body according to a configurable set of
//! matching methods.

use crate::context::{PullContext, ReviewState, Timestamp};
use crate::error::PolicyResult;
use crate::regex_field::CompiledRegex;
use serde::{Deserialize, Serialize};

/// Where a [`Candidate`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateType {
    Comment,
    Review,
    Body,
    ReviewComment,
}

/// An artifact that potentially counts toward approval or disapproval
/// (spec.md's glossary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub user: String,
    #[serde(rename = "type")]
    pub kind: CandidateType,
    pub created_at: Timestamp,
    pub last_edited_at: Timestamp,
    /// The commit SHA a review was posted against, when applicable.
    pub commit_sha: Option<String>,
}

/// Default reacji accepted when a rule's `methods` is omitted entirely
/// (spec.md §4.C "Default methods").
pub const DEFAULT_COMMENT_EMOJI: [&str; 2] = [":+1:", "\u{1F44D}"];

/// Candidate-extraction configuration for a single rule (spec.md §4.C).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Methods {
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub comment_patterns: Vec<CompiledRegex>,
    #[serde(default)]
    pub body_patterns: Vec<CompiledRegex>,
    /// `Some(true)`/`Some(false)` is explicit; `None` means "use the rule's
    /// default", resolved by [`Methods::resolved_github_review`] (spec.md §9 Open
    /// Question: unset means true whenever the rule has `requires.count > 0`).
    #[serde(default)]
    pub github_review: Option<bool>,
    #[serde(default)]
    pub github_review_comment_patterns: Vec<CompiledRegex>,
}

impl Methods {
    /// `Methods` as it applies when a rule's `methods` field is omitted entirely:
    /// thumbs-up comments plus an approving/changes-requested review.
    #[must_use]
    pub fn defaults() -> Self {
        Methods {
            comments: DEFAULT_COMMENT_EMOJI.iter().map(|s| s.to_string()).collect(),
            comment_patterns: Vec::new(),
            body_patterns: Vec::new(),
            github_review: Some(true),
            github_review_comment_patterns: Vec::new(),
        }
    }

    /// Resolve the effective `github_review` flag given whether the enclosing
    /// rule actually requires any approvals (spec.md §9 Open Question).
    #[must_use]
    pub fn resolved_github_review(&self, requires_count_positive: bool) -> bool {
        self.github_review.unwrap_or(requires_count_positive)
    }

    /// Extract the union of qualifying comments, the PR body, and reviews, ordered
    /// stably by creation time ascending; ties broken by insertion order
    /// (comments, then reviews, then body — spec.md §4.C "Ordering").
    ///
    /// `review_state` is the review state that counts as a candidate via
    /// `github_review` — `Approved` for approval rules, `ChangesRequested` for
    /// disapproval rules.
    pub fn candidates(
        &self,
        ctx: &dyn PullContext,
        requires_count_positive: bool,
        review_state: ReviewState,
    ) -> PolicyResult<Vec<Candidate>> {
        let mut out = Vec::new();

        for comment in ctx.comments()? {
            let exact = self.comments.iter().any(|c| c == &comment.body);
            let pattern = self.comment_patterns.iter().any(|re| re.is_match(&comment.body));
            if exact || pattern {
                out.push(Candidate {
                    user: comment.author,
                    kind: CandidateType::Comment,
                    created_at: comment.created_at,
                    last_edited_at: comment.last_edited_at,
                    commit_sha: None,
                });
            }
        }

        let github_review = self.resolved_github_review(requires_count_positive);
        for review in ctx.reviews()? {
            let counts_as_review = github_review && review.state == review_state;
            let comment_pattern = self
                .github_review_comment_patterns
                .iter()
                .any(|re| re.is_match(&review.body));
            if counts_as_review || comment_pattern {
                out.push(Candidate {
                    user: review.author,
                    kind: CandidateType::Review,
                    created_at: review.created_at,
                    last_edited_at: review.last_edited_at,
                    commit_sha: review.commit_sha.clone(),
                });
            }
        }

        if !self.body_patterns.is_empty() {
            let body = ctx.body()?;
            if self.body_patterns.iter().any(|re| re.is_match(&body.body_text)) {
                out.push(Candidate {
                    user: body.author,
                    kind: CandidateType::Body,
                    created_at: body.created_at,
                    last_edited_at: body.last_edited_at,
                    commit_sha: None,
                });
            }
        }

        out.sort_by_key(|c| c.created_at);
        Ok(out)
    }
}
