//! Pull Context (spec.md §4.A) — the capability-set the core depends on for facts a
//! predicate may ask about. Concrete implementations come from a host-client
//! collaborator that is out of scope for this crate; [`StaticPullContext`] is the one
//! deterministic, in-memory implementation shipped here, used by tests and the
//! simulation harness (policy-sim), in the same role `JsonlEventLog` plays for the
//! teacher's `replay-cli`: a concrete stand-in for an otherwise-abstract interface.

use crate::error::{PolicyError, PolicyResult};
use policy_core::cancellation::CancellationToken;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Seconds-since-epoch timestamp. Zero is reserved to mean "never edited" for
/// comment/review `last_edited_at` fields (spec.md §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// The sentinel "never edited" value.
    pub const ZERO: Timestamp = Timestamp(0);

    /// True when this timestamp is the "never edited" sentinel.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// Cryptographic signature kind recognized on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// GPG-signed commit.
    Gpg,
    /// SSH-signed commit.
    Ssh,
    /// S/MIME-signed commit.
    Smime,
    /// Any other/unknown signature type reported by the host.
    Other,
}

/// A commit signature as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Whether the host considers this signature cryptographically valid.
    pub valid: bool,
    /// Signature kind (used by `HasValidSignaturesByKeys`, which requires `Gpg`).
    pub kind: SignatureKind,
    /// The signer's identity, when the host can resolve one (used by `HasValidSignaturesBy`).
    pub signer: Option<String>,
    /// The signing key id, when available (used by `HasValidSignaturesByKeys`).
    pub key_id: Option<String>,
}

/// A single commit on the pull request (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Commit SHA. Unique within `PullContext::commits()`.
    pub sha: String,
    /// Parent SHAs, first-parent first.
    pub parents: Vec<String>,
    /// Commit author username (may be empty if the host cannot resolve one).
    pub author: String,
    /// Commit committer username.
    pub committer: String,
    /// True when the commit was made through the host's web UI (relevant to
    /// update-merge detection, spec.md §4.E step 5, and `AuthorIsOnlyContributor`).
    pub committed_via_web: bool,
    /// Cryptographic signature, if any.
    pub signature: Option<Signature>,
}

/// Status of a changed file on the pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// A single changed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub filename: String,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
}

/// State of a review (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
}

/// A single issue comment on the pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub created_at: Timestamp,
    /// Zero means "never edited" (spec.md §3 invariant).
    pub last_edited_at: Timestamp,
    pub author: String,
    pub body: String,
}

/// A single review on the pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub created_at: Timestamp,
    /// Zero means "never edited".
    pub last_edited_at: Timestamp,
    pub author: String,
    pub state: ReviewState,
    pub body: String,
    /// The head commit SHA this review was posted against, when the host reports one.
    pub commit_sha: Option<String>,
}

/// The pull-request body treated as an editable artifact (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub body_text: String,
    pub created_at: Timestamp,
    /// Zero means "never edited".
    pub last_edited_at: Timestamp,
    pub author: String,
}

/// Conclusion of a commit status or a single workflow-run attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    Skipped,
    Stale,
    ActionRequired,
    TimedOut,
    Pending,
}

/// A user's maximum permission level on the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    None,
    Read,
    Write,
    Admin,
}

/// Lazy, memoized, fallible read-through to the host for every fact a predicate may
/// ask about (spec.md §4.A). Implementations are single-threaded per evaluation: a
/// single `PullContext` must never be shared across threads, though distinct
/// instances may be evaluated concurrently (spec.md §5).
pub trait PullContext {
    fn owner(&self) -> &str;
    fn repo(&self) -> &str;
    fn number(&self) -> u64;
    fn title(&self) -> PolicyResult<String>;
    fn author(&self) -> PolicyResult<String>;
    fn head_sha(&self) -> PolicyResult<String>;
    fn branches(&self) -> PolicyResult<(String, String)>;
    fn commits(&self) -> PolicyResult<Vec<Commit>>;
    fn comments(&self) -> PolicyResult<Vec<Comment>>;
    fn reviews(&self) -> PolicyResult<Vec<Review>>;
    fn body(&self) -> PolicyResult<Body>;
    fn changed_files(&self) -> PolicyResult<Vec<FileChange>>;
    fn labels(&self) -> PolicyResult<HashSet<String>>;
    fn latest_statuses(&self) -> PolicyResult<HashMap<String, Conclusion>>;
    fn latest_workflow_runs(&self) -> PolicyResult<HashMap<String, Vec<Conclusion>>>;
    fn pushed_at(&self, sha: &str) -> PolicyResult<Option<Timestamp>>;
    fn user_in_team(&self, user: &str, team: &str) -> PolicyResult<bool>;
    fn user_in_org(&self, user: &str, org: &str) -> PolicyResult<bool>;
    fn permission(&self, user: &str) -> PolicyResult<Permission>;

    /// The cooperative cancellation flag the external dispatcher holds a clone of.
    /// Consulted at every IO suspension point (spec.md §5); implementations that
    /// never get cancelled can return a token that is simply never `cancel()`-ed.
    fn cancellation_token(&self) -> &CancellationToken;

    /// `"owner/repo"`, used by the `Repository` predicate.
    fn repository_slug(&self) -> String {
        format!("{}/{}", self.owner(), self.repo())
    }

    /// Returns [`PolicyError::Cancelled`] once [`cancellation_token`](Self::cancellation_token)
    /// has been cancelled. Called at each IO suspension point so an in-flight
    /// evaluation aborts promptly instead of running to completion on stale input.
    fn check_cancelled(&self) -> PolicyResult<()> {
        if self.cancellation_token().is_cancelled() {
            return Err(PolicyError::Cancelled);
        }
        Ok(())
    }

    /// Walk from head via `parents[0]`, collecting commits that exist in the full
    /// commit set, stopping at the first parent that is not itself a commit of this
    /// pull request (spec.md §3, §4.A). This is a partial linear projection of the
    /// commit graph, not a full DAG walk, and may be a proper subset of `commits()`.
    fn sorted_commits(&self) -> PolicyResult<Vec<Commit>> {
        self.check_cancelled()?;
        let commits = self.commits()?;
        let head = self.head_sha()?;
        let by_sha: HashMap<&str, &Commit> =
            commits.iter().map(|c| (c.sha.as_str(), c)).collect();
        if !by_sha.contains_key(head.as_str()) {
            return Err(PolicyError::Evaluation(format!(
                "head sha {head} is not present in commits()"
            )));
        }
        let mut out = Vec::with_capacity(commits.len());
        let mut cursor = head;
        loop {
            let Some(commit) = by_sha.get(cursor.as_str()) else { break };
            out.push((*commit).clone());
            match commit.parents.first() {
                Some(parent) if by_sha.contains_key(parent.as_str()) => cursor = parent.clone(),
                _ => break,
            }
        }
        Ok(out)
    }
}

/// A deterministic, in-memory `PullContext` used by tests and the simulation
/// harness. Every getter memoizes its result in a `RefCell`, mirroring the "arena of
/// optional fields" strategy described in spec.md §9 — cheap, single-threaded, and
/// never re-derives a value once fetched once, matching real evaluator call patterns
/// where the same getter is invoked by several predicates in one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticPullContextData {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub head_sha: String,
    pub base_ref: String,
    pub head_ref: String,
    pub commits: Vec<Commit>,
    pub comments: Vec<Comment>,
    pub reviews: Vec<Review>,
    pub body: Body,
    pub changed_files: Vec<FileChange>,
    pub labels: HashSet<String>,
    pub latest_statuses: HashMap<String, Conclusion>,
    #[serde(default)]
    pub latest_workflow_runs: HashMap<String, Vec<Conclusion>>,
    pub pushed_at: HashMap<String, Timestamp>,
    #[serde(default)]
    pub team_members: HashMap<String, HashSet<String>>,
    #[serde(default)]
    pub org_members: HashMap<String, HashSet<String>>,
    #[serde(default)]
    pub permissions: HashMap<String, Permission>,
}

/// Wraps [`StaticPullContextData`] with the memoization cells every real
/// `PullContext` is expected to provide.
pub struct StaticPullContext {
    data: StaticPullContextData,
    commits_cache: RefCell<Option<Vec<Commit>>>,
    comments_cache: RefCell<Option<Vec<Comment>>>,
    reviews_cache: RefCell<Option<Vec<Review>>>,
    cancellation: CancellationToken,
}

impl StaticPullContext {
    #[must_use]
    pub fn new(data: StaticPullContextData) -> Self {
        Self::with_cancellation(data, CancellationToken::new())
    }

    /// Build a context sharing the given token, so a caller can cancel an
    /// in-flight evaluation from outside (tests, or a real dispatcher's deadline).
    #[must_use]
    pub fn with_cancellation(data: StaticPullContextData, cancellation: CancellationToken) -> Self {
        Self {
            data,
            commits_cache: RefCell::new(None),
            comments_cache: RefCell::new(None),
            reviews_cache: RefCell::new(None),
            cancellation,
        }
    }
}

impl PullContext for StaticPullContext {
    fn owner(&self) -> &str {
        &self.data.owner
    }

    fn repo(&self) -> &str {
        &self.data.repo
    }

    fn number(&self) -> u64 {
        self.data.number
    }

    fn title(&self) -> PolicyResult<String> {
        Ok(self.data.title.clone())
    }

    fn author(&self) -> PolicyResult<String> {
        Ok(self.data.author.clone())
    }

    fn head_sha(&self) -> PolicyResult<String> {
        Ok(self.data.head_sha.clone())
    }

    fn branches(&self) -> PolicyResult<(String, String)> {
        Ok((self.data.base_ref.clone(), self.data.head_ref.clone()))
    }

    fn commits(&self) -> PolicyResult<Vec<Commit>> {
        if let Some(cached) = self.commits_cache.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let value = self.data.commits.clone();
        *self.commits_cache.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    fn comments(&self) -> PolicyResult<Vec<Comment>> {
        if let Some(cached) = self.comments_cache.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let value = self.data.comments.clone();
        *self.comments_cache.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    fn reviews(&self) -> PolicyResult<Vec<Review>> {
        if let Some(cached) = self.reviews_cache.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let value = self.data.reviews.clone();
        *self.reviews_cache.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    fn body(&self) -> PolicyResult<Body> {
        Ok(self.data.body.clone())
    }

    fn changed_files(&self) -> PolicyResult<Vec<FileChange>> {
        Ok(self.data.changed_files.clone())
    }

    fn labels(&self) -> PolicyResult<HashSet<String>> {
        Ok(self.data.labels.clone())
    }

    fn latest_statuses(&self) -> PolicyResult<HashMap<String, Conclusion>> {
        Ok(self.data.latest_statuses.clone())
    }

    fn latest_workflow_runs(&self) -> PolicyResult<HashMap<String, Vec<Conclusion>>> {
        Ok(self.data.latest_workflow_runs.clone())
    }

    fn pushed_at(&self, sha: &str) -> PolicyResult<Option<Timestamp>> {
        Ok(self.data.pushed_at.get(sha).copied())
    }

    fn user_in_team(&self, user: &str, team: &str) -> PolicyResult<bool> {
        Ok(self.data.team_members.get(team).is_some_and(|members| members.contains(user)))
    }

    fn user_in_org(&self, user: &str, org: &str) -> PolicyResult<bool> {
        Ok(self.data.org_members.get(org).is_some_and(|members| members.contains(user)))
    }

    fn permission(&self, user: &str) -> PolicyResult<Permission> {
        Ok(self.data.permissions.get(user).copied().unwrap_or(Permission::None))
    }

    fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}
