//! Approval Rule / Disapproval Rule (spec.md §4.E, §4.F) — the unit that turns a
//! predicate precondition plus a set of qualifying candidates into a [`EvalResult`].

use crate::actors::Actors;
use crate::candidates::Methods;
use crate::context::{Commit, Permission, PullContext, ReviewState};
use crate::error::PolicyResult;
use crate::predicates::RawPredicates;
use crate::predicates::Predicate;
use crate::result::{join_users, short_sha, Dismissal, EvalResult, RequestReviewMode, ReviewRequestRule, Status};
use crate::trigger::TriggerSet;
use serde::Deserialize;
use std::collections::HashSet;

/// `requires: { count, users, teams, organizations, permissions, admins, write_collaborators }`
/// (spec.md §3). The legacy `admins` / `write_collaborators` flags fold into
/// `permissions` at [`Requires::actors`] time rather than at parse time, so the raw
/// config round-trips exactly as authored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Requires {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub admins: bool,
    #[serde(default)]
    pub write_collaborators: bool,
}

impl Requires {
    /// The effective [`Actors`] set this requirement checks membership against.
    #[must_use]
    pub fn actors(&self) -> Actors {
        let mut permissions = self.permissions.clone();
        if self.admins {
            permissions.push(Permission::Admin);
        }
        if self.write_collaborators {
            permissions.push(Permission::Write);
        }
        Actors {
            users: self.users.clone(),
            teams: self.teams.clone(),
            organizations: self.organizations.clone(),
            permissions,
        }
    }
}

/// `request_review: { enabled, mode, count }` (spec.md §3).
#[derive(Debug, Clone, Deserialize)]
pub struct RequestReview {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_request_review_mode")]
    pub mode: RequestReviewMode,
    #[serde(default)]
    pub count: u32,
}

fn default_request_review_mode() -> RequestReviewMode {
    RequestReviewMode::AllUsers
}

/// Options shared by approval and disapproval rules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonOptions {
    #[serde(default)]
    pub allow_author: bool,
    #[serde(default)]
    pub allow_contributor: bool,
    #[serde(default)]
    pub allow_non_author_contributor: bool,
    #[serde(default)]
    pub ignore_edited_comments: bool,
    #[serde(default)]
    pub ignore_commits_by: Actors,
    pub methods: Option<Methods>,
}

/// Approval-only options (spec.md §4.F: disapproval has none of these).
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(default = "default_true")]
    pub invalidate_on_push: bool,
    #[serde(default)]
    pub ignore_update_merges: bool,
    #[serde(default)]
    pub request_review: Option<RequestReview>,
}

impl Default for ApprovalOptions {
    fn default() -> Self {
        ApprovalOptions {
            common: CommonOptions::default(),
            invalidate_on_push: true,
            ignore_update_merges: false,
            request_review: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Raw, as-authored rule shape shared by approval and disapproval rule lists in a
/// policy file (spec.md §6 `approval_rules` / `disapproval_rules`).
#[derive(Debug, Clone, Deserialize)]
pub struct RawRule<O> {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "if", default)]
    pub if_: RawPredicates,
    #[serde(default)]
    pub options: O,
    #[serde(default)]
    pub requires: Requires,
}

/// A compiled `approval_rules` entry.
#[derive(Debug, Clone)]
pub struct ApprovalRule {
    pub name: String,
    pub description: String,
    pub predicates: Vec<Predicate>,
    pub options: ApprovalOptions,
    pub requires: Requires,
}

impl From<RawRule<ApprovalOptions>> for ApprovalRule {
    fn from(raw: RawRule<ApprovalOptions>) -> Self {
        ApprovalRule {
            name: raw.name,
            description: raw.description,
            predicates: raw.if_.into_predicates(),
            options: raw.options,
            requires: raw.requires,
        }
    }
}

/// A compiled `disapproval_rules` entry.
#[derive(Debug, Clone)]
pub struct DisapprovalRule {
    pub name: String,
    pub description: String,
    pub predicates: Vec<Predicate>,
    pub options: CommonOptions,
    pub requires: Requires,
}

impl From<RawRule<CommonOptions>> for DisapprovalRule {
    fn from(raw: RawRule<CommonOptions>) -> Self {
        DisapprovalRule {
            name: raw.name,
            description: raw.description,
            predicates: raw.if_.into_predicates(),
            options: raw.options,
            requires: raw.requires,
        }
    }
}

fn is_update_merge(commit: &Commit, all_shas: &HashSet<&str>) -> bool {
    commit.parents.len() == 2
        && commit.committed_via_web
        && all_shas.contains(commit.parents[0].as_str())
        && !all_shas.contains(commit.parents[1].as_str())
}

fn filtered_commits(
    ctx: &dyn PullContext,
    ignore_update_merges: bool,
    ignore_commits_by: &Actors,
) -> PolicyResult<Vec<Commit>> {
    let sorted = ctx.sorted_commits()?;
    let all_commits = ctx.commits()?;
    let all_shas: HashSet<&str> = all_commits.iter().map(|c| c.sha.as_str()).collect();
    let mut out = Vec::with_capacity(sorted.len());
    for commit in sorted {
        if ignore_update_merges && is_update_merge(&commit, &all_shas) {
            continue;
        }
        if !ignore_commits_by.is_empty() {
            let author_ignored = ignore_commits_by.is_actor(&commit.author, ctx)?;
            let committer_ignored = ignore_commits_by.is_actor(&commit.committer, ctx)?;
            if author_ignored && committer_ignored {
                continue;
            }
        }
        out.push(commit);
    }
    Ok(out)
}

fn banned_users(author: &str, common: &CommonOptions, commits: &[Commit]) -> HashSet<String> {
    let mut banned = HashSet::new();
    if !(common.allow_author || common.allow_contributor) {
        banned.insert(author.to_string());
    }
    if !(common.allow_contributor || common.allow_non_author_contributor) {
        for commit in commits {
            for user in [commit.author.as_str(), commit.committer.as_str()] {
                if !user.is_empty() && user != author {
                    banned.insert(user.to_string());
                }
            }
        }
    }
    banned
}

impl ApprovalRule {
    /// Host-event classes that could change this rule's outcome (spec.md §4.H).
    #[must_use]
    pub fn trigger(&self) -> TriggerSet {
        let requires_count_positive = self.requires.count > 0;
        let methods = self.options.common.methods.clone().unwrap_or_else(Methods::defaults);
        let mut set = TriggerSet::COMMIT;
        if requires_count_positive && (!methods.comments.is_empty() || !methods.comment_patterns.is_empty()) {
            set |= TriggerSet::COMMENT;
        }
        if !methods.body_patterns.is_empty() {
            set |= TriggerSet::PULL_REQUEST;
        }
        if methods.resolved_github_review(requires_count_positive)
            || !methods.github_review_comment_patterns.is_empty()
        {
            set |= TriggerSet::REVIEW;
        }
        for p in &self.predicates {
            set |= p.trigger();
        }
        set
    }

    /// Evaluate this rule's `Evaluate(ctx) → Result` contract (spec.md §4.E).
    pub fn evaluate(&self, ctx: &dyn PullContext) -> PolicyResult<EvalResult> {
        ctx.check_cancelled()?;
        let mut predicate_results = Vec::new();
        for predicate in &self.predicates {
            let result = predicate.evaluate(ctx)?;
            let satisfied = result.satisfied;
            predicate_results.push(result);
            if !satisfied {
                return Ok(EvalResult::skipped(
                    self.name.clone(),
                    self.description.clone(),
                    predicate_results,
                ));
            }
        }

        let methods = self.options.common.methods.clone().unwrap_or_else(Methods::defaults);
        let requires_count_positive = self.requires.count > 0;
        let mut candidates =
            methods.candidates(ctx, requires_count_positive, ReviewState::Approved)?;
        let mut dismissals = Vec::new();

        if self.options.common.ignore_edited_comments {
            let (kept, edited): (Vec<_>, Vec<_>) =
                candidates.into_iter().partition(|c| c.last_edited_at.is_zero());
            dismissals.extend(edited.into_iter().map(|candidate| Dismissal {
                candidate,
                reason: "Comment was edited".to_string(),
            }));
            candidates = kept;
        }

        if self.options.invalidate_on_push {
            let sorted = ctx.sorted_commits()?;
            let push_head = if self.options.ignore_update_merges {
                let all_commits = ctx.commits()?;
                let all_shas: HashSet<&str> = all_commits.iter().map(|c| c.sha.as_str()).collect();
                sorted.iter().find(|c| !is_update_merge(c, &all_shas)).cloned()
            } else {
                sorted.into_iter().next()
            };
            if let Some(head_commit) = push_head {
                if let Some(last_pushed_at) = ctx.pushed_at(&head_commit.sha)? {
                    let sha = head_commit.sha.clone();
                    let (kept, invalidated): (Vec<_>, Vec<_>) = candidates
                        .into_iter()
                        .partition(|c| c.created_at > last_pushed_at);
                    dismissals.extend(invalidated.into_iter().map(|candidate| Dismissal {
                        candidate,
                        reason: format!("Invalidated by push of {}", short_sha(&sha, 7)),
                    }));
                    candidates = kept;
                }
            }
        }

        if self.requires.count == 0 {
            return Ok(EvalResult {
                name: self.name.clone(),
                description: self.description.clone(),
                status: Status::Approved,
                status_description: "No approval required".to_string(),
                error: None,
                approvers: vec![],
                dismissals,
                review_request_rule: None,
                predicate_results,
                children: vec![],
            });
        }

        let author = ctx.author()?;
        let commits = filtered_commits(
            ctx,
            self.options.ignore_update_merges,
            &self.options.common.ignore_commits_by,
        )?;
        let banned = banned_users(&author, &self.options.common, &commits);

        let requires_actors = self.requires.actors();
        let candidate_count = candidates.len();
        let mut approvers = Vec::new();
        for candidate in candidates {
            if banned.contains(&candidate.user) {
                continue;
            }
            if requires_actors.is_actor(&candidate.user, ctx)? {
                approvers.push(candidate);
            }
        }
        let ignored = candidate_count - approvers.len();

        if approvers.len() as u32 >= self.requires.count {
            Ok(EvalResult {
                name: self.name.clone(),
                description: self.description.clone(),
                status: Status::Approved,
                status_description: format!("Approved by {}", join_users(&approvers)),
                error: None,
                approvers,
                dismissals,
                review_request_rule: None,
                predicate_results,
                children: vec![],
            })
        } else {
            let status_description = if ignored > 0 {
                format!(
                    "{}/{} required approvals. Ignored {} approvals from disqualified users",
                    approvers.len(),
                    self.requires.count,
                    ignored
                )
            } else {
                format!("{}/{} required approvals", approvers.len(), self.requires.count)
            };
            let review_request_rule = self.options.request_review.as_ref().and_then(|rr| {
                rr.enabled.then(|| ReviewRequestRule {
                    actors: requires_actors.clone(),
                    count: if rr.count > 0 { rr.count } else { self.requires.count },
                    mode: rr.mode,
                })
            });
            Ok(EvalResult {
                name: self.name.clone(),
                description: self.description.clone(),
                status: Status::Pending,
                status_description,
                error: None,
                approvers,
                dismissals,
                review_request_rule,
                predicate_results,
                children: vec![],
            })
        }
    }
}

impl DisapprovalRule {
    /// Host-event classes that could change this rule's outcome (spec.md §4.H).
    #[must_use]
    pub fn trigger(&self) -> TriggerSet {
        let requires_count_positive = self.requires.count > 0;
        let methods = self.options.methods.clone().unwrap_or_else(Methods::defaults);
        let mut set = TriggerSet::COMMIT;
        if requires_count_positive && (!methods.comments.is_empty() || !methods.comment_patterns.is_empty()) {
            set |= TriggerSet::COMMENT;
        }
        if !methods.body_patterns.is_empty() {
            set |= TriggerSet::PULL_REQUEST;
        }
        if methods.resolved_github_review(requires_count_positive)
            || !methods.github_review_comment_patterns.is_empty()
        {
            set |= TriggerSet::REVIEW;
        }
        for p in &self.predicates {
            set |= p.trigger();
        }
        set
    }

    /// Evaluate this rule (spec.md §4.F): structurally identical to [`ApprovalRule`]
    /// but without push-invalidation, update-merge filtering, or review requests; a
    /// single qualifying candidate disapproves, zero candidates is Skipped.
    pub fn evaluate(&self, ctx: &dyn PullContext) -> PolicyResult<EvalResult> {
        ctx.check_cancelled()?;
        let mut predicate_results = Vec::new();
        for predicate in &self.predicates {
            let result = predicate.evaluate(ctx)?;
            let satisfied = result.satisfied;
            predicate_results.push(result);
            if !satisfied {
                return Ok(EvalResult::skipped(
                    self.name.clone(),
                    self.description.clone(),
                    predicate_results,
                ));
            }
        }

        let methods = self.options.methods.clone().unwrap_or_else(Methods::defaults);
        let requires_count_positive = self.requires.count > 0;
        let mut candidates =
            methods.candidates(ctx, requires_count_positive, ReviewState::ChangesRequested)?;
        let mut dismissals = Vec::new();

        if self.options.ignore_edited_comments {
            let (kept, edited): (Vec<_>, Vec<_>) =
                candidates.into_iter().partition(|c| c.last_edited_at.is_zero());
            dismissals.extend(edited.into_iter().map(|candidate| Dismissal {
                candidate,
                reason: "Comment was edited".to_string(),
            }));
            candidates = kept;
        }

        let author = ctx.author()?;
        let commits = filtered_commits(ctx, false, &self.options.ignore_commits_by)?;
        let banned = banned_users(&author, &self.options, &commits);

        let requires_actors = self.requires.actors();
        let mut disapprovers = Vec::new();
        for candidate in candidates {
            if banned.contains(&candidate.user) {
                continue;
            }
            if requires_actors.is_actor(&candidate.user, ctx)? {
                disapprovers.push(candidate);
            }
        }

        if disapprovers.is_empty() {
            Ok(EvalResult {
                name: self.name.clone(),
                description: self.description.clone(),
                status: Status::Skipped,
                status_description: "No disapprovals".to_string(),
                error: None,
                approvers: vec![],
                dismissals,
                review_request_rule: None,
                predicate_results,
                children: vec![],
            })
        } else {
            Ok(EvalResult {
                name: self.name.clone(),
                description: self.description.clone(),
                status: Status::Disapproved,
                status_description: format!("Disapproved by {}", join_users(&disapprovers)),
                error: None,
                approvers: disapprovers,
                dismissals,
                review_request_rule: None,
                predicate_results,
                children: vec![],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::ComparisonExpr;
    use crate::context::{
        Body, Comment, Review, StaticPullContext, StaticPullContextData, Timestamp,
    };
    use crate::predicates::{ModifiedLinesConfig, Predicate};
    use std::collections::{HashMap, HashSet};

    fn base_data() -> StaticPullContextData {
        StaticPullContextData {
            owner: "o".into(),
            repo: "r".into(),
            number: 1,
            title: "t".into(),
            author: "mhaypenny".into(),
            head_sha: "c1".into(),
            base_ref: "main".into(),
            head_ref: "feature".into(),
            commits: vec![Commit {
                sha: "c1".into(),
                parents: vec![],
                author: "mhaypenny".into(),
                committer: "mhaypenny".into(),
                committed_via_web: false,
                signature: None,
            }],
            comments: vec![],
            reviews: vec![],
            body: Body {
                body_text: String::new(),
                created_at: Timestamp(0),
                last_edited_at: Timestamp::ZERO,
                author: "mhaypenny".into(),
            },
            changed_files: vec![],
            labels: HashSet::new(),
            latest_statuses: HashMap::new(),
            latest_workflow_runs: HashMap::new(),
            pushed_at: HashMap::new(),
            team_members: HashMap::new(),
            org_members: HashMap::new(),
            permissions: HashMap::new(),
        }
    }

    fn rule(requires_count: u32) -> ApprovalRule {
        ApprovalRule {
            name: "single-approver".into(),
            description: "requires one approval".into(),
            predicates: vec![],
            options: ApprovalOptions::default(),
            requires: Requires {
                count: requires_count,
                permissions: vec![Permission::None],
                ..Requires::default()
            },
        }
    }

    #[test]
    fn evaluate_observes_cancellation_before_touching_the_context() {
        let token = policy_core::cancellation::CancellationToken::new();
        token.cancel();
        let ctx = StaticPullContext::with_cancellation(base_data(), token);
        let err = rule(0).evaluate(&ctx).unwrap_err();
        assert_eq!(err, crate::error::PolicyError::Cancelled);
    }

    #[test]
    fn zero_count_is_approved_with_no_approval_required() {
        let ctx = StaticPullContext::new(base_data());
        let result = rule(0).evaluate(&ctx).unwrap();
        assert_eq!(result.status, Status::Approved);
        assert_eq!(result.status_description, "No approval required");
    }

    #[test]
    fn failing_precondition_is_skipped_with_canonical_description() {
        let mut r = rule(1);
        r.predicates = vec![Predicate::ModifiedLines(ModifiedLinesConfig {
            additions: Some(ComparisonExpr::GreaterThan(1_000_000)),
            deletions: None,
            total: None,
        })];
        let ctx = StaticPullContext::new(base_data());
        let result = r.evaluate(&ctx).unwrap();
        assert_eq!(result.status, Status::Skipped);
        assert_eq!(result.status_description, "The preconditions of this rule are not satisfied");
    }

    #[test]
    fn thumbs_up_comment_satisfies_single_approval_requirement() {
        let mut data = base_data();
        data.comments = vec![Comment {
            created_at: Timestamp(10),
            last_edited_at: Timestamp::ZERO,
            author: "alice".into(),
            body: ":+1:".into(),
        }];
        data.pushed_at.insert("c1".into(), Timestamp(1));
        let ctx = StaticPullContext::new(data);
        let result = rule(1).evaluate(&ctx).unwrap();
        assert_eq!(result.status, Status::Approved);
        assert_eq!(result.status_description, "Approved by alice");
    }

    #[test]
    fn pending_when_approvals_short_of_requirement() {
        let mut data = base_data();
        data.comments = vec![Comment {
            created_at: Timestamp(10),
            last_edited_at: Timestamp::ZERO,
            author: "alice".into(),
            body: ":+1:".into(),
        }];
        data.pushed_at.insert("c1".into(), Timestamp(1));
        let ctx = StaticPullContext::new(data);
        let result = rule(2).evaluate(&ctx).unwrap();
        assert_eq!(result.status, Status::Pending);
        assert_eq!(result.status_description, "1/2 required approvals");
    }

    #[test]
    fn push_invalidates_approval_created_before_it() {
        let mut data = base_data();
        data.comments = vec![Comment {
            created_at: Timestamp(1),
            last_edited_at: Timestamp::ZERO,
            author: "alice".into(),
            body: ":+1:".into(),
        }];
        data.pushed_at.insert("c1".into(), Timestamp(5));
        let ctx = StaticPullContext::new(data);
        let result = rule(1).evaluate(&ctx).unwrap();
        assert_eq!(result.status, Status::Pending);
        assert_eq!(result.dismissals.len(), 1);
        assert_eq!(result.dismissals[0].reason, "Invalidated by push of c1");
    }

    #[test]
    fn author_is_banned_by_default() {
        let mut data = base_data();
        data.comments = vec![Comment {
            created_at: Timestamp(10),
            last_edited_at: Timestamp::ZERO,
            author: "mhaypenny".into(),
            body: ":+1:".into(),
        }];
        data.pushed_at.insert("c1".into(), Timestamp(1));
        let ctx = StaticPullContext::new(data);
        let result = rule(1).evaluate(&ctx).unwrap();
        assert_eq!(result.status, Status::Pending);
        assert_eq!(
            result.status_description,
            "0/1 required approvals. Ignored 1 approvals from disqualified users"
        );
    }

    #[test]
    fn ignore_edited_comments_dismisses_edited_candidates() {
        let mut data = base_data();
        data.comments = vec![Comment {
            created_at: Timestamp(10),
            last_edited_at: Timestamp(20),
            author: "alice".into(),
            body: ":+1:".into(),
        }];
        data.pushed_at.insert("c1".into(), Timestamp(1));
        let ctx = StaticPullContext::new(data);
        let mut r = rule(1);
        r.options.common.ignore_edited_comments = true;
        let result = r.evaluate(&ctx).unwrap();
        assert_eq!(result.status, Status::Pending);
        assert_eq!(result.dismissals.len(), 1);
        assert_eq!(result.dismissals[0].reason, "Comment was edited");
    }

    #[test]
    fn ignore_update_merges_looks_past_the_update_merge_for_push_invalidation() {
        let mut data = base_data();
        data.head_sha = "merge".into();
        data.commits = vec![
            Commit {
                sha: "merge".into(),
                parents: vec!["c1".into(), "base1".into()],
                author: "mhaypenny".into(),
                committer: "mhaypenny".into(),
                committed_via_web: true,
                signature: None,
            },
            Commit {
                sha: "c1".into(),
                parents: vec![],
                author: "mhaypenny".into(),
                committer: "mhaypenny".into(),
                committed_via_web: false,
                signature: None,
            },
        ];
        data.comments = vec![Comment {
            created_at: Timestamp(20),
            last_edited_at: Timestamp::ZERO,
            author: "comment-approver".into(),
            body: ":+1:".into(),
        }];
        data.pushed_at.insert("merge".into(), Timestamp(25));
        data.pushed_at.insert("c1".into(), Timestamp(5));

        let mut r = rule(1);
        r.requires.users = vec!["comment-approver".to_string()];

        let without_ignore = r.evaluate(&StaticPullContext::new(data.clone())).unwrap();
        assert_eq!(without_ignore.status, Status::Pending);
        assert_eq!(without_ignore.dismissals.len(), 1);

        r.options.ignore_update_merges = true;
        let with_ignore = r.evaluate(&StaticPullContext::new(data)).unwrap();
        assert_eq!(with_ignore.status, Status::Approved);
        assert_eq!(with_ignore.status_description, "Approved by comment-approver");
    }

    fn disapproval_rule() -> DisapprovalRule {
        DisapprovalRule {
            name: "blocking-review".into(),
            description: "blocks on changes requested".into(),
            predicates: vec![],
            options: CommonOptions::default(),
            requires: Requires { permissions: vec![Permission::None], ..Requires::default() },
        }
    }

    #[test]
    fn no_disapprovers_is_skipped() {
        let ctx = StaticPullContext::new(base_data());
        let result = disapproval_rule().evaluate(&ctx).unwrap();
        assert_eq!(result.status, Status::Skipped);
    }

    #[test]
    fn single_changes_requested_review_disapproves() {
        let mut data = base_data();
        data.reviews = vec![Review {
            created_at: Timestamp(1),
            last_edited_at: Timestamp::ZERO,
            author: "carol".into(),
            state: ReviewState::ChangesRequested,
            body: String::new(),
            commit_sha: Some("c1".into()),
        }];
        let ctx = StaticPullContext::new(data);
        let result = disapproval_rule().evaluate(&ctx).unwrap();
        assert_eq!(result.status, Status::Disapproved);
        assert_eq!(result.status_description, "Disapproved by carol");
    }
}
