//! Predicate Library (spec.md §4.D) — pure boolean functions over a [`PullContext`].

use crate::actors::Actors;
use crate::comparison::ComparisonExpr;
use crate::context::{Conclusion, FileStatus, PullContext};
use crate::error::PolicyResult;
use crate::regex_field::CompiledRegex;
use crate::trigger::TriggerSet;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::collections::HashSet;

/// Result of evaluating one predicate against a context (spec.md §3 `Result.PredicateResults`).
#[derive(Debug, Clone, Serialize)]
pub struct PredicateResult {
    pub name: &'static str,
    pub satisfied: bool,
    pub description: String,
    pub values: serde_json::Value,
    pub conditions: Vec<String>,
}

/// File-path include/exclude configuration shared by `ChangedFiles` and `OnlyChangedFiles`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub paths: Vec<CompiledRegex>,
    #[serde(default)]
    pub ignore: Vec<CompiledRegex>,
}

impl PathsConfig {
    fn is_ignored(&self, filename: &str) -> bool {
        self.ignore.iter().any(|re| re.is_match(filename))
    }

    fn path_matches(&self, filename: &str) -> bool {
        self.paths.iter().any(|re| re.is_match(filename))
    }
}

/// `additions` / `deletions` / `total` comparison thresholds (spec.md §4.D `ModifiedLines`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModifiedLinesConfig {
    pub additions: Option<ComparisonExpr>,
    pub deletions: Option<ComparisonExpr>,
    pub total: Option<ComparisonExpr>,
}

/// `matches` (any-of) / `not_matches` (none-of) used by `Title` and `Repository`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchConfig {
    #[serde(default)]
    pub matches: Vec<CompiledRegex>,
    #[serde(default)]
    pub not_matches: Vec<CompiledRegex>,
}

impl MatchConfig {
    fn evaluate(&self, text: &str) -> bool {
        if !self.matches.is_empty() {
            self.matches.iter().any(|re| re.is_match(text))
        } else if !self.not_matches.is_empty() {
            !self.not_matches.iter().any(|re| re.is_match(text))
        } else {
            true
        }
    }
}

/// Status-check configuration shared by `HasSuccessfulStatus` and `HasStatus`.
///
/// Accepts a YAML-tagged union: a bare list of context names (default allowed
/// conclusion set `{success}`), or an object form with an explicit `conclusions`
/// list and/or the legacy `skipped_is_success` flag (spec.md §9 "YAML-tagged
/// unions").
#[derive(Debug, Clone, Serialize)]
pub struct StatusConfig {
    pub contexts: Vec<String>,
    pub conclusions: Option<Vec<Conclusion>>,
    pub skipped_is_success: bool,
}

impl StatusConfig {
    fn allowed(&self) -> HashSet<Conclusion> {
        if let Some(explicit) = &self.conclusions {
            return explicit.iter().copied().collect();
        }
        let mut set = HashSet::from([Conclusion::Success]);
        if self.skipped_is_success {
            set.insert(Conclusion::Skipped);
        }
        set
    }
}

impl<'de> Deserialize<'de> for StatusConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            List(Vec<String>),
            Object {
                contexts: Vec<String>,
                #[serde(default)]
                conclusions: Option<Vec<Conclusion>>,
                #[serde(default)]
                skipped_is_success: bool,
            },
        }
        match Shape::deserialize(deserializer)? {
            Shape::List(contexts) => {
                Ok(StatusConfig { contexts, conclusions: None, skipped_is_success: false })
            }
            Shape::Object { contexts, conclusions, skipped_is_success } => {
                Ok(StatusConfig { contexts, conclusions, skipped_is_success })
            }
        }
    }
}

/// Workflow-run configuration for `HasWorkflowResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub workflows: Vec<String>,
    #[serde(default)]
    pub conclusions: Option<Vec<Conclusion>>,
}

impl WorkflowConfig {
    fn allowed(&self) -> HashSet<Conclusion> {
        self.conclusions
            .as_ref()
            .map(|c| c.iter().copied().collect())
            .unwrap_or_else(|| HashSet::from([Conclusion::Success]))
    }
}

/// One named, compiled predicate. See spec.md §4.D for semantics of each variant.
#[derive(Debug, Clone, Serialize)]
pub enum Predicate {
    ChangedFiles(PathsConfig),
    OnlyChangedFiles(PathsConfig),
    ModifiedLines(ModifiedLinesConfig),
    HasAuthorIn(Actors),
    HasContributorIn(Actors),
    OnlyHasContributorsIn(Actors),
    AuthorIsOnlyContributor(bool),
    TargetsBranch(CompiledRegex),
    FromBranch(CompiledRegex),
    Title(MatchConfig),
    Repository(MatchConfig),
    HasLabels(Vec<String>),
    HasSuccessfulStatus(StatusConfig),
    HasStatus(StatusConfig),
    HasWorkflowResult(WorkflowConfig),
    HasValidSignatures(bool),
    HasValidSignaturesBy(Actors),
    HasValidSignaturesByKeys(Vec<String>),
}

impl Predicate {
    /// Stable name used in `PredicateResult` and UI rendering.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Predicate::ChangedFiles(_) => "ChangedFiles",
            Predicate::OnlyChangedFiles(_) => "OnlyChangedFiles",
            Predicate::ModifiedLines(_) => "ModifiedLines",
            Predicate::HasAuthorIn(_) => "HasAuthorIn",
            Predicate::HasContributorIn(_) => "HasContributorIn",
            Predicate::OnlyHasContributorsIn(_) => "OnlyHasContributorsIn",
            Predicate::AuthorIsOnlyContributor(_) => "AuthorIsOnlyContributor",
            Predicate::TargetsBranch(_) => "TargetsBranch",
            Predicate::FromBranch(_) => "FromBranch",
            Predicate::Title(_) => "Title",
            Predicate::Repository(_) => "Repository",
            Predicate::HasLabels(_) => "HasLabels",
            Predicate::HasSuccessfulStatus(_) => "HasSuccessfulStatus",
            Predicate::HasStatus(_) => "HasStatus",
            Predicate::HasWorkflowResult(_) => "HasWorkflowResult",
            Predicate::HasValidSignatures(_) => "HasValidSignatures",
            Predicate::HasValidSignaturesBy(_) => "HasValidSignaturesBy",
            Predicate::HasValidSignaturesByKeys(_) => "HasValidSignaturesByKeys",
        }
    }

    /// Host-event classes that could flip this predicate's result (spec.md §4.H).
    #[must_use]
    pub fn trigger(&self) -> TriggerSet {
        match self {
            Predicate::ChangedFiles(_)
            | Predicate::OnlyChangedFiles(_)
            | Predicate::ModifiedLines(_) => TriggerSet::COMMIT,
            Predicate::HasAuthorIn(_) => TriggerSet::STATIC,
            Predicate::HasContributorIn(_) | Predicate::OnlyHasContributorsIn(_) => {
                TriggerSet::COMMIT
            }
            Predicate::AuthorIsOnlyContributor(_) => TriggerSet::COMMIT,
            Predicate::TargetsBranch(_) | Predicate::FromBranch(_) => TriggerSet::STATIC,
            Predicate::Title(_) => TriggerSet::PULL_REQUEST,
            Predicate::Repository(_) => TriggerSet::STATIC,
            Predicate::HasLabels(_) => TriggerSet::LABEL,
            Predicate::HasSuccessfulStatus(_)
            | Predicate::HasStatus(_)
            | Predicate::HasWorkflowResult(_) => TriggerSet::STATUS,
            Predicate::HasValidSignatures(_)
            | Predicate::HasValidSignaturesBy(_)
            | Predicate::HasValidSignaturesByKeys(_) => TriggerSet::COMMIT,
        }
    }

    /// Evaluate this predicate against `ctx`.
    pub fn evaluate(&self, ctx: &dyn PullContext) -> PolicyResult<PredicateResult> {
        let name = self.name();
        match self {
            Predicate::ChangedFiles(cfg) => {
                let files = ctx.changed_files()?;
                let matched: Vec<&str> = files
                    .iter()
                    .filter(|f| !cfg.is_ignored(&f.filename) && cfg.path_matches(&f.filename))
                    .map(|f| f.filename.as_str())
                    .collect();
                let satisfied = !matched.is_empty();
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: if satisfied {
                        format!("changed files matched: {}", matched.join(", "))
                    } else {
                        "no changed file matched the configured paths".to_string()
                    },
                    values: json!({ "matched_files": matched }),
                    conditions: vec![],
                })
            }
            Predicate::OnlyChangedFiles(cfg) => {
                let files = ctx.changed_files()?;
                let non_ignored: Vec<&str> = files
                    .iter()
                    .filter(|f| !cfg.is_ignored(&f.filename))
                    .map(|f| f.filename.as_str())
                    .collect();
                let satisfied =
                    !non_ignored.is_empty() && non_ignored.iter().all(|f| cfg.path_matches(f));
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: if satisfied {
                        "every changed file matched the configured paths".to_string()
                    } else {
                        "some changed file did not match the configured paths".to_string()
                    },
                    values: json!({ "non_ignored_files": non_ignored }),
                    conditions: vec![],
                })
            }
            Predicate::ModifiedLines(cfg) => {
                let files = ctx.changed_files()?;
                let additions: u64 = files.iter().map(|f| f.additions).sum();
                let deletions: u64 = files.iter().map(|f| f.deletions).sum();
                let total = additions + deletions;
                let satisfied = [
                    cfg.additions.map(|e| e.matches(additions)),
                    cfg.deletions.map(|e| e.matches(deletions)),
                    cfg.total.map(|e| e.matches(total)),
                ]
                .into_iter()
                .flatten()
                .any(|b| b);
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: format!(
                        "modified lines: +{additions} -{deletions} total={total}"
                    ),
                    values: json!({
                        "additions": additions,
                        "deletions": deletions,
                        "total": total,
                    }),
                    conditions: vec![],
                })
            }
            Predicate::HasAuthorIn(actors) => {
                let author = ctx.author()?;
                let satisfied = actors.is_actor(&author, ctx)?;
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: format!("author {author} is{} a listed actor", not_str(satisfied)),
                    values: json!({ "author": author }),
                    conditions: vec![],
                })
            }
            Predicate::HasContributorIn(actors) => {
                let author = ctx.author()?;
                let mut satisfied = actors.is_actor(&author, ctx)?;
                if !satisfied {
                    for c in ctx.sorted_commits()? {
                        if actors.is_actor(&c.author, ctx)? || actors.is_actor(&c.committer, ctx)? {
                            satisfied = true;
                            break;
                        }
                    }
                }
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: "at least one contributor (or the author) is a listed actor"
                        .to_string(),
                    values: serde_json::Value::Null,
                    conditions: vec![],
                })
            }
            Predicate::OnlyHasContributorsIn(actors) => {
                let author = ctx.author()?;
                let mut satisfied = actors.is_actor(&author, ctx)?;
                if satisfied {
                    for c in ctx.sorted_commits()? {
                        if !actors.is_actor(&c.author, ctx)? || !actors.is_actor(&c.committer, ctx)? {
                            satisfied = false;
                            break;
                        }
                    }
                }
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: "every contributor and the author are listed actors".to_string(),
                    values: serde_json::Value::Null,
                    conditions: vec![],
                })
            }
            Predicate::AuthorIsOnlyContributor(expect_author_only) => {
                let author = ctx.author()?;
                let mut contrary_sha = None;
                for c in ctx.sorted_commits()? {
                    let author_ok = c.author == author;
                    let committer_ok = c.committed_via_web || c.committer == author;
                    if !author_ok || !committer_ok {
                        contrary_sha = Some(c.sha);
                        break;
                    }
                }
                let author_is_only = contrary_sha.is_none();
                let satisfied = author_is_only == *expect_author_only;
                let description = match &contrary_sha {
                    Some(sha) => format!(
                        "Commit `{}` was authored or committed by a different user",
                        short_sha(sha, 10)
                    ),
                    None => "every commit was authored and committed by the PR author".to_string(),
                };
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description,
                    values: json!({ "contrary_commit": contrary_sha }),
                    conditions: vec![],
                })
            }
            Predicate::TargetsBranch(re) => {
                let (base, _head) = ctx.branches()?;
                let satisfied = re.is_match(&base);
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: format!("base branch {base:?} against /{}/", re.as_str()),
                    values: json!({ "base": base }),
                    conditions: vec![],
                })
            }
            Predicate::FromBranch(re) => {
                let (_base, head) = ctx.branches()?;
                let satisfied = re.is_match(&head);
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: format!("head branch {head:?} against /{}/", re.as_str()),
                    values: json!({ "head": head }),
                    conditions: vec![],
                })
            }
            Predicate::Title(cfg) => {
                let title = ctx.title()?;
                let satisfied = cfg.evaluate(&title);
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: format!("title {title:?}"),
                    values: json!({ "title": title }),
                    conditions: vec![],
                })
            }
            Predicate::Repository(cfg) => {
                let slug = ctx.repository_slug();
                let satisfied = cfg.evaluate(&slug);
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: format!("repository {slug:?}"),
                    values: json!({ "repository": slug }),
                    conditions: vec![],
                })
            }
            Predicate::HasLabels(required) => {
                let labels = ctx.labels()?;
                let lower: HashSet<String> = labels.iter().map(|l| l.to_lowercase()).collect();
                let satisfied = required.iter().all(|r| lower.contains(&r.to_lowercase()));
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: format!("required labels: {}", required.join(", ")),
                    values: json!({ "labels": labels }),
                    conditions: vec![],
                })
            }
            Predicate::HasSuccessfulStatus(cfg) | Predicate::HasStatus(cfg) => {
                let statuses = ctx.latest_statuses()?;
                let allowed = cfg.allowed();
                let mut missing = Vec::new();
                let mut failing = Vec::new();
                for context_name in &cfg.contexts {
                    match statuses.get(context_name) {
                        None => missing.push(context_name.clone()),
                        Some(conclusion) if !allowed.contains(conclusion) => {
                            failing.push(context_name.clone())
                        }
                        Some(_) => {}
                    }
                }
                let satisfied = missing.is_empty() && failing.is_empty();
                let description = if satisfied {
                    "all required statuses passed".to_string()
                } else if !missing.is_empty() {
                    format!("missing statuses: {}", missing.join(", "))
                } else {
                    format!("statuses did not pass: {}", failing.join(", "))
                };
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description,
                    values: json!({ "missingResults": missing, "failingStatuses": failing }),
                    conditions: vec![],
                })
            }
            Predicate::HasWorkflowResult(cfg) => {
                let runs = ctx.latest_workflow_runs()?;
                let allowed = cfg.allowed();
                let mut missing = Vec::new();
                let mut failing = Vec::new();
                for workflow in &cfg.workflows {
                    match runs.get(workflow) {
                        None => missing.push(workflow.clone()),
                        Some(attempts) if attempts.iter().any(|c| !allowed.contains(c)) => {
                            failing.push(workflow.clone())
                        }
                        Some(attempts) if attempts.is_empty() => missing.push(workflow.clone()),
                        Some(_) => {}
                    }
                }
                let satisfied = missing.is_empty() && failing.is_empty();
                let description = if satisfied {
                    "all required workflows passed".to_string()
                } else if !missing.is_empty() {
                    format!("missing workflow results: {}", missing.join(", "))
                } else {
                    format!("workflow results did not pass: {}", failing.join(", "))
                };
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description,
                    values: json!({ "missingResults": missing, "failingWorkflows": failing }),
                    conditions: vec![],
                })
            }
            Predicate::HasValidSignatures(expect_all_valid) => {
                let commits = ctx.commits()?;
                let any_invalid = commits
                    .iter()
                    .any(|c| !c.signature.as_ref().is_some_and(|s| s.valid));
                let satisfied = any_invalid != *expect_all_valid;
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: if *expect_all_valid {
                        "every commit has a valid signature".to_string()
                    } else {
                        "at least one commit lacks a valid signature".to_string()
                    },
                    values: serde_json::Value::Null,
                    conditions: vec![],
                })
            }
            Predicate::HasValidSignaturesBy(actors) => {
                let commits = ctx.commits()?;
                let mut satisfied = true;
                for c in &commits {
                    let Some(sig) = &c.signature else {
                        satisfied = false;
                        break;
                    };
                    if !sig.valid {
                        satisfied = false;
                        break;
                    }
                    let Some(signer) = &sig.signer else {
                        satisfied = false;
                        break;
                    };
                    if !actors.is_actor(signer, ctx)? {
                        satisfied = false;
                        break;
                    }
                }
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: "every commit is validly signed by a listed actor".to_string(),
                    values: serde_json::Value::Null,
                    conditions: vec![],
                })
            }
            Predicate::HasValidSignaturesByKeys(allowed_keys) => {
                let commits = ctx.commits()?;
                let allowed: HashSet<&str> = allowed_keys.iter().map(String::as_str).collect();
                let satisfied = commits.iter().all(|c| {
                    c.signature.as_ref().is_some_and(|sig| {
                        sig.valid
                            && sig.kind == crate::context::SignatureKind::Gpg
                            && sig.key_id.as_deref().is_some_and(|k| allowed.contains(k))
                    })
                });
                Ok(PredicateResult {
                    name,
                    satisfied,
                    description: "every commit is GPG-signed by a whitelisted key".to_string(),
                    values: serde_json::Value::Null,
                    conditions: vec![],
                })
            }
        }
    }
}

fn not_str(satisfied: bool) -> &'static str {
    if satisfied {
        ""
    } else {
        " not"
    }
}

fn short_sha(sha: &str, len: usize) -> &str {
    &sha[..sha.len().min(len)]
}

/// Declarative predicate block (spec.md §3 `Rule.if`): populated fields become an
/// implicit AND, evaluated in declaration order. Deserializes directly from the
/// rule's YAML `if:` mapping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPredicates {
    pub changed_files: Option<PathsConfig>,
    pub only_changed_files: Option<PathsConfig>,
    pub modified_lines: Option<ModifiedLinesConfig>,
    pub has_author_in: Option<Actors>,
    pub has_contributor_in: Option<Actors>,
    pub only_has_contributors_in: Option<Actors>,
    pub author_is_only_contributor: Option<bool>,
    pub targets_branch: Option<CompiledRegex>,
    pub from_branch: Option<CompiledRegex>,
    pub title: Option<MatchConfig>,
    pub repository: Option<MatchConfig>,
    pub has_labels: Option<Vec<String>>,
    pub has_successful_status: Option<StatusConfig>,
    pub has_status: Option<StatusConfig>,
    pub has_workflow_result: Option<WorkflowConfig>,
    pub has_valid_signatures: Option<bool>,
    pub has_valid_signatures_by: Option<Actors>,
    pub has_valid_signatures_by_keys: Option<Vec<String>>,
}

impl RawPredicates {
    /// Build the ordered predicate list a rule will evaluate. Order matches field
    /// declaration order above, which is also each rule's evaluation order
    /// (spec.md §4.E step 1, §5 "Ordering guarantees").
    #[must_use]
    pub fn into_predicates(self) -> Vec<Predicate> {
        let mut out = Vec::new();
        macro_rules! push {
            ($field:expr, $variant:ident) => {
                if let Some(value) = $field {
                    out.push(Predicate::$variant(value));
                }
            };
        }
        push!(self.changed_files, ChangedFiles);
        push!(self.only_changed_files, OnlyChangedFiles);
        push!(self.modified_lines, ModifiedLines);
        push!(self.has_author_in, HasAuthorIn);
        push!(self.has_contributor_in, HasContributorIn);
        push!(self.only_has_contributors_in, OnlyHasContributorsIn);
        push!(self.author_is_only_contributor, AuthorIsOnlyContributor);
        push!(self.targets_branch, TargetsBranch);
        push!(self.from_branch, FromBranch);
        push!(self.title, Title);
        push!(self.repository, Repository);
        push!(self.has_labels, HasLabels);
        push!(self.has_successful_status, HasSuccessfulStatus);
        push!(self.has_status, HasStatus);
        push!(self.has_workflow_result, HasWorkflowResult);
        push!(self.has_valid_signatures, HasValidSignatures);
        push!(self.has_valid_signatures_by, HasValidSignaturesBy);
        push!(self.has_valid_signatures_by_keys, HasValidSignaturesByKeys);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{
        Body, Comment, Commit, FileChange, Review, Signature, SignatureKind, StaticPullContext,
        StaticPullContextData, Timestamp,
    };
    use std::collections::HashMap;

    fn empty_ctx() -> StaticPullContextData {
        StaticPullContextData {
            owner: "o".into(),
            repo: "acme-repo".into(),
            number: 1,
            title: "Fix the thing".into(),
            author: "mhaypenny".into(),
            head_sha: "h".into(),
            base_ref: "main".into(),
            head_ref: "feature/foo".into(),
            commits: vec![],
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

    #[test]
    fn changed_files_ignores_before_matching() {
        let mut data = empty_ctx();
        data.changed_files = vec![
            FileChange {
                filename: "docs/readme.md".into(),
                status: FileStatus::Modified,
                additions: 1,
                deletions: 0,
            },
            FileChange {
                filename: "src/lib.rs".into(),
                status: FileStatus::Modified,
                additions: 3,
                deletions: 1,
            },
        ];
        let ctx = StaticPullContext::new(data);
        let pred = Predicate::ChangedFiles(PathsConfig {
            paths: vec![CompiledRegex::compile(".*").unwrap()],
            ignore: vec![CompiledRegex::compile("^docs/").unwrap()],
        });
        let result = pred.evaluate(&ctx).unwrap();
        assert!(result.satisfied);
        assert_eq!(result.values["matched_files"], json!(["src/lib.rs"]));
    }

    #[test]
    fn only_changed_files_requires_all_non_ignored_to_match() {
        let mut data = empty_ctx();
        data.changed_files = vec![FileChange {
            filename: "src/lib.rs".into(),
            status: FileStatus::Modified,
            additions: 1,
            deletions: 0,
        }];
        let ctx = StaticPullContext::new(data);
        let pred = Predicate::OnlyChangedFiles(PathsConfig {
            paths: vec![CompiledRegex::compile("^src/").unwrap()],
            ignore: vec![],
        });
        assert!(pred.evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn modified_lines_satisfied_if_any_expression_matches() {
        let mut data = empty_ctx();
        data.changed_files = vec![FileChange {
            filename: "a".into(),
            status: FileStatus::Modified,
            additions: 150,
            deletions: 0,
        }];
        let ctx = StaticPullContext::new(data);
        let pred = Predicate::ModifiedLines(ModifiedLinesConfig {
            additions: Some(ComparisonExpr::GreaterThan(100)),
            deletions: None,
            total: None,
        });
        assert!(pred.evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn author_is_only_contributor_true_variant() {
        let mut data = empty_ctx();
        data.head_sha = "c2".into();
        data.commits = vec![
            Commit {
                sha: "c2".into(),
                parents: vec!["c1".into()],
                author: "mhaypenny".into(),
                committer: "mhaypenny".into(),
                committed_via_web: false,
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
        let ctx = StaticPullContext::new(data);
        let pred = Predicate::AuthorIsOnlyContributor(true);
        assert!(pred.evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn author_is_only_contributor_detects_contrary_commit() {
        let mut data = empty_ctx();
        data.head_sha = "c2".into();
        data.commits = vec![
            Commit {
                sha: "c2".into(),
                parents: vec!["c1".into()],
                author: "someone-else".into(),
                committer: "someone-else".into(),
                committed_via_web: false,
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
        let ctx = StaticPullContext::new(data);
        let pred = Predicate::AuthorIsOnlyContributor(false);
        let result = pred.evaluate(&ctx).unwrap();
        assert!(result.satisfied);
        assert!(result.description.contains("c2"));
    }

    #[test]
    fn targets_branch_and_from_branch() {
        let ctx = StaticPullContext::new(empty_ctx());
        let targets = Predicate::TargetsBranch(CompiledRegex::compile("^main$").unwrap());
        assert!(targets.evaluate(&ctx).unwrap().satisfied);
        let from = Predicate::FromBranch(CompiledRegex::compile("^feature/").unwrap());
        assert!(from.evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn title_matches_any_of_when_populated() {
        let ctx = StaticPullContext::new(empty_ctx());
        let pred = Predicate::Title(MatchConfig {
            matches: vec![CompiledRegex::compile("^Fix").unwrap()],
            not_matches: vec![CompiledRegex::compile("WIP").unwrap()],
        });
        assert!(pred.evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn title_not_matches_applies_when_matches_empty() {
        let ctx = StaticPullContext::new(empty_ctx());
        let pred = Predicate::Title(MatchConfig {
            matches: vec![],
            not_matches: vec![CompiledRegex::compile("WIP").unwrap()],
        });
        assert!(pred.evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn repository_matches_owner_slash_repo() {
        let ctx = StaticPullContext::new(empty_ctx());
        let pred = Predicate::Repository(MatchConfig {
            matches: vec![CompiledRegex::compile("^o/acme-repo$").unwrap()],
            not_matches: vec![],
        });
        assert!(pred.evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn has_labels_is_case_insensitive_and_requires_all() {
        let mut data = empty_ctx();
        data.labels = HashSet::from(["Needs-Review".to_string(), "urgent".to_string()]);
        let ctx = StaticPullContext::new(data);
        let pred = Predicate::HasLabels(vec!["needs-review".into(), "URGENT".into()]);
        assert!(pred.evaluate(&ctx).unwrap().satisfied);
        let pred_missing = Predicate::HasLabels(vec!["missing".into()]);
        assert!(!pred_missing.evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn has_successful_status_list_form_defaults_to_success_only() {
        let mut data = empty_ctx();
        data.latest_statuses.insert("ci/build".into(), Conclusion::Success);
        let ctx = StaticPullContext::new(data);
        let cfg: StatusConfig = serde_yaml::from_str("[ci/build]").unwrap();
        let pred = Predicate::HasSuccessfulStatus(cfg);
        assert!(pred.evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn has_status_object_form_supports_skipped_is_success() {
        let mut data = empty_ctx();
        data.latest_statuses.insert("ci/optional".into(), Conclusion::Skipped);
        let ctx = StaticPullContext::new(data);
        let cfg: StatusConfig = serde_yaml::from_str(
            "contexts: [ci/optional]\nskipped_is_success: true\n",
        )
        .unwrap();
        let pred = Predicate::HasStatus(cfg);
        assert!(pred.evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn has_status_reports_missing_vs_failing() {
        let mut data = empty_ctx();
        data.latest_statuses.insert("ci/build".into(), Conclusion::Failure);
        let ctx = StaticPullContext::new(data);
        let cfg = StatusConfig {
            contexts: vec!["ci/build".into(), "ci/missing".into()],
            conclusions: None,
            skipped_is_success: false,
        };
        let result = Predicate::HasStatus(cfg).evaluate(&ctx).unwrap();
        assert!(!result.satisfied);
        assert_eq!(result.values["missingResults"], json!(["ci/missing"]));
        assert_eq!(result.values["failingStatuses"], json!(["ci/build"]));
    }

    #[test]
    fn has_workflow_result_requires_every_attempt_to_pass() {
        let mut data = empty_ctx();
        data.latest_workflow_runs
            .insert(".github/workflows/ci.yml".into(), vec![Conclusion::Failure, Conclusion::Success]);
        let ctx = StaticPullContext::new(data);
        let cfg = WorkflowConfig {
            workflows: vec![".github/workflows/ci.yml".into()],
            conclusions: None,
        };
        assert!(!Predicate::HasWorkflowResult(cfg).evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn has_valid_signatures_true_requires_every_commit_signed() {
        let mut data = empty_ctx();
        data.head_sha = "c1".into();
        data.commits = vec![Commit {
            sha: "c1".into(),
            parents: vec![],
            author: "a".into(),
            committer: "a".into(),
            committed_via_web: false,
            signature: Some(Signature {
                valid: true,
                kind: SignatureKind::Gpg,
                signer: Some("a".into()),
                key_id: Some("KEY1".into()),
            }),
        }];
        let ctx = StaticPullContext::new(data);
        assert!(Predicate::HasValidSignatures(true).evaluate(&ctx).unwrap().satisfied);
        assert!(!Predicate::HasValidSignatures(false).evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn has_valid_signatures_by_keys_requires_gpg_and_whitelisted_key() {
        let mut data = empty_ctx();
        data.head_sha = "c1".into();
        data.commits = vec![Commit {
            sha: "c1".into(),
            parents: vec![],
            author: "a".into(),
            committer: "a".into(),
            committed_via_web: false,
            signature: Some(Signature {
                valid: true,
                kind: SignatureKind::Gpg,
                signer: Some("a".into()),
                key_id: Some("KEY1".into()),
            }),
        }];
        let ctx = StaticPullContext::new(data);
        let pred_ok = Predicate::HasValidSignaturesByKeys(vec!["KEY1".into()]);
        assert!(pred_ok.evaluate(&ctx).unwrap().satisfied);
        let pred_fail = Predicate::HasValidSignaturesByKeys(vec!["OTHER".into()]);
        assert!(!pred_fail.evaluate(&ctx).unwrap().satisfied);
    }

    #[test]
    fn raw_predicates_preserve_declaration_order() {
        let raw: RawPredicates = serde_yaml::from_str(
            "has_labels: [urgent]\nchanged_files:\n  paths: [\"^src/\"]\n",
        )
        .unwrap();
        let predicates = raw.into_predicates();
        let names: Vec<&str> = predicates.iter().map(Predicate::name).collect();
        assert_eq!(names, vec!["ChangedFiles", "HasLabels"]);
    }
}
