//! Actor Set (spec.md §4.B) — decides whether a username satisfies a membership
//! clause.

use crate::context::{Permission, PullContext};
use crate::error::PolicyResult;
use serde::{Deserialize, Serialize};

/// `{users, teams, organizations, permissions}` — matching is an OR across all four
/// dimensions. ANDing membership clauses is achieved by nesting rules, not by this
/// type (spec.md §4.B).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actors {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Actors {
    /// True when all four dimensions are empty. An empty `Actors` never matches
    /// any user (spec.md §4.B).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.teams.is_empty()
            && self.organizations.is_empty()
            && self.permissions.is_empty()
    }

    /// `true` iff `user` is directly listed, belongs to a listed team or
    /// organization, or holds at least one of the listed permission levels.
    pub fn is_actor(&self, user: &str, ctx: &dyn PullContext) -> PolicyResult<bool> {
        if self.users.iter().any(|u| u == user) {
            return Ok(true);
        }
        for team in &self.teams {
            if ctx.user_in_team(user, team)? {
                return Ok(true);
            }
        }
        for org in &self.organizations {
            if ctx.user_in_org(user, org)? {
                return Ok(true);
            }
        }
        if !self.permissions.is_empty() {
            let held = ctx.permission(user)?;
            if self.permissions.iter().any(|required| held >= *required) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Body, StaticPullContext, StaticPullContextData, Timestamp};
    use std::collections::{HashMap, HashSet};

    fn ctx_with_membership() -> StaticPullContext {
        let mut team_members = HashMap::new();
        team_members.insert("core".to_string(), HashSet::from(["alice".to_string()]));
        let mut org_members = HashMap::new();
        org_members.insert("cool-org".to_string(), HashSet::from(["bob".to_string()]));
        let mut permissions = HashMap::new();
        permissions.insert("carol".to_string(), Permission::Admin);

        StaticPullContext::new(StaticPullContextData {
            owner: "o".into(),
            repo: "r".into(),
            number: 1,
            title: "t".into(),
            author: "dave".into(),
            head_sha: "h".into(),
            base_ref: "main".into(),
            head_ref: "feature".into(),
            commits: vec![],
            comments: vec![],
            reviews: vec![],
            body: Body {
                body_text: String::new(),
                created_at: Timestamp(0),
                last_edited_at: Timestamp::ZERO,
                author: "dave".into(),
            },
            changed_files: vec![],
            labels: HashSet::new(),
            latest_statuses: HashMap::new(),
            latest_workflow_runs: HashMap::new(),
            pushed_at: HashMap::new(),
            team_members,
            org_members,
            permissions,
        })
    }

    #[test]
    fn empty_actors_never_match() {
        let ctx = ctx_with_membership();
        let actors = Actors::default();
        assert!(actors.is_empty());
        assert!(!actors.is_actor("alice", &ctx).unwrap());
    }

    #[test]
    fn direct_user_match() {
        let ctx = ctx_with_membership();
        let actors = Actors { users: vec!["alice".into()], ..Default::default() };
        assert!(actors.is_actor("alice", &ctx).unwrap());
        assert!(!actors.is_actor("zoe", &ctx).unwrap());
    }

    #[test]
    fn team_membership_matches() {
        let ctx = ctx_with_membership();
        let actors = Actors { teams: vec!["core".into()], ..Default::default() };
        assert!(actors.is_actor("alice", &ctx).unwrap());
        assert!(!actors.is_actor("bob", &ctx).unwrap());
    }

    #[test]
    fn org_membership_matches() {
        let ctx = ctx_with_membership();
        let actors = Actors { organizations: vec!["cool-org".into()], ..Default::default() };
        assert!(actors.is_actor("bob", &ctx).unwrap());
    }

    #[test]
    fn permission_threshold_matches_at_or_above() {
        let ctx = ctx_with_membership();
        let actors = Actors { permissions: vec![Permission::Write], ..Default::default() };
        assert!(actors.is_actor("carol", &ctx).unwrap());
        assert!(!actors.is_actor("dave", &ctx).unwrap());
    }
}
