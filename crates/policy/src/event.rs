//! External webhook glue (spec.md §4.H / §6 event table): maps an inbound
//! GitHub webhook to the [`TriggerSet`] bits it could affect, so the dispatcher can
//! skip re-evaluating a policy whose trigger set doesn't intersect the event.

use crate::trigger::TriggerSet;
use serde::Deserialize;

/// The webhook event classes this engine reacts to (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    PullRequestOpened,
    PullRequestEdited,
    PullRequestSynchronize,
    IssueComment,
    PullRequestReviewComment,
    PullRequestReview,
    Status,
    CheckRun,
    CheckSuite,
    WorkflowRun,
    Labeled,
    Unlabeled,
}

impl WebhookEvent {
    /// The [`TriggerSet`] bits this event class could flip (spec.md §6 event table).
    #[must_use]
    pub fn trigger_bits(self) -> TriggerSet {
        match self {
            WebhookEvent::PullRequestOpened
            | WebhookEvent::PullRequestEdited
            | WebhookEvent::PullRequestSynchronize => TriggerSet::PULL_REQUEST | TriggerSet::COMMIT,
            WebhookEvent::IssueComment | WebhookEvent::PullRequestReviewComment => TriggerSet::COMMENT,
            WebhookEvent::PullRequestReview => TriggerSet::REVIEW,
            WebhookEvent::Status
            | WebhookEvent::CheckRun
            | WebhookEvent::CheckSuite
            | WebhookEvent::WorkflowRun => TriggerSet::STATUS,
            WebhookEvent::Labeled | WebhookEvent::Unlabeled => TriggerSet::LABEL,
        }
    }

    /// Whether a policy whose combined trigger bitmap is `policy_trigger` needs
    /// re-evaluation in response to this event.
    #[must_use]
    pub fn should_reevaluate(self, policy_trigger: TriggerSet) -> bool {
        policy_trigger.intersects(self.trigger_bits())
    }
}
