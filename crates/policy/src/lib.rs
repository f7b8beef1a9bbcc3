//! Pull-request approval/disapproval policy engine.
//!
//! This crate evaluates a declarative policy document against the state of a pull
//! request and produces a pass/fail verdict plus a full explanation tree, without
//! ever making a GitHub API call itself: all host interaction is abstracted behind
//! the [`context::PullContext`] trait, so the engine is deterministic and testable
//! against synthetic fixtures.
//!
//! Evaluation pipeline, end to end:
//! 1. [`config::PolicyFile::from_yaml`] parses and validates a policy document,
//!    fails closed with an indexed [`config::ConfigError`] on any malformed input.
//! 2. [`composer::Evaluator`] walks the compiled `and`/`or` tree, dispatching each
//!    leaf to a [`rule::ApprovalRule`] or [`rule::DisapprovalRule`].
//! 3. Each rule checks its [`predicates::Predicate`] preconditions, gathers
//!    [`candidates::Candidate`]s via [`candidates::Methods`], filters them against
//!    an [`actors::Actors`] membership set, and renders a [`result::EvalResult`].
//! 4. [`event::WebhookEvent`] lets a caller skip re-evaluation entirely when an
//!    inbound webhook's [`trigger::TriggerSet`] bits can't affect the outcome.
//!
//! Every getter on [`context::PullContext`] returns a [`error::PolicyResult`], so a
//! single flaky GitHub API call surfaces as [`error::PolicyError::Evaluation`]
//! rather than panicking; [`error::PolicyError::Cancelled`] lets a caller abort an
//! in-flight evaluation without fabricating a status.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod actors;
pub mod candidates;
pub mod comparison;
pub mod composer;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod observer;
pub mod predicates;
pub mod regex_field;
pub mod result;
pub mod rule;
pub mod trigger;

pub use actors::Actors;
pub use candidates::{Candidate, CandidateType, Methods};
pub use composer::{Evaluator, RuleSet};
pub use config::{ConfigError, PolicyFile};
pub use context::{Permission, PullContext, ReviewState};
pub use error::{PolicyError, PolicyResult};
pub use event::WebhookEvent;
pub use observer::{install_audit_sink, policy_metrics, set_observer, AuditRecord, AuditSink, PolicyObserver};
pub use predicates::Predicate;
pub use result::{EvalResult, Status};
pub use rule::{ApprovalRule, DisapprovalRule, Requires};
pub use trigger::TriggerSet;
