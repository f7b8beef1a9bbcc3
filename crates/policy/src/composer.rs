//! Policy Composer (spec.md §4.G) — combines named rules into an `and`/`or`
//! evaluator tree and walks it to a single top-level [`EvalResult`].

use crate::context::PullContext;
use crate::error::{PolicyError, PolicyResult};
use crate::result::{EvalResult, Status};
use crate::rule::{ApprovalRule, DisapprovalRule};
use crate::trigger::TriggerSet;
use serde::Deserialize;
use std::collections::HashMap;

/// Maximum `and`/`or` nesting depth a policy document may declare (spec.md §4.G).
pub const MAX_DEPTH: usize = 5;

/// The as-authored shape of `policy.approval` / `policy.disapproval` composition:
/// a bare rule name, or a single-key `and`/`or` map whose value is a list of the
/// same shape. A bare list at the root is implicitly `and:` (handled by the YAML
/// caller, see [`crate::config`]).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawConjunction {
    Rule(String),
    Composite(HashMap<String, Vec<RawConjunction>>),
}

/// A compiled evaluator-tree node: either a leaf naming one rule, or an `and`/`or`
/// node over child nodes.
#[derive(Debug, Clone)]
pub enum Evaluator {
    Leaf(String),
    And(Vec<Evaluator>),
    Or(Vec<Evaluator>),
}

/// Compile a [`RawConjunction`] into an [`Evaluator`], validating max depth and
/// that every referenced rule name exists in `known_rules`.
pub fn compile(
    raw: &RawConjunction,
    known_rules: &std::collections::HashSet<String>,
) -> Result<Evaluator, String> {
    compile_at(raw, known_rules, 0, &[])
}

fn compile_at(
    raw: &RawConjunction,
    known_rules: &std::collections::HashSet<String>,
    depth: usize,
    path: &[usize],
) -> Result<Evaluator, String> {
    if depth > MAX_DEPTH {
        return Err(format!("policy nesting exceeds maximum depth of {MAX_DEPTH}"));
    }
    match raw {
        RawConjunction::Rule(name) => {
            if !known_rules.contains(name) {
                return Err(format!(
                    "{}policy references undefined rule '{name}'",
                    path_prefix(path)
                ));
            }
            Ok(Evaluator::Leaf(name.clone()))
        }
        RawConjunction::Composite(map) => {
            if map.len() != 1 {
                return Err(format!(
                    "{}composite policy node must have exactly one key ('and' or 'or')",
                    path_prefix(path)
                ));
            }
            let (key, children) = map.iter().next().expect("checked len == 1");
            if children.is_empty() {
                return Err(format!("{}'{key}' must be a non-empty list", path_prefix(path)));
            }
            let mut compiled = Vec::with_capacity(children.len());
            for (i, child) in children.iter().enumerate() {
                let mut child_path = path.to_vec();
                child_path.push(i);
                let node = compile_at(child, known_rules, depth + 1, &child_path).map_err(|e| {
                    format!("failed to parse subpolicy (index={i}) for '{key}': {e}")
                })?;
                compiled.push(node);
            }
            match key.as_str() {
                "and" => Ok(Evaluator::And(compiled)),
                "or" => Ok(Evaluator::Or(compiled)),
                other => Err(format!("{}unknown composition key '{other}'", path_prefix(path))),
            }
        }
    }
}

fn path_prefix(path: &[usize]) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(
            "{}: ",
            path.iter().map(|i| format!("index={i}")).collect::<Vec<_>>().join(", ")
        )
    }
}

/// The full set of rules a compiled policy may reference, by name.
pub struct RuleSet<'a> {
    pub approval: &'a HashMap<String, ApprovalRule>,
    pub disapproval: &'a HashMap<String, DisapprovalRule>,
}

impl Evaluator {
    /// Union of every leaf rule's trigger bitmap reachable from this node.
    #[must_use]
    pub fn trigger(&self, rules: &RuleSet<'_>) -> TriggerSet {
        match self {
            Evaluator::Leaf(name) => rules
                .approval
                .get(name)
                .map(ApprovalRule::trigger)
                .or_else(|| rules.disapproval.get(name).map(DisapprovalRule::trigger))
                .unwrap_or(TriggerSet::NONE),
            Evaluator::And(children) | Evaluator::Or(children) => {
                children.iter().map(|c| c.trigger(rules)).collect()
            }
        }
    }

    /// Evaluate this node against `ctx`, walking leaves to the named rule's
    /// `evaluate()` and composing children per the AND/OR semantics of spec.md §4.G.
    pub fn evaluate(
        &self,
        ctx: &dyn PullContext,
        rules: &RuleSet<'_>,
    ) -> PolicyResult<EvalResult> {
        match self {
            Evaluator::Leaf(name) => evaluate_leaf(name, ctx, rules),
            Evaluator::And(children) => evaluate_and(children, ctx, rules),
            Evaluator::Or(children) => evaluate_or(children, ctx, rules),
        }
    }
}

fn evaluate_leaf(
    name: &str,
    ctx: &dyn PullContext,
    rules: &RuleSet<'_>,
) -> PolicyResult<EvalResult> {
    if let Some(rule) = rules.approval.get(name) {
        return rule.evaluate(ctx);
    }
    if let Some(rule) = rules.disapproval.get(name) {
        return rule.evaluate(ctx);
    }
    Err(PolicyError::Evaluation(format!("policy references undefined rule '{name}'")))
}

fn evaluate_and(
    children: &[Evaluator],
    ctx: &dyn PullContext,
    rules: &RuleSet<'_>,
) -> PolicyResult<EvalResult> {
    let mut results = Vec::with_capacity(children.len());
    for child in children {
        let result = match child.evaluate(ctx, rules) {
            Ok(r) => r,
            Err(e) => EvalResult::error("and".to_string(), String::new(), e.to_string()),
        };
        if result.status == Status::Disapproved {
            let mut node = and_node(results);
            node.children.push(result.clone());
            node.status = Status::Disapproved;
            node.status_description = result.status_description.clone();
            return Ok(node);
        }
        results.push(result);
    }

    let approved = results.iter().filter(|r| r.status == Status::Approved).count();
    let pending = results.iter().filter(|r| r.status == Status::Pending).count();
    let errored = results.iter().any(|r| r.status == Status::Error);

    let mut node = and_node(results);
    if errored {
        node.status = Status::Error;
        node.status_description = "one or more rules in the conjunction failed to evaluate".to_string();
    } else if pending > 0 {
        node.status = Status::Pending;
        node.status_description = format!("{approved}/{} rules approved", approved + pending);
    } else if approved > 0 {
        node.status = Status::Approved;
        node.status_description = format!("{approved}/{approved} rules approved");
    } else {
        node.status = Status::Skipped;
        node.status_description = "All of the rules are skipped".to_string();
    }
    Ok(node)
}

fn evaluate_or(
    children: &[Evaluator],
    ctx: &dyn PullContext,
    rules: &RuleSet<'_>,
) -> PolicyResult<EvalResult> {
    let mut results = Vec::with_capacity(children.len());
    for child in children {
        let result = match child.evaluate(ctx, rules) {
            Ok(r) => r,
            Err(e) => EvalResult::error("or".to_string(), String::new(), e.to_string()),
        };
        if result.status == Status::Approved {
            let mut node = or_node(results);
            node.children.push(result.clone());
            node.status = Status::Approved;
            node.status_description = "One or more rules approved".to_string();
            return Ok(node);
        }
        results.push(result);
    }

    let pending = results.iter().any(|r| r.status == Status::Pending);
    let disapproved = results.iter().find(|r| r.status == Status::Disapproved).cloned();

    let mut node = or_node(results);
    if pending {
        node.status = Status::Pending;
        node.status_description = "additional approval is required".to_string();
    } else if let Some(d) = disapproved {
        node.status = Status::Disapproved;
        node.status_description = d.status_description.clone();
    } else {
        node.status = Status::Skipped;
        node.status_description = "All of the rules are skipped".to_string();
    }
    Ok(node)
}

fn and_node(children: Vec<EvalResult>) -> EvalResult {
    EvalResult {
        name: "and".to_string(),
        description: String::new(),
        status: Status::Skipped,
        status_description: String::new(),
        error: None,
        approvers: vec![],
        dismissals: vec![],
        review_request_rule: None,
        predicate_results: vec![],
        children,
    }
}

fn or_node(children: Vec<EvalResult>) -> EvalResult {
    EvalResult {
        name: "or".to_string(),
        description: String::new(),
        status: Status::Skipped,
        status_description: String::new(),
        error: None,
        approvers: vec![],
        dismissals: vec![],
        review_request_rule: None,
        predicate_results: vec![],
        children,
    }
}
