//! Policy file loading (spec.md §6 "Policy file"). A policy document is parsed
//! once per repository at evaluation time: `approval_rules` / `disapproval_rules`
//! define the named rule library, `policy.approval` / `policy.disapproval` compose
//! them (or, for disapproval, apply a flat requirement) into the evaluator the
//! dispatcher actually runs.

use crate::composer::{compile, Evaluator, RawConjunction, RuleSet};
use crate::rule::{ApprovalOptions, ApprovalRule, CommonOptions, DisapprovalRule, RawRule, Requires};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// `policy.disapproval`: a flat requirement (no composition) applied as a single
/// synthetic rule (spec.md §6).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisapprovalPolicy {
    #[serde(default)]
    pub requires: Requires,
    #[serde(default)]
    pub options: CommonOptions,
}

/// `policy:` top-level block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyBlock {
    pub approval: Option<RawConjunction>,
    pub disapproval: Option<DisapprovalPolicy>,
}

/// The raw, as-authored policy document (spec.md §6).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPolicyFile {
    #[serde(default)]
    pub policy: PolicyBlock,
    #[serde(default)]
    pub approval_rules: Vec<RawRule<ApprovalOptions>>,
    #[serde(default)]
    pub disapproval_rules: Vec<RawRule<CommonOptions>>,
}

/// A fully compiled, ready-to-evaluate policy: named rules plus the composed
/// approval/disapproval evaluator trees.
pub struct PolicyFile {
    pub approval_rules: HashMap<String, ApprovalRule>,
    pub disapproval_rules: HashMap<String, DisapprovalRule>,
    pub approval: Evaluator,
    /// Synthesized as a single leaf named `"disapproval"` registered into
    /// `disapproval_rules`, since `policy.disapproval` has no composition (spec.md §6).
    pub disapproval: Evaluator,
}

/// A single indexed validation failure (spec.md §7 "Configuration errors ... surface
/// during parsing with an index-path").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

const DISAPPROVAL_RULE_NAME: &str = "disapproval";

impl PolicyFile {
    /// Parse and validate a policy document from its YAML source text.
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let raw: RawPolicyFile =
            serde_yaml::from_str(source).map_err(|e| ConfigError(format!("malformed policy YAML: {e}")))?;
        Self::compile(raw)
    }

    fn compile(raw: RawPolicyFile) -> Result<Self, ConfigError> {
        let mut approval_rules = HashMap::new();
        for (i, rule) in raw.approval_rules.into_iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(ConfigError(format!("approval_rules[{i}].name must be non-empty")));
            }
            let name = rule.name.clone();
            if approval_rules.insert(name.clone(), ApprovalRule::from(rule)).is_some() {
                return Err(ConfigError(format!(
                    "approval_rules[{i}]: duplicate rule name '{name}'"
                )));
            }
        }

        let mut disapproval_rules = HashMap::new();
        for (i, rule) in raw.disapproval_rules.into_iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(ConfigError(format!("disapproval_rules[{i}].name must be non-empty")));
            }
            let name = rule.name.clone();
            if disapproval_rules.insert(name.clone(), DisapprovalRule::from(rule)).is_some() {
                return Err(ConfigError(format!(
                    "disapproval_rules[{i}]: duplicate rule name '{name}'"
                )));
            }
        }

        let known: HashSet<String> =
            approval_rules.keys().chain(disapproval_rules.keys()).cloned().collect();

        let approval = match &raw.policy.approval {
            Some(conjunction) => {
                compile(conjunction, &known).map_err(|e| ConfigError(format!("failed to parse policy: {e}")))?
            }
            None => Evaluator::And(vec![]),
        };

        if let Some(disapproval_policy) = raw.policy.disapproval {
            disapproval_rules.insert(
                DISAPPROVAL_RULE_NAME.to_string(),
                DisapprovalRule {
                    name: DISAPPROVAL_RULE_NAME.to_string(),
                    description: String::new(),
                    predicates: vec![],
                    options: disapproval_policy.options,
                    requires: disapproval_policy.requires,
                },
            );
        }
        let disapproval = if disapproval_rules.contains_key(DISAPPROVAL_RULE_NAME) {
            Evaluator::Leaf(DISAPPROVAL_RULE_NAME.to_string())
        } else {
            Evaluator::And(vec![])
        };

        Ok(PolicyFile { approval_rules, disapproval_rules, approval, disapproval })
    }

    /// Borrow this policy's rules as a [`RuleSet`] for evaluator dispatch.
    #[must_use]
    pub fn rule_set(&self) -> RuleSet<'_> {
        RuleSet { approval: &self.approval_rules, disapproval: &self.disapproval_rules }
    }
}
