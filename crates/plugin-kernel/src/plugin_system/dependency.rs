//! Declared dependencies between plugins, plus the condition language that
//! gates whether a dependency edge is actually in effect at resolve time.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::plugin_system::version::VersionConstraint;

/// The comparison a [`Condition`] performs against the resolve-time context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    Eq,
    NotEq,
    Exists,
    NotExists,
}

/// A single predicate evaluated against a name -> value context during
/// resolution. Used to make a dependency conditionally required, e.g.
/// "depend on `tls` only when `tls_enabled` is true".
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub kind: String,
    pub key: String,
    pub value: Option<Value>,
    pub op: ConditionOp,
}

impl Condition {
    pub fn exists(key: impl Into<String>) -> Self {
        Condition { kind: "context".to_string(), key: key.into(), value: None, op: ConditionOp::Exists }
    }

    pub fn not_exists(key: impl Into<String>) -> Self {
        Condition { kind: "context".to_string(), key: key.into(), value: None, op: ConditionOp::NotExists }
    }

    pub fn equals(key: impl Into<String>, value: Value) -> Self {
        Condition { kind: "context".to_string(), key: key.into(), value: Some(value), op: ConditionOp::Eq }
    }

    pub fn not_equals(key: impl Into<String>, value: Value) -> Self {
        Condition { kind: "context".to_string(), key: key.into(), value: Some(value), op: ConditionOp::NotEq }
    }

    /// Evaluates this condition against `context`. Pure, no I/O.
    pub fn evaluate(&self, context: &BTreeMap<String, Value>) -> bool {
        match self.op {
            ConditionOp::Exists => context.contains_key(&self.key),
            ConditionOp::NotExists => !context.contains_key(&self.key),
            ConditionOp::Eq => context.get(&self.key) == self.value.as_ref(),
            ConditionOp::NotEq => context.get(&self.key) != self.value.as_ref(),
        }
    }
}

/// A declared dependency on another plugin.
#[derive(Debug, Clone)]
pub struct PluginDependency {
    /// Name of the required plugin.
    pub target: String,
    /// Version constraint the target must satisfy.
    pub constraint: VersionConstraint,
    /// If true, a missing/unsatisfiable target is tolerated rather than fatal.
    pub optional: bool,
    /// Conditions gating whether this dependency is actually in effect.
    pub conditions: Vec<Condition>,
}

impl PluginDependency {
    pub fn required(target: impl Into<String>, constraint: VersionConstraint) -> Self {
        PluginDependency { target: target.into(), constraint, optional: false, conditions: Vec::new() }
    }

    pub fn optional(target: impl Into<String>, constraint: VersionConstraint) -> Self {
        PluginDependency { target: target.into(), constraint, optional: true, conditions: Vec::new() }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Whether this dependency is in effect given the resolve-time context.
    /// A dependency with no conditions is always in effect.
    pub fn is_active(&self, context: &BTreeMap<String, Value>) -> bool {
        self.conditions.iter().all(|c| c.evaluate(context))
    }
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.optional { "optional" } else { "required" };
        write!(f, "{} dependency on '{}' ({})", kind, self.target, self.constraint)
    }
}
