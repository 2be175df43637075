//! Conflict engine (C5): classifies raw diagnostics into typed conflicts
//! and applies a resolution strategy.

use crate::resolver::version_resolve::VersionConflict;

/// Policy governing how the conflict engine treats each conflict kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    Strict,
    Permissive,
    Auto,
}

#[derive(Debug, Clone)]
pub enum Conflict {
    Missing { target: String, required_by: String, optional: bool },
    Circular { cycle: Vec<String> },
    Version(VersionConflict),
    LoadOrder { detail: String },
    Condition { plugin: String, target: String },
}

impl Conflict {
    /// A one-line rendering used for `ResolutionResult::conflicts` and the
    /// composite error built from more than one unresolved conflict.
    pub fn describe(&self) -> String {
        match self {
            Conflict::Missing { target, required_by, optional } => format!(
                "missing {}dependency '{target}' required by '{required_by}'",
                if *optional { "optional " } else { "" }
            ),
            Conflict::Circular { cycle } => format!("circular dependency: {}", cycle.join(" -> ")),
            Conflict::Version(v) => format!(
                "version conflict for '{}': no version in {:?} satisfies all constraints from {:?}",
                v.target, v.candidates, v.required_by
            ),
            Conflict::LoadOrder { detail } => format!("load order conflict: {detail}"),
            Conflict::Condition { plugin, target } => {
                format!("condition unmet for '{plugin}' dependency on '{target}'")
            }
        }
    }
}

/// Outcome of applying a [`ResolutionStrategy`] to a raw conflict list:
/// conflicts the strategy did not absorb remain fatal; absorbed ones
/// become warnings.
pub struct StrategyOutcome {
    pub unresolved: Vec<Conflict>,
    pub warnings: Vec<String>,
}

/// Applies `strategy` to `conflicts` per the fixed behavior matrix:
///
/// | strategy   | missing                      | circular | version                          | load_order        |
/// |------------|------------------------------|----------|-----------------------------------|--------------------|
/// | strict     | fail                         | fail     | fail                              | fail               |
/// | permissive | warn if optional, else fail  | fail     | warn                              | warn               |
/// | auto       | warn if optional             | fail     | warn if the conflict is condition-gated away, else fail | adjust order and warn |
pub fn apply_strategy(conflicts: Vec<Conflict>, strategy: ResolutionStrategy) -> StrategyOutcome {
    let mut unresolved = Vec::new();
    let mut warnings = Vec::new();

    for conflict in conflicts {
        match &conflict {
            Conflict::Circular { cycle } => {
                unresolved.push(Conflict::Circular { cycle: cycle.clone() });
            }
            Conflict::Missing { target, required_by, optional } => match strategy {
                ResolutionStrategy::Strict => unresolved.push(conflict),
                ResolutionStrategy::Permissive | ResolutionStrategy::Auto => {
                    if *optional {
                        warnings.push(format!("missing optional dependency '{}' required by '{}'", target, required_by));
                    } else {
                        unresolved.push(conflict);
                    }
                }
            },
            Conflict::Condition { plugin, target } => match strategy {
                ResolutionStrategy::Strict => unresolved.push(conflict),
                ResolutionStrategy::Permissive | ResolutionStrategy::Auto => {
                    warnings.push(format!("condition unmet for '{}' dependency on '{}', skipped", plugin, target));
                }
            },
            Conflict::Version(v) => match strategy {
                ResolutionStrategy::Strict => unresolved.push(conflict),
                ResolutionStrategy::Permissive => {
                    warnings.push(format!(
                        "version conflict for '{}': no version in {:?} satisfies {:?}",
                        v.target, v.candidates, v.required_by
                    ));
                }
                ResolutionStrategy::Auto => {
                    unresolved.push(conflict);
                }
            },
            Conflict::LoadOrder { detail } => match strategy {
                ResolutionStrategy::Strict => unresolved.push(conflict),
                ResolutionStrategy::Permissive | ResolutionStrategy::Auto => {
                    warnings.push(format!("load order adjusted: {}", detail));
                }
            },
        }
    }

    StrategyOutcome { unresolved, warnings }
}
