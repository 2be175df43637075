//! Resolver facade (C6): orchestrates C1–C5 and returns a resolution
//! report.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::kernel::constants::PLUGIN_NAME_PATTERN_HINT;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::Plugin;
use crate::plugin_system::version::Version;
use crate::resolver::conflict::{apply_strategy, Conflict, ResolutionStrategy};
use crate::resolver::graph::DependencyGraph;
use crate::resolver::topo::{topological_sort, OrderHint};
use crate::resolver::version_resolve::{ConstraintEntry, ResolvedVersion, VersionResolver};

/// `{order, conflicts, versions, warnings, resolution_time}` — the full
/// account of one `resolve` call.
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    pub order: Vec<String>,
    /// Every conflict detected before the strategy was applied, rendered —
    /// present even when the strategy downgraded all of them to warnings.
    /// Empty only when none were detected at all.
    pub conflicts: Vec<String>,
    pub versions: HashMap<String, Version>,
    pub warnings: Vec<String>,
    pub resolution_time: Duration,
}

fn is_valid_plugin_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Constraint-only checks without allocating a graph: plugin name format,
/// duplicate names. Prerequisite checks that must pass before a graph can
/// even be built.
pub fn validate_plugins(plugins: &[Arc<dyn Plugin>]) -> Result<(), PluginSystemError> {
    let mut seen = std::collections::HashSet::new();
    for plugin in plugins {
        if !is_valid_plugin_name(plugin.name()) {
            return Err(PluginSystemError::InvalidPluginName(format!(
                "{} (expected {})",
                plugin.name(),
                PLUGIN_NAME_PATTERN_HINT
            )));
        }
        if !seen.insert(plugin.name().to_string()) {
            return Err(PluginSystemError::DuplicatePlugin(plugin.name().to_string()));
        }
    }
    Ok(())
}

/// `resolve({plugins, strategy, config}) -> ResolutionResult`.
///
/// `allow_circular_dependencies` gates only cycles made up entirely of
/// optional edges: any cycle containing at least one non-optional edge is
/// fatal regardless of this flag or `strategy` (spec's chosen resolution to
/// the two-resolver-implementations open question — cycles through any
/// non-optional edge are fatal, checked on the graph as built).
pub fn resolve(
    plugins: &[Arc<dyn Plugin>],
    strategy: ResolutionStrategy,
    context: &BTreeMap<String, Value>,
    allow_circular_dependencies: bool,
    priorities: &HashMap<String, i64>,
    hints: &[OrderHint],
) -> Result<ResolutionResult, PluginSystemError> {
    let start = Instant::now();
    validate_plugins(plugins)?;

    let mut graph = DependencyGraph::new();
    for plugin in plugins {
        graph.add_node(plugin.name(), plugin.version().clone(), false);
    }

    let mut version_resolver = VersionResolver::new();
    for plugin in plugins {
        version_resolver.register_available(plugin.name(), plugin.version().clone());
    }

    let mut raw_conflicts: Vec<Conflict> = Vec::new();

    for plugin in plugins {
        for dep in plugin.dependencies() {
            if !dep.is_active(context) {
                raw_conflicts.push(Conflict::Condition { plugin: plugin.name().to_string(), target: dep.target.clone() });
                continue;
            }

            graph.add_edge(plugin.name(), &dep.target, dep.optional);

            if !graph.contains(&dep.target) {
                raw_conflicts.push(Conflict::Missing {
                    target: dep.target.clone(),
                    required_by: plugin.name().to_string(),
                    optional: dep.optional,
                });
                continue;
            }

            version_resolver.register_constraint(ConstraintEntry {
                target: dep.target.clone(),
                constraint: dep.constraint.clone(),
                required_by: plugin.name().to_string(),
            });
        }
    }

    for resolved in version_resolver.resolve_all() {
        if let ResolvedVersion::Conflict(c) = resolved {
            raw_conflicts.push(Conflict::Version(c));
        }
    }

    let mut permitted_cycle_warnings = Vec::new();
    for cycle in graph.detect_cycles() {
        if cycle.fully_optional && allow_circular_dependencies {
            permitted_cycle_warnings.push(format!(
                "permitted circular dependency through optional edges only: {}",
                cycle.path.join(" -> ")
            ));
            continue;
        }
        raw_conflicts.push(Conflict::Circular { cycle: cycle.path });
    }

    let raw_conflicts_rendered: Vec<String> = raw_conflicts.iter().map(Conflict::describe).collect();

    let outcome = apply_strategy(raw_conflicts, strategy);
    if !outcome.unresolved.is_empty() {
        return Err(describe_unresolved(&outcome.unresolved));
    }

    let sort_outcome = topological_sort(&graph, hints, priorities);

    if !crate::resolver::topo::validate_order(&graph, &sort_outcome.order) {
        return Err(PluginSystemError::CircularDependency { cycle: sort_outcome.order.clone() });
    }

    let mut warnings = outcome.warnings;
    warnings.extend(permitted_cycle_warnings);
    warnings.extend(sort_outcome.warnings);

    let versions: HashMap<String, Version> =
        plugins.iter().map(|p| (p.name().to_string(), p.version().clone())).collect();

    Ok(ResolutionResult {
        order: sort_outcome.order,
        conflicts: raw_conflicts_rendered,
        versions,
        warnings,
        resolution_time: start.elapsed(),
    })
}

/// One specific `PluginSystemError` per conflict; the kind a single
/// unresolved conflict of this shape has always produced.
fn describe_one(conflict: &Conflict) -> PluginSystemError {
    match conflict {
        Conflict::Missing { target, required_by, .. } => {
            PluginSystemError::MissingDependency { target: target.clone(), required_by: required_by.clone() }
        }
        Conflict::Circular { cycle } => PluginSystemError::CircularDependency { cycle: cycle.clone() },
        Conflict::Version(v) => PluginSystemError::VersionConflict {
            target: v.target.clone(),
            candidates: v.candidates.iter().map(|c| c.to_string()).collect(),
            required_by: v.required_by.clone(),
        },
        Conflict::Condition { plugin, target } => {
            PluginSystemError::ConditionUnmet { plugin: plugin.clone(), target: target.clone() }
        }
        Conflict::LoadOrder { detail } => PluginSystemError::CircularDependency { cycle: vec![detail.clone()] },
    }
}

/// Surfaces every unresolved conflict, not just the first: a single
/// survivor keeps its specific variant (so callers can still match
/// `VersionConflict`/`CircularDependency`/etc. directly), while two or more
/// collapse into `ResolutionFailed` carrying all of them rendered.
fn describe_unresolved(unresolved: &[Conflict]) -> PluginSystemError {
    if let [only] = unresolved {
        return describe_one(only);
    }
    PluginSystemError::ResolutionFailed { conflicts: unresolved.iter().map(Conflict::describe).collect() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin_system::dependency::PluginDependency;
    use crate::plugin_system::entity::ApiSurface;
    use crate::plugin_system::traits::plugin;
    use crate::plugin_system::version::VersionConstraint;

    fn make(name: &str, version: Version, deps: Vec<PluginDependency>) -> Arc<dyn Plugin> {
        let mut builder = plugin(name, version).setup(|_ctx| async { Ok(ApiSurface::new()) });
        for d in deps {
            builder = builder.depends_on(d);
        }
        builder.build()
    }

    #[test]
    fn linear_chain_resolves_in_dependency_order() {
        let a = make("a", Version::new(1, 0, 0), vec![]);
        let b = make(
            "b",
            Version::new(1, 0, 0),
            vec![PluginDependency::required("a", VersionConstraint::parse("^1.0.0").unwrap())],
        );
        let c = make(
            "c",
            Version::new(1, 0, 0),
            vec![PluginDependency::required("b", VersionConstraint::parse("^1.0.0").unwrap())],
        );
        let result = resolve(&[a, b, c], ResolutionStrategy::Strict, &BTreeMap::new(), false, &HashMap::new(), &[]).unwrap();
        assert_eq!(result.order, vec!["a", "b", "c"]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn version_conflict_fails_under_strict() {
        let a = make("a", Version::new(1, 0, 0), vec![]);
        let b = make(
            "b",
            Version::new(1, 0, 0),
            vec![PluginDependency::required("a", VersionConstraint::parse("^1.0.0").unwrap())],
        );
        let c = make(
            "c",
            Version::new(1, 0, 0),
            vec![PluginDependency::required("a", VersionConstraint::parse("^2.0.0").unwrap())],
        );
        let err = resolve(&[a, b, c], ResolutionStrategy::Strict, &BTreeMap::new(), false, &HashMap::new(), &[]).unwrap_err();
        match err {
            PluginSystemError::VersionConflict { required_by, .. } => {
                assert_eq!(required_by, vec!["b".to_string(), "c".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn circular_dependency_fails() {
        let a = make(
            "a",
            Version::new(1, 0, 0),
            vec![PluginDependency::required("b", VersionConstraint::parse("*").unwrap())],
        );
        let b = make(
            "b",
            Version::new(1, 0, 0),
            vec![PluginDependency::required("a", VersionConstraint::parse("*").unwrap())],
        );
        let err = resolve(&[a, b], ResolutionStrategy::Strict, &BTreeMap::new(), false, &HashMap::new(), &[]).unwrap_err();
        assert!(matches!(err, PluginSystemError::CircularDependency { .. }));
    }

    #[test]
    fn circular_dependency_through_optional_edges_is_fatal_unless_allowed() {
        let a = make(
            "a",
            Version::new(1, 0, 0),
            vec![PluginDependency::optional("b", VersionConstraint::parse("*").unwrap())],
        );
        let b = make(
            "b",
            Version::new(1, 0, 0),
            vec![PluginDependency::optional("a", VersionConstraint::parse("*").unwrap())],
        );
        let err = resolve(&[a.clone(), b.clone()], ResolutionStrategy::Strict, &BTreeMap::new(), false, &HashMap::new(), &[]).unwrap_err();
        assert!(matches!(err, PluginSystemError::CircularDependency { .. }));

        let result = resolve(&[a, b], ResolutionStrategy::Strict, &BTreeMap::new(), true, &HashMap::new(), &[]).unwrap();
        assert_eq!(result.order.len(), 2);
        assert!(result.warnings.iter().any(|w| w.contains("permitted circular dependency")));
    }

    #[test]
    fn circular_dependency_with_one_mandatory_edge_is_fatal_even_when_allowed() {
        let a = make(
            "a",
            Version::new(1, 0, 0),
            vec![PluginDependency::required("b", VersionConstraint::parse("*").unwrap())],
        );
        let b = make(
            "b",
            Version::new(1, 0, 0),
            vec![PluginDependency::optional("a", VersionConstraint::parse("*").unwrap())],
        );
        let err = resolve(&[a, b], ResolutionStrategy::Strict, &BTreeMap::new(), true, &HashMap::new(), &[]).unwrap_err();
        assert!(matches!(err, PluginSystemError::CircularDependency { .. }));
    }

    #[test]
    fn optional_missing_succeeds_with_warning_under_auto() {
        let a = make(
            "a",
            Version::new(1, 0, 0),
            vec![PluginDependency::optional("b", VersionConstraint::parse("^1.0.0").unwrap())],
        );
        let result = resolve(&[a], ResolutionStrategy::Auto, &BTreeMap::new(), false, &HashMap::new(), &[]).unwrap();
        assert_eq!(result.order, vec!["a"]);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn optional_missing_is_fatal_under_strict() {
        let a = make(
            "a",
            Version::new(1, 0, 0),
            vec![PluginDependency::optional("b", VersionConstraint::parse("^1.0.0").unwrap())],
        );
        let err = resolve(&[a], ResolutionStrategy::Strict, &BTreeMap::new(), false, &HashMap::new(), &[]).unwrap_err();
        assert!(matches!(err, PluginSystemError::MissingDependency { .. }));
    }

    #[test]
    fn invalid_plugin_name_is_rejected() {
        let a = make("Not-Valid", Version::new(1, 0, 0), vec![]);
        let err = resolve(&[a], ResolutionStrategy::Strict, &BTreeMap::new(), false, &HashMap::new(), &[]).unwrap_err();
        assert!(matches!(err, PluginSystemError::InvalidPluginName(_)));
    }

    #[test]
    fn multiple_unresolved_conflicts_are_all_surfaced() {
        let a = make("a", Version::new(1, 0, 0), vec![]);
        let b = make(
            "b",
            Version::new(1, 0, 0),
            vec![PluginDependency::required("a", VersionConstraint::parse("^1.0.0").unwrap())],
        );
        let c = make(
            "c",
            Version::new(1, 0, 0),
            vec![
                PluginDependency::required("a", VersionConstraint::parse("^2.0.0").unwrap()),
                PluginDependency::required("missing-dep", VersionConstraint::parse("*").unwrap()),
            ],
        );
        let err = resolve(&[a, b, c], ResolutionStrategy::Strict, &BTreeMap::new(), false, &HashMap::new(), &[]).unwrap_err();
        match err {
            PluginSystemError::ResolutionFailed { conflicts } => {
                assert_eq!(conflicts.len(), 2);
                assert!(conflicts.iter().any(|c| c.contains("version conflict")));
                assert!(conflicts.iter().any(|c| c.contains("missing-dep")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn resolution_result_reports_downgraded_conflicts() {
        let a = make(
            "a",
            Version::new(1, 0, 0),
            vec![PluginDependency::optional("b", VersionConstraint::parse("^1.0.0").unwrap())],
        );
        let result = resolve(&[a], ResolutionStrategy::Auto, &BTreeMap::new(), false, &HashMap::new(), &[]).unwrap();
        assert_eq!(result.conflicts.len(), 1);
        assert!(result.conflicts[0].contains("missing"));
    }

    #[test]
    fn duplicate_plugin_is_rejected() {
        let a1 = make("a", Version::new(1, 0, 0), vec![]);
        let a2 = make("a", Version::new(1, 0, 1), vec![]);
        let err = resolve(&[a1, a2], ResolutionStrategy::Strict, &BTreeMap::new(), false, &HashMap::new(), &[]).unwrap_err();
        assert!(matches!(err, PluginSystemError::DuplicatePlugin(_)));
    }
}
