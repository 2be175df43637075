//! Version resolver (C3): gathers per-plugin constraint sets and picks a
//! concrete version per plugin, surfacing version conflicts.

use std::collections::HashMap;

use crate::plugin_system::version::{Version, VersionConstraint};

/// One constraint aimed at `target`, declared by `required_by`.
#[derive(Debug, Clone)]
pub struct ConstraintEntry {
    pub target: String,
    pub constraint: VersionConstraint,
    pub required_by: String,
}

#[derive(Debug, Clone)]
pub struct VersionConflict {
    pub target: String,
    pub candidates: Vec<Version>,
    pub required_by: Vec<String>,
}

/// Outcome of resolving a single plugin's incoming constraints.
pub enum ResolvedVersion {
    Ok(Version),
    Conflict(VersionConflict),
}

#[derive(Debug, Default)]
pub struct VersionResolver {
    available: HashMap<String, Version>,
    constraints: Vec<ConstraintEntry>,
}

impl VersionResolver {
    pub fn new() -> Self {
        VersionResolver::default()
    }

    pub fn register_available(&mut self, name: impl Into<String>, version: Version) {
        self.available.insert(name.into(), version);
    }

    pub fn register_constraint(&mut self, entry: ConstraintEntry) {
        self.constraints.push(entry);
    }

    /// Verifies the declared version of `target` satisfies every
    /// constraint aimed at it. Each plugin declares exactly one version,
    /// so resolution is a single satisfaction check against the
    /// intersection of all incoming constraints rather than a search over
    /// candidates; `pick_highest` exists for callers that do have multiple
    /// candidate versions available (e.g. future registries), not this
    /// single-version model.
    pub fn resolve(&self, target: &str) -> Option<ResolvedVersion> {
        let declared = self.available.get(target)?;
        let aimed: Vec<&ConstraintEntry> = self.constraints.iter().filter(|c| c.target == target).collect();

        if aimed.iter().all(|c| c.constraint.satisfies(declared)) {
            return Some(ResolvedVersion::Ok(declared.clone()));
        }

        Some(ResolvedVersion::Conflict(VersionConflict {
            target: target.to_string(),
            candidates: vec![declared.clone()],
            required_by: aimed.into_iter().map(|c| c.required_by.clone()).collect(),
        }))
    }

    pub fn resolve_all(&self) -> Vec<ResolvedVersion> {
        let mut targets: Vec<&String> = self.available.keys().collect();
        targets.sort();
        targets.into_iter().filter_map(|t| self.resolve(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_satisfying_constraint_resolves_ok() {
        let mut r = VersionResolver::new();
        r.register_available("a", Version::new(1, 0, 0));
        r.register_constraint(ConstraintEntry {
            target: "a".to_string(),
            constraint: VersionConstraint::parse("^1.0.0").unwrap(),
            required_by: "b".to_string(),
        });
        match r.resolve("a") {
            Some(ResolvedVersion::Ok(v)) => assert_eq!(v, Version::new(1, 0, 0)),
            _ => panic!("expected Ok"),
        }
    }

    #[test]
    fn mutually_unsatisfiable_constraints_conflict() {
        let mut r = VersionResolver::new();
        r.register_available("a", Version::new(1, 0, 0));
        r.register_constraint(ConstraintEntry {
            target: "a".to_string(),
            constraint: VersionConstraint::parse("^1.0.0").unwrap(),
            required_by: "b".to_string(),
        });
        r.register_constraint(ConstraintEntry {
            target: "a".to_string(),
            constraint: VersionConstraint::parse("^2.0.0").unwrap(),
            required_by: "c".to_string(),
        });
        match r.resolve("a") {
            Some(ResolvedVersion::Conflict(c)) => {
                assert_eq!(c.target, "a");
                assert_eq!(c.required_by, vec!["b".to_string(), "c".to_string()]);
            }
            _ => panic!("expected Conflict"),
        }
    }
}
