//! Dependency graph (C2): adjacency over plugin names, cycle detection.

use std::collections::{HashMap, HashSet};

use crate::plugin_system::version::Version;

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub name: String,
    pub version: Version,
    pub optional: bool,
}

/// A cycle found by [`DependencyGraph::detect_cycles`], canonicalized, with
/// whether every edge along it is optional — the only kind of cycle
/// `allow_circular_dependencies` may permit.
#[derive(Debug, Clone)]
pub struct CycleInfo {
    pub path: Vec<String>,
    pub fully_optional: bool,
}

/// Adjacency mapping `name -> {name -> optional}` (outgoing = depends-on)
/// plus a reverse index. Every referenced non-optional target must exist as
/// a node; optional missing targets are tolerated but the edge is still
/// recorded for ordering purposes. An edge's optionality is the AND of every
/// declaration registered for it: a single non-optional declaration makes
/// the edge non-optional even if another plugin declared it optional.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, GraphNode>,
    outgoing: HashMap<String, HashMap<String, bool>>,
    incoming: HashMap<String, HashSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, version: Version, optional: bool) {
        let name = name.into();
        self.outgoing.entry(name.clone()).or_default();
        self.incoming.entry(name.clone()).or_default();
        self.nodes.insert(name.clone(), GraphNode { name, version, optional });
    }

    /// Records the edge `from -> to` (from depends on to). `to` need not
    /// yet exist as a node — callers tolerate missing optional targets.
    pub fn add_edge(&mut self, from: &str, to: &str, optional: bool) {
        self.outgoing
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .and_modify(|existing| *existing = *existing && optional)
            .or_insert(optional);
        self.incoming.entry(to.to_string()).or_default().insert(from.to_string());
    }

    pub fn get_node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn successors(&self, name: &str) -> impl Iterator<Item = &str> {
        self.outgoing.get(name).into_iter().flat_map(|s| s.keys().map(|s| s.as_str()))
    }

    pub fn predecessors(&self, name: &str) -> impl Iterator<Item = &str> {
        self.incoming.get(name).into_iter().flat_map(|s| s.iter().map(|s| s.as_str()))
    }

    fn is_edge_optional(&self, from: &str, to: &str) -> bool {
        self.outgoing.get(from).and_then(|m| m.get(to)).copied().unwrap_or(false)
    }

    /// Iterative tri-state-colored DFS cycle detection. Every gray-to-gray
    /// hit yields a cycle path, canonicalized (rotated so the
    /// lexicographically smallest name leads) so duplicate discoveries of
    /// the same cycle collapse. Each reported cycle also records whether
    /// every edge along it is optional.
    pub fn detect_cycles(&self) -> Vec<CycleInfo> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color: HashMap<&str, Color> = self.nodes.keys().map(|k| (k.as_str(), Color::White)).collect();
        let mut cycles: Vec<CycleInfo> = Vec::new();
        let mut seen_canonical: HashSet<Vec<String>> = HashSet::new();

        let mut names: Vec<&str> = self.nodes.keys().map(|k| k.as_str()).collect();
        names.sort();

        for start in names {
            if color.get(start) != Some(&Color::White) {
                continue;
            }

            // (node, child-iterator index) frames, with an explicit path stack.
            let mut path: Vec<&str> = Vec::new();
            let mut frames: Vec<(&str, Vec<&str>, usize)> = Vec::new();

            frames.push((start, self.successors(start).collect(), 0));
            color.insert(start, Color::Gray);
            path.push(start);

            while let Some((node, children, idx)) = frames.last_mut() {
                if *idx < children.len() {
                    let child = children[*idx];
                    *idx += 1;
                    match color.get(child).copied().unwrap_or(Color::White) {
                        Color::White => {
                            if self.nodes.contains_key(child) {
                                color.insert(child, Color::Gray);
                                path.push(child);
                                frames.push((child, self.successors(child).collect(), 0));
                            }
                        }
                        Color::Gray => {
                            let start_idx = path.iter().position(|n| *n == child).unwrap_or(0);
                            let mut cycle: Vec<String> = path[start_idx..].iter().map(|s| s.to_string()).collect();
                            cycle.push(child.to_string());
                            let fully_optional = cycle
                                .windows(2)
                                .all(|pair| self.is_edge_optional(&pair[0], &pair[1]));
                            let canonical = canonicalize_cycle(&cycle);
                            if seen_canonical.insert(canonical.clone()) {
                                cycles.push(CycleInfo { path: canonical, fully_optional });
                            }
                        }
                        Color::Black => {}
                    }
                } else {
                    let finished = *node;
                    color.insert(finished, Color::Black);
                    path.pop();
                    frames.pop();
                }
            }
        }

        cycles
    }
}

/// Rotates a cycle (first and last element equal, closing the loop) so the
/// lexicographically smallest name among the distinct members leads.
fn canonicalize_cycle(cycle: &[String]) -> Vec<String> {
    if cycle.len() <= 1 {
        return cycle.to_vec();
    }
    let body = &cycle[..cycle.len() - 1];
    let min_idx = body
        .iter()
        .enumerate()
        .min_by_key(|(_, n)| n.as_str())
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut rotated: Vec<String> = body[min_idx..].iter().cloned().collect();
    rotated.extend(body[..min_idx].iter().cloned());
    rotated.push(rotated[0].clone());
    rotated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v() -> Version {
        Version::new(1, 0, 0)
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let mut g = DependencyGraph::new();
        g.add_node("a", v(), false);
        g.add_node("b", v(), false);
        g.add_edge("b", "a", false);
        assert!(g.detect_cycles().is_empty());
    }

    #[test]
    fn direct_cycle_is_detected() {
        let mut g = DependencyGraph::new();
        g.add_node("a", v(), false);
        g.add_node("b", v(), false);
        g.add_edge("a", "b", false);
        g.add_edge("b", "a", false);
        let cycles = g.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path.first(), cycles[0].path.last());
        assert!(!cycles[0].fully_optional);
    }

    #[test]
    fn cycle_canonicalization_collapses_duplicates() {
        let mut g = DependencyGraph::new();
        for n in ["a", "b", "c"] {
            g.add_node(n, v(), false);
        }
        g.add_edge("a", "b", false);
        g.add_edge("b", "c", false);
        g.add_edge("c", "a", false);
        let cycles = g.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path[0], "a");
    }

    #[test]
    fn cycle_of_entirely_optional_edges_is_flagged_fully_optional() {
        let mut g = DependencyGraph::new();
        g.add_node("a", v(), false);
        g.add_node("b", v(), false);
        g.add_edge("a", "b", true);
        g.add_edge("b", "a", true);
        let cycles = g.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].fully_optional);
    }

    #[test]
    fn cycle_with_one_mandatory_edge_is_not_fully_optional() {
        let mut g = DependencyGraph::new();
        g.add_node("a", v(), false);
        g.add_node("b", v(), false);
        g.add_edge("a", "b", true);
        g.add_edge("b", "a", false);
        let cycles = g.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert!(!cycles[0].fully_optional);
    }

    #[test]
    fn predecessors_and_successors_reflect_edges() {
        let mut g = DependencyGraph::new();
        g.add_node("a", v(), false);
        g.add_node("b", v(), false);
        g.add_edge("b", "a", false);
        assert!(g.successors("b").any(|s| s == "a"));
        assert!(g.predecessors("a").any(|s| s == "b"));
    }
}
