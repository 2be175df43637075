//! Topological sorter (C4): Kahn's algorithm with deterministic
//! tie-breaking, plus auxiliary before/after ordering hints.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::resolver::graph::DependencyGraph;

/// An auxiliary ordering hint translated into a synthetic edge:
/// `Before { a, b }` means `a` must precede `b`; `After { a, b }` means
/// `a` must follow `b`.
#[derive(Debug, Clone)]
pub enum OrderHint {
    Before { plugin: String, other: String },
    After { plugin: String, other: String },
}

pub struct SortOutcome {
    pub order: Vec<String>,
    pub warnings: Vec<String>,
}

/// Produces a load order honoring the graph's edges plus `hints`, using
/// Kahn's algorithm. Ties among ready nodes break by `(priority DESC, name
/// ASC)`; a higher `priority` value sorts first. Synthetic edges from
/// `hints` that would introduce a cycle are dropped with a warning rather
/// than failing the whole sort.
pub fn topological_sort(
    graph: &DependencyGraph,
    hints: &[OrderHint],
    priorities: &HashMap<String, i64>,
) -> SortOutcome {
    let mut warnings = Vec::new();
    let mut synthetic: Vec<(String, String)> = Vec::new();

    for hint in hints {
        let (before, after) = match hint {
            OrderHint::Before { plugin, other } => (plugin.clone(), other.clone()),
            OrderHint::After { plugin, other } => (other.clone(), plugin.clone()),
        };
        if would_create_cycle(graph, &synthetic, &before, &after) {
            warnings.push(format!(
                "order hint '{} before {}' dropped: would introduce a cycle",
                before, after
            ));
            continue;
        }
        synthetic.push((before, after));
    }

    // in-degree counts over base graph edges (dependency: from depends on
    // to, so `to` must precede `from`) plus synthetic before/after edges.
    let mut indegree: HashMap<String, usize> = HashMap::new();
    let mut adj: HashMap<String, Vec<String>> = HashMap::new();

    for node in graph.all_nodes() {
        indegree.entry(node.name.clone()).or_insert(0);
        adj.entry(node.name.clone()).or_default();
    }

    for node in graph.all_nodes() {
        for dep in graph.successors(&node.name) {
            if !graph.contains(dep) {
                continue;
            }
            adj.entry(dep.to_string()).or_default().push(node.name.clone());
            *indegree.entry(node.name.clone()).or_insert(0) += 1;
        }
    }

    for (before, after) in &synthetic {
        if graph.contains(before) && graph.contains(after) {
            adj.entry(before.clone()).or_default().push(after.clone());
            *indegree.entry(after.clone()).or_insert(0) += 1;
        }
    }

    let priority_of = |name: &str| priorities.get(name).copied().unwrap_or(0);

    let mut ready: Vec<String> = indegree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(name, _)| name.clone())
        .collect();
    sort_ready(&mut ready, &priority_of);

    let mut queue: VecDeque<String> = ready.into();
    let mut order = Vec::new();
    let mut remaining_indegree = indegree.clone();

    while let Some(node) = queue.pop_front() {
        order.push(node.clone());
        let mut newly_ready = Vec::new();
        if let Some(children) = adj.get(&node) {
            for child in children {
                if let Some(deg) = remaining_indegree.get_mut(child) {
                    *deg -= 1;
                    if *deg == 0 {
                        newly_ready.push(child.clone());
                    }
                }
            }
        }
        sort_ready(&mut newly_ready, &priority_of);
        for n in newly_ready {
            queue.push_back(n);
        }
        // re-stabilize ties among the current queue front after insertion
        let mut as_vec: Vec<String> = queue.into_iter().collect();
        stable_priority_resort(&mut as_vec, &priority_of);
        queue = as_vec.into();
    }

    SortOutcome { order, warnings }
}

fn sort_ready(names: &mut [String], priority_of: &impl Fn(&str) -> i64) {
    names.sort_by(|a, b| priority_of(b).cmp(&priority_of(a)).then_with(|| a.cmp(b)));
}

/// Re-sorts only the contiguous run of as-yet-undispatched nodes that
/// share the current minimum remaining indegree is unnecessary here since
/// Kahn's queue already only holds zero-indegree nodes; re-applying the
/// tie-break keeps the queue in the canonical order as new nodes arrive.
fn stable_priority_resort(names: &mut [String], priority_of: &impl Fn(&str) -> i64) {
    sort_ready(names, priority_of);
}

/// `before`/`after` name a *precedes* edge to add (`before` must execute
/// before `after`). A dependency edge `dependent -> dependency` in the raw
/// graph is a precedes edge in the opposite direction (`dependency`
/// precedes `dependent`), so this walks `graph.predecessors` — the set of
/// nodes that depend on, and therefore execute after, a given node — plus
/// any synthetic precedes edges already accepted.
fn would_create_cycle(graph: &DependencyGraph, synthetic: &[(String, String)], before: &str, after: &str) -> bool {
    if before == after {
        return true;
    }
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack = vec![after.to_string()];
    while let Some(node) = stack.pop() {
        if node == before {
            return true;
        }
        if !visited.insert(node.clone()) {
            continue;
        }
        for dependent in graph.predecessors(&node) {
            stack.push(dependent.to_string());
        }
        for (b, a) in synthetic {
            if *b == node {
                stack.push(a.clone());
            }
        }
    }
    false
}

/// Re-checks every non-optional edge for the `index(target) <
/// index(source)` invariant.
pub fn validate_order(graph: &DependencyGraph, order: &[String]) -> bool {
    let position: HashMap<&str, usize> = order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
    for node in graph.all_nodes() {
        if node.optional {
            continue;
        }
        let Some(&source_idx) = position.get(node.name.as_str()) else { continue };
        for dep in graph.successors(&node.name) {
            if !graph.contains(dep) {
                continue;
            }
            if let Some(&target_idx) = position.get(dep) {
                if target_idx >= source_idx {
                    return false;
                }
            }
        }
    }
    true
}
