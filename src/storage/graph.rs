//! Call graph adjacency store.
//!
//! Forward (caller -> callees) and reverse (callee -> callers) adjacency are
//! kept in step on every mutation. The include relation rides along so the
//! whole graph snapshots to one JSON document:
//!
//! ```json
//! { "forward": { "<id>": ["<id>"] }, "reverse": { ... }, "includes": { "main.c": ["stdio.h"] } }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{CallEdge, SymbolId};

/// Default hop count for caller/callee queries.
pub const DEFAULT_DEPTH: usize = 1;

type Adjacency = BTreeMap<SymbolId, BTreeSet<SymbolId>>;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallGraph {
    #[serde(default)]
    forward: Adjacency,
    #[serde(default)]
    reverse: Adjacency,
    #[serde(default)]
    includes: BTreeMap<String, Vec<String>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, caller: SymbolId, callee: SymbolId) -> bool {
        let added = self
            .forward
            .entry(caller.clone())
            .or_default()
            .insert(callee.clone());
        self.reverse.entry(callee).or_default().insert(caller);
        added
    }

    pub fn extend_edges(&mut self, edges: impl IntoIterator<Item = CallEdge>) {
        for edge in edges {
            self.add_edge(edge.caller_id, edge.callee_id);
        }
    }

    /// Drop every edge touching one of `ids`, in either direction.
    pub fn remove_symbols(&mut self, ids: &HashSet<SymbolId>) {
        for id in ids {
            if let Some(callees) = self.forward.remove(id) {
                for callee in callees {
                    unlink(&mut self.reverse, &callee, id);
                }
            }
            if let Some(callers) = self.reverse.remove(id) {
                for caller in callers {
                    unlink(&mut self.forward, &caller, id);
                }
            }
        }
    }

    pub fn add_include(&mut self, including_file: &str, included_path: &str) {
        let targets = self.includes.entry(including_file.to_string()).or_default();
        if !targets.iter().any(|existing| existing == included_path) {
            targets.push(included_path.to_string());
        }
    }

    pub fn remove_includes(&mut self, including_file: &str) {
        self.includes.remove(including_file);
    }

    /// Ids reachable from `id` over forward edges in at most `depth` hops.
    pub fn get_callees(&self, id: &SymbolId, depth: usize) -> HashSet<SymbolId> {
        traverse(&self.forward, id, depth)
    }

    /// Ids reaching `id` over forward edges in at most `depth` hops.
    pub fn get_callers(&self, id: &SymbolId, depth: usize) -> HashSet<SymbolId> {
        traverse(&self.reverse, id, depth)
    }

    pub fn includes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.includes
    }

    pub fn edges(&self) -> Vec<CallEdge> {
        self.forward
            .iter()
            .flat_map(|(caller, callees)| {
                callees.iter().map(move |callee| CallEdge {
                    caller_id: caller.clone(),
                    callee_id: callee.clone(),
                })
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.includes.is_empty()
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        self.includes.clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a snapshot. The result replaces any in-memory graph wholesale.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

fn unlink(adjacency: &mut Adjacency, key: &SymbolId, target: &SymbolId) {
    if let Some(set) = adjacency.get_mut(key) {
        set.remove(target);
        if set.is_empty() {
            adjacency.remove(key);
        }
    }
}

/// Breadth-first expansion for `depth` hops. The start id is only part of
/// the result when a cycle leads back to it.
fn traverse(adjacency: &Adjacency, start: &SymbolId, depth: usize) -> HashSet<SymbolId> {
    let mut reached = HashSet::new();
    let mut frontier = vec![start];

    for _ in 0..depth {
        let mut next = Vec::new();
        for node in frontier {
            for neighbour in adjacency.get(node).into_iter().flatten() {
                if reached.insert(neighbour.clone()) {
                    next.push(neighbour);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    reached
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SymbolId {
        SymbolId::from(s)
    }

    fn set(ids: &[&str]) -> HashSet<SymbolId> {
        ids.iter().map(|s| id(s)).collect()
    }

    fn chain() -> CallGraph {
        let mut graph = CallGraph::new();
        graph.add_edge(id("A"), id("B"));
        graph.add_edge(id("B"), id("C"));
        graph
    }

    #[test]
    fn test_linear_chain_queries() {
        let graph = chain();
        assert_eq!(graph.get_callees(&id("A"), 1), set(&["B"]));
        assert_eq!(graph.get_callees(&id("A"), 2), set(&["B", "C"]));
        assert_eq!(graph.get_callers(&id("C"), 2), set(&["A", "B"]));
        assert_eq!(graph.get_callers(&id("C"), DEFAULT_DEPTH), set(&["B"]));
    }

    #[test]
    fn test_depth_zero_is_empty() {
        let graph = chain();
        assert!(graph.get_callees(&id("A"), 0).is_empty());
        assert!(graph.get_callers(&id("C"), 0).is_empty());
    }

    #[test]
    fn test_unknown_id_is_empty() {
        let graph = chain();
        assert!(graph.get_callees(&id("nope"), 3).is_empty());
        assert!(graph.get_callers(&id("nope"), 3).is_empty());
    }

    #[test]
    fn test_start_only_included_through_cycle() {
        let mut graph = chain();
        assert!(!graph.get_callees(&id("A"), 5).contains(&id("A")));

        graph.add_edge(id("C"), id("A"));
        let reached = graph.get_callees(&id("A"), 3);
        assert_eq!(reached, set(&["A", "B", "C"]));
        // Self recursion
        graph.add_edge(id("D"), id("D"));
        assert_eq!(graph.get_callees(&id("D"), 1), set(&["D"]));
    }

    #[test]
    fn test_remove_symbols_cleans_both_directions() {
        let mut graph = chain();
        graph.remove_symbols(&set(&["B"]));

        assert!(graph.get_callees(&id("A"), 2).is_empty());
        assert!(graph.get_callers(&id("C"), 2).is_empty());
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut graph = CallGraph::new();
        assert!(graph.add_edge(id("A"), id("B")));
        assert!(!graph.add_edge(id("A"), id("B")));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_snapshot_shape_and_reload() {
        let mut graph = chain();
        graph.add_include("main.c", "stdio.h");
        graph.add_include("main.c", "stdio.h");
        graph.add_include("main.c", "util.h");

        let json = graph.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["forward"]["A"], serde_json::json!(["B"]));
        assert_eq!(value["reverse"]["C"], serde_json::json!(["B"]));
        assert_eq!(value["includes"]["main.c"], serde_json::json!(["stdio.h", "util.h"]));

        let reloaded = CallGraph::from_json(&json).unwrap();
        assert_eq!(reloaded, graph);
    }
}
