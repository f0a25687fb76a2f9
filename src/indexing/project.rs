//! In-memory index of one project: symbols, call graph and the raw call
//! references edges are derived from.
//!
//! Raw call references are kept per caller so a single file can be
//! retracted and re-extracted without re-resolving the whole project. A
//! re-extracted file gains outgoing edges from its own calls and incoming
//! edges from every existing call that names one of its functions.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::merger::MergedExtraction;
use super::resolver::CallResolver;
use crate::parsing::{CallReference, FileExtraction};
use crate::storage::{CallGraph, SymbolSnapshot, SymbolStore};
use crate::symbol::Symbol;
use crate::types::{SymbolId, SymbolKind};

#[derive(Debug, Default, Clone)]
struct CallTable {
    by_caller: HashMap<SymbolId, Vec<String>>,
    by_callee: HashMap<String, HashSet<SymbolId>>,
}

impl CallTable {
    fn insert(&mut self, call: CallReference) {
        self.by_callee
            .entry(call.callee_name.clone())
            .or_default()
            .insert(call.caller_id.clone());
        let names = self.by_caller.entry(call.caller_id).or_default();
        if !names.contains(&call.callee_name) {
            names.push(call.callee_name);
        }
    }

    fn remove_caller(&mut self, caller: &SymbolId) {
        let Some(names) = self.by_caller.remove(caller) else {
            return;
        };
        for name in names {
            if let Some(callers) = self.by_callee.get_mut(&name) {
                callers.remove(caller);
                if callers.is_empty() {
                    self.by_callee.remove(&name);
                }
            }
        }
    }

    fn callers_of(&self, name: &str) -> impl Iterator<Item = &SymbolId> {
        self.by_callee.get(name).into_iter().flatten()
    }

    fn to_sorted_vec(&self) -> Vec<CallReference> {
        let mut calls: Vec<CallReference> = self
            .by_caller
            .iter()
            .flat_map(|(caller, names)| {
                names.iter().map(move |name| CallReference {
                    caller_id: caller.clone(),
                    callee_name: name.clone(),
                })
            })
            .collect();
        calls.sort_by(|a, b| (&a.caller_id, &a.callee_name).cmp(&(&b.caller_id, &b.callee_name)));
        calls
    }
}

/// Aggregate counts for one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStats {
    pub project_id: String,
    pub files: usize,
    pub symbols: usize,
    pub by_kind: BTreeMap<SymbolKind, usize>,
    pub call_edges: usize,
    pub include_files: usize,
}

#[derive(Debug, Clone)]
pub struct ProjectIndex {
    project_id: String,
    root: PathBuf,
    symbols: SymbolStore,
    graph: CallGraph,
    calls: CallTable,
    files: BTreeSet<String>,
}

impl ProjectIndex {
    pub fn new(project_id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            project_id: project_id.into(),
            root: root.into(),
            symbols: SymbolStore::new(),
            graph: CallGraph::new(),
            calls: CallTable::default(),
            files: BTreeSet::new(),
        }
    }

    /// Build from a full merge, resolving every call reference.
    pub fn from_merged(project_id: impl Into<String>, root: impl Into<PathBuf>, merged: MergedExtraction) -> Self {
        let mut index = Self::new(project_id, root);
        let resolver = CallResolver::from_symbols(&merged.symbols);
        index.graph.extend_edges(resolver.resolve(&merged.calls));

        for include in &merged.includes {
            index.graph.add_include(&include.including_file, &include.included_path);
        }
        for call in merged.calls {
            index.calls.insert(call);
        }
        index.symbols = SymbolStore::from_symbols(merged.symbols);
        index.files = merged.files.into_iter().collect();
        index
    }

    /// Restore from persisted state. The graph replaces derived state as-is.
    pub fn from_snapshot(
        project_id: impl Into<String>,
        root: impl Into<PathBuf>,
        snapshot: SymbolSnapshot,
        graph: CallGraph,
    ) -> Self {
        let mut index = Self::new(project_id, root);
        index.files = snapshot
            .files
            .into_iter()
            .chain(snapshot.symbols.iter().map(|s| s.file_path.clone()))
            .collect();
        index.symbols = SymbolStore::from_symbols(snapshot.symbols);
        for call in snapshot.calls {
            index.calls.insert(call);
        }
        index.graph = graph;
        index
    }

    pub fn snapshot(&self) -> SymbolSnapshot {
        SymbolSnapshot {
            symbols: self.symbols.to_sorted_vec(),
            calls: self.calls.to_sorted_vec(),
            files: self.files.iter().cloned().collect(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn graph(&self) -> &CallGraph {
        &self.graph
    }

    pub fn symbols(&self) -> &SymbolStore {
        &self.symbols
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    pub fn contains_file(&self, rel_path: &str) -> bool {
        self.files.contains(rel_path)
    }

    /// Retract everything recorded for `rel_path`. Returns the removed
    /// symbols.
    pub fn remove_file(&mut self, rel_path: &str) -> Vec<Symbol> {
        let removed = self.symbols.remove_file(rel_path);
        let ids: HashSet<SymbolId> = removed.iter().map(|s| s.id.clone()).collect();
        self.graph.remove_symbols(&ids);
        for id in &ids {
            self.calls.remove_caller(id);
        }
        self.graph.remove_includes(rel_path);
        self.files.remove(rel_path);
        removed
    }

    /// Replace the contents of `rel_path` with a fresh extraction. Prior
    /// symbols and edges of the file are retracted first.
    pub fn replace_file(&mut self, rel_path: &str, extraction: FileExtraction) {
        self.remove_file(rel_path);
        self.files.insert(rel_path.to_string());

        let new_functions: Vec<(String, SymbolId)> = extraction
            .symbols
            .iter()
            .filter(|s| s.is_function())
            .map(|s| (s.name.clone(), s.id.clone()))
            .collect();
        for symbol in extraction.symbols {
            self.symbols.insert(symbol);
        }
        for include in &extraction.includes {
            self.graph.add_include(&include.including_file, &include.included_path);
        }

        for call in extraction.calls {
            for callee in self.symbols.function_ids(&call.callee_name) {
                self.graph.add_edge(call.caller_id.clone(), callee);
            }
            self.calls.insert(call);
        }

        for (name, id) in new_functions {
            let callers: Vec<SymbolId> = self.calls.callers_of(&name).cloned().collect();
            for caller in callers {
                self.graph.add_edge(caller, id.clone());
            }
        }
    }

    pub fn get(&self, id: &SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn find_by_name(&self, name: &str) -> Vec<&Symbol> {
        self.symbols.find_by_name(name)
    }

    pub fn list_by_kind(&self, kind: SymbolKind, limit: usize) -> Vec<&Symbol> {
        self.symbols.list_by_kind(kind, limit)
    }

    pub fn symbols_in_file(&self, rel_path: &str) -> Vec<&Symbol> {
        self.symbols.symbols_in_file(rel_path)
    }

    /// Ids for a query target: an exact symbol id, otherwise every function
    /// with that name.
    pub fn resolve_target(&self, target: &str) -> Vec<SymbolId> {
        let id = SymbolId::from(target);
        if self.symbols.get(&id).is_some() {
            return vec![id];
        }
        self.symbols.function_ids(target)
    }

    pub fn get_callers(&self, id: &SymbolId, depth: usize) -> HashSet<SymbolId> {
        self.graph.get_callers(id, depth)
    }

    pub fn get_callees(&self, id: &SymbolId, depth: usize) -> HashSet<SymbolId> {
        self.graph.get_callees(id, depth)
    }

    pub fn callers(&self, id: &SymbolId, depth: usize) -> Vec<&Symbol> {
        self.resolve_ids(self.get_callers(id, depth))
    }

    pub fn callees(&self, id: &SymbolId, depth: usize) -> Vec<&Symbol> {
        self.resolve_ids(self.get_callees(id, depth))
    }

    fn resolve_ids(&self, ids: HashSet<SymbolId>) -> Vec<&Symbol> {
        let mut symbols: Vec<&Symbol> = ids.iter().filter_map(|id| self.symbols.get(id)).collect();
        symbols.sort_by(|a, b| (&a.file_path, a.line_number).cmp(&(&b.file_path, b.line_number)));
        symbols
    }

    pub fn includes(&self) -> &BTreeMap<String, Vec<String>> {
        self.graph.includes()
    }

    pub fn statistics(&self) -> ProjectStats {
        ProjectStats {
            project_id: self.project_id.clone(),
            files: self.files.len(),
            symbols: self.symbols.len(),
            by_kind: self.symbols.count_by_kind(),
            call_edges: self.graph.edge_count(),
            include_files: self.graph.includes().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::{CExtractor, NullMeasurer};
    use crate::types::Backend;
    use std::sync::Arc;

    fn extract(path: &str, code: &str) -> FileExtraction {
        CExtractor::new(Arc::new(NullMeasurer))
            .extract(path, code.as_bytes())
            .unwrap()
    }

    fn merged(files: &[(&str, &str)]) -> MergedExtraction {
        let mut merged = MergedExtraction {
            backends_used: vec![Backend::TreeSitter],
            ..MergedExtraction::default()
        };
        for (path, code) in files {
            let extraction = extract(path, code);
            merged.files.push(path.to_string());
            merged.symbols.extend(extraction.symbols);
            merged.calls.extend(extraction.calls);
            merged.includes.extend(extraction.includes);
        }
        merged
    }

    fn only_function<'a>(index: &'a ProjectIndex, name: &str) -> &'a Symbol {
        let found: Vec<&Symbol> = index
            .find_by_name(name)
            .into_iter()
            .filter(|s| s.is_function())
            .collect();
        assert_eq!(found.len(), 1, "expected one function named {name}");
        found[0]
    }

    const MAIN_C: &str = "#include \"util.h\"\nint main(void) { return foo(); }\n";
    const FOO_C: &str = "int foo(void) { return bar(1); }\n";
    const BAR_C: &str = "int bar(int x) { return x * 2; }\n";

    #[test]
    fn test_cross_file_resolution() {
        let index = ProjectIndex::from_merged(
            "proj",
            "/tmp/proj",
            merged(&[("main.c", MAIN_C), ("foo.c", FOO_C), ("bar.c", BAR_C)]),
        );
        let foo = only_function(&index, "foo");
        let bar = only_function(&index, "bar");
        let main = only_function(&index, "main");

        assert_eq!(index.get_callers(&bar.id, 1), HashSet::from([foo.id.clone()]));
        assert_eq!(
            index.get_callers(&bar.id, 2),
            HashSet::from([foo.id.clone(), main.id.clone()])
        );
        assert_eq!(index.includes().get("main.c"), Some(&vec!["util.h".to_string()]));

        let stats = index.statistics();
        assert_eq!(stats.files, 3);
        assert_eq!(stats.symbols, 3);
        assert_eq!(stats.call_edges, 2);
        assert_eq!(stats.by_kind[&SymbolKind::Function], 3);
    }

    #[test]
    fn test_remove_file_retracts_symbols_and_edges() {
        let mut index = ProjectIndex::from_merged("proj", "/tmp/proj", merged(&[("foo.c", FOO_C), ("bar.c", BAR_C)]));
        let foo_id = only_function(&index, "foo").id.clone();

        let removed = index.remove_file("bar.c");
        assert_eq!(removed.len(), 1);
        assert!(index.symbols_in_file("bar.c").is_empty());
        assert!(index.find_by_name("bar").is_empty());
        assert!(index.get_callees(&foo_id, 1).is_empty());
        assert!(!index.contains_file("bar.c"));
        assert_eq!(index.graph().edge_count(), 0);
    }

    #[test]
    fn test_replace_file_restores_incoming_edges() {
        let mut index = ProjectIndex::from_merged("proj", "/tmp/proj", merged(&[("foo.c", FOO_C), ("bar.c", BAR_C)]));
        index.remove_file("bar.c");

        // bar comes back on a different line; foo's call resolves again
        index.replace_file("bar.c", extract("bar.c", &format!("\n\n{BAR_C}")));
        let foo = only_function(&index, "foo").id.clone();
        let bar = only_function(&index, "bar");
        assert_eq!(bar.line_number, 3);
        assert_eq!(index.get_callees(&foo, 1), HashSet::from([bar.id.clone()]));
    }

    #[test]
    fn test_incremental_matches_full_build() {
        let files = [("main.c", MAIN_C), ("foo.c", FOO_C), ("bar.c", BAR_C)];
        let full = ProjectIndex::from_merged("proj", "/tmp/proj", merged(&files));

        let mut incremental = ProjectIndex::new("proj", "/tmp/proj");
        for (path, code) in files.iter().rev() {
            incremental.replace_file(path, extract(path, code));
        }

        let full_edges: BTreeSet<_> = full.graph().edges().into_iter().collect();
        let incremental_edges: BTreeSet<_> = incremental.graph().edges().into_iter().collect();
        assert_eq!(full_edges, incremental_edges);
        assert_eq!(full.snapshot().symbols, incremental.snapshot().symbols);
    }

    #[test]
    fn test_snapshot_round_trip_keeps_call_table() {
        let index = ProjectIndex::from_merged("proj", "/tmp/proj", merged(&[("foo.c", FOO_C), ("notes.c", "/* */")]));
        let mut restored = ProjectIndex::from_snapshot("proj", "/tmp/proj", index.snapshot(), index.graph().clone());
        assert!(restored.contains_file("notes.c"));

        // bar defined after reload still picks up foo's call
        restored.replace_file("bar.c", extract("bar.c", BAR_C));
        let foo = only_function(&restored, "foo").id.clone();
        assert_eq!(restored.get_callees(&foo, 1).len(), 1);
    }

    #[test]
    fn test_resolve_target_by_id_or_name() {
        let index = ProjectIndex::from_merged("proj", "/tmp/proj", merged(&[("foo.c", FOO_C)]));
        let foo = only_function(&index, "foo").id.clone();
        assert_eq!(index.resolve_target(foo.as_str()), vec![foo.clone()]);
        assert_eq!(index.resolve_target("foo"), vec![foo]);
        assert!(index.resolve_target("nope").is_empty());
    }
}
