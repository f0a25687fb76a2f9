//! In-memory symbol table with name and file indexes.

use std::collections::{BTreeMap, HashMap};

use crate::symbol::Symbol;
use crate::types::{SymbolId, SymbolKind};

#[derive(Debug, Default, Clone)]
pub struct SymbolStore {
    symbols: HashMap<SymbolId, Symbol>,
    by_name: HashMap<String, Vec<SymbolId>>,
    by_file: HashMap<String, Vec<SymbolId>>,
}

impl SymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_symbols(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        let mut store = Self::new();
        for symbol in symbols {
            store.insert(symbol);
        }
        store
    }

    /// Insert a symbol, replacing any previous symbol with the same id.
    pub fn insert(&mut self, symbol: Symbol) {
        if self.symbols.contains_key(&symbol.id) {
            self.remove(&symbol.id.clone());
        }
        self.by_name
            .entry(symbol.name.clone())
            .or_default()
            .push(symbol.id.clone());
        self.by_file
            .entry(symbol.file_path.clone())
            .or_default()
            .push(symbol.id.clone());
        self.symbols.insert(symbol.id.clone(), symbol);
    }

    pub fn remove(&mut self, id: &SymbolId) -> Option<Symbol> {
        let symbol = self.symbols.remove(id)?;
        detach(&mut self.by_name, &symbol.name, id);
        detach(&mut self.by_file, &symbol.file_path, id);
        Some(symbol)
    }

    /// Remove every symbol recorded for `file_path`, returning them.
    pub fn remove_file(&mut self, file_path: &str) -> Vec<Symbol> {
        let Some(ids) = self.by_file.remove(file_path) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(symbol) = self.symbols.remove(&id) {
                detach(&mut self.by_name, &symbol.name, &id);
                removed.push(symbol);
            }
        }
        removed
    }

    pub fn get(&self, id: &SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    /// Exact-name lookup, ordered by file then line.
    pub fn find_by_name(&self, name: &str) -> Vec<&Symbol> {
        let mut found: Vec<&Symbol> = self
            .by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.symbols.get(id))
            .collect();
        found.sort_by(|a, b| (&a.file_path, a.line_number).cmp(&(&b.file_path, b.line_number)));
        found
    }

    /// Ids of function symbols named `name`. Call resolution only targets
    /// functions.
    pub fn function_ids(&self, name: &str) -> Vec<SymbolId> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter(|id| self.symbols.get(*id).is_some_and(Symbol::is_function))
            .cloned()
            .collect()
    }

    pub fn symbols_in_file(&self, file_path: &str) -> Vec<&Symbol> {
        let mut found: Vec<&Symbol> = self
            .by_file
            .get(file_path)
            .into_iter()
            .flatten()
            .filter_map(|id| self.symbols.get(id))
            .collect();
        found.sort_by_key(|s| s.line_number);
        found
    }

    /// Symbols of one kind, ordered by name, file and line. `limit = 0`
    /// means no limit.
    pub fn list_by_kind(&self, kind: SymbolKind, limit: usize) -> Vec<&Symbol> {
        let mut found: Vec<&Symbol> = self.symbols.values().filter(|s| s.kind() == kind).collect();
        found.sort_by(|a, b| {
            (&a.name, &a.file_path, a.line_number).cmp(&(&b.name, &b.file_path, b.line_number))
        });
        if limit > 0 {
            found.truncate(limit);
        }
        found
    }

    pub fn count_by_kind(&self) -> BTreeMap<SymbolKind, usize> {
        let mut counts: BTreeMap<SymbolKind, usize> = SymbolKind::ALL.iter().map(|k| (*k, 0)).collect();
        for symbol in self.symbols.values() {
            *counts.entry(symbol.kind()).or_default() += 1;
        }
        counts
    }

    pub fn contains_file(&self, file_path: &str) -> bool {
        self.by_file.contains_key(file_path)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.by_file.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// All symbols ordered by file and line, for stable snapshots.
    pub fn to_sorted_vec(&self) -> Vec<Symbol> {
        let mut all: Vec<Symbol> = self.symbols.values().cloned().collect();
        all.sort_by(|a, b| {
            (&a.file_path, a.line_number, &a.name, &a.id).cmp(&(&b.file_path, b.line_number, &b.name, &b.id))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.by_file.len()
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
        self.by_name.clear();
        self.by_file.clear();
    }
}

fn detach(index: &mut HashMap<String, Vec<SymbolId>>, key: &str, id: &SymbolId) {
    if let Some(ids) = index.get_mut(key) {
        ids.retain(|existing| existing != id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}
