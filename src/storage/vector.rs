//! Seam to an external embedding/vector store.
//!
//! The indexer pushes one document per symbol and retracts documents by file
//! when a file changes. Embedding and similarity search live behind this
//! trait and are not part of this crate.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::IndexResult;
use crate::symbol::Symbol;
use crate::types::SymbolId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    pub symbol_id: SymbolId,
    pub project_id: String,
    pub file_path: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl VectorDocument {
    pub fn from_symbol(project_id: &str, symbol: &Symbol) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("name".to_string(), symbol.name.clone());
        metadata.insert("kind".to_string(), symbol.kind().to_string());
        metadata.insert("line".to_string(), symbol.line_number.to_string());
        metadata.insert("source".to_string(), symbol.source.to_string());
        if let Some(complexity) = symbol.complexity() {
            metadata.insert("complexity".to_string(), complexity.as_str().to_string());
        }

        Self {
            symbol_id: symbol.id.clone(),
            project_id: project_id.to_string(),
            file_path: symbol.file_path.clone(),
            text: symbol.searchable_text(),
            metadata,
        }
    }
}

pub trait VectorStore: Send + Sync {
    fn upsert(&self, documents: Vec<VectorDocument>) -> IndexResult<()>;

    /// Remove all documents for one file. Returns how many were removed.
    fn delete_by_file(&self, project_id: &str, file_path: &str) -> IndexResult<usize>;

    /// Remove all documents of a project.
    fn clear(&self, project_id: &str) -> IndexResult<()>;
}

/// Discards everything. Used when no vector store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullVectorStore;

impl VectorStore for NullVectorStore {
    fn upsert(&self, _documents: Vec<VectorDocument>) -> IndexResult<()> {
        Ok(())
    }

    fn delete_by_file(&self, _project_id: &str, _file_path: &str) -> IndexResult<usize> {
        Ok(0)
    }

    fn clear(&self, _project_id: &str) -> IndexResult<()> {
        Ok(())
    }
}

/// Keeps documents in memory, keyed by symbol id.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    documents: RwLock<HashMap<SymbolId, VectorDocument>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    pub fn get(&self, id: &SymbolId) -> Option<VectorDocument> {
        self.documents.read().get(id).cloned()
    }

    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .documents
            .read()
            .values()
            .map(|doc| doc.file_path.clone())
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

impl VectorStore for MemoryVectorStore {
    fn upsert(&self, documents: Vec<VectorDocument>) -> IndexResult<()> {
        let mut store = self.documents.write();
        for doc in documents {
            store.insert(doc.symbol_id.clone(), doc);
        }
        Ok(())
    }

    fn delete_by_file(&self, project_id: &str, file_path: &str) -> IndexResult<usize> {
        let mut store = self.documents.write();
        let before = store.len();
        store.retain(|_, doc| !(doc.project_id == project_id && doc.file_path == file_path));
        Ok(before - store.len())
    }

    fn clear(&self, project_id: &str) -> IndexResult<()> {
        self.documents.write().retain(|_, doc| doc.project_id != project_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolDetail;
    use crate::types::Backend;

    fn doc(id: &str, project: &str, file: &str) -> VectorDocument {
        let symbol = Symbol::new(
            SymbolId::from(id),
            format!("fn_{id}"),
            file,
            1,
            Backend::TreeSitter,
            SymbolDetail::function("int", Vec::new()),
        );
        VectorDocument::from_symbol(project, &symbol)
    }

    #[test]
    fn test_document_metadata() {
        let d = doc("1", "p", "a.c");
        assert_eq!(d.metadata["kind"], "function");
        assert_eq!(d.metadata["complexity"], "low");
        assert!(d.text.contains("fn_1"));
    }

    #[test]
    fn test_memory_store_delete_by_file_is_project_scoped() {
        let store = MemoryVectorStore::new();
        store
            .upsert(vec![doc("1", "p", "a.c"), doc("2", "p", "b.c"), doc("3", "q", "a.c")])
            .unwrap();

        assert_eq!(store.delete_by_file("p", "a.c").unwrap(), 1);
        assert_eq!(store.len(), 2);
        assert!(store.get(&SymbolId::from("3")).is_some());

        store.clear("p").unwrap();
        assert_eq!(store.files(), vec!["a.c"]);
    }
}
