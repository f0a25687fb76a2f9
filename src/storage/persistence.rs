//! JSON snapshot persistence for a project's symbols and call graph.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::{StorageError, StorageResult};
use super::graph::CallGraph;
use super::index_data::SymbolSnapshot;

const SYMBOLS_FILE: &str = "symbols.json";
const GRAPH_FILE: &str = "call_graph.json";

/// Write `value` as pretty JSON via a temp file in the same directory, so
/// readers never observe a half-written snapshot.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let json = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serialization {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StorageError::io(dir, e))?;
    tmp.write_all(&json).map_err(|e| StorageError::io(path, e))?;
    tmp.persist(path).map_err(|e| StorageError::io(path, e.error))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let json = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    serde_json::from_str(&json).map_err(|e| StorageError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Reads and writes the snapshots in one project's data directory.
#[derive(Debug, Clone)]
pub struct IndexPersistence {
    base_path: PathBuf,
}

impl IndexPersistence {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn ensure_dir(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.base_path).map_err(|e| StorageError::io(&self.base_path, e))
    }

    #[must_use = "Save errors should be handled to ensure data is persisted"]
    pub fn save(&self, symbols: &SymbolSnapshot, graph: &CallGraph) -> StorageResult<()> {
        self.ensure_dir()?;
        write_json_atomic(&self.base_path.join(SYMBOLS_FILE), symbols)?;
        write_json_atomic(&self.base_path.join(GRAPH_FILE), graph)
    }

    /// Load both snapshots. `None` when the project was never saved.
    #[must_use = "Load errors should be handled appropriately"]
    pub fn load(&self) -> StorageResult<Option<(SymbolSnapshot, CallGraph)>> {
        if !self.exists() {
            return Ok(None);
        }
        let symbols = read_json(&self.base_path.join(SYMBOLS_FILE))?;
        let graph = read_json(&self.base_path.join(GRAPH_FILE))?;
        Ok(Some((symbols, graph)))
    }

    pub fn load_graph(&self) -> StorageResult<CallGraph> {
        read_json(&self.base_path.join(GRAPH_FILE))
    }

    pub fn exists(&self) -> bool {
        self.base_path.join(SYMBOLS_FILE).is_file() && self.base_path.join(GRAPH_FILE).is_file()
    }

    pub fn clear(&self) -> StorageResult<()> {
        if self.base_path.exists() {
            fs::remove_dir_all(&self.base_path).map_err(|e| StorageError::io(&self.base_path, e))?;
        }
        Ok(())
    }
}
