//! Per-project index metadata and its lifecycle.
//!
//! Layout under the index directory:
//!
//! ```text
//! <index_path>/meta/<project_id>.json      metadata (owned here)
//! <index_path>/projects/<project_id>/      symbol and graph snapshots
//! ```
//!
//! Validity is presence-only: an index whose metadata file exists is
//! considered valid. Source edits made while nothing was watching are not
//! detected; callers force a rebuild when they need freshness.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};
use super::persistence::write_json_atomic;

const METADATA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub version: u32,
    pub project_id: String,
    pub project_path: PathBuf,
    pub symbol_count: usize,
    pub file_count: usize,
    pub call_edge_count: usize,
    #[serde(default)]
    pub backends_used: Vec<String>,
    #[serde(default)]
    pub build_time_ms: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IndexMetadata {
    pub fn new(project_id: impl Into<String>, project_path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            version: METADATA_VERSION,
            project_id: project_id.into(),
            project_path: project_path.into(),
            symbol_count: 0,
            file_count: 0,
            call_edge_count: 0,
            backends_used: Vec::new(),
            build_time_ms: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_counts(&mut self, symbol_count: usize, file_count: usize, call_edge_count: usize) {
        self.symbol_count = symbol_count;
        self.file_count = file_count;
        self.call_edge_count = call_edge_count;
        self.updated_at = Utc::now();
    }
}

/// CRUD over per-project metadata. Never touches symbol content beyond
/// deleting a project's data directory.
#[derive(Debug, Clone)]
pub struct IndexManager {
    base_path: PathBuf,
}

impl IndexManager {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn meta_dir(&self) -> PathBuf {
        self.base_path.join("meta")
    }

    fn projects_dir(&self) -> PathBuf {
        self.base_path.join("projects")
    }

    fn metadata_path(&self, project_id: &str) -> PathBuf {
        self.meta_dir().join(format!("{project_id}.json"))
    }

    /// Directory holding a project's snapshots.
    pub fn data_dir(&self, project_id: &str) -> PathBuf {
        self.projects_dir().join(project_id)
    }

    /// Create fresh metadata for a project, replacing any existing entry.
    pub fn create(&self, project_id: &str, project_path: &Path) -> StorageResult<IndexMetadata> {
        let metadata = IndexMetadata::new(project_id, project_path);
        self.save(&metadata)?;
        Ok(metadata)
    }

    pub fn get(&self, project_id: &str) -> StorageResult<Option<IndexMetadata>> {
        let path = self.metadata_path(project_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                path,
                reason: e.to_string(),
            })
    }

    /// Apply `change` to existing metadata and save it. Returns `None` when
    /// the project has no metadata.
    pub fn update(
        &self,
        project_id: &str,
        change: impl FnOnce(&mut IndexMetadata),
    ) -> StorageResult<Option<IndexMetadata>> {
        let Some(mut metadata) = self.get(project_id)? else {
            return Ok(None);
        };
        change(&mut metadata);
        metadata.updated_at = Utc::now();
        self.save(&metadata)?;
        Ok(Some(metadata))
    }

    /// Insert or replace metadata.
    pub fn save(&self, metadata: &IndexMetadata) -> StorageResult<()> {
        let dir = self.meta_dir();
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        write_json_atomic(&self.metadata_path(&metadata.project_id), metadata)
    }

    /// All readable metadata entries, ordered by project id. Corrupt
    /// entries are logged and skipped.
    pub fn list(&self) -> StorageResult<Vec<IndexMetadata>> {
        let mut entries = Vec::new();
        for project_id in self.metadata_ids()? {
            match self.get(&project_id) {
                Ok(Some(metadata)) => entries.push(metadata),
                Ok(None) => {}
                Err(e) => tracing::warn!("[index] skipping metadata for '{project_id}': {e}"),
            }
        }
        entries.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        Ok(entries)
    }

    pub fn exists(&self, project_id: &str) -> bool {
        self.metadata_path(project_id).is_file()
    }

    /// Presence-only validity check.
    pub fn is_valid(&self, project_id: &str) -> bool {
        self.exists(project_id)
    }

    /// Remove a project's metadata and data. Returns whether anything existed.
    pub fn delete(&self, project_id: &str) -> StorageResult<bool> {
        let mut existed = false;

        let meta = self.metadata_path(project_id);
        if meta.exists() {
            fs::remove_file(&meta).map_err(|e| StorageError::io(&meta, e))?;
            existed = true;
        }

        let data = self.data_dir(project_id);
        if data.exists() {
            fs::remove_dir_all(&data).map_err(|e| StorageError::io(&data, e))?;
            existed = true;
        }

        Ok(existed)
    }

    /// Remove every project. Returns how many metadata entries were removed.
    pub fn clear(&self) -> StorageResult<usize> {
        let count = self.metadata_ids()?.len();
        for dir in [self.meta_dir(), self.projects_dir()] {
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
            }
        }
        Ok(count)
    }

    /// Remove data directories without metadata and metadata without a data
    /// directory. Returns the affected project ids.
    pub fn cleanup_orphaned(&self) -> StorageResult<Vec<String>> {
        let meta_ids = self.metadata_ids()?;
        let data_ids = list_dir_names(&self.projects_dir(), |path| path.is_dir())?;

        let mut removed = Vec::new();
        for id in &data_ids {
            if !meta_ids.contains(id) {
                let dir = self.data_dir(id);
                fs::remove_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
                removed.push(id.clone());
            }
        }
        for id in &meta_ids {
            if !data_ids.contains(id) {
                let meta = self.metadata_path(id);
                fs::remove_file(&meta).map_err(|e| StorageError::io(&meta, e))?;
                removed.push(id.clone());
            }
        }

        removed.sort();
        Ok(removed)
    }

    fn metadata_ids(&self) -> StorageResult<Vec<String>> {
        let names = list_dir_names(&self.meta_dir(), |path| {
            path.is_file() && path.extension().is_some_and(|ext| ext == "json")
        })?;
        Ok(names
            .into_iter()
            .map(|name| name.trim_end_matches(".json").to_string())
            .collect())
    }
}

fn list_dir_names(dir: &Path, keep: impl Fn(&Path) -> bool) -> StorageResult<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(dir, e))?;
        let path = entry.path();
        if keep(&path) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
