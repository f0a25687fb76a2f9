//! Full project builds.
//!
//! A build walks the project, merges every backend's symbols, resolves the
//! call graph, refills the vector store and persists snapshots plus
//! metadata. Builds of the same project serialize on a per-project lock;
//! different projects build independently.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::backends;
use super::merger::SymbolMerger;
use super::project::ProjectIndex;
use super::walker::FileWalker;
use crate::Settings;
use crate::error::{IndexError, IndexResult};
use crate::parsing::{CExtractor, CyclomaticMeasurer};
use crate::storage::{IndexManager, IndexMetadata, IndexPersistence, NullVectorStore, VectorDocument, VectorStore};
use crate::types::Backend;

/// Result of [`ProjectIndexer::build`], serialized with a `status` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BuildOutcome {
    Success {
        project_id: String,
        total_files: usize,
        total_symbols: usize,
        total_call_edges: usize,
        backends_used: Vec<Backend>,
        build_time_ms: u64,
    },
    Cached {
        metadata: IndexMetadata,
    },
    Error {
        message: String,
    },
}

impl BuildOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, BuildOutcome::Error { .. })
    }
}

pub struct ProjectIndexer {
    settings: Arc<Settings>,
    manager: IndexManager,
    walker: FileWalker,
    merger: SymbolMerger,
    vectors: Arc<dyn VectorStore>,
    pool: rayon::ThreadPool,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ProjectIndexer {
    /// Indexer with the cyclomatic measurer, backends enabled in settings
    /// and no vector store.
    pub fn new(settings: Arc<Settings>) -> IndexResult<Self> {
        let merger = SymbolMerger::new(
            CExtractor::new(Arc::new(CyclomaticMeasurer)),
            backends::from_settings(&settings),
        );
        Self::with_merger(settings, merger)
    }

    pub fn with_merger(settings: Arc<Settings>, merger: SymbolMerger) -> IndexResult<Self> {
        let threads = settings.indexing.parallel_threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("symgraph-parse-{i}"))
            .build()
            .map_err(|e| IndexError::General(format!("Failed to build parse pool: {e}")))?;

        Ok(Self {
            manager: IndexManager::new(settings.resolved_index_path()),
            walker: FileWalker::new(settings.clone()),
            settings,
            merger,
            vectors: Arc::new(NullVectorStore),
            pool,
            locks: DashMap::new(),
        })
    }

    pub fn with_vector_store(mut self, vectors: Arc<dyn VectorStore>) -> Self {
        self.vectors = vectors;
        self
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn manager(&self) -> &IndexManager {
        &self.manager
    }

    pub fn merger(&self) -> &SymbolMerger {
        &self.merger
    }

    pub fn walker(&self) -> &FileWalker {
        &self.walker
    }

    pub fn vectors(&self) -> &Arc<dyn VectorStore> {
        &self.vectors
    }

    /// Canonical root and project id (its final path component).
    pub fn project_id_for(root: &Path) -> IndexResult<(String, PathBuf)> {
        let canonical = root.canonicalize().map_err(|source| IndexError::FileRead {
            path: root.to_path_buf(),
            source,
        })?;
        let project_id = canonical
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        Ok((project_id, canonical))
    }

    pub(crate) fn project_lock(&self, project_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Build `root`, or return cached metadata when an index already exists
    /// and `force` is false. Never panics or errors; failures come back as
    /// [`BuildOutcome::Error`].
    pub fn build(&self, root: &Path, force: bool) -> BuildOutcome {
        match self.try_build(root, force) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("[indexer] build failed: {e}");
                BuildOutcome::Error { message: e.to_string() }
            }
        }
    }

    fn try_build(&self, root: &Path, force: bool) -> IndexResult<BuildOutcome> {
        let (project_id, root) = Self::project_id_for(root)?;
        let lock = self.project_lock(&project_id);
        let _guard = lock.lock();

        if !force && self.manager.is_valid(&project_id) {
            if let Some(metadata) = self.manager.get(&project_id)? {
                crate::debug_event!("indexer", "cached", "{project_id}");
                return Ok(BuildOutcome::Cached { metadata });
            }
        }

        let started = Instant::now();
        let (index, backends_used) = self.full_build(&project_id, &root)?;
        let build_time_ms = elapsed_ms(started);

        let metadata = self.persist(&index, |metadata| {
            metadata.backends_used = backends_used.iter().map(ToString::to_string).collect();
            metadata.build_time_ms = build_time_ms;
        })?;

        crate::log_event!(
            "indexer",
            "built",
            "{project_id}: {} files, {} symbols, {} call edges in {build_time_ms}ms",
            metadata.file_count,
            metadata.symbol_count,
            metadata.call_edge_count
        );

        Ok(BuildOutcome::Success {
            project_id,
            total_files: metadata.file_count,
            total_symbols: metadata.symbol_count,
            total_call_edges: metadata.call_edge_count,
            backends_used,
            build_time_ms,
        })
    }

    /// Walk, merge, resolve and refill the vector store. Does not persist.
    fn full_build(&self, project_id: &str, root: &Path) -> IndexResult<(ProjectIndex, Vec<Backend>)> {
        let files = self.walker.walk(root);
        crate::debug_event!("indexer", "discovered", "{project_id}: {} files", files.len());

        let merged = self.merger.merge(project_id, root, &files, &self.pool)?;
        let backends_used = merged.backends_used.clone();
        let index = ProjectIndex::from_merged(project_id, root, merged);

        self.vectors.clear(project_id)?;
        let documents: Vec<VectorDocument> = index
            .symbols()
            .to_sorted_vec()
            .iter()
            .map(|symbol| VectorDocument::from_symbol(project_id, symbol))
            .collect();
        self.vectors.upsert(documents)?;

        Ok((index, backends_used))
    }

    /// Full rebuild of an already-identified project, persisted. Used as the
    /// incremental fallback.
    pub fn rebuild(&self, project_id: &str, root: &Path) -> IndexResult<ProjectIndex> {
        let lock = self.project_lock(project_id);
        let _guard = lock.lock();

        let started = Instant::now();
        let (index, backends_used) = self.full_build(project_id, root)?;
        let build_time_ms = elapsed_ms(started);
        self.persist(&index, |metadata| {
            metadata.backends_used = backends_used.iter().map(ToString::to_string).collect();
            metadata.build_time_ms = build_time_ms;
        })?;
        Ok(index)
    }

    /// Write snapshots and upsert metadata counts for `index`.
    pub fn persist(&self, index: &ProjectIndex, change: impl FnOnce(&mut IndexMetadata)) -> IndexResult<IndexMetadata> {
        let project_id = index.project_id();
        IndexPersistence::new(self.manager.data_dir(project_id)).save(&index.snapshot(), index.graph())?;

        let mut metadata = self
            .manager
            .get(project_id)?
            .unwrap_or_else(|| IndexMetadata::new(project_id, index.root()));
        metadata.project_path = index.root().to_path_buf();
        let stats = index.statistics();
        metadata.update_counts(stats.symbols, stats.files, stats.call_edges);
        change(&mut metadata);
        self.manager.save(&metadata)?;
        Ok(metadata)
    }

    /// Load a persisted index for `root`, if one exists.
    pub fn load(&self, root: &Path) -> IndexResult<Option<ProjectIndex>> {
        let (project_id, root) = Self::project_id_for(root)?;
        self.load_project(&project_id, &root)
    }

    pub fn load_project(&self, project_id: &str, root: &Path) -> IndexResult<Option<ProjectIndex>> {
        if !self.manager.exists(project_id) {
            return Ok(None);
        }
        let persistence = IndexPersistence::new(self.manager.data_dir(project_id));
        Ok(persistence
            .load()?
            .map(|(snapshot, graph)| ProjectIndex::from_snapshot(project_id, root, snapshot, graph)))
    }

    /// Load the persisted index or build it first.
    pub fn open(&self, root: &Path) -> IndexResult<ProjectIndex> {
        let (project_id, canonical) = Self::project_id_for(root)?;
        if let Some(index) = self.load_project(&project_id, &canonical)? {
            return Ok(index);
        }
        match self.build(&canonical, true) {
            BuildOutcome::Error { message } => Err(IndexError::General(message)),
            _ => self
                .load_project(&project_id, &canonical)?
                .ok_or_else(|| IndexError::General(format!("index for '{project_id}' missing after build"))),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    duration_ms(started.elapsed())
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
