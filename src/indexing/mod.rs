//! Project indexing: discovery, multi-backend merge, call resolution, full
//! builds and incremental updates.

pub mod backends;
pub mod incremental;
pub mod indexer;
pub mod merger;
pub mod project;
pub mod resolver;
pub mod walker;

pub use backends::{ClangdBackend, CscopeBackend, CtagsBackend, SymbolBackend};
pub use incremental::{IncrementalIndexer, IncrementalStats, IndexerState};
pub use indexer::{BuildOutcome, ProjectIndexer};
pub use merger::{MergedExtraction, SymbolMerger};
pub use project::{ProjectIndex, ProjectStats};
pub use resolver::CallResolver;
pub use walker::{FileWalker, relative_path};
