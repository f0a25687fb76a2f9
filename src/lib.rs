pub mod cli;
pub mod config;
pub mod error;
pub mod indexing;
pub mod logging;
pub mod parsing;
pub mod storage;
pub mod symbol;
pub mod types;
pub mod watcher;

pub use config::Settings;
pub use error::{IndexError, IndexResult};
pub use indexing::{
    BuildOutcome, IncrementalIndexer, IncrementalStats, IndexerState, ProjectIndex, ProjectIndexer, ProjectStats,
};
pub use parsing::{CExtractor, CallReference, ComplexityMeasurer, CyclomaticMeasurer, FileExtraction, NullMeasurer};
pub use storage::{CallGraph, IndexManager, IndexMetadata, SymbolStore, VectorStore};
pub use symbol::{Symbol, SymbolDetail};
pub use types::*;
pub use watcher::{ChangeKind, ChangeQueue};
