pub mod error;
pub mod graph;
pub mod index_data;
pub mod metadata;
pub mod persistence;
pub mod symbols;
pub mod vector;

pub use error::{StorageError, StorageResult};
pub use graph::{CallGraph, DEFAULT_DEPTH};
pub use index_data::SymbolSnapshot;
pub use metadata::{IndexManager, IndexMetadata};
pub use persistence::IndexPersistence;
pub use symbols::SymbolStore;
pub use vector::{MemoryVectorStore, NullVectorStore, VectorDocument, VectorStore};
