// Database module
// Typed vector collections behind `VectorStore` (LanceDB or in-memory) and the SQLite document ledger

pub mod lancedb;
pub mod memory;
pub mod sqlite;
pub mod store;

use std::sync::Arc;

use crate::config::{Config, StorageBackend};

pub use self::lancedb::LanceVectorStore;
pub use memory::InMemoryVectorStore;
pub use sqlite::Database;
pub use sqlite::models::{IndexedDocument, NewIndexedDocument};
pub use store::{
    CollectionHandle, IndexedRecord, RecordSet, SimilarityResult, StoreError, VectorStore,
};

/// Open the vector store selected by the configuration
#[inline]
pub async fn open_vector_store(config: &Config) -> Result<Arc<dyn VectorStore>, StoreError> {
    match config.storage.backend {
        StorageBackend::Lancedb => Ok(Arc::new(
            LanceVectorStore::open(&config.vector_database_path()).await?,
        )),
        StorageBackend::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
    }
}
