#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::store::{
    CollectionHandle, IndexedRecord, RecordSet, SimilarityResult, StoreError, VectorStore,
};
use crate::embeddings::cosine_similarity;

#[derive(Debug)]
struct Collection {
    dimension: usize,
    /// Insertion order
    records: Vec<IndexedRecord>,
}

/// Non-durable vector store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Arc<RwLock<Collection>>>>,
}

impl InMemoryVectorStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    async fn collection(
        &self,
        handle: &CollectionHandle,
    ) -> Result<Arc<RwLock<Collection>>, StoreError> {
        self.collections
            .read()
            .await
            .get(&handle.name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownCollection(handle.name.clone()))
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        dimension: usize,
    ) -> Result<CollectionHandle, StoreError> {
        let handle = CollectionHandle::new(name, dimension);
        let mut collections = self.collections.write().await;

        if let Some(existing) = collections.get(name) {
            handle.check_dimension(existing.read().await.dimension)?;
            return Ok(handle);
        }

        debug!("Creating in-memory collection '{}' ({} dims)", name, dimension);
        collections.insert(
            name.to_string(),
            Arc::new(RwLock::new(Collection {
                dimension,
                records: Vec::new(),
            })),
        );
        Ok(handle)
    }

    async fn add(
        &self,
        collection: &CollectionHandle,
        records: RecordSet,
    ) -> Result<usize, StoreError> {
        records.validate(collection)?;
        let shared = self.collection(collection).await?;
        let mut stored = shared.write().await;
        collection.check_dimension(stored.dimension)?;

        let incoming: HashSet<&str> = records.ids.iter().map(String::as_str).collect();
        let before = stored.records.len();
        stored.records.retain(|record| !incoming.contains(record.id.as_str()));
        let replaced = before - stored.records.len();

        let written = records.len();
        stored.records.extend(records.into_records());

        debug!(
            "Added {} records to '{}' ({} replaced)",
            written, collection.name, replaced
        );
        Ok(written)
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SimilarityResult>, StoreError> {
        collection.check_dimension(vector.len())?;
        let shared = self.collection(collection).await?;
        let stored = shared.read().await;

        let mut scored: Vec<(f32, &IndexedRecord)> = stored
            .records
            .iter()
            .map(|record| (1.0 - cosine_similarity(vector, &record.vector), record))
            .collect();
        // Stable sort keeps insertion order among equal distances
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, record)| {
                SimilarityResult::new(
                    record.id.clone(),
                    record.text.clone(),
                    record.metadata.clone(),
                    distance,
                )
            })
            .collect())
    }

    async fn clear(&self, collection: &CollectionHandle) -> Result<(), StoreError> {
        let shared = self.collection(collection).await?;
        shared.write().await.records.clear();
        debug!("Cleared in-memory collection '{}'", collection.name);
        Ok(())
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize, StoreError> {
        let shared = self.collection(collection).await?;
        let count = shared.read().await.records.len();
        Ok(count)
    }

    async fn delete_document(
        &self,
        collection: &CollectionHandle,
        doc_id: &str,
        from_chunk: usize,
    ) -> Result<(), StoreError> {
        let shared = self.collection(collection).await?;
        let from_chunk = i64::try_from(from_chunk).unwrap_or(i64::MAX);
        shared.write().await.records.retain(|record| {
            record.doc_id() != Some(doc_id)
                || record.chunk_index().is_none_or(|index| index < from_chunk)
        });
        Ok(())
    }
}
