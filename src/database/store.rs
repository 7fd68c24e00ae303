use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::documents::{Metadata, keys};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record arity mismatch: {ids} ids, {vectors} vectors, {texts} texts, {metadatas} metadatas")]
    ArityMismatch {
        ids: usize,
        vectors: usize,
        texts: usize,
        metadatas: usize,
    },

    #[error("Collection '{collection}' expects {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate record id in batch: {0}")]
    DuplicateId(String),

    #[error("Metadata '{key}' of record '{id}' is not a finite number")]
    NonFiniteMetadata { id: String, key: String },

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Vector store error: {0}")]
    Backend(String),
}

/// A named collection with a fixed vector dimension
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CollectionHandle {
    pub name: String,
    pub dimension: usize,
}

impl CollectionHandle {
    #[inline]
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
        }
    }

    pub(crate) fn check_dimension(&self, actual: usize) -> Result<(), StoreError> {
        if actual == self.dimension {
            Ok(())
        } else {
            Err(StoreError::DimensionMismatch {
                collection: self.name.clone(),
                expected: self.dimension,
                actual,
            })
        }
    }
}

/// Column-oriented batch of records for a single `add` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    pub ids: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
    pub texts: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

impl RecordSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Check arity, then id uniqueness, then vector dimensions, then metadata values
    #[inline]
    pub fn validate(&self, collection: &CollectionHandle) -> Result<(), StoreError> {
        let n = self.ids.len();
        if self.vectors.len() != n || self.texts.len() != n || self.metadatas.len() != n {
            return Err(StoreError::ArityMismatch {
                ids: n,
                vectors: self.vectors.len(),
                texts: self.texts.len(),
                metadatas: self.metadatas.len(),
            });
        }

        let mut seen = HashSet::with_capacity(n);
        for id in &self.ids {
            if !seen.insert(id.as_str()) {
                return Err(StoreError::DuplicateId(id.clone()));
            }
        }

        for vector in &self.vectors {
            collection.check_dimension(vector.len())?;
        }

        for (id, metadata) in self.ids.iter().zip(&self.metadatas) {
            if let Some((key, _)) = metadata.iter().find(|(_, value)| !value.is_finite()) {
                return Err(StoreError::NonFiniteMetadata {
                    id: id.clone(),
                    key: key.clone(),
                });
            }
        }

        Ok(())
    }

    /// Split into row records; call after `validate`
    #[inline]
    pub fn into_records(self) -> Vec<IndexedRecord> {
        self.ids
            .into_iter()
            .zip(self.vectors)
            .zip(self.texts)
            .zip(self.metadatas)
            .map(|(((id, vector), text), metadata)| IndexedRecord {
                id,
                text,
                vector,
                metadata,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

impl IndexedRecord {
    pub(crate) fn doc_id(&self) -> Option<&str> {
        self.metadata.get(keys::DOC_ID).and_then(|v| v.as_str())
    }

    pub(crate) fn chunk_index(&self) -> Option<i64> {
        self.metadata.get(keys::CHUNK_INDEX).and_then(|v| v.as_int())
    }
}

/// One nearest-neighbour hit; `similarity_score = 1 - distance`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub distance: f32,
    pub similarity_score: f32,
}

impl SimilarityResult {
    #[inline]
    pub fn new(id: String, text: String, metadata: Metadata, distance: f32) -> Self {
        Self {
            id,
            text,
            metadata,
            distance,
            similarity_score: 1.0 - distance,
        }
    }
}

/// Persistent or ephemeral storage of typed vector collections.
///
/// Records whose id already exists in the collection are overwritten and
/// count as a fresh insertion for tie-breaking. Distances are cosine
/// distances; ties are broken by insertion order.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn get_or_create_collection(
        &self,
        name: &str,
        dimension: usize,
    ) -> Result<CollectionHandle, StoreError>;

    /// Validate and write all records, or none. Returns the number written.
    async fn add(
        &self,
        collection: &CollectionHandle,
        records: RecordSet,
    ) -> Result<usize, StoreError>;

    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SimilarityResult>, StoreError>;

    async fn clear(&self, collection: &CollectionHandle) -> Result<(), StoreError>;

    async fn count(&self, collection: &CollectionHandle) -> Result<usize, StoreError>;

    /// Remove the chunks of `doc_id` whose `chunk_index >= from_chunk`
    async fn delete_document(
        &self,
        collection: &CollectionHandle,
        doc_id: &str,
        from_chunk: usize,
    ) -> Result<(), StoreError>;
}
