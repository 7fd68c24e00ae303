#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::documents::DocumentType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IndexedDocument {
    pub doc_id: String,
    pub document_type: DocumentType,
    pub source_file: String,
    pub file_type: String,
    pub chunk_count: i64,
    pub char_count: i64,
    pub word_count: i64,
    pub indexed_at: NaiveDateTime,
}

impl IndexedDocument {
    /// Deterministic ids of this document's chunks, in chunk order
    #[inline]
    pub fn chunk_ids(&self) -> Vec<String> {
        (0..self.chunk_count)
            .map(|i| format!("{}_chunk_{}", self.doc_id, i))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIndexedDocument {
    pub doc_id: String,
    pub document_type: DocumentType,
    pub source_file: String,
    pub file_type: String,
    pub chunk_count: i64,
    pub char_count: i64,
    pub word_count: i64,
}
