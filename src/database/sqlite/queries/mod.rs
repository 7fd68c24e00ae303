#[cfg(test)]
mod tests;

use super::models::*;
use crate::documents::DocumentType;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

const SELECT_DOCUMENT: &str = r"
    SELECT doc_id,
           document_type,
           source_file,
           file_type,
           chunk_count,
           char_count,
           word_count,
           indexed_at
    FROM documents";

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert or replace the ledger row for one document
    #[inline]
    pub async fn upsert(pool: &SqlitePool, document: &NewIndexedDocument) -> Result<IndexedDocument> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r"
            INSERT INTO documents
                (doc_id, document_type, source_file, file_type, chunk_count, char_count, word_count, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(document_type, doc_id) DO UPDATE SET
                source_file = excluded.source_file,
                file_type = excluded.file_type,
                chunk_count = excluded.chunk_count,
                char_count = excluded.char_count,
                word_count = excluded.word_count,
                indexed_at = excluded.indexed_at
            ",
        )
        .bind(&document.doc_id)
        .bind(document.document_type)
        .bind(&document.source_file)
        .bind(&document.file_type)
        .bind(document.chunk_count)
        .bind(document.char_count)
        .bind(document.word_count)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to record document {}", document.doc_id))?;

        debug!(
            "Recorded {} document {} ({} chunks)",
            document.document_type, document.doc_id, document.chunk_count
        );

        Self::get(pool, document.document_type, &document.doc_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve recorded document"))
    }

    #[inline]
    pub async fn get(
        pool: &SqlitePool,
        document_type: DocumentType,
        doc_id: &str,
    ) -> Result<Option<IndexedDocument>> {
        sqlx::query_as::<_, IndexedDocument>(&format!(
            "{SELECT_DOCUMENT} WHERE document_type = ? AND doc_id = ?"
        ))
        .bind(document_type)
        .bind(doc_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document")
    }

    #[inline]
    pub async fn list_by_type(
        pool: &SqlitePool,
        document_type: DocumentType,
    ) -> Result<Vec<IndexedDocument>> {
        sqlx::query_as::<_, IndexedDocument>(&format!(
            "{SELECT_DOCUMENT} WHERE document_type = ? ORDER BY indexed_at, doc_id"
        ))
        .bind(document_type)
        .fetch_all(pool)
        .await
        .context("Failed to list documents by type")
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<IndexedDocument>> {
        sqlx::query_as::<_, IndexedDocument>(&format!(
            "{SELECT_DOCUMENT} ORDER BY document_type, indexed_at, doc_id"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list documents")
    }

    /// Sum of recorded chunk counts for one collection
    #[inline]
    pub async fn total_chunks(pool: &SqlitePool, document_type: DocumentType) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(chunk_count), 0) FROM documents WHERE document_type = ?",
        )
        .bind(document_type)
        .fetch_one(pool)
        .await
        .context("Failed to sum document chunks")
    }

    #[inline]
    pub async fn count_by_type(pool: &SqlitePool, document_type: DocumentType) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents WHERE document_type = ?")
            .bind(document_type)
            .fetch_one(pool)
            .await
            .context("Failed to count documents")
    }

    #[inline]
    pub async fn delete(
        pool: &SqlitePool,
        document_type: DocumentType,
        doc_id: &str,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE document_type = ? AND doc_id = ?")
            .bind(document_type)
            .bind(doc_id)
            .execute(pool)
            .await
            .context("Failed to delete document")?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn delete_by_type(pool: &SqlitePool, document_type: DocumentType) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE document_type = ?")
            .bind(document_type)
            .execute(pool)
            .await
            .context("Failed to delete documents by type")?;

        debug!(
            "Removed {} {} documents from the ledger",
            result.rows_affected(),
            document_type
        );
        Ok(result.rows_affected())
    }
}
