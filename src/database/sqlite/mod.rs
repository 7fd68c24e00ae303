use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{IndexedDocument, NewIndexedDocument};
use crate::database::sqlite::queries::DocumentQueries;
use crate::documents::DocumentType;


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// SQLite ledger of indexed documents
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let database_path = database_path.as_ref();
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create ledger directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    /// Private in-memory ledger; a single connection that never expires keeps
    /// the database alive for the lifetime of the pool
    #[inline]
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to create in-memory database")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    // Document ledger operations
    #[inline]
    pub async fn record_document(&self, document: &NewIndexedDocument) -> Result<IndexedDocument> {
        DocumentQueries::upsert(&self.pool, document).await
    }

    #[inline]
    pub async fn get_document(
        &self,
        document_type: DocumentType,
        doc_id: &str,
    ) -> Result<Option<IndexedDocument>> {
        DocumentQueries::get(&self.pool, document_type, doc_id).await
    }

    #[inline]
    pub async fn list_documents(
        &self,
        document_type: Option<DocumentType>,
    ) -> Result<Vec<IndexedDocument>> {
        match document_type {
            Some(document_type) => DocumentQueries::list_by_type(&self.pool, document_type).await,
            None => DocumentQueries::list_all(&self.pool).await,
        }
    }

    #[inline]
    pub async fn total_chunks(&self, document_type: DocumentType) -> Result<i64> {
        DocumentQueries::total_chunks(&self.pool, document_type).await
    }

    #[inline]
    pub async fn count_documents(&self, document_type: DocumentType) -> Result<i64> {
        DocumentQueries::count_by_type(&self.pool, document_type).await
    }

    #[inline]
    pub async fn delete_document(&self, document_type: DocumentType, doc_id: &str) -> Result<bool> {
        DocumentQueries::delete(&self.pool, document_type, doc_id).await
    }

    #[inline]
    pub async fn clear_documents(&self, document_type: DocumentType) -> Result<u64> {
        DocumentQueries::delete_by_type(&self.pool, document_type).await
    }
}
