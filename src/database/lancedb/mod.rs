// LanceDB vector store
// One table per collection, cosine distance, a `seq` column recording insertion order

#[cfg(test)]
mod tests;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::store::{
    CollectionHandle, IndexedRecord, RecordSet, SimilarityResult, StoreError, VectorStore,
};
use crate::documents::Metadata;

const SEQ_COLUMN: &str = "seq";
const DISTANCE_COLUMN: &str = "_distance";

/// Durable vector store backed by a LanceDB directory
pub struct LanceVectorStore {
    connection: Connection,
    /// Serializes writers per collection
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    next_seq: AtomicU64,
}

impl std::fmt::Debug for LanceVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceVectorStore")
            .field("uri", &self.connection.uri())
            .finish_non_exhaustive()
    }
}

fn backend(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("{context}: {e}"))
}

impl LanceVectorStore {
    /// Open (or create) the store rooted at `db_path`
    #[inline]
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        debug!("Initializing LanceDB at path: {}", db_path.display());

        std::fs::create_dir_all(db_path)
            .map_err(|e| backend("Failed to create vector database directory", e))?;

        let uri = db_path.to_string_lossy().to_string();

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt")
                    || error_msg.contains("invalid")
                    || error_msg.contains("malformed")
                {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        backend("Failed to connect to LanceDB after recovery", e)
                    })?
                } else {
                    return Err(backend("Failed to connect to LanceDB", e));
                }
            }
        };

        // Seed from the clock so sequence numbers keep growing across sessions
        let seed = u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default();

        info!("Vector store initialized at {}", db_path.display());
        Ok(Self {
            connection,
            write_locks: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(seed),
        })
    }

    fn attempt_corruption_recovery(db_path: &Path) -> Result<(), StoreError> {
        warn!(
            "Attempting database corruption recovery at {}",
            db_path.display()
        );

        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {}", backup_path.display());
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path)
                .map_err(|e| backend("Failed to remove corrupted database", e))?;
        }

        std::fs::create_dir_all(db_path)
            .map_err(|e| backend("Failed to recreate vector database directory", e))?;

        info!("Database corruption recovery completed");
        Ok(())
    }

    async fn write_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    fn create_schema(vector_dim: usize) -> Result<Arc<Schema>, StoreError> {
        let list_size = i32::try_from(vector_dim)
            .map_err(|_| StoreError::Backend(format!("Vector dimension too large: {vector_dim}")))?;

        Ok(Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    list_size,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
            Field::new("doc_id", DataType::Utf8, true),
            Field::new("chunk_index", DataType::UInt32, true),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(SEQ_COLUMN, DataType::UInt64, false),
        ])))
    }

    async fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| backend("Failed to list tables", e))?;
        Ok(table_names.iter().any(|table| table == name))
    }

    async fn open_table(&self, handle: &CollectionHandle) -> Result<Table, StoreError> {
        if !self.table_exists(&handle.name).await? {
            return Err(StoreError::UnknownCollection(handle.name.clone()));
        }

        self.connection
            .open_table(&handle.name)
            .execute()
            .await
            .map_err(|e| backend("Failed to open table", e))
    }

    async fn create_table(&self, name: &str, dimension: usize) -> Result<(), StoreError> {
        let schema = Self::create_schema(dimension)?;
        self.connection
            .create_empty_table(name, schema)
            .execute()
            .await
            .map_err(|e| backend("Failed to create table", e))?;
        info!("Created collection '{}' with {} dimensions", name, dimension);
        Ok(())
    }

    /// Detect vector dimension from an existing table schema
    async fn detect_existing_vector_dimension(&self, name: &str) -> Result<usize, StoreError> {
        let table = self
            .connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| backend("Failed to open existing table", e))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| backend("Failed to get table schema", e))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return usize::try_from(*size)
                        .map_err(|e| backend("Invalid vector dimension", e));
                }
            }
        }

        Err(StoreError::Backend(format!(
            "Could not find vector column in table '{name}'"
        )))
    }

    /// Create a RecordBatch from indexed records, stamping each with a fresh sequence number
    fn create_record_batch(
        &self,
        dimension: usize,
        records: &[IndexedRecord],
    ) -> Result<RecordBatch, StoreError> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * dimension);
        let mut texts = Vec::with_capacity(len);
        let mut doc_ids = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut metadatas = Vec::with_capacity(len);
        let mut seqs = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            texts.push(record.text.as_str());
            doc_ids.push(record.doc_id());
            chunk_indices.push(record.chunk_index().and_then(|i| u32::try_from(i).ok()));
            metadatas.push(
                serde_json::to_string(&record.metadata)
                    .map_err(|e| backend("Failed to serialize metadata", e))?,
            );
            seqs.push(self.next_seq.fetch_add(1, Ordering::Relaxed));
        }

        let schema = Self::create_schema(dimension)?;

        let list_size = i32::try_from(dimension)
            .map_err(|e| backend("Vector dimension too large", e))?;
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            list_size,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| backend("Failed to create vector array", e))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(doc_ids)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(metadatas)),
            Arc::new(UInt64Array::from(seqs)),
        ];

        RecordBatch::try_new(schema, arrays).map_err(|e| backend("Failed to create record batch", e))
    }

    /// Parse a single record batch from search results into (seq, result) pairs
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<(u64, SimilarityResult)>, StoreError> {
        let ids = string_column(batch, "id")?;
        let texts = string_column(batch, "text")?;
        let metadatas = string_column(batch, "metadata")?;
        let seqs = batch
            .column_by_name(SEQ_COLUMN)
            .ok_or_else(|| StoreError::Backend("Missing seq column".to_string()))?
            .as_any()
            .downcast_ref::<UInt64Array>()
            .ok_or_else(|| StoreError::Backend("Invalid seq column type".to_string()))?;
        let distances = batch
            .column_by_name(DISTANCE_COLUMN)
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut results = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let metadata: Metadata = serde_json::from_str(metadatas.value(row))
                .map_err(|e| backend("Failed to parse stored metadata", e))?;

            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            results.push((
                seqs.value(row),
                SimilarityResult::new(
                    ids.value(row).to_string(),
                    texts.value(row).to_string(),
                    metadata,
                    distance,
                ),
            ));
        }

        Ok(results)
    }

    /// The `limit` nearest rows ordered by (distance, seq)
    async fn search_window(
        table: &Table,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<(u64, SimilarityResult)>, StoreError> {
        let mut stream = table
            .vector_search(vector)
            .map_err(|e| backend("Failed to create vector search", e))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| backend("Failed to execute search", e))?;

        let mut hits = Vec::with_capacity(limit);
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| backend("Failed to read result stream", e))?
        {
            hits.extend(Self::parse_search_batch(&batch)?);
        }

        hits.sort_by(|(seq_a, a), (seq_b, b)| {
            a.distance.total_cmp(&b.distance).then(seq_a.cmp(seq_b))
        });
        Ok(hits)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StoreError::Backend(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StoreError::Backend(format!("Invalid {name} column type")))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    fn backend_name(&self) -> &'static str {
        "lancedb"
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        dimension: usize,
    ) -> Result<CollectionHandle, StoreError> {
        let handle = CollectionHandle::new(name, dimension);
        let lock = self.write_lock(name).await;
        let _guard = lock.lock().await;

        if self.table_exists(name).await? {
            let existing = self.detect_existing_vector_dimension(name).await?;
            debug!("Opened collection '{}' ({} dims)", name, existing);
            handle.check_dimension(existing)?;
            return Ok(handle);
        }

        self.create_table(name, dimension).await?;
        Ok(handle)
    }

    async fn add(
        &self,
        collection: &CollectionHandle,
        records: RecordSet,
    ) -> Result<usize, StoreError> {
        records.validate(collection)?;
        if records.is_empty() {
            debug!("No records to store");
            return Ok(0);
        }

        let lock = self.write_lock(&collection.name).await;
        let _guard = lock.lock().await;

        let table = self.open_table(collection).await?;
        let records = records.into_records();
        let record_batch = self.create_record_batch(collection.dimension, &records)?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        // Upsert on id; matched rows take the new seq and so move to the end
        let mut merge = table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| backend("Failed to insert records", e))?;

        debug!(
            "Stored {} records in collection '{}'",
            records.len(),
            collection.name
        );
        Ok(records.len())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SimilarityResult>, StoreError> {
        collection.check_dimension(vector.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let table = self.open_table(collection).await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| backend("Failed to count rows", e))?;
        if count == 0 {
            return Ok(Vec::new());
        }

        // Grow the window until the k-th hit is strictly closer than the last one fetched,
        // so ties at the cutoff are settled by insertion order rather than scan order
        let mut limit = k.min(count);
        let mut hits = loop {
            let hits = Self::search_window(&table, vector, limit).await?;
            let settled = limit >= count
                || hits.len() < limit
                || hits
                    .get(k - 1)
                    .zip(hits.last())
                    .is_none_or(|((_, kth), (_, last))| kth.distance < last.distance);
            if settled {
                break hits;
            }
            limit = limit.saturating_mul(2).min(count);
            debug!("Tie at the cutoff on '{}', widening to {}", collection.name, limit);
        };
        hits.truncate(k);

        debug!(
            "Query on '{}' returned {} results",
            collection.name,
            hits.len()
        );
        Ok(hits.into_iter().map(|(_, result)| result).collect())
    }

    async fn clear(&self, collection: &CollectionHandle) -> Result<(), StoreError> {
        let lock = self.write_lock(&collection.name).await;
        let _guard = lock.lock().await;

        if self.table_exists(&collection.name).await? {
            info!("Dropping collection '{}'", collection.name);
            self.connection
                .drop_table(&collection.name)
                .await
                .map_err(|e| backend("Failed to drop table", e))?;
        }

        self.create_table(&collection.name, collection.dimension)
            .await
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize, StoreError> {
        let table = self.open_table(collection).await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| backend("Failed to count rows", e))
    }

    async fn delete_document(
        &self,
        collection: &CollectionHandle,
        doc_id: &str,
        from_chunk: usize,
    ) -> Result<(), StoreError> {
        let lock = self.write_lock(&collection.name).await;
        let _guard = lock.lock().await;

        let table = self.open_table(collection).await?;
        let predicate = format!(
            "doc_id = {} AND chunk_index >= {}",
            quote_literal(doc_id),
            from_chunk
        );
        table
            .delete(&predicate)
            .await
            .map_err(|e| backend("Failed to delete document records", e))?;

        debug!(
            "Deleted chunks {}.. of '{}' from '{}'",
            from_chunk, doc_id, collection.name
        );
        Ok(())
    }
}
