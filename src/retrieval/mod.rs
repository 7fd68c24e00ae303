// Retrieval service
// Indexing on write (extract, chunk, embed, store, record) and nearest-neighbour retrieval on read

pub mod consistency;


use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::{Config, RetrievalConfig, StorageBackend};
use crate::conflicts::{ConflictDetector, ConflictDocument, ConflictFinding};
use crate::database::{
    CollectionHandle, Database, IndexedDocument, NewIndexedDocument, RecordSet, SimilarityResult,
    StoreError, VectorStore, open_vector_store,
};
use crate::documents::samples::SAMPLE_DOCUMENTS;
use crate::documents::{DocumentClassifier, DocumentType, Metadata, keys};
use crate::embeddings::{ChunkingConfig, EmbeddingEngine, EmbeddingError, build_engine, chunk_text};
use crate::extraction::{DocumentFormat, ExtractedText, ExtractorRegistry};
use crate::{RagError, Result};

pub use consistency::{CollectionConsistency, ConsistencyReport, ConsistencyValidator};

/// Outcome of indexing one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexReport {
    pub doc_id: String,
    pub document_type: DocumentType,
    pub collection: String,
    pub chunks_indexed: usize,
    pub embedding_dimension: usize,
    pub char_count: usize,
    pub word_count: usize,
    /// Document-level metadata shared by every chunk
    pub metadata: Metadata,
}

/// Ranked hits for a query; `message` explains an empty collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub document_type: DocumentType,
    pub results: Vec<SimilarityResult>,
    pub message: Option<String>,
}

impl SearchOutcome {
    #[inline]
    pub fn total_found(&self) -> usize {
        self.results.len()
    }
}

/// Retrieval results assembled for drafting a bid against one RFQ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextBundle {
    pub historical_bids: Vec<SimilarityResult>,
    pub similar_rfqs: Vec<SimilarityResult>,
    pub total_context_chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionCount {
    pub document_type: DocumentType,
    pub collection: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub collections: Vec<CollectionCount>,
    pub embedding_dimension: usize,
    pub model: String,
    pub storage: String,
}

impl CollectionStats {
    #[inline]
    pub fn total_records(&self) -> usize {
        self.collections.iter().map(|c| c.count).sum()
    }

    #[inline]
    pub fn count_for(&self, document_type: DocumentType) -> usize {
        self.collections
            .iter()
            .find(|c| c.document_type == document_type)
            .map_or(0, |c| c.count)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub report: IndexReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

/// Per-file results of indexing a directory tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectoryReport {
    pub indexed: Vec<IndexedFile>,
    pub failed: Vec<FailedFile>,
    /// Files with an extension no extractor handles
    pub skipped: Vec<PathBuf>,
}

impl DirectoryReport {
    #[inline]
    pub fn total_chunks(&self) -> usize {
        self.indexed.iter().map(|f| f.report.chunks_indexed).sum()
    }
}

struct Collection {
    handle: CollectionHandle,
    /// Serializes index and clear operations on this collection
    write_lock: Mutex<()>,
}

/// Entry point for indexing and retrieval.
///
/// Construct once per process and share behind an `Arc`; the embedding model
/// is loaded a single time and every collection is created up front with the
/// model's dimension.
pub struct RetrievalService {
    engine: Arc<dyn EmbeddingEngine>,
    store: Arc<dyn VectorStore>,
    ledger: Database,
    extractors: Arc<ExtractorRegistry>,
    detector: ConflictDetector,
    chunking: ChunkingConfig,
    retrieval: RetrievalConfig,
    conflict_threshold: f32,
    collections: BTreeMap<DocumentType, Collection>,
}

impl fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalService")
            .field("model", &self.engine.model_id())
            .field("dimension", &self.engine.dimension())
            .field("storage", &self.store.backend_name())
            .field("chunking", &self.chunking)
            .finish_non_exhaustive()
    }
}

impl RetrievalService {
    /// Build the engine, vector store and ledger selected by `config`
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let engine = build_engine(&config.embedding, &config.model_cache_path())?;
        let store = open_vector_store(config).await?;
        let ledger = match config.storage.backend {
            StorageBackend::Lancedb => Database::new(config.ledger_path())
                .await
                .context("Failed to initialize document ledger")?,
            StorageBackend::Memory => Database::in_memory()
                .await
                .context("Failed to initialize in-memory document ledger")?,
        };

        Self::with_components(config, engine, store, ledger).await
    }

    /// Assemble a service from already constructed parts
    #[inline]
    pub async fn with_components(
        config: &Config,
        engine: Arc<dyn EmbeddingEngine>,
        store: Arc<dyn VectorStore>,
        ledger: Database,
    ) -> Result<Self> {
        let dimension = engine.dimension();
        let mut collections = BTreeMap::new();
        for document_type in DocumentType::ALL {
            let handle = store
                .get_or_create_collection(document_type.collection_name(), dimension)
                .await?;
            collections.insert(
                document_type,
                Collection {
                    handle,
                    write_lock: Mutex::new(()),
                },
            );
        }

        info!(
            "Retrieval service ready: model {} ({} dimensions), {} storage",
            engine.model_id(),
            dimension,
            store.backend_name()
        );

        Ok(Self {
            detector: ConflictDetector::new(Arc::clone(&engine), &config.conflicts),
            engine,
            store,
            ledger,
            extractors: Arc::new(ExtractorRegistry::default()),
            chunking: config.chunking.clone(),
            retrieval: config.retrieval.clone(),
            conflict_threshold: config.conflicts.threshold,
            collections,
        })
    }

    /// Replace the default format-to-extractor registry
    #[inline]
    #[must_use]
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = Arc::new(extractors);
        self
    }

    #[inline]
    pub fn embedding_dimension(&self) -> usize {
        self.engine.dimension()
    }

    #[inline]
    pub const fn retrieval_config(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Threshold used when a caller does not pick one
    #[inline]
    pub const fn conflict_threshold(&self) -> f32 {
        self.conflict_threshold
    }

    #[inline]
    pub fn collection_handle(&self, document_type: DocumentType) -> Result<&CollectionHandle> {
        Ok(&self.collection(document_type)?.handle)
    }

    fn collection(&self, document_type: DocumentType) -> Result<&Collection> {
        self.collections.get(&document_type).ok_or_else(|| {
            StoreError::UnknownCollection(document_type.collection_name().to_string()).into()
        })
    }

    fn handles(&self) -> Vec<(DocumentType, CollectionHandle)> {
        self.collections
            .iter()
            .map(|(document_type, collection)| (*document_type, collection.handle.clone()))
            .collect()
    }

    /// Extract text on the blocking pool
    #[inline]
    pub async fn extract(&self, bytes: Vec<u8>, format: DocumentFormat) -> Result<ExtractedText> {
        let extractors = Arc::clone(&self.extractors);
        let extracted = tokio::task::spawn_blocking(move || extractors.extract_text(&bytes, format))
            .await
            .context("Extraction task failed")??;
        Ok(extracted)
    }

    /// Extract, chunk, embed and store one document.
    ///
    /// The id is taken from the `doc_id` tag, else the `source_file` tag,
    /// else generated. Re-indexing an existing id replaces all of its chunks.
    #[inline]
    pub async fn index_document(
        &self,
        bytes: Vec<u8>,
        format: DocumentFormat,
        document_type: DocumentType,
        metadata: Metadata,
    ) -> Result<IndexReport> {
        let extracted = self.extract(bytes, format).await?;

        let mut metadata = metadata;
        for (key, value) in extracted.properties {
            metadata.entry(key).or_insert(value);
        }

        self.index_chunks(&extracted.text, format.label(), document_type, metadata)
            .await
    }

    /// Index text that needs no extraction
    #[inline]
    pub async fn index_text(
        &self,
        text: &str,
        document_type: DocumentType,
        metadata: Metadata,
    ) -> Result<IndexReport> {
        let file_type = metadata
            .get(keys::FILE_TYPE)
            .and_then(|v| v.as_str())
            .unwrap_or(DocumentFormat::PlainText.label())
            .to_string();

        self.index_chunks(text, &file_type, document_type, metadata)
            .await
    }

    /// Read and index a file, inferring its format from the extension
    #[inline]
    pub async fn index_file(
        &self,
        path: &Path,
        document_type: DocumentType,
        metadata: Metadata,
    ) -> Result<IndexReport> {
        let format = DocumentFormat::from_path(path)?;
        let bytes = tokio::fs::read(path).await?;

        let mut metadata = metadata;
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            metadata
                .entry(keys::SOURCE_FILE.to_string())
                .or_insert_with(|| name.into());
        }

        self.index_document(bytes, format, document_type, metadata)
            .await
    }

    /// Index every supported file below `dir`.
    ///
    /// Files are processed independently: a failure is recorded and the walk
    /// continues. Types come from `classifier`, falling back to the configured
    /// type when it cannot decide. Each file's doc id is its `/`-separated path
    /// relative to `dir`.
    #[inline]
    pub async fn index_directory(
        &self,
        dir: &Path,
        classifier: &dyn DocumentClassifier,
    ) -> Result<DirectoryReport> {
        if !dir.is_dir() {
            return Err(RagError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", dir.display()),
            )));
        }

        let mut report = DirectoryReport::default();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
                    warn!("Failed to read {}: {}", path.display(), e);
                    report.failed.push(FailedFile {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            if DocumentFormat::from_path(path).is_err() {
                debug!("Skipping unsupported file: {}", path.display());
                report.skipped.push(path.to_path_buf());
                continue;
            }

            let relative = path.strip_prefix(dir).unwrap_or(path);
            let document_type = classifier
                .classify(relative)
                .or(self.retrieval.fallback_document_type);

            // Same-named files in different folders must not share a doc id
            let source = relative_source(relative);
            let mut metadata = Metadata::new();
            metadata.insert(keys::DOC_ID.to_string(), source.as_str().into());
            metadata.insert(keys::SOURCE_FILE.to_string(), source.into());

            match self.index_file(path, document_type, metadata).await {
                Ok(indexed) => report.indexed.push(IndexedFile {
                    path: path.to_path_buf(),
                    report: indexed,
                }),
                Err(e) => {
                    warn!("Failed to index {}: {}", path.display(), e);
                    report.failed.push(FailedFile {
                        path: path.to_path_buf(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Indexed {} files ({} chunks) from {}, {} failed, {} skipped",
            report.indexed.len(),
            report.total_chunks(),
            dir.display(),
            report.failed.len(),
            report.skipped.len()
        );

        Ok(report)
    }

    /// Index the built-in sample corpus
    #[inline]
    pub async fn seed_samples(&self) -> Result<Vec<IndexReport>> {
        let mut reports = Vec::with_capacity(SAMPLE_DOCUMENTS.len());
        for sample in &SAMPLE_DOCUMENTS {
            reports.push(
                self.index_text(sample.content, sample.document_type, sample.metadata())
                    .await?,
            );
        }
        info!("Seeded {} sample documents", reports.len());
        Ok(reports)
    }

    async fn index_chunks(
        &self,
        text: &str,
        file_type: &str,
        document_type: DocumentType,
        mut metadata: Metadata,
    ) -> Result<IndexReport> {
        let doc_id = resolve_doc_id(&metadata);
        let source_file = metadata
            .get(keys::SOURCE_FILE)
            .and_then(|v| v.as_str())
            .map_or_else(|| doc_id.clone(), str::to_string);

        let chunks: Vec<String> =
            chunk_text(text, self.chunking.chunk_size, self.chunking.overlap)
                .into_iter()
                .filter(|chunk| !chunk.trim().is_empty())
                .collect();
        if chunks.is_empty() {
            warn!("Document {} has no text to index", doc_id);
            return Err(RagError::EmptyDocument(doc_id));
        }

        debug!("Embedding {} chunks of {}", chunks.len(), doc_id);
        let vectors = self.engine.embed(&chunks).await?;

        let total_chunks = chunks.len();
        metadata.insert(keys::DOC_ID.to_string(), doc_id.clone().into());
        metadata.insert(keys::SOURCE_FILE.to_string(), source_file.clone().into());
        metadata.insert(
            keys::DOCUMENT_TYPE.to_string(),
            document_type.as_str().into(),
        );
        metadata.insert(keys::FILE_TYPE.to_string(), file_type.into());
        metadata.insert(keys::TOTAL_CHUNKS.to_string(), total_chunks.into());
        metadata.insert(keys::INDEXED_AT.to_string(), Utc::now().to_rfc3339().into());

        let mut records = RecordSet::default();
        for (i, (chunk, vector)) in chunks.into_iter().zip(vectors).enumerate() {
            let mut chunk_metadata = metadata.clone();
            chunk_metadata.insert(keys::CHUNK_INDEX.to_string(), i.into());
            chunk_metadata.insert(
                keys::CHUNK_TEXT_PREVIEW.to_string(),
                preview(&chunk, self.retrieval.preview_chars).into(),
            );

            records.ids.push(format!("{doc_id}_chunk_{i}"));
            records.vectors.push(vector);
            records.texts.push(chunk);
            records.metadatas.push(chunk_metadata);
        }

        let char_count = text.chars().count();
        let word_count = text.split_whitespace().count();
        let ledger_row = NewIndexedDocument {
            doc_id: doc_id.clone(),
            document_type,
            source_file,
            file_type: file_type.to_string(),
            chunk_count: i64::try_from(total_chunks).unwrap_or(i64::MAX),
            char_count: i64::try_from(char_count).unwrap_or(i64::MAX),
            word_count: i64::try_from(word_count).unwrap_or(i64::MAX),
        };

        let collection = self.collection(document_type)?;
        let _guard = collection.write_lock.lock().await;

        self.store.add(&collection.handle, records).await?;

        if let Err(e) = self
            .store
            .delete_document(&collection.handle, &doc_id, total_chunks)
            .await
        {
            error!("Failed to prune stale chunks of {}: {}", doc_id, e);
            self.rollback(collection, document_type, &doc_id).await;
            return Err(e.into());
        }

        if let Err(e) = self.ledger.record_document(&ledger_row).await {
            error!("Failed to record {} in the ledger: {}", doc_id, e);
            self.rollback(collection, document_type, &doc_id).await;
            return Err(e
                .context(format!("Failed to record document {}", doc_id))
                .into());
        }

        info!(
            "Indexed {} as {} ({} chunks)",
            doc_id, document_type, total_chunks
        );

        Ok(IndexReport {
            doc_id,
            document_type,
            collection: collection.handle.name.clone(),
            chunks_indexed: total_chunks,
            embedding_dimension: collection.handle.dimension,
            char_count,
            word_count,
            metadata,
        })
    }

    /// Remove every trace of a document after a failed write
    async fn rollback(&self, collection: &Collection, document_type: DocumentType, doc_id: &str) {
        warn!("Rolling back partially indexed document {}", doc_id);

        if let Err(e) = self
            .store
            .delete_document(&collection.handle, doc_id, 0)
            .await
        {
            error!("Failed to remove chunks of {}: {}", doc_id, e);
        }
        if let Err(e) = self.ledger.delete_document(document_type, doc_id).await {
            error!("Failed to remove ledger row of {}: {}", doc_id, e);
        }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.engine.embed(&[query.to_string()]).await?;
        let vector = vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })?;
        Ok(vector)
    }

    async fn nearest(
        &self,
        document_type: DocumentType,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SimilarityResult>> {
        let collection = self.collection(document_type)?;
        if self.store.count(&collection.handle).await? == 0 {
            return Ok(Vec::new());
        }
        Ok(self.store.query(&collection.handle, vector, k).await?)
    }

    /// Embed `query` and return the `k` nearest chunks of one collection
    #[inline]
    pub async fn search(
        &self,
        query: &str,
        document_type: DocumentType,
        k: usize,
    ) -> Result<SearchOutcome> {
        let collection = self.collection(document_type)?;

        if self.store.count(&collection.handle).await? == 0 {
            let message = format!(
                "No documents indexed in {} collection",
                collection.handle.name
            );
            info!("{}", message);
            return Ok(SearchOutcome {
                query: query.to_string(),
                document_type,
                results: Vec::new(),
                message: Some(message),
            });
        }

        let vector = self.embed_query(query).await?;
        let results = self.store.query(&collection.handle, &vector, k).await?;
        debug!(
            "Found {} results in {} for query of {} characters",
            results.len(),
            collection.handle.name,
            query.chars().count()
        );

        Ok(SearchOutcome {
            query: query.to_string(),
            document_type,
            results,
            message: None,
        })
    }

    /// Historical bids and similar RFQ chunks for drafting a bid.
    ///
    /// Only the opening `context_query_chars` characters of the RFQ form the
    /// query; both searches share its single embedding.
    #[inline]
    pub async fn get_context_for_bid(
        &self,
        rfq_text: &str,
        n_historical_bids: usize,
        n_rfq_chunks: usize,
    ) -> Result<ContextBundle> {
        let query: String = rfq_text
            .chars()
            .take(self.retrieval.context_query_chars)
            .collect();
        let vector = self.embed_query(&query).await?;

        let historical_bids = self
            .nearest(DocumentType::Bid, &vector, n_historical_bids)
            .await?;
        let similar_rfqs = self
            .nearest(DocumentType::Rfq, &vector, n_rfq_chunks)
            .await?;

        info!(
            "Assembled bid context: {} historical bid chunks, {} RFQ chunks",
            historical_bids.len(),
            similar_rfqs.len()
        );

        Ok(ContextBundle {
            total_context_chunks: historical_bids.len() + similar_rfqs.len(),
            historical_bids,
            similar_rfqs,
        })
    }

    /// `get_context_for_bid` with the configured result counts
    #[inline]
    pub async fn get_default_context(&self, rfq_text: &str) -> Result<ContextBundle> {
        self.get_context_for_bid(
            rfq_text,
            self.retrieval.n_historical_bids,
            self.retrieval.n_rfq_chunks,
        )
        .await
    }

    #[inline]
    pub async fn detect_conflicts(
        &self,
        documents: &[ConflictDocument],
        threshold: f32,
    ) -> Result<Vec<ConflictFinding>> {
        Ok(self.detector.detect(documents, threshold).await?)
    }

    #[inline]
    pub async fn stats(&self) -> Result<CollectionStats> {
        let mut collections = Vec::with_capacity(self.collections.len());
        for (document_type, collection) in &self.collections {
            collections.push(CollectionCount {
                document_type: *document_type,
                collection: collection.handle.name.clone(),
                count: self.store.count(&collection.handle).await?,
            });
        }

        Ok(CollectionStats {
            collections,
            embedding_dimension: self.engine.dimension(),
            model: self.engine.model_id().to_string(),
            storage: self.store.backend_name().to_string(),
        })
    }

    /// Empty one collection and drop its ledger rows; returns the rows removed
    #[inline]
    pub async fn clear_collection(&self, document_type: DocumentType) -> Result<u64> {
        let collection = self.collection(document_type)?;
        let _guard = collection.write_lock.lock().await;

        self.store.clear(&collection.handle).await?;
        let removed = self.ledger.clear_documents(document_type).await?;

        info!(
            "Cleared {} collection ({} documents)",
            collection.handle.name, removed
        );
        Ok(removed)
    }

    #[inline]
    pub async fn list_documents(
        &self,
        document_type: Option<DocumentType>,
    ) -> Result<Vec<IndexedDocument>> {
        Ok(self.ledger.list_documents(document_type).await?)
    }

    /// Compare ledger and store totals with every collection's writers held off
    #[inline]
    pub async fn check_consistency(&self) -> Result<ConsistencyReport> {
        let mut guards = Vec::with_capacity(self.collections.len());
        for collection in self.collections.values() {
            guards.push(collection.write_lock.lock().await);
        }

        let validator = ConsistencyValidator::new(&self.ledger, self.store.as_ref());
        Ok(validator.validate_consistency(&self.handles()).await?)
    }

    /// Prune stored chunks the ledger no longer accounts for; returns the records removed
    #[inline]
    pub async fn repair_consistency(&self) -> Result<usize> {
        let validator = ConsistencyValidator::new(&self.ledger, self.store.as_ref());

        let mut pruned = 0;
        for (document_type, collection) in &self.collections {
            let _guard = collection.write_lock.lock().await;
            pruned += validator
                .prune_stale_chunks(&[(*document_type, collection.handle.clone())])
                .await?;
        }
        Ok(pruned)
    }
}

fn resolve_doc_id(metadata: &Metadata) -> String {
    [keys::DOC_ID, keys::SOURCE_FILE]
        .into_iter()
        .filter_map(|key| metadata.get(key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map_or_else(|| format!("doc-{}", Uuid::new_v4()), str::to_string)
}

fn relative_source(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn preview(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}
