// Consistency validation
// Compares the SQLite ledger against the vector store, one collection at a time

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::database::{CollectionHandle, Database, VectorStore};
use crate::documents::DocumentType;

/// Ledger and store totals for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionConsistency {
    pub document_type: DocumentType,
    pub collection: String,
    /// Sum of `chunk_count` over the ledger rows of this type
    pub ledger_chunks: usize,
    /// Records actually held by the vector store
    pub stored_records: usize,
}

impl CollectionConsistency {
    #[inline]
    pub const fn is_consistent(&self) -> bool {
        self.ledger_chunks == self.stored_records
    }

    #[inline]
    pub const fn difference(&self) -> usize {
        self.ledger_chunks.abs_diff(self.stored_records)
    }
}

/// Consistency check results between the ledger and the vector store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub ledger_chunks: usize,
    pub stored_records: usize,
    pub collections: Vec<CollectionConsistency>,
    pub is_consistent: bool,
}

impl ConsistencyReport {
    #[inline]
    pub fn from_collections(collections: Vec<CollectionConsistency>) -> Self {
        Self {
            ledger_chunks: collections.iter().map(|c| c.ledger_chunks).sum(),
            stored_records: collections.iter().map(|c| c.stored_records).sum(),
            is_consistent: collections.iter().all(CollectionConsistency::is_consistent),
            collections,
        }
    }

    #[inline]
    pub fn inconsistent_collections(&self) -> impl Iterator<Item = &CollectionConsistency> {
        self.collections.iter().filter(|c| !c.is_consistent())
    }

    /// Get a human-readable summary of the consistency report
    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent {
            format!(
                "Stores are consistent: {} chunks in the ledger, {} records in the vector store",
                self.ledger_chunks, self.stored_records
            )
        } else {
            format!(
                "Inconsistencies found: {} chunks in the ledger, {} records in the vector store, {} collections with issues",
                self.ledger_chunks,
                self.stored_records,
                self.inconsistent_collections().count()
            )
        }
    }

    /// Number of records by which the two stores disagree
    #[inline]
    pub fn total_issues(&self) -> usize {
        self.collections
            .iter()
            .map(CollectionConsistency::difference)
            .sum()
    }
}

/// Performs consistency validation between the ledger and a vector store
pub struct ConsistencyValidator<'a> {
    database: &'a Database,
    store: &'a dyn VectorStore,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(database: &'a Database, store: &'a dyn VectorStore) -> Self {
        Self { database, store }
    }

    /// Compare ledger chunk totals with store counts for every given collection
    #[inline]
    pub async fn validate_consistency(
        &self,
        collections: &[(DocumentType, CollectionHandle)],
    ) -> Result<ConsistencyReport> {
        info!("Starting ledger/vector store consistency validation");

        let mut results = Vec::with_capacity(collections.len());
        for (document_type, handle) in collections {
            let ledger_chunks = self
                .database
                .total_chunks(*document_type)
                .await
                .with_context(|| format!("Failed to sum ledger chunks for {}", document_type))?;
            let stored_records = self
                .store
                .count(handle)
                .await
                .with_context(|| format!("Failed to count records in {}", handle.name))?;

            debug!(
                "{}: {} ledger chunks, {} stored records",
                handle.name, ledger_chunks, stored_records
            );

            results.push(CollectionConsistency {
                document_type: *document_type,
                collection: handle.name.clone(),
                ledger_chunks: usize::try_from(ledger_chunks).unwrap_or_default(),
                stored_records,
            });
        }

        let report = ConsistencyReport::from_collections(results);

        if report.is_consistent {
            info!("Consistency validation passed");
        } else {
            warn!("Consistency validation found issues");
            Self::log_consistency_issues(&report);
        }

        Ok(report)
    }

    /// Remove stored chunks beyond each ledger row's recorded chunk count.
    ///
    /// Repairs stale tails left by an interrupted re-index. Records of
    /// documents the ledger does not know are left alone. Returns the number
    /// of records removed; callers must keep writers off these collections
    /// while it runs.
    #[inline]
    pub async fn prune_stale_chunks(
        &self,
        collections: &[(DocumentType, CollectionHandle)],
    ) -> Result<usize> {
        let mut pruned_records = 0;

        for (document_type, handle) in collections {
            let before = self
                .store
                .count(handle)
                .await
                .with_context(|| format!("Failed to count records in {}", handle.name))?;

            let documents = self.database.list_documents(Some(*document_type)).await?;
            for document in documents {
                let keep = usize::try_from(document.chunk_count).unwrap_or_default();
                if let Err(e) = self
                    .store
                    .delete_document(handle, &document.doc_id, keep)
                    .await
                {
                    error!(
                        "Failed to prune stale chunks of {} in {}: {}",
                        document.doc_id, handle.name, e
                    );
                }
            }

            let after = self
                .store
                .count(handle)
                .await
                .with_context(|| format!("Failed to count records in {}", handle.name))?;
            let removed = before.saturating_sub(after);
            if removed > 0 {
                debug!("Pruned {} stale chunks from {}", removed, handle.name);
            }
            pruned_records += removed;
        }

        info!("Pruned {} stale chunks", pruned_records);
        Ok(pruned_records)
    }

    fn log_consistency_issues(report: &ConsistencyReport) {
        for issue in report.inconsistent_collections() {
            warn!(
                "Collection {} ({}) has consistency issues: {} ledger chunks, {} stored records",
                issue.collection, issue.document_type, issue.ledger_chunks, issue.stored_records
            );
        }
    }
}
