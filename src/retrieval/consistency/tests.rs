use super::*;
use crate::database::{InMemoryVectorStore, NewIndexedDocument, RecordSet};
use crate::documents::{Metadata, keys};

fn collection(document_type: DocumentType, ledger: usize, stored: usize) -> CollectionConsistency {
    CollectionConsistency {
        document_type,
        collection: document_type.collection_name().to_string(),
        ledger_chunks: ledger,
        stored_records: stored,
    }
}

#[test]
fn consistency_report_creation() {
    let report = ConsistencyReport::from_collections(vec![
        collection(DocumentType::Rfq, 100, 95),
        collection(DocumentType::Bid, 10, 10),
    ]);

    assert_eq!(report.ledger_chunks, 110);
    assert_eq!(report.stored_records, 105);
    assert_eq!(report.total_issues(), 5);
    assert!(!report.is_consistent);
    assert!(report.summary().contains("Inconsistencies found"));
    assert!(report.summary().contains("1 collections with issues"));
}

#[test]
fn consistent_report() {
    let report = ConsistencyReport::from_collections(vec![
        collection(DocumentType::Rfq, 4, 4),
        collection(DocumentType::Conflict, 0, 0),
    ]);

    assert_eq!(report.total_issues(), 0);
    assert!(report.is_consistent);
    assert!(report.summary().contains("Stores are consistent"));
    assert_eq!(report.inconsistent_collections().count(), 0);
}

#[test]
fn difference_is_symmetric() {
    assert_eq!(collection(DocumentType::Bid, 3, 7).difference(), 4);
    assert_eq!(collection(DocumentType::Bid, 7, 3).difference(), 4);
}

fn records(doc_id: &str, count: usize) -> RecordSet {
    let mut set = RecordSet::default();
    for i in 0..count {
        let mut metadata = Metadata::new();
        metadata.insert(keys::DOC_ID.to_string(), doc_id.into());
        metadata.insert(keys::CHUNK_INDEX.to_string(), i.into());
        set.ids.push(format!("{doc_id}_chunk_{i}"));
        set.vectors.push(vec![1.0, i as f32]);
        set.texts.push(format!("chunk {i}"));
        set.metadatas.push(metadata);
    }
    set
}

#[tokio::test]
async fn validator_detects_and_repairs_stale_tail() {
    let database = Database::in_memory().await.expect("should open ledger");
    let store = InMemoryVectorStore::new();
    let handle = store
        .get_or_create_collection(DocumentType::Rfq.collection_name(), 2)
        .await
        .expect("should create collection");
    let collections = vec![(DocumentType::Rfq, handle.clone())];

    for (doc_id, stored, recorded) in [("rfq_a", 6, 3), ("rfq_b", 2, 2)] {
        store
            .add(&handle, records(doc_id, stored))
            .await
            .expect("should add records");
        database
            .record_document(&NewIndexedDocument {
                doc_id: doc_id.to_string(),
                document_type: DocumentType::Rfq,
                source_file: format!("{doc_id}.txt"),
                file_type: "TXT".to_string(),
                chunk_count: recorded,
                char_count: 3000,
                word_count: 500,
            })
            .await
            .expect("should record document");
    }

    let validator = ConsistencyValidator::new(&database, &store);
    let report = validator
        .validate_consistency(&collections)
        .await
        .expect("should validate");
    assert!(!report.is_consistent);
    assert_eq!(report.total_issues(), 3);

    let pruned = validator
        .prune_stale_chunks(&collections)
        .await
        .expect("should prune");
    assert_eq!(pruned, 3, "counts records removed, not documents checked");
    assert_eq!(store.count(&handle).await.expect("should count"), 5);

    let pruned_again = validator
        .prune_stale_chunks(&collections)
        .await
        .expect("should prune");
    assert_eq!(pruned_again, 0);

    let report = validator
        .validate_consistency(&collections)
        .await
        .expect("should validate");
    assert!(report.is_consistent, "{}", report.summary());
}
