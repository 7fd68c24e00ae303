use super::*;
use crate::documents::{MetadataValue, keys};
use tempfile::TempDir;

fn chunk_metadata(doc_id: &str, index: usize) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(keys::DOC_ID.to_string(), MetadataValue::from(doc_id));
    metadata.insert(keys::CHUNK_INDEX.to_string(), MetadataValue::from(index));
    metadata.insert("project".to_string(), MetadataValue::from("Dubai Marina"));
    metadata.insert("won".to_string(), MetadataValue::from(true));
    metadata
}

fn record_set(doc_id: &str, vectors: Vec<Vec<f32>>) -> RecordSet {
    let n = vectors.len();
    RecordSet {
        ids: (0..n).map(|i| format!("{doc_id}_chunk_{i}")).collect(),
        texts: (0..n).map(|i| format!("{doc_id} text {i}")).collect(),
        metadatas: (0..n).map(|i| chunk_metadata(doc_id, i)).collect(),
        vectors,
    }
}

async fn create_test_store() -> (LanceVectorStore, CollectionHandle, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = LanceVectorStore::open(&temp_dir.path().join("vectors"))
        .await
        .expect("should open vector store");
    let handle = store
        .get_or_create_collection("historical_bids", 3)
        .await
        .expect("should create collection");
    (store, handle, temp_dir)
}

#[tokio::test]
async fn collection_creation_is_idempotent() {
    let (store, handle, _temp_dir) = create_test_store().await;
    assert_eq!(store.backend_name(), "lancedb");
    assert_eq!(store.count(&handle).await.expect("should count"), 0);

    let again = store
        .get_or_create_collection("historical_bids", 3)
        .await
        .expect("should reopen collection");
    assert_eq!(again, handle);

    let mismatch = store.get_or_create_collection("historical_bids", 4).await;
    assert!(matches!(
        mismatch,
        Err(StoreError::DimensionMismatch {
            expected: 4,
            actual: 3,
            ..
        })
    ));
}

#[tokio::test]
async fn add_and_query_round_trip() {
    let (store, handle, _temp_dir) = create_test_store().await;
    let written = store
        .add(
            &handle,
            record_set(
                "bid_luxury_tower_win",
                vec![
                    vec![1.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0],
                    vec![0.7, 0.7, 0.0],
                ],
            ),
        )
        .await
        .expect("should add records");
    assert_eq!(written, 3);
    assert_eq!(store.count(&handle).await.expect("should count"), 3);

    let results = store
        .query(&handle, &[1.0, 0.0, 0.0], 2)
        .await
        .expect("should query");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "bid_luxury_tower_win_chunk_0");
    assert_eq!(results[0].text, "bid_luxury_tower_win text 0");
    assert!(results[0].similarity_score > 0.99);
    assert_eq!(results[1].id, "bid_luxury_tower_win_chunk_2");
    assert!(results[0].similarity_score >= results[1].similarity_score);

    let metadata = &results[0].metadata;
    assert_eq!(
        metadata.get(keys::CHUNK_INDEX).and_then(MetadataValue::as_int),
        Some(0)
    );
    assert_eq!(metadata.get("won"), Some(&MetadataValue::Bool(true)));
    assert_eq!(
        metadata.get("project").and_then(MetadataValue::as_str),
        Some("Dubai Marina")
    );
}

#[tokio::test]
async fn query_limits_and_empty_collection() {
    let (store, handle, _temp_dir) = create_test_store().await;
    assert!(
        store
            .query(&handle, &[1.0, 0.0, 0.0], 5)
            .await
            .expect("should query empty collection")
            .is_empty()
    );

    store
        .add(&handle, record_set("doc", vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]]))
        .await
        .expect("should add records");

    let results = store
        .query(&handle, &[0.0, 0.0, 1.0], 10)
        .await
        .expect("should query");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "doc_chunk_1");

    assert!(
        store
            .query(&handle, &[0.0, 0.0, 1.0], 0)
            .await
            .expect("should query")
            .is_empty()
    );

    let wrong = store.query(&handle, &[1.0, 0.0], 2).await;
    assert!(matches!(wrong, Err(StoreError::DimensionMismatch { .. })));
}

#[tokio::test]
async fn ties_at_the_cutoff_follow_insertion_order() {
    let (store, handle, _temp_dir) = create_test_store().await;

    store
        .add(&handle, record_set("far", vec![vec![0.0, 0.0, 1.0]]))
        .await
        .expect("should add far record");
    store
        .add(&handle, record_set("dup", vec![vec![1.0, 0.0, 0.0]; 6]))
        .await
        .expect("should add duplicates");
    store
        .add(&handle, record_set("late", vec![vec![1.0, 0.0, 0.0]]))
        .await
        .expect("should add late duplicate");

    let ids = |results: Vec<SimilarityResult>| -> Vec<String> {
        results.into_iter().map(|result| result.id).collect()
    };

    let top = store
        .query(&handle, &[1.0, 0.0, 0.0], 3)
        .await
        .expect("should query");
    assert_eq!(ids(top), vec!["dup_chunk_0", "dup_chunk_1", "dup_chunk_2"]);

    let all_ties = store
        .query(&handle, &[1.0, 0.0, 0.0], 7)
        .await
        .expect("should query");
    assert_eq!(
        ids(all_ties),
        vec![
            "dup_chunk_0",
            "dup_chunk_1",
            "dup_chunk_2",
            "dup_chunk_3",
            "dup_chunk_4",
            "dup_chunk_5",
            "late_chunk_0",
        ]
    );

    let everything = store
        .query(&handle, &[1.0, 0.0, 0.0], 20)
        .await
        .expect("should query");
    assert_eq!(everything.len(), 8);
    assert_eq!(everything[7].id, "far_chunk_0");
}

#[tokio::test]
async fn invalid_batches_write_nothing() {
    let (store, handle, _temp_dir) = create_test_store().await;

    let mut misaligned = record_set("doc", vec![vec![1.0, 0.0, 0.0]]);
    misaligned.metadatas.clear();
    assert!(matches!(
        store.add(&handle, misaligned).await,
        Err(StoreError::ArityMismatch { .. })
    ));

    let wrong_dimension = record_set("doc", vec![vec![1.0, 0.0, 0.0], vec![1.0, 0.0]]);
    assert!(matches!(
        store.add(&handle, wrong_dimension).await,
        Err(StoreError::DimensionMismatch { .. })
    ));

    let mut not_a_number = record_set("doc", vec![vec![1.0, 0.0, 0.0]]);
    not_a_number.metadatas[0].insert("margin".to_string(), MetadataValue::Float(f64::NAN));
    assert!(matches!(
        store.add(&handle, not_a_number).await,
        Err(StoreError::NonFiniteMetadata { .. })
    ));

    assert_eq!(store.count(&handle).await.expect("should count"), 0);
}

#[tokio::test]
async fn non_finite_tags_are_stored_as_text() {
    let (store, handle, _temp_dir) = create_test_store().await;

    let mut records = record_set("doc", vec![vec![1.0, 0.0, 0.0]]);
    records.metadatas[0].insert("margin".to_string(), MetadataValue::parse_loose("NaN"));
    records.metadatas[0].insert("cap".to_string(), MetadataValue::parse_loose("inf"));
    store.add(&handle, records).await.expect("should add");

    let results = store
        .query(&handle, &[1.0, 0.0, 0.0], 5)
        .await
        .expect("stored metadata should parse back");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata["margin"].as_str(), Some("NaN"));
    assert_eq!(results[0].metadata["cap"].as_str(), Some("inf"));
}

#[tokio::test]
async fn overwrite_replaces_existing_ids() {
    let (store, handle, _temp_dir) = create_test_store().await;
    store
        .add(&handle, record_set("first", vec![vec![1.0, 0.0, 0.0]]))
        .await
        .expect("should add");
    store
        .add(&handle, record_set("second", vec![vec![1.0, 0.0, 0.0]]))
        .await
        .expect("should add");

    let mut replacement = record_set("first", vec![vec![1.0, 0.0, 0.0]]);
    replacement.texts[0] = "replaced".to_string();
    store
        .add(&handle, replacement)
        .await
        .expect("should overwrite");

    assert_eq!(store.count(&handle).await.expect("should count"), 2);

    let results = store
        .query(&handle, &[1.0, 0.0, 0.0], 2)
        .await
        .expect("should query");
    assert_eq!(results[0].id, "second_chunk_0");
    assert_eq!(results[1].id, "first_chunk_0");
    assert_eq!(results[1].text, "replaced");
}

#[tokio::test]
async fn delete_document_and_clear() {
    let (store, handle, _temp_dir) = create_test_store().await;
    store
        .add(
            &handle,
            record_set(
                "it's-quoted",
                vec![
                    vec![1.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0],
                    vec![0.0, 0.0, 1.0],
                ],
            ),
        )
        .await
        .expect("should add");

    store
        .delete_document(&handle, "it's-quoted", 1)
        .await
        .expect("should prune tail");
    assert_eq!(store.count(&handle).await.expect("should count"), 1);

    store.clear(&handle).await.expect("should clear");
    assert_eq!(store.count(&handle).await.expect("should count"), 0);

    store
        .add(&handle, record_set("after", vec![vec![0.0, 1.0, 0.0]]))
        .await
        .expect("collection should stay usable after clear");
    assert_eq!(store.count(&handle).await.expect("should count"), 1);
}

#[tokio::test]
async fn data_survives_reopen() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("vectors");

    {
        let store = LanceVectorStore::open(&path)
            .await
            .expect("should open vector store");
        let handle = store
            .get_or_create_collection("rfq_documents", 3)
            .await
            .expect("should create collection");
        store
            .add(&handle, record_set("rfq", vec![vec![1.0, 0.0, 0.0]]))
            .await
            .expect("should add");
    }

    let store = LanceVectorStore::open(&path)
        .await
        .expect("should reopen vector store");
    let handle = store
        .get_or_create_collection("rfq_documents", 3)
        .await
        .expect("should reopen collection");
    assert_eq!(store.count(&handle).await.expect("should count"), 1);
}

#[tokio::test]
async fn unknown_collection_is_reported() {
    let (store, _handle, _temp_dir) = create_test_store().await;
    let missing = CollectionHandle::new("conflict_documents", 3);
    assert!(matches!(
        store.count(&missing).await,
        Err(StoreError::UnknownCollection(_))
    ));
}

#[test]
fn literals_are_escaped() {
    assert_eq!(quote_literal("it's"), "'it''s'");
}
