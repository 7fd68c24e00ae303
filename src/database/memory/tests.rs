use super::*;
use crate::documents::{Metadata, MetadataValue, keys};

fn chunk_metadata(doc_id: &str, index: usize) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(keys::DOC_ID.to_string(), MetadataValue::from(doc_id));
    metadata.insert(keys::CHUNK_INDEX.to_string(), MetadataValue::from(index));
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

async fn store_with_collection(dimension: usize) -> (InMemoryVectorStore, CollectionHandle) {
    let store = InMemoryVectorStore::new();
    let handle = store
        .get_or_create_collection("rfq_documents", dimension)
        .await
        .expect("should create collection");
    (store, handle)
}

#[tokio::test]
async fn get_or_create_is_idempotent() {
    let (store, handle) = store_with_collection(3).await;
    store
        .add(&handle, record_set("doc", vec![vec![1.0, 0.0, 0.0]]))
        .await
        .expect("should add");

    let again = store
        .get_or_create_collection("rfq_documents", 3)
        .await
        .expect("should reopen collection");
    assert_eq!(again, handle);
    assert_eq!(store.count(&again).await.expect("should count"), 1);
}

#[tokio::test]
async fn reopening_with_other_dimension_fails() {
    let (store, _handle) = store_with_collection(3).await;
    let result = store.get_or_create_collection("rfq_documents", 4).await;
    assert!(matches!(
        result,
        Err(StoreError::DimensionMismatch {
            expected: 4,
            actual: 3,
            ..
        })
    ));
}

#[tokio::test]
async fn add_rejects_misaligned_sequences() {
    let (store, handle) = store_with_collection(2).await;
    let mut records = record_set("doc", vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    records.texts.pop();

    let result = store.add(&handle, records).await;
    assert!(matches!(result, Err(StoreError::ArityMismatch { .. })));
    assert_eq!(store.count(&handle).await.expect("should count"), 0);
}

#[tokio::test]
async fn add_rejects_duplicate_ids_in_batch() {
    let (store, handle) = store_with_collection(2).await;
    let mut records = record_set("doc", vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    records.ids[1] = records.ids[0].clone();

    let result = store.add(&handle, records).await;
    assert!(matches!(result, Err(StoreError::DuplicateId(ref id)) if id == "doc_chunk_0"));
    assert_eq!(store.count(&handle).await.expect("should count"), 0);
}

#[tokio::test]
async fn add_rejects_wrong_dimension_without_writing() {
    let (store, handle) = store_with_collection(2).await;
    let records = record_set("doc", vec![vec![1.0, 0.0], vec![0.0, 1.0, 0.0]]);

    let result = store.add(&handle, records).await;
    assert!(matches!(
        result,
        Err(StoreError::DimensionMismatch {
            expected: 2,
            actual: 3,
            ..
        })
    ));
    assert_eq!(store.count(&handle).await.expect("should count"), 0);
}

#[tokio::test]
async fn add_rejects_non_finite_metadata_without_writing() {
    let (store, handle) = store_with_collection(2).await;
    let mut records = record_set("doc", vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    records.metadatas[1].insert("margin".to_string(), MetadataValue::Float(f64::INFINITY));

    let result = store.add(&handle, records).await;
    assert!(matches!(
        result,
        Err(StoreError::NonFiniteMetadata { ref id, ref key }) if id == "doc_chunk_1" && key == "margin"
    ));
    assert_eq!(store.count(&handle).await.expect("should count"), 0);
}

#[tokio::test]
async fn add_to_unknown_collection_fails() {
    let store = InMemoryVectorStore::new();
    let handle = CollectionHandle::new("missing", 2);
    let result = store.add(&handle, record_set("doc", vec![vec![1.0, 0.0]])).await;
    assert!(matches!(result, Err(StoreError::UnknownCollection(_))));
}

#[tokio::test]
async fn query_orders_by_distance() {
    let (store, handle) = store_with_collection(2).await;
    store
        .add(
            &handle,
            record_set(
                "doc",
                vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            ),
        )
        .await
        .expect("should add");

    let results = store
        .query(&handle, &[1.0, 0.0], 10)
        .await
        .expect("should query");

    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["doc_chunk_1", "doc_chunk_2", "doc_chunk_0"]);
    assert!((results[0].similarity_score - 1.0).abs() < 1e-6);
    assert!(results[0].distance.abs() < 1e-6);
    for pair in results.windows(2) {
        assert!(pair[0].similarity_score >= pair[1].similarity_score);
    }
    for result in &results {
        assert!((result.similarity_score - (1.0 - result.distance)).abs() < 1e-6);
    }
}

#[tokio::test]
async fn query_returns_min_of_k_and_count() {
    let (store, handle) = store_with_collection(2).await;
    store
        .add(
            &handle,
            record_set("doc", vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]),
        )
        .await
        .expect("should add");

    for (k, expected) in [(0, 0), (2, 2), (3, 3), (10, 3)] {
        let results = store
            .query(&handle, &[1.0, 0.5], k)
            .await
            .expect("should query");
        assert_eq!(results.len(), expected, "k = {k}");
    }
}

#[tokio::test]
async fn query_empty_collection_returns_nothing() {
    let (store, handle) = store_with_collection(2).await;
    let results = store
        .query(&handle, &[1.0, 0.0], 5)
        .await
        .expect("should query");
    assert!(results.is_empty());
}

#[tokio::test]
async fn query_with_wrong_dimension_fails() {
    let (store, handle) = store_with_collection(2).await;
    let result = store.query(&handle, &[1.0, 0.0, 0.0], 5).await;
    assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));
}

#[tokio::test]
async fn ties_follow_insertion_order() {
    let (store, handle) = store_with_collection(2).await;
    store
        .add(&handle, record_set("first", vec![vec![1.0, 0.0]]))
        .await
        .expect("should add");
    store
        .add(&handle, record_set("second", vec![vec![2.0, 0.0]]))
        .await
        .expect("should add");

    let results = store
        .query(&handle, &[1.0, 0.0], 2)
        .await
        .expect("should query");
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["first_chunk_0", "second_chunk_0"]);
}

#[tokio::test]
async fn existing_ids_are_overwritten_and_move_to_the_end() {
    let (store, handle) = store_with_collection(2).await;
    store
        .add(&handle, record_set("first", vec![vec![1.0, 0.0]]))
        .await
        .expect("should add");
    store
        .add(&handle, record_set("second", vec![vec![1.0, 0.0]]))
        .await
        .expect("should add");

    let mut replacement = record_set("first", vec![vec![1.0, 0.0]]);
    replacement.texts[0] = "replaced".to_string();
    store.add(&handle, replacement).await.expect("should overwrite");

    assert_eq!(store.count(&handle).await.expect("should count"), 2);
    let results = store
        .query(&handle, &[1.0, 0.0], 2)
        .await
        .expect("should query");
    assert_eq!(results[0].id, "second_chunk_0");
    assert_eq!(results[1].id, "first_chunk_0");
    assert_eq!(results[1].text, "replaced");
}

#[tokio::test]
async fn clear_keeps_collection_usable() {
    let (store, handle) = store_with_collection(2).await;
    store
        .add(&handle, record_set("doc", vec![vec![1.0, 0.0]]))
        .await
        .expect("should add");

    store.clear(&handle).await.expect("should clear");
    assert_eq!(store.count(&handle).await.expect("should count"), 0);

    store
        .add(&handle, record_set("doc", vec![vec![0.0, 1.0]]))
        .await
        .expect("should add after clear");
    assert_eq!(store.count(&handle).await.expect("should count"), 1);
}

#[tokio::test]
async fn delete_document_prunes_tail_chunks() {
    let (store, handle) = store_with_collection(2).await;
    store
        .add(
            &handle,
            record_set("doc", vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]),
        )
        .await
        .expect("should add");
    store
        .add(&handle, record_set("other", vec![vec![1.0, 0.0]]))
        .await
        .expect("should add");

    store
        .delete_document(&handle, "doc", 1)
        .await
        .expect("should prune");
    assert_eq!(store.count(&handle).await.expect("should count"), 2);

    store
        .delete_document(&handle, "doc", 0)
        .await
        .expect("should delete");
    let remaining = store
        .query(&handle, &[1.0, 0.0], 10)
        .await
        .expect("should query");
    let ids: Vec<&str> = remaining.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["other_chunk_0"]);
}

#[tokio::test]
async fn collections_are_independent() {
    let store = InMemoryVectorStore::new();
    let rfq = store
        .get_or_create_collection("rfq_documents", 2)
        .await
        .expect("should create");
    let bids = store
        .get_or_create_collection("historical_bids", 2)
        .await
        .expect("should create");

    store
        .add(&rfq, record_set("doc", vec![vec![1.0, 0.0]]))
        .await
        .expect("should add");

    assert_eq!(store.count(&rfq).await.expect("should count"), 1);
    assert_eq!(store.count(&bids).await.expect("should count"), 0);
    assert_eq!(store.backend_name(), "memory");
}
