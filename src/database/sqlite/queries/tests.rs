use super::*;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

async fn create_test_pool() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_path)
                .create_if_missing(true)
                .foreign_keys(true),
        )
        .await
        .expect("Failed to create test pool");

    sqlx::raw_sql(include_str!("../migrations/001_documents.sql"))
        .execute(&pool)
        .await
        .expect("Failed to run migrations");

    (temp_dir, pool)
}

fn new_document(doc_id: &str, chunk_count: i64) -> NewIndexedDocument {
    NewIndexedDocument {
        doc_id: doc_id.to_string(),
        document_type: DocumentType::Rfq,
        source_file: "stadium.docx".to_string(),
        file_type: "DOCX".to_string(),
        chunk_count,
        char_count: 5000,
        word_count: 900,
    }
}

#[tokio::test]
async fn upsert_inserts_then_replaces() {
    let (_temp_dir, pool) = create_test_pool().await;

    let first = DocumentQueries::upsert(&pool, &new_document("rfq_stadium_004", 6))
        .await
        .expect("Failed to insert document");
    assert_eq!(first.chunk_count, 6);

    let mut shrunk = new_document("rfq_stadium_004", 2);
    shrunk.source_file = "stadium-rev2.docx".to_string();
    let second = DocumentQueries::upsert(&pool, &shrunk)
        .await
        .expect("Failed to replace document");

    assert_eq!(second.chunk_count, 2);
    assert_eq!(second.source_file, "stadium-rev2.docx");
    assert!(second.indexed_at >= first.indexed_at);
    assert_eq!(
        DocumentQueries::count_by_type(&pool, DocumentType::Rfq)
            .await
            .expect("Failed to count"),
        1
    );
    assert_eq!(
        DocumentQueries::total_chunks(&pool, DocumentType::Rfq)
            .await
            .expect("Failed to sum"),
        2
    );
}

#[tokio::test]
async fn get_missing_document() {
    let (_temp_dir, pool) = create_test_pool().await;
    let missing = DocumentQueries::get(&pool, DocumentType::Bid, "nope")
        .await
        .expect("Failed to query");
    assert!(missing.is_none());
}

#[tokio::test]
async fn total_chunks_of_empty_collection_is_zero() {
    let (_temp_dir, pool) = create_test_pool().await;
    let total = DocumentQueries::total_chunks(&pool, DocumentType::Conflict)
        .await
        .expect("Failed to sum");
    assert_eq!(total, 0);
}

#[tokio::test]
async fn list_all_groups_by_type() {
    let (_temp_dir, pool) = create_test_pool().await;

    let mut bid = new_document("bid_luxury_tower_win", 3);
    bid.document_type = DocumentType::Bid;
    DocumentQueries::upsert(&pool, &bid)
        .await
        .expect("Failed to insert");
    DocumentQueries::upsert(&pool, &new_document("rfq_highway_002", 1))
        .await
        .expect("Failed to insert");

    let all = DocumentQueries::list_all(&pool)
        .await
        .expect("Failed to list");
    let types: Vec<DocumentType> = all.iter().map(|d| d.document_type).collect();
    assert_eq!(types, vec![DocumentType::Bid, DocumentType::Rfq]);
}

#[tokio::test]
async fn document_type_check_constraint() {
    let (_temp_dir, pool) = create_test_pool().await;
    let result = sqlx::query(
        "INSERT INTO documents (doc_id, document_type, source_file, file_type, chunk_count, indexed_at) VALUES ('x', 'memo', 'x', 'TXT', 1, CURRENT_TIMESTAMP)",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err());
}
