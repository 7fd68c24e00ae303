use chrono::Utc;

use super::*;

#[test]
fn chunk_ids_follow_document_order() {
    let document = IndexedDocument {
        doc_id: "rfq_highway_002".to_string(),
        document_type: DocumentType::Rfq,
        source_file: "highway.pdf".to_string(),
        file_type: "PDF".to_string(),
        chunk_count: 3,
        char_count: 2400,
        word_count: 410,
        indexed_at: Utc::now().naive_utc(),
    };

    assert_eq!(
        document.chunk_ids(),
        vec![
            "rfq_highway_002_chunk_0",
            "rfq_highway_002_chunk_1",
            "rfq_highway_002_chunk_2"
        ]
    );
}

#[test]
fn empty_document_has_no_chunk_ids() {
    let document = IndexedDocument {
        doc_id: "empty".to_string(),
        document_type: DocumentType::Bid,
        source_file: String::new(),
        file_type: "TXT".to_string(),
        chunk_count: 0,
        char_count: 0,
        word_count: 0,
        indexed_at: Utc::now().naive_utc(),
    };

    assert!(document.chunk_ids().is_empty());
}
