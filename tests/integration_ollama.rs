#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Retrieval through the Ollama provider: a mocked server for the pipeline,
// plus ignored tests that need a local Ollama instance.
// Run the real ones with: cargo test --test integration_ollama -- --ignored

use bid_rag::config::{Config, EmbeddingConfig, EmbeddingProvider, OllamaConfig, StorageBackend};
use bid_rag::conflicts::ConflictDocument;
use bid_rag::documents::{DocumentType, Metadata, keys};
use bid_rag::embeddings::{EmbeddingEngine, HashingEmbedder, OllamaEmbedder};
use bid_rag::retrieval::RetrievalService;
use std::env;
use std::time::Duration;
use tempfile::TempDir;
use tracing::info;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const MOCK_DIMENSION: usize = 64;
const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Answers `/api/embed` with deterministic vectors for whatever input it gets
struct EmbedResponder {
    embedder: HashingEmbedder,
}

impl Respond for EmbedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&request.body) else {
            return ResponseTemplate::new(400);
        };
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|input| self.embedder.embed_one(input.as_str().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();

        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": body["model"],
            "embeddings": embeddings,
        }))
    }
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

async fn start_mock_ollama() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(EmbedResponder {
            embedder: HashingEmbedder::new(MOCK_DIMENSION),
        })
        .mount(&server)
        .await;
    server
}

fn mock_config(server: &MockServer, temp_dir: &TempDir) -> Config {
    let address = server.address();
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.embedding = EmbeddingConfig {
        provider: EmbeddingProvider::Ollama,
        model: "all-minilm".to_string(),
        dimension: u32::try_from(MOCK_DIMENSION).expect("small dimension"),
        batch_size: 2,
        ollama: OllamaConfig {
            protocol: "http".to_string(),
            host: address.ip().to_string(),
            port: address.port(),
        },
    };
    config.storage.backend = StorageBackend::Memory;
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_over_mocked_ollama() {
    init_test_tracing();
    let server = start_mock_ollama().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let service = RetrievalService::new(&mock_config(&server, &temp_dir))
        .await
        .expect("should build service");

    let mut metadata = Metadata::new();
    metadata.insert(keys::DOC_ID.to_string(), "rfq_highway".into());
    let report = service
        .index_text(
            "Highway expansion project: 12 km of new lanes, two interchanges and drainage works.",
            DocumentType::Rfq,
            metadata,
        )
        .await
        .expect("should index through Ollama");
    assert_eq!(report.embedding_dimension, MOCK_DIMENSION);

    let outcome = service
        .search("Highway expansion project", DocumentType::Rfq, 5)
        .await
        .expect("should search through Ollama");
    assert_eq!(outcome.total_found(), 1);
    assert_eq!(outcome.results[0].id, "rfq_highway_chunk_0");

    let stats = service.stats().await.expect("should report stats");
    assert_eq!(stats.model, "all-minilm");
    assert_eq!(stats.embedding_dimension, MOCK_DIMENSION);

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2, "one call to index, one to search");
}

#[tokio::test(flavor = "multi_thread")]
async fn conflict_batch_is_split_by_batch_size() {
    let server = start_mock_ollama().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let service = RetrievalService::new(&mock_config(&server, &temp_dir))
        .await
        .expect("should build service");

    let findings = service
        .detect_conflicts(
            &[
                ConflictDocument::new("Budget is $10M over 20 months", "a"),
                ConflictDocument::new("Budget is $10M over 20 months", "b"),
                ConflictDocument::new("This project needs asphalt paving", "c"),
            ],
            0.85,
        )
        .await
        .expect("should detect conflicts");
    assert_eq!(findings.len(), 1);

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2, "three texts at batch size two");
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_fails_indexing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.embedding.provider = EmbeddingProvider::Ollama;
    config.embedding.ollama.port = 9;
    config.storage.backend = StorageBackend::Memory;

    let service = RetrievalService::new(&config)
        .await
        .expect("construction does not contact the server");
    let result = service
        .index_text("Any text", DocumentType::Bid, Metadata::new())
        .await;
    assert!(matches!(result, Err(bid_rag::RagError::Embedding(_))));

    let stats = service.stats().await.expect("should report stats");
    assert_eq!(stats.total_records(), 0);
}

fn create_integration_test_embedder() -> OllamaEmbedder {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);

    let mut config = EmbeddingConfig::default();
    if let Ok(model) = env::var("OLLAMA_MODEL") {
        config.model = model;
    }
    config.ollama.host = host;
    config.ollama.port = port;

    OllamaEmbedder::new(&config)
        .expect("Failed to create Ollama embedder")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(3)
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();
    let embedder = create_integration_test_embedder();

    let result = embedder.health_check();
    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance with all-minilm pulled"]
async fn real_ollama_embeddings_are_deterministic() {
    init_test_tracing();
    let embedder = create_integration_test_embedder();

    let texts = vec![
        "Commercial building construction in Dubai Marina".to_string(),
        "Highway expansion with two interchanges".to_string(),
    ];
    let first = embedder.embed(&texts).await.expect("should embed");
    let second = embedder.embed(&texts).await.expect("should embed again");

    assert_eq!(first.len(), texts.len());
    assert!(first.iter().all(|v| v.len() == embedder.dimension()));
    for (a, b) in first.iter().zip(&second) {
        let drift: f32 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
        assert!(drift < 1e-3, "embeddings drifted by {drift}");
    }

    let empty = embedder.embed(&[]).await.expect("should embed empty batch");
    assert!(empty.is_empty());
    info!("Embedded {} texts with {}", texts.len(), embedder.model_id());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance with all-minilm pulled"]
async fn real_ollama_conflict_properties() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.storage.backend = StorageBackend::Memory;
    let service = RetrievalService::new(&config)
        .await
        .expect("should build service");

    let similar = service
        .detect_conflicts(
            &[
                ConflictDocument::new("Budget is $10M over 20 months", "a"),
                ConflictDocument::new("Total investment is $10M across 20 months", "b"),
            ],
            0.85,
        )
        .await
        .expect("should detect conflicts");
    assert_eq!(similar.len(), 1);
    assert!(similar[0].similarity_score > 0.85);

    let unrelated = service
        .detect_conflicts(
            &[
                ConflictDocument::new("Budget is $10M", "a"),
                ConflictDocument::new("This project needs asphalt paving", "b"),
            ],
            0.85,
        )
        .await
        .expect("should detect conflicts");
    assert!(unrelated.is_empty());
}
