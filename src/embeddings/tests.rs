use super::*;
use tempfile::TempDir;

#[test]
fn cosine_similarity_bounds() {
    let a = [1.0, 0.0, 0.0];
    let b = [0.0, 1.0, 0.0];
    let c = [-1.0, 0.0, 0.0];

    assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    assert!((cosine_similarity(&a, &c) + 1.0).abs() < 1e-6);
}

#[test]
fn cosine_similarity_degenerate_inputs() {
    assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).abs() < f32::EPSILON);
    assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).abs() < f32::EPSILON);
    assert!(cosine_similarity(&[], &[]).abs() < f32::EPSILON);
}

#[test]
fn validate_batch_checks_count_then_dimension() {
    let vectors = vec![vec![0.0; 3], vec![0.0; 4]];

    assert!(matches!(
        validate_batch(3, &vectors, 3),
        Err(EmbeddingError::CountMismatch {
            expected: 3,
            actual: 2
        })
    ));
    assert!(matches!(
        validate_batch(2, &vectors, 3),
        Err(EmbeddingError::DimensionMismatch {
            expected: 3,
            actual: 4
        })
    ));
    assert!(validate_batch(1, &vectors[..1], 3).is_ok());
}

#[test]
fn build_hashing_engine() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = EmbeddingConfig {
        provider: EmbeddingProvider::Hashing,
        dimension: 96,
        ..EmbeddingConfig::default()
    };

    let engine = build_engine(&config, temp_dir.path()).expect("should build engine");
    assert_eq!(engine.dimension(), 96);
    assert_eq!(engine.model_id(), "feature-hashing-v1");
}

#[test]
fn build_ollama_engine_without_server() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let engine =
        build_engine(&EmbeddingConfig::default(), temp_dir.path()).expect("should build engine");
    assert_eq!(engine.dimension(), 384);
    assert_eq!(engine.model_id(), DEFAULT_EMBEDDING_MODEL);
}

#[cfg(not(feature = "fastembed"))]
#[test]
fn fastembed_requires_feature() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = EmbeddingConfig {
        provider: EmbeddingProvider::FastEmbed,
        ..EmbeddingConfig::default()
    };

    assert!(matches!(
        build_engine(&config, temp_dir.path()),
        Err(EmbeddingError::Model(_))
    ));
}
