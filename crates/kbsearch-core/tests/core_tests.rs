use std::fs;
use std::time::Duration;
use tempfile::TempDir;

use kbsearch_core::config::{CacheBackendKind, Config, Settings};
use kbsearch_core::error::{with_timeout, Error};
use kbsearch_core::file_store::LocalFileStore;
use kbsearch_core::traits::FileStore;
use kbsearch_core::types::{Chunk, ImageChunk, ImageInput, Modality, ScoredChunk, TextChunk};

fn text_chunk(id: &str) -> Chunk {
    Chunk::Text(TextChunk {
        id: id.to_string(),
        document_id: "doc-1".to_string(),
        document_name: "manual.pdf".to_string(),
        content: "煞車系統檢修程序".to_string(),
    })
}

#[test]
fn score_prefers_relevance_over_similarity() {
    let mut sc = ScoredChunk::new(text_chunk("c1"), 0.42);
    assert_eq!(sc.score(), 0.42);
    sc.relevance_score = Some(0.9);
    assert_eq!(sc.score(), 0.9);
}

#[test]
fn chunk_serializes_with_modality_tag() {
    let image = Chunk::Image(ImageChunk {
        id: "img-1".to_string(),
        document_id: "doc-2".to_string(),
        document_name: "diagram.png".to_string(),
        image_payload: "aGVsbG8=".to_string(),
        description: "brake caliper".to_string(),
    });
    let json = serde_json::to_value(&image).unwrap();
    assert_eq!(json["modality"], "image");
    assert_eq!(image.text(), "brake caliper");
    assert_eq!(image.modality(), Modality::Image);

    let back: Chunk = serde_json::from_value(json).unwrap();
    assert_eq!(back, image);
}

#[test]
fn scored_chunk_omits_unset_scores() {
    let sc = ScoredChunk::new(text_chunk("c1"), 0.5);
    let json = serde_json::to_string(&sc).unwrap();
    assert!(!json.contains("relevance_score"));
    assert!(!json.contains("file_url"));
    assert!(json.contains("\"rerank_fallback\":false"));
}

#[test]
fn image_input_encodes_bytes() {
    assert_eq!(ImageInput::Bytes(b"hello".to_vec()).to_base64(), "aGVsbG8=");
    assert_eq!(ImageInput::Base64("abc=".into()).to_base64(), "abc=");
}

#[test]
fn empty_config_yields_defaults() {
    let settings = Config::from_toml_str("").settings().expect("defaults are valid");
    assert_eq!(settings.retrieval.default_top_k, 5);
    assert_eq!(settings.retrieval.rrf_k, 60);
    assert_eq!(settings.retrieval.lexical_pool_size, 100);
    assert_eq!(settings.retrieval.rerank_top_n, 10);
    assert_eq!(settings.cache.ttl(), Duration::from_secs(3600));
    assert_eq!(settings.cache.backend, CacheBackendKind::Sqlite);
    assert_eq!(settings.rerank.model, "rerank-v3.5");
    assert!(!settings.rerank.is_configured());
    assert_eq!(settings.embedding.text.dim, 1536);
    assert_eq!(settings.embedding.image.dim, 768);
}

#[test]
fn toml_overrides_individual_keys() {
    let cfg = Config::from_toml_str(
        r#"
        [retrieval]
        rrf_k = 30

        [rerank]
        api_key = "secret"

        [cache]
        ttl_seconds = 60
        backend = "memory"
        "#,
    );
    let settings = cfg.settings().unwrap();
    assert_eq!(settings.retrieval.rrf_k, 30);
    assert_eq!(settings.retrieval.default_top_k, 5, "untouched keys keep defaults");
    assert!(settings.rerank.is_configured());
    assert_eq!(settings.cache.ttl_seconds, 60);
    assert_eq!(settings.cache.backend, CacheBackendKind::Memory);

    let k: u32 = cfg.get("retrieval.rrf_k").unwrap();
    assert_eq!(k, 30);
}

#[test]
fn validate_rejects_zero_rrf_constant() {
    let err = Config::from_toml_str("[retrieval]\nrrf_k = 0\n").settings().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn validate_rejects_zero_timeouts_and_shared_collections() {
    let mut settings = Settings::default();
    settings.rerank.timeout_ms = 0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.storage.image_collection = settings.storage.text_collection.clone();
    assert!(settings.validate().is_err());
}

#[tokio::test]
async fn file_store_finds_original_upload() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("doc-1")).unwrap();
    fs::write(tmp.path().join("doc-1").join("manual.pdf"), b"%PDF").unwrap();
    fs::create_dir_all(tmp.path().join("doc-empty")).unwrap();

    let store = LocalFileStore::new(tmp.path());
    assert!(store.file_exists("doc-1").await);
    assert!(!store.file_exists("doc-empty").await);
    assert!(!store.file_exists("missing").await);
    assert!(!store.file_exists("..").await);
    assert!(!store.file_exists("doc-1/../doc-1").await);
}

#[tokio::test]
async fn with_timeout_maps_expiry() {
    let res: kbsearch_core::Result<()> = with_timeout("vector search", Duration::from_millis(10), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    })
    .await;
    match res {
        Err(Error::Timeout { stage, millis }) => {
            assert_eq!(stage, "vector search");
            assert_eq!(millis, 10);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[test]
fn sqlite_cache_requires_a_path() {
    let err = Config::from_toml_str("[cache]\nbackend = \"sqlite\"\npath = \"\"\n").settings().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert!(Config::from_toml_str("[cache]\nbackend = \"memory\"\npath = \"\"\n").settings().is_ok());
}
