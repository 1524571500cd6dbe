use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

use kbsearch_core::config::{EmbeddingEndpoint, EmbeddingSettings};
use kbsearch_core::traits::{ImageEmbedder, TextEmbedder};
use kbsearch_core::types::ImageInput;
use kbsearch_core::Error;
use kbsearch_embed::{image_embedder, text_embedder, JinaClipEmbedder, OpenAiTextEmbedder};

fn endpoint(server: &MockServer, dim: usize) -> EmbeddingEndpoint {
    EmbeddingEndpoint {
        endpoint: server.url("/v1/embeddings"),
        model: "test-model".to_string(),
        dim,
        api_key: String::new(),
    }
}

#[tokio::test]
async fn openai_results_are_reordered_by_index() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings").header("authorization", "Bearer sk-test");
            then.status(200).json_body(json!({
                "data": [
                    { "index": 1, "embedding": [0.0, 1.0, 0.0] },
                    { "index": 0, "embedding": [1.0, 0.0, 0.0] }
                ]
            }));
        })
        .await;

    let embedder =
        OpenAiTextEmbedder::new(&endpoint(&server, 3), "sk-test".into(), Duration::from_secs(5)).unwrap();
    let out = embedder
        .embed_texts(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();
    assert_eq!(out, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn openai_empty_batch_makes_no_request() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(500);
        })
        .await;
    let embedder = OpenAiTextEmbedder::new(&endpoint(&server, 3), "k".into(), Duration::from_secs(5)).unwrap();
    assert!(embedder.embed_texts(&[]).await.unwrap().is_empty());
    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn wrong_dimension_is_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200).json_body(json!({ "data": [ { "index": 0, "embedding": [1.0, 0.0] } ] }));
        })
        .await;
    let embedder = OpenAiTextEmbedder::new(&endpoint(&server, 3), "k".into(), Duration::from_secs(5)).unwrap();
    let err = embedder.embed_text("x").await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2, .. }));
}

#[tokio::test]
async fn http_error_status_maps_to_embedding_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(401).body("bad key");
        })
        .await;
    let embedder = JinaClipEmbedder::new(&endpoint(&server, 2), "k".into(), Duration::from_secs(5)).unwrap();
    let err = embedder.embed_query_text("bogie").await.unwrap_err();
    match err {
        Error::Embedding(msg) => assert!(msg.contains("401")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn jina_embeds_images_and_text() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200).json_body(json!({ "data": [ { "index": 0, "embedding": [0.6, 0.8] } ] }));
        })
        .await;
    let embedder = JinaClipEmbedder::new(&endpoint(&server, 2), "k".into(), Duration::from_secs(5)).unwrap();
    let v = embedder.embed_image(&ImageInput::Bytes(vec![1, 2, 3])).await.unwrap();
    assert_eq!(v, vec![0.6, 0.8]);
    let v = embedder.embed_query_text("pantograph").await.unwrap();
    assert_eq!(v, vec![0.6, 0.8]);
    assert_eq!(mock.hits_async().await, 2);
}

#[tokio::test]
async fn fake_setting_selects_hash_embedder() {
    let mut settings = EmbeddingSettings::default();
    settings.use_fake = true;
    settings.text.dim = 32;
    settings.image.dim = 16;
    let text = text_embedder(&settings, Duration::from_secs(1)).unwrap();
    let image = image_embedder(&settings, Duration::from_secs(1)).unwrap();
    assert_eq!(text.dim(), 32);
    assert_eq!(image.dim(), 16);
    assert_eq!(text.embed_text("brake").await.unwrap().len(), 32);
}
