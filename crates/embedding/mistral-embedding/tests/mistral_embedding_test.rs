//! Integration tests for the Mistral embedding service.
//!
//! These tests exercise [`mistral_embedding::MistralEmbedding`] over HTTP against a local
//! mockito server standing in for `POST /v1/embeddings`. The test that calls the real
//! Mistral API is marked with `#[ignore]` and requires `MISTRALAI_API_KEY`.
//!
//! # Running tests
//!
//! - **Default (no API):** `cargo test -p mistral-embedding`
//! - **With API:** `cargo test -p mistral-embedding -- --ignored`; set `MISTRALAI_API_KEY`
//!   (e.g. in repo root `.env`).

use std::path::Path;
use std::time::Duration;

use embedding::{EmbeddingService, EnvEmbeddingConfig};
use mistral_embedding::{MistralEmbedding, MistralEmbeddingError, RetryPolicy};
use mockito::Matcher;
use serde_json::json;

const TEST_API_KEY: &str = "test-mistral-key";

/// Loads `.env` from the workspace root so `MISTRALAI_API_KEY` is available in ignored tests.
/// Path: `crates/embedding/mistral-embedding` → `../../../.env` = repo root.
fn load_root_env() {
    let root_env = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../.env");
    let _ = dotenvy::from_path(root_env);
}

/// Service pointed at the mock server, with millisecond backoff so retry tests stay fast.
fn service_for(server: &mockito::ServerGuard) -> MistralEmbedding {
    MistralEmbedding::builder()
        .api_key(TEST_API_KEY)
        .base_url(server.url())
        .retry_policy(RetryPolicy::new(3, Duration::from_millis(5)))
        .build()
        .expect("build MistralEmbedding")
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// **Test: Batch embedding over HTTP.**
///
/// **Setup:** Mock answers with two entries listed out of order.
///
/// **Expected:** One request carrying the bearer key, model and inputs; vectors come back in input order.
#[tokio::test]
async fn test_embed_batch_over_http() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/embeddings")
        .match_header("authorization", format!("Bearer {}", TEST_API_KEY).as_str())
        .match_body(Matcher::PartialJson(json!({
            "model": "mistral-embed",
            "input": ["Hello", "World"],
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
            "id": "embd-1",
            "object": "list",
            "model": "mistral-embed",
            "data": [
                {"object": "embedding", "embedding": [0.4, 0.5, 0.6], "index": 1},
                {"object": "embedding", "embedding": [0.1, 0.2, 0.3], "index": 0}
            ],
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }"#,
        )
        .expect(1)
        .create_async()
        .await;

    let service = service_for(&server);
    let embeddings = service.embed_batch(&texts(&["Hello", "World"])).await.unwrap();

    assert_eq!(embeddings, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
    mock.assert_async().await;
}

/// **Test: Rejected key is not retried.**
///
/// **Expected:** A 401 yields `ProviderCall` after exactly one request.
#[tokio::test]
async fn test_unauthorized_fails_without_retry() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/embeddings")
        .with_status(401)
        .with_body(r#"{"message": "Unauthorized"}"#)
        .expect(1)
        .create_async()
        .await;

    let service = service_for(&server);
    let err = service.embed_documents(&texts(&["Hello"])).await.unwrap_err();

    assert!(matches!(err, MistralEmbeddingError::ProviderCall(_)), "got {:?}", err);
    assert!(err.to_string().contains("401"));
    mock.assert_async().await;
}

/// **Test: Server errors are retried until attempts run out.**
///
/// **Expected:** Three requests, then `EmptyResponse` carrying the last error text.
#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/embeddings")
        .with_status(503)
        .with_body("upstream overloaded")
        .expect(3)
        .create_async()
        .await;

    let service = service_for(&server);
    let err = service.embed_documents(&texts(&["Hello"])).await.unwrap_err();

    match &err {
        MistralEmbeddingError::EmptyResponse(message) => {
            assert!(message.contains("503"), "message: {}", message);
            assert!(message.contains("upstream overloaded"), "message: {}", message);
        }
        other => panic!("expected EmptyResponse, got {:?}", other),
    }
    mock.assert_async().await;
}

/// **Test: Rate limiting is retried.**
///
/// **Expected:** Every attempt hits the endpoint; the 429 text reaches `EmptyResponse`.
#[tokio::test]
async fn test_rate_limit_is_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/embeddings")
        .with_status(429)
        .with_body(r#"{"message": "Requests rate limit exceeded"}"#)
        .expect(3)
        .create_async()
        .await;

    let service = service_for(&server);
    let err = service.embed_documents(&texts(&["Hello"])).await.unwrap_err();

    assert!(err.to_string().contains("rate limit exceeded"), "got {}", err);
    mock.assert_async().await;
}

/// **Test: Undecodable body counts as a transient failure.**
///
/// **Expected:** Retried three times, then `EmptyResponse`.
#[tokio::test]
async fn test_malformed_body_is_empty_response() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/embeddings")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"unexpected": true}"#)
        .expect(3)
        .create_async()
        .await;

    let service = service_for(&server);
    let err = service.embed_documents(&texts(&["Hello"])).await.unwrap_err();

    assert!(matches!(err, MistralEmbeddingError::EmptyResponse(_)), "got {:?}", err);
    mock.assert_async().await;
}

/// **Test: Service built from the shared env config.**
///
/// **Expected:** Model, threshold, key and base URL from the config are used.
#[tokio::test]
async fn test_from_config() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/embeddings")
        .match_header("authorization", "Bearer config-key")
        .match_body(Matcher::PartialJson(json!({"model": "mistral-embed-custom"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": [{"embedding": [0.25], "index": 0}]}"#)
        .expect(1)
        .create_async()
        .await;

    let config = EnvEmbeddingConfig {
        embedding_provider: "mistral".to_string(),
        embedding_model: Some("mistral-embed-custom".to_string()),
        mistral_api_key: Some("config-key".to_string()),
        mistral_base_url: Some(server.url()),
        score_threshold: 0.7,
    };
    let service = MistralEmbedding::from_config(&config).unwrap();

    assert_eq!(service.score_threshold(), 0.7);
    assert_eq!(service.embed("Hello").await.unwrap(), vec![0.25]);
    mock.assert_async().await;
}

/// **Test: Real API embedding.**
///
/// **Note:** Ignored by default; run with `cargo test -p mistral-embedding -- --ignored`.
#[tokio::test]
#[ignore] // Requires API key, run with: cargo test -p mistral-embedding -- --ignored
async fn test_mistral_embedding_live() {
    load_root_env();
    let api_key = std::env::var("MISTRALAI_API_KEY")
        .expect("MISTRALAI_API_KEY environment variable must be set for this test (or set in root .env)");

    let service = MistralEmbedding::new(None, Some(api_key), None).unwrap();
    let embeddings = service
        .embed_batch(&texts(&["Hello", "World", "Goodbye"]))
        .await
        .unwrap();

    assert_eq!(embeddings.len(), 3);
    for embedding in embeddings {
        assert_eq!(embedding.len(), 1024); // mistral-embed produces 1024 dimensions
    }
}
