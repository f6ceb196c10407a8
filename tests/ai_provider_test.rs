//! Provider HTTP behavior: credential hygiene on error paths and
//! bounded error bodies.

use rss_ai_publisher::ai::{AiProvider, GenerationError, GenerationRequest, GoogleProvider};
use wiremock::matchers::{header, method, path, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "sk-secret-12345";

fn request() -> GenerationRequest {
    GenerationRequest {
        prompt: "Write a blog post.".to_string(),
        temperature: 0.7,
        min_words: 800,
        max_words: 1500,
    }
}

#[tokio::test]
async fn test_transport_error_never_contains_api_key() {
    // Unreachable address: the connection fails and the error renders
    // the full request URL.
    let provider = GoogleProvider::new(reqwest::Client::new(), API_KEY.to_string())
        .with_base_url("http://127.0.0.1:9".to_string());

    let err = provider.generate(&request()).await.unwrap_err();
    assert!(!err.to_string().contains(API_KEY));
    assert!(!format!("{err:?}").contains(API_KEY));
}

#[tokio::test]
async fn test_google_key_sent_via_header_not_url() {
    let server = MockServer::start().await;
    let payload = serde_json::json!({
        "candidates": [{
            "content": {
                "parts": [{ "text": r#"{"title": "T", "html": "<p>B</p>"}"# }],
            },
        }],
    });
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", API_KEY))
        .and(query_param_is_missing("key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleProvider::new(reqwest::Client::new(), API_KEY.to_string())
        .with_base_url(server.uri());

    let article = provider.generate(&request()).await.unwrap();
    assert_eq!(article.title, "T");
}

#[tokio::test]
async fn test_api_error_body_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(2000)))
        .mount(&server)
        .await;

    let provider = GoogleProvider::new(reqwest::Client::new(), API_KEY.to_string())
        .with_base_url(server.uri());

    let err = provider.generate(&request()).await.unwrap_err();
    match err {
        GenerationError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message.chars().count(), 500);
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}
