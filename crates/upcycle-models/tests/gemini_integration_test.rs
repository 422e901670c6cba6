//! Integration tests for the Gemini provider against a local mock server.

use mockito::Matcher;
use serde_json::json;
use upcycle_abstraction::{
    ChatMessage, ContentBlock, ImageSource, MessageContent, Model, ModelError, ModelParameters,
    ResponseFormat,
};
use upcycle_models::GeminiModel;

const PATH: &str = "/models/gemini-test:generateContent";

fn model_for(server: &mockito::ServerGuard) -> GeminiModel {
    GeminiModel::with_api_key("gemini-test".to_string(), "test-key".to_string())
        .with_base_url(server.url())
}

fn text_reply(text: &str) -> String {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 8, "totalTokenCount": 20}
    })
    .to_string()
}

#[tokio::test]
async fn test_generate_text_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(text_reply(r#"{"material":"Denim"}"#))
        .create_async()
        .await;

    let response = model_for(&server).generate_text("What is this?", None).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.content, r#"{"material":"Denim"}"#);
    assert_eq!(response.model_id.as_deref(), Some("gemini-test"));
    let usage = response.usage.unwrap();
    assert_eq!(usage.total_tokens, 20);
}

#[tokio::test]
async fn test_multimodal_request_carries_inline_image_and_schema() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": "Photo: "},
                    {"inlineData": {"mimeType": "image/png", "data": "AAAA"}}
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {"type": "object"}
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(text_reply(r#"{"material":"Glass"}"#))
        .create_async()
        .await;

    let message = ChatMessage::user(MessageContent::Blocks(vec![
        ContentBlock::Text { text: "Photo: ".to_string() },
        ContentBlock::Image {
            source: ImageSource::Base64 { data: "AAAA".to_string() },
            media_type: "image/png".to_string(),
        },
    ]));
    let params = ModelParameters {
        response_format: Some(ResponseFormat::JsonSchema(r#"{"type":"object"}"#.to_string())),
        ..ModelParameters::default()
    };

    let response =
        model_for(&server).generate_chat_completion(&[message], Some(params)).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.content, r#"{"material":"Glass"}"#);
}

#[tokio::test]
async fn test_split_text_parts_are_joined() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "{\"material\":"}, {"text": "\"Wood\"}"}]}
        }]
    });
    server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let response = model_for(&server).generate_text("x", None).await.unwrap();
    assert_eq!(response.content, r#"{"material":"Wood"}"#);
}

#[tokio::test]
async fn test_rate_limit_maps_to_quota_exceeded() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body(r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#)
        .create_async()
        .await;

    let result = model_for(&server).generate_text("x", None).await;
    match result {
        Err(ModelError::QuotaExceeded { provider, message }) => {
            assert_eq!(provider, "gemini");
            assert!(message.unwrap().contains("RESOURCE_EXHAUSTED"));
        }
        other => panic!("Expected QuotaExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_maps_to_model_response_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;

    let result = model_for(&server).generate_text("x", None).await;
    assert!(matches!(result, Err(ModelError::ModelResponseError(msg)) if msg.contains("503")));
}

#[tokio::test]
async fn test_empty_candidates_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates": [], "promptFeedback": {"blockReason": "SAFETY"}}"#)
        .create_async()
        .await;

    let result = model_for(&server).generate_text("x", None).await;
    assert!(matches!(result, Err(ModelError::UnusableResponse(_))));
}

#[tokio::test]
async fn test_safety_blocked_candidate_is_unusable_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]}"#)
        .create_async()
        .await;

    let result = model_for(&server).generate_text("x", None).await;
    assert!(matches!(result, Err(ModelError::UnusableResponse(msg)) if msg.contains("SAFETY")));
}

#[tokio::test]
async fn test_malformed_envelope_is_unusable_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("<html>proxy error</html>")
        .create_async()
        .await;

    let result = model_for(&server).generate_text("x", None).await;
    assert!(matches!(result, Err(ModelError::UnusableResponse(_))));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_request_error() {
    // Port 9 (discard) is not expected to accept HTTP connections.
    let model = GeminiModel::with_api_key("gemini-test".to_string(), "k".to_string())
        .with_base_url("http://127.0.0.1:9");

    let result = model.generate_text("x", None).await;
    assert!(matches!(result, Err(ModelError::RequestError(_) | ModelError::Timeout(_))));
}
