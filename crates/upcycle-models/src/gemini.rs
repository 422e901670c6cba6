//! Google Gemini model implementation.
//!
//! This module provides an implementation of the `Model` trait for Google's Gemini API.
//! Images travel as inline base64 parts; a `ResponseFormat::JsonSchema` request is
//! forwarded as Gemini's `responseSchema` so the reply is constrained server-side too.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, error};
use upcycle_abstraction::{
    ChatMessage, ContentBlock, ImageSource, MessageContent, Model, ModelError, ModelParameters,
    ModelResponse, ModelUsage, ResponseFormat,
};

/// Default endpoint of the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini model implementation.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    /// The model ID (e.g., "gemini-2.0-flash").
    model_id: String,
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the Gemini API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl GeminiModel {
    /// Creates a new `GeminiModel` with the given model ID.
    ///
    /// The API key is read from `GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`.
    ///
    /// # Errors
    /// Returns a `ModelError` if neither environment variable is set.
    pub fn new(model_id: String) -> Result<Self, ModelError> {
        let api_key = env::var("GEMINI_API_KEY").or_else(|_| env::var("GOOGLE_API_KEY")).map_err(
            |_| {
                ModelError::UnsupportedModelProvider(
                    "GEMINI_API_KEY environment variable not set".to_string(),
                )
            },
        )?;

        Ok(Self::with_api_key(model_id, api_key))
    }

    /// Creates a new `GeminiModel` with a custom API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self { model_id, api_key, base_url: DEFAULT_BASE_URL.to_string(), client: Client::new() }
    }

    /// Points the model at a different endpoint (proxies, test servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Applies a per-request timeout to every call.
    ///
    /// # Errors
    /// Returns a `ModelError` if the HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ModelError> {
        self.client = Client::builder().timeout(timeout).build().map_err(|e| {
            ModelError::Other(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(self)
    }

    /// Converts our ChatMessage role to Gemini API role format.
    ///
    /// System messages are filtered out before this is called; they travel
    /// in the `systemInstruction` field instead.
    fn role_to_gemini(role: &str) -> String {
        match role {
            "assistant" => "model".to_string(),
            _ => role.to_string(),
        }
    }

    /// Extracts system messages from the chat history and concatenates them.
    ///
    /// Multiple system messages are joined with "\n\n".
    fn extract_system_messages(messages: &[ChatMessage]) -> Option<String> {
        let system_messages: Vec<String> = messages
            .iter()
            .filter(|msg| msg.role == "system")
            .map(|msg| msg.content.text())
            .collect();

        if system_messages.is_empty() { None } else { Some(system_messages.join("\n\n")) }
    }

    /// Converts a ContentBlock to Gemini's part format.
    fn content_block_to_gemini_part(block: &ContentBlock) -> Result<GeminiPart, ModelError> {
        match block {
            ContentBlock::Text { text } => Ok(GeminiPart::Text { text: text.clone() }),
            ContentBlock::Image { source, media_type } => match source {
                ImageSource::Base64 { data } => Ok(GeminiPart::InlineData {
                    inline_data: GeminiInlineData {
                        mime_type: media_type.clone(),
                        data: data.clone(),
                    },
                }),
                ImageSource::Url { .. } => Err(ModelError::UnsupportedContentType {
                    content_type: "image (URL)".to_string(),
                    model: "gemini".to_string(),
                }),
            },
        }
    }

    /// Converts our ChatMessage to Gemini format.
    fn to_gemini_content(msg: &ChatMessage) -> Result<GeminiContent, ModelError> {
        let role = Self::role_to_gemini(&msg.role);

        let parts = match &msg.content {
            MessageContent::Text(text) => vec![GeminiPart::Text { text: text.clone() }],
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .map(Self::content_block_to_gemini_part)
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(GeminiContent { role: Some(role), parts })
    }

    /// Builds the generation config from the caller's parameters.
    fn generation_config(params: ModelParameters) -> Result<GeminiGenerationConfig, ModelError> {
        let (mime_type, schema) = match &params.response_format {
            Some(ResponseFormat::Json) => (Some("application/json".to_string()), None),
            Some(ResponseFormat::JsonSchema(schema_str)) => {
                let parsed = serde_json::from_str::<serde_json::Value>(schema_str).map_err(|e| {
                    error!(error = %e, schema = schema_str, "Invalid JSON schema in response_format");
                    ModelError::SerializationError(format!("Invalid JSON schema: {}", e))
                })?;
                (Some("application/json".to_string()), Some(parsed))
            }
            Some(ResponseFormat::Text) | None => (None, None),
        };

        Ok(GeminiGenerationConfig {
            temperature: params.temperature,
            top_p: params.top_p,
            max_output_tokens: params.max_tokens,
            stop_sequences: params.stop_sequences,
            response_mime_type: mime_type,
            response_schema: schema,
        })
    }

    /// Builds the full request body for `generateContent`.
    fn build_request(
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<GeminiRequest, ModelError> {
        let system_instruction = Self::extract_system_messages(messages);

        let contents = messages
            .iter()
            .filter(|msg| msg.role != "system")
            .map(Self::to_gemini_content)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GeminiRequest {
            contents,
            generation_config: parameters.map(Self::generation_config).transpose()?,
            system_instruction: system_instruction.map(|text| GeminiSystemInstruction {
                parts: vec![GeminiPart::Text { text }],
            }),
        })
    }

    /// Maps a non-success HTTP status to a `ModelError`.
    fn status_error(status: reqwest::StatusCode, error_text: String) -> ModelError {
        match status.as_u16() {
            402 | 429 => {
                ModelError::QuotaExceeded { provider: "gemini".to_string(), message: Some(error_text) }
            }
            401 | 403 => ModelError::UnsupportedModelProvider(format!(
                "Authentication failed ({}): {}",
                status, error_text
            )),
            _ => ModelError::ModelResponseError(format!("API error ({}): {}", status, error_text)),
        }
    }
}

#[async_trait]
impl Model for GeminiModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            prompt_len = prompt.len(),
            parameters = ?parameters,
            "GeminiModel generating text"
        );

        let messages = vec![ChatMessage::user(MessageContent::Text(prompt.to_string()))];
        self.generate_chat_completion(&messages, parameters).await
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            parameters = ?parameters,
            "GeminiModel generating chat completion"
        );

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model_id);
        let request_body = Self::build_request(messages, parameters)?;

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to Gemini API");
                if e.is_timeout() {
                    ModelError::Timeout(format!("Gemini request timed out: {}", e))
                } else {
                    ModelError::RequestError(format!("Network error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                "Gemini API returned error status"
            );
            return Err(Self::status_error(status, error_text));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Gemini API response");
            if e.is_timeout() {
                ModelError::Timeout(format!("Gemini response timed out: {}", e))
            } else {
                ModelError::UnusableResponse(format!("Failed to parse response: {}", e))
            }
        })?;

        let candidate = gemini_response.candidates.first().ok_or_else(|| {
            error!("No candidates in Gemini API response");
            ModelError::UnusableResponse("No candidates in API response".to_string())
        })?;

        let content: String = candidate
            .content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| match p {
                GeminiPart::Text { text } => Some(text.as_str()),
                GeminiPart::InlineData { .. } | GeminiPart::Other(_) => None,
            })
            .collect();

        if content.is_empty() {
            error!(finish_reason = ?candidate.finish_reason, "No text content in Gemini API response");
            return Err(ModelError::UnusableResponse(format!(
                "No text content in API response (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let usage = gemini_response.usage_metadata.map(|meta| ModelUsage {
            prompt_tokens: meta.prompt_token_count.unwrap_or(0),
            completion_tokens: meta.candidates_token_count.unwrap_or(0),
            total_tokens: meta.total_token_count.unwrap_or(0),
        });

        Ok(ModelResponse { content, model_id: Some(self.model_id.clone()), usage })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: GeminiInlineData,
    },
    // Function calls, thoughts and other part kinds are not used by this crate.
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_field_names)] // Matches API naming
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_text(text: &str) -> ChatMessage {
        ChatMessage::user(MessageContent::Text(text.to_string()))
    }

    #[test]
    fn test_role_conversion() {
        assert_eq!(GeminiModel::role_to_gemini("user"), "user");
        assert_eq!(GeminiModel::role_to_gemini("assistant"), "model");
    }

    #[test]
    fn test_extract_system_messages() {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: MessageContent::Text("First instruction.".to_string()),
            },
            ChatMessage {
                role: "system".to_string(),
                content: MessageContent::Text("Second instruction.".to_string()),
            },
            user_text("Hello"),
        ];
        let system = GeminiModel::extract_system_messages(&messages);
        assert_eq!(system, Some("First instruction.\n\nSecond instruction.".to_string()));

        let system = GeminiModel::extract_system_messages(&[user_text("Hello")]);
        assert_eq!(system, None);
    }

    #[test]
    fn test_image_block_becomes_inline_data() {
        let message = ChatMessage::user(MessageContent::Blocks(vec![
            ContentBlock::Text { text: "Photo:".to_string() },
            ContentBlock::Image {
                source: ImageSource::Base64 { data: "AAAA".to_string() },
                media_type: "image/png".to_string(),
            },
        ]));

        let request = GeminiModel::build_request(&[message], None).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Photo:");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "AAAA");
        assert!(json.get("generationConfig").is_none());
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_url_images_are_rejected() {
        let message = ChatMessage::user(MessageContent::Blocks(vec![ContentBlock::Image {
            source: ImageSource::Url { url: "https://example.com/a.png".to_string() },
            media_type: "image/png".to_string(),
        }]));

        let result = GeminiModel::build_request(&[message], None);
        assert!(matches!(result, Err(ModelError::UnsupportedContentType { .. })));
    }

    #[test]
    fn test_json_schema_becomes_response_schema() {
        let params = ModelParameters {
            temperature: Some(0.2),
            top_p: None,
            max_tokens: None,
            stop_sequences: None,
            response_format: Some(ResponseFormat::JsonSchema(
                r#"{"type":"object","properties":{"material":{"type":"string"}}}"#.to_string(),
            )),
        };

        let request = GeminiModel::build_request(&[user_text("Hi")], Some(params)).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        let config = &json["generationConfig"];

        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["properties"]["material"]["type"], "string");
        assert!(config.get("topP").is_none());
    }

    #[test]
    fn test_invalid_schema_is_serialization_error() {
        let params = ModelParameters {
            response_format: Some(ResponseFormat::JsonSchema("{not json".to_string())),
            ..ModelParameters::default()
        };

        let result = GeminiModel::build_request(&[user_text("Hi")], Some(params));
        assert!(matches!(result, Err(ModelError::SerializationError(_))));
    }

    #[test]
    fn test_status_error_mapping() {
        use reqwest::StatusCode;

        assert!(matches!(
            GeminiModel::status_error(StatusCode::TOO_MANY_REQUESTS, "slow down".to_string()),
            ModelError::QuotaExceeded { .. }
        ));
        assert!(matches!(
            GeminiModel::status_error(StatusCode::FORBIDDEN, "bad key".to_string()),
            ModelError::UnsupportedModelProvider(_)
        ));
        assert!(matches!(
            GeminiModel::status_error(StatusCode::BAD_GATEWAY, "oops".to_string()),
            ModelError::ModelResponseError(_)
        ));
    }

    #[test]
    fn test_response_parts_tolerate_unknown_kinds() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"thought": true}, {"text": "{\"a\":1}"}]},
                "finishReason": "STOP"
            }]
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        let parts = &parsed.candidates[0].content.as_ref().unwrap().parts;
        assert!(matches!(parts[0], GeminiPart::Other(_)));
        assert!(matches!(parts[1], GeminiPart::Text { .. }));
    }

    #[test]
    fn test_gemini_model_creation_with_api_key() {
        let model = GeminiModel::with_api_key("gemini-2.0-flash".to_string(), "test-key".to_string())
            .with_base_url("http://localhost:1234/");
        assert_eq!(model.model_id(), "gemini-2.0-flash");
        assert_eq!(model.base_url, "http://localhost:1234");
    }
}
