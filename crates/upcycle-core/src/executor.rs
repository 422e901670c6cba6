//! Flow execution engine.
//!
//! One invocation runs validate → render → invoke → validate reply, and stops at
//! the first failure. The executor holds no per-invocation state, so a single
//! instance can serve any number of concurrent invocations.

use crate::error::{FlowError, InvocationResult};
use crate::flow::FlowDefinition;
use crate::schema::FromRecord;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info_span, warn};
use upcycle_abstraction::{Model, ModelError, ModelParameters, ResponseFormat};

/// Runs flows against an injected model.
#[derive(Clone)]
pub struct FlowExecutor {
    model: Arc<dyn Model>,
    parameters: ModelParameters,
}

impl FlowExecutor {
    /// Creates an executor that leaves sampling parameters to the model's defaults.
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            parameters: ModelParameters {
                temperature: None,
                top_p: None,
                max_tokens: None,
                stop_sequences: None,
                response_format: None,
            },
        }
    }

    /// Sets the sampling parameters sent with every call.
    ///
    /// `response_format` is always replaced by the flow's output schema.
    #[must_use]
    pub fn with_parameters(mut self, parameters: ModelParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// ID of the underlying model.
    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Runs `flow` on untyped input.
    pub async fn run<O: FromRecord>(
        &self,
        flow: &FlowDefinition<O>,
        input: &Value,
    ) -> InvocationResult<O> {
        let span = info_span!("flow", flow = flow.name(), model = self.model.model_id());
        self.execute(flow, input).instrument(span).await
    }

    /// Runs `flow` on a typed input, serialized to its wire shape first.
    pub async fn run_typed<I: Serialize + Sync, O: FromRecord>(
        &self,
        flow: &FlowDefinition<O>,
        input: &I,
    ) -> InvocationResult<O> {
        let value = serde_json::to_value(input).map_err(|e| {
            warn!(flow = flow.name(), error = %e, "Input could not be serialized");
            FlowError::invalid_input(flow.name(), format!("input could not be serialized: {}", e))
        })?;
        self.run(flow, &value).await
    }

    async fn execute<O: FromRecord>(
        &self,
        flow: &FlowDefinition<O>,
        input: &Value,
    ) -> InvocationResult<O> {
        let name = flow.name();

        debug!("Validating input");
        let record = flow.input_schema().validate(input).map_err(|e| {
            warn!(error = %e, "Input rejected");
            FlowError::invalid_input(name, e.to_string())
        })?;

        debug!("Rendering prompt");
        let payload = flow.render(&record).map_err(|e| {
            warn!(error = %e, "Prompt rendering failed");
            FlowError::invalid_input(name, e.to_string())
        })?;

        let parameters = ModelParameters {
            response_format: Some(ResponseFormat::JsonSchema(
                flow.output_schema().to_json_schema().to_string(),
            )),
            ..self.parameters.clone()
        };

        debug!(parts = payload.parts().len(), "Invoking model");
        let message = payload.into_message();
        let response = self
            .model
            .generate_chat_completion(std::slice::from_ref(&message), Some(parameters))
            .await
            .map_err(|e| classify_model_error(name, &e))?;

        debug!(reply_len = response.content.len(), "Validating reply");
        let reply = extract_json(&response.content).map_err(|e| {
            warn!(error = %e, reply = %response.content, "Reply is not JSON");
            FlowError::schema_violation(name, format!("reply is not valid JSON: {}", e))
        })?;

        let output = flow
            .output_schema()
            .validate(&reply)
            .and_then(|record| O::from_record(&record))
            .map_err(|e| {
                warn!(error = %e, reply = %response.content, "Reply breaks the output contract");
                FlowError::schema_violation(name, e.to_string())
            })?;

        debug!("Flow succeeded");
        Ok(output)
    }
}

impl std::fmt::Debug for FlowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowExecutor")
            .field("model", &self.model.model_id())
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Maps a model error to a flow error. The raw error goes to the log only.
fn classify_model_error(flow: &str, err: &ModelError) -> FlowError {
    match err {
        ModelError::UnsupportedContentType { .. } | ModelError::InvalidMediaSource { .. } => {
            warn!(error = %err, "Model rejected the prompt content");
            FlowError::invalid_input(flow, "the supplied media cannot be sent to the model")
        }
        ModelError::UnusableResponse(_) => {
            warn!(error = %err, "Model answered without a usable reply");
            FlowError::schema_violation(flow, "the model reply holds no usable content")
        }
        _ => {
            error!(error = %err, "Model call failed");
            let cause = match err {
                ModelError::Timeout(_) => "the model did not answer in time",
                ModelError::QuotaExceeded { .. } => "the model service is rate limited",
                ModelError::UnsupportedModelProvider(_) => "the model service is not configured",
                _ => "the model service could not be reached",
            };
            FlowError::upstream_unavailable(flow, cause)
        }
    }
}

/// Parses the reply text as JSON, tolerating a surrounding Markdown code fence.
fn extract_json(reply: &str) -> Result<Value, serde_json::Error> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, strip_info_string);
    serde_json::from_str(body.trim())
}

/// Drops the info string (`json` in ```` ```json ````) from fenced code.
fn strip_info_string(fenced: &str) -> &str {
    if let Some((_, code)) = fenced.split_once('\n') {
        return code;
    }
    // Single-line fence: the info string runs up to the first JSON delimiter.
    fenced.find(['{', '[']).map_or(fenced, |start| &fenced[start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_json() {
        assert_eq!(extract_json(r#" {"a": 1} "#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_extract_fenced_json() {
        let reply = "```json\n{\"material\": \"Denim\"}\n```";
        assert_eq!(extract_json(reply).unwrap(), json!({"material": "Denim"}));

        let reply = "```\n[1, 2]\n```";
        assert_eq!(extract_json(reply).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_extract_single_line_fence() {
        let reply = r#"```json {"material":"Denim"}```"#;
        assert_eq!(extract_json(reply).unwrap(), json!({"material": "Denim"}));

        let reply = "```[1, 2]```";
        assert_eq!(extract_json(reply).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_extract_rejects_prose() {
        assert!(extract_json("The material is denim.").is_err());
    }

    #[test]
    fn test_classify_model_errors() {
        use crate::error::FlowErrorKind;

        let timeout = classify_model_error("f", &ModelError::Timeout("30s elapsed".to_string()));
        assert_eq!(timeout.kind, FlowErrorKind::UpstreamUnavailable);
        assert!(!timeout.message.contains("30s elapsed"));

        let http = classify_model_error(
            "f",
            &ModelError::ModelResponseError("API error (500): secret stack".to_string()),
        );
        assert_eq!(http.kind, FlowErrorKind::UpstreamUnavailable);
        assert!(!http.message.contains("secret"));

        let media = classify_model_error(
            "f",
            &ModelError::UnsupportedContentType {
                content_type: "image (URL)".to_string(),
                model: "gemini".to_string(),
            },
        );
        assert_eq!(media.kind, FlowErrorKind::InvalidInput);

        let blocked = classify_model_error(
            "f",
            &ModelError::UnusableResponse("No text content (finish reason: SAFETY)".to_string()),
        );
        assert_eq!(blocked.kind, FlowErrorKind::SchemaViolation);
        assert!(!blocked.is_retryable());
        assert!(!blocked.message.contains("SAFETY"));
    }
}
