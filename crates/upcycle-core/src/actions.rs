//! Request handlers for form-style callers.
//!
//! Handlers take untyped fields, run a flow, and answer with a small state
//! object holding either the result or a message fit for end users. Detailed
//! causes go to the log.

use crate::error::{FlowError, FlowErrorKind, InvocationResult};
use crate::executor::FlowExecutor;
use crate::flows::upcycling_ideas::{self, SuggestUpcyclingIdeasInput};
use crate::flows::{MaterialIdentification, material_identification};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

const INVALID_INPUT: &str = "Invalid input.";
const IDENTIFY_FAILED: &str = "Failed to identify material. Please try again.";
const MATERIAL_REQUIRED: &str = "Material description is required.";
const IDEAS_FAILED: &str = "Failed to generate ideas. Please try again.";

/// Caller-side limits applied around a whole invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionOptions {
    /// Give up after this long. A reply arriving later is dropped.
    pub deadline: Option<Duration>,
}

/// Outcome of [`identify_material_action`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyMaterialState {
    /// The identification, on success.
    pub result: Option<MaterialIdentification>,
    /// A user-facing message, on failure.
    pub error: Option<String>,
}

/// Outcome of [`get_upcycling_ideas_action`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcyclingIdeasState {
    /// The ideas; empty on failure.
    pub ideas: Vec<String>,
    /// A user-facing message, on failure.
    pub error: Option<String>,
}

/// Runs `invocation` under the optional deadline.
///
/// An expired deadline is reported as `UpstreamUnavailable`; the invocation
/// future is dropped, so its reply is never observed.
pub async fn with_deadline<T>(
    flow: &str,
    options: ActionOptions,
    invocation: impl Future<Output = InvocationResult<T>>,
) -> InvocationResult<T> {
    let Some(deadline) = options.deadline else {
        return invocation.await;
    };
    tokio::time::timeout(deadline, invocation).await.unwrap_or_else(|_| {
        warn!(flow, deadline_ms = deadline.as_millis() as u64, "Flow deadline expired");
        Err(FlowError::upstream_unavailable(flow, "the model did not answer before the deadline"))
    })
}

/// Identifies the material in an uploaded photo.
///
/// Reads `photoDataUri` and `description` from `form`; a missing key is an
/// absent field, an empty value is a present-but-empty one.
pub async fn identify_material_action(
    executor: &FlowExecutor,
    form: &HashMap<String, String>,
    options: ActionOptions,
) -> IdentifyMaterialState {
    let fields: Map<String, Value> = ["photoDataUri", "description"]
        .into_iter()
        .filter_map(|key| form.get(key).map(|v| (key.to_string(), Value::String(v.clone()))))
        .collect();
    let input = Value::Object(fields);

    let flow = material_identification::definition();
    let invocation = executor.run(flow, &input);
    match with_deadline(flow.name(), options, invocation).await {
        Ok(result) => {
            info!(flow = flow.name(), material = %result.material, "Material identified");
            IdentifyMaterialState { result: Some(result), error: None }
        }
        Err(err) => {
            error!(flow = flow.name(), kind = %err.kind, error = %err, "Material identification failed");
            let message = match err.kind {
                FlowErrorKind::InvalidInput => INVALID_INPUT,
                FlowErrorKind::UpstreamUnavailable | FlowErrorKind::SchemaViolation => IDENTIFY_FAILED,
            };
            IdentifyMaterialState { result: None, error: Some(message.to_string()) }
        }
    }
}

/// Suggests upcycling ideas for a material.
///
/// An empty material is refused without calling the model.
pub async fn get_upcycling_ideas_action(
    executor: &FlowExecutor,
    material: &str,
    customization_request: Option<&str>,
    options: ActionOptions,
) -> UpcyclingIdeasState {
    if material.is_empty() {
        return UpcyclingIdeasState { ideas: Vec::new(), error: Some(MATERIAL_REQUIRED.to_string()) };
    }

    let input = SuggestUpcyclingIdeasInput {
        material_description: material.to_string(),
        customization_request: customization_request.map(str::to_string),
    };
    let invocation = upcycling_ideas::suggest_upcycling_ideas(executor, &input);
    match with_deadline(upcycling_ideas::FLOW_NAME, options, invocation).await {
        Ok(result) => {
            if !result.meets_minimum() {
                warn!(
                    flow = upcycling_ideas::FLOW_NAME,
                    count = result.upcycling_ideas.len(),
                    "Model returned fewer ideas than requested"
                );
            }
            UpcyclingIdeasState { ideas: result.upcycling_ideas, error: None }
        }
        Err(err) => {
            error!(flow = upcycling_ideas::FLOW_NAME, kind = %err.kind, error = %err, "Idea generation failed");
            UpcyclingIdeasState { ideas: Vec::new(), error: Some(IDEAS_FAILED.to_string()) }
        }
    }
}
