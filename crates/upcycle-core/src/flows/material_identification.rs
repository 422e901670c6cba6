//! Material identification: photo plus optional description in, material label out.

use crate::error::InvocationResult;
use crate::executor::FlowExecutor;
use crate::flow::FlowDefinition;
use crate::media::MediaRef;
use crate::prompt::{PromptError, PromptPayload};
use crate::schema::{
    FieldDescriptor, FieldKind, FromRecord, Presence, Record, Schema, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Flow name used in logs and errors.
pub const FLOW_NAME: &str = "identifyMaterialFlow";

const PHOTO: &str = "photoDataUri";
const DESCRIPTION: &str = "description";
const MATERIAL: &str = "material";
const CONFIDENCE: &str = "confidence";

const INPUT_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::required(
        PHOTO,
        FieldKind::Media,
        "A photo of the item, as a data URI that must include a MIME type and use Base64 encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'.",
    ),
    FieldDescriptor::optional(
        DESCRIPTION,
        FieldKind::Text,
        "The user provided description of the item.",
    ),
];

const OUTPUT_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::required(MATERIAL, FieldKind::Text, "The identified material of the item."),
    FieldDescriptor::optional(
        CONFIDENCE,
        FieldKind::Number,
        "The confidence level of the material identification.",
    ),
];

static FLOW: FlowDefinition<MaterialIdentification> = FlowDefinition::new(
    FLOW_NAME,
    Schema::new("IdentifyMaterialInput", INPUT_FIELDS),
    Schema::new("IdentifyMaterialOutput", OUTPUT_FIELDS),
    render,
);

/// The material identification flow.
pub fn definition() -> &'static FlowDefinition<MaterialIdentification> {
    &FLOW
}

/// Input of [`identify_material`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyMaterialInput {
    /// `data:<mimetype>;base64,<payload>`.
    pub photo_data_uri: String,
    /// Free-text description. `Some("")` is sent as present-but-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Output of [`identify_material`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialIdentification {
    /// The identified material, e.g. "Denim".
    pub material: String,
    /// Model confidence, when it gave one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl FromRecord for MaterialIdentification {
    fn from_record(record: &Record) -> Result<Self, ValidationError> {
        Ok(Self {
            material: record.text(MATERIAL)?.to_string(),
            confidence: record.optional_number(CONFIDENCE)?.value(),
        })
    }
}

fn render(input: &Record) -> Result<PromptPayload, PromptError> {
    let photo = MediaRef::parse_data_uri(input.text(PHOTO)?)
        .map_err(|source| PromptError::InvalidMedia { field: PHOTO, source })?;

    let mut payload = PromptPayload::new();
    payload.push_text(
        "You are an AI assistant that identifies the material of an item from a photo and a description.\n\n\
         Analyze the following photo and description to determine the material of the item.\n\n",
    );
    match input.optional_text(DESCRIPTION)? {
        Presence::Absent => {}
        Presence::Empty => payload.push_text("Description: \n"),
        Presence::Value(description) => payload.push_text(format!("Description: {description}\n")),
    }
    payload.push_text("Photo: ");
    payload.push_media(photo);
    Ok(payload)
}

/// Identifies the material of the pictured item.
pub async fn identify_material(
    executor: &FlowExecutor,
    input: &IdentifyMaterialInput,
) -> InvocationResult<MaterialIdentification> {
    executor.run_typed(definition(), input).await
}
