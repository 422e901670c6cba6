//! Upcycling idea generation: material description in, list of ideas out.

use crate::error::InvocationResult;
use crate::executor::FlowExecutor;
use crate::flow::FlowDefinition;
use crate::prompt::{PromptError, PromptPayload};
use crate::schema::{
    FieldDescriptor, FieldKind, FromRecord, Presence, Record, Schema, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Flow name used in logs and errors.
pub const FLOW_NAME: &str = "suggestUpcyclingIdeasFlow";

/// How many ideas the prompt asks for. Requested, not enforced on the reply.
pub const MIN_IDEAS: usize = 3;

const MATERIAL_DESCRIPTION: &str = "materialDescription";
const CUSTOMIZATION_REQUEST: &str = "customizationRequest";
const UPCYCLING_IDEAS: &str = "upcyclingIdeas";

const INPUT_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::required(
        MATERIAL_DESCRIPTION,
        FieldKind::Text,
        "A description of the material for which upcycling ideas are needed.",
    ),
    FieldDescriptor::optional(
        CUSTOMIZATION_REQUEST,
        FieldKind::Text,
        "A user's specific request for customization.",
    ),
];

const OUTPUT_FIELDS: &[FieldDescriptor] = &[FieldDescriptor::required(
    UPCYCLING_IDEAS,
    FieldKind::TextList,
    "A list of creative upcycling ideas for the material.",
)];

static FLOW: FlowDefinition<UpcyclingIdeas> = FlowDefinition::new(
    FLOW_NAME,
    Schema::new("SuggestUpcyclingIdeasInput", INPUT_FIELDS),
    Schema::new("SuggestUpcyclingIdeasOutput", OUTPUT_FIELDS),
    render,
);

/// The idea generation flow.
pub fn definition() -> &'static FlowDefinition<UpcyclingIdeas> {
    &FLOW
}

/// Input of [`suggest_upcycling_ideas`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestUpcyclingIdeasInput {
    /// What the material is, e.g. "plastic bottles".
    pub material_description: String,
    /// Extra wishes for the ideas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization_request: Option<String>,
}

/// Output of [`suggest_upcycling_ideas`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcyclingIdeas {
    /// Ideas in the order the model gave them. May hold fewer than [`MIN_IDEAS`].
    pub upcycling_ideas: Vec<String>,
}

impl UpcyclingIdeas {
    /// Whether the model delivered as many ideas as it was asked for.
    pub fn meets_minimum(&self) -> bool {
        self.upcycling_ideas.len() >= MIN_IDEAS
    }
}

impl FromRecord for UpcyclingIdeas {
    fn from_record(record: &Record) -> Result<Self, ValidationError> {
        Ok(Self { upcycling_ideas: record.text_list(UPCYCLING_IDEAS)?.to_vec() })
    }
}

fn render(input: &Record) -> Result<PromptPayload, PromptError> {
    let material = input.text(MATERIAL_DESCRIPTION)?;

    let mut payload = PromptPayload::new();
    payload.push_text(format!(
        "You are a creative upcycling expert. Given a description of a waste material, and an optional user request, \
         you will generate a list of creative upcycling ideas. Return at least {MIN_IDEAS} ideas.\n\n\
         Material Description: {material}\n"
    ));
    // An empty request is treated like no request at all.
    if let Presence::Value(request) = input.optional_text(CUSTOMIZATION_REQUEST)? {
        payload.push_text(format!(
            "User's Customization Request: {request}\n\
             Every idea must satisfy this request.\n"
        ));
    }
    Ok(payload)
}

/// Suggests ways to upcycle the described material.
pub async fn suggest_upcycling_ideas(
    executor: &FlowExecutor,
    input: &SuggestUpcyclingIdeasInput,
) -> InvocationResult<UpcyclingIdeas> {
    executor.run_typed(definition(), input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rendered_text(input: serde_json::Value) -> String {
        let record = FLOW.input_schema().validate(&input).unwrap();
        FLOW.render(&record).unwrap().text()
    }

    #[test]
    fn test_prompt_without_request_omits_clause() {
        let text = rendered_text(json!({"materialDescription": "plastic bottles"}));
        assert!(text.contains("Material Description: plastic bottles\n"));
        assert!(text.contains("Return at least 3 ideas."));
        assert!(!text.contains("Customization Request"));
    }

    #[test]
    fn test_prompt_with_request_adds_clause() {
        let text = rendered_text(json!({
            "materialDescription": "glass jars",
            "customizationRequest": "for a kitchen"
        }));
        assert!(text.contains("User's Customization Request: for a kitchen\n"));
    }

    #[test]
    fn test_empty_request_is_omitted() {
        let text =
            rendered_text(json!({"materialDescription": "glass jars", "customizationRequest": ""}));
        assert!(!text.contains("Customization Request"));
    }

    #[test]
    fn test_prompt_carries_output_field_purpose() {
        let text = rendered_text(json!({"materialDescription": "cork"}));
        assert!(text.contains(
            "- upcyclingIdeas (array of strings, required): A list of creative upcycling ideas for the material."
        ));
    }

    #[test]
    fn test_meets_minimum() {
        let two = UpcyclingIdeas { upcycling_ideas: vec!["a".into(), "b".into()] };
        assert!(!two.meets_minimum());
        let three = UpcyclingIdeas { upcycling_ideas: vec!["a".into(), "b".into(), "c".into()] };
        assert!(three.meets_minimum());
    }
}
