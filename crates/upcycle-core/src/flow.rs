//! Flow definitions: a name, two contracts and a prompt renderer.

use crate::prompt::{PromptError, PromptPayload, append_output_contract};
use crate::schema::{Record, Schema};
use std::fmt;
use std::marker::PhantomData;

/// Renders a validated input record into the prompt body.
pub type PromptRenderer = fn(&Record) -> Result<PromptPayload, PromptError>;

/// One named generation operation. Immutable; safe to share across tasks.
///
/// `O` is the typed output the executor hands back on success.
pub struct FlowDefinition<O> {
    name: &'static str,
    input_schema: Schema,
    output_schema: Schema,
    renderer: PromptRenderer,
    _output: PhantomData<fn() -> O>,
}

impl<O> FlowDefinition<O> {
    /// Creates a flow definition.
    pub const fn new(
        name: &'static str,
        input_schema: Schema,
        output_schema: Schema,
        renderer: PromptRenderer,
    ) -> Self {
        Self { name, input_schema, output_schema, renderer, _output: PhantomData }
    }

    /// Flow name used in logs and errors.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Contract for caller input.
    pub const fn input_schema(&self) -> &Schema {
        &self.input_schema
    }

    /// Contract for the model's reply.
    pub const fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    /// Renders the full prompt: the flow's template followed by the
    /// output-contract block. Pure; no I/O.
    pub fn render(&self, input: &Record) -> Result<PromptPayload, PromptError> {
        let mut payload = (self.renderer)(input)?;
        append_output_contract(&mut payload, &self.output_schema);
        Ok(payload)
    }
}

impl<O> fmt::Debug for FlowDefinition<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowDefinition")
            .field("name", &self.name)
            .field("input_schema", &self.input_schema.name())
            .field("output_schema", &self.output_schema.name())
            .finish_non_exhaustive()
    }
}
