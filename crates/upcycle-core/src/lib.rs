//! Structured generation pipeline for Upcycle.
//!
//! A flow sends a user payload (an image, some text) to a generative model and
//! only hands back a reply that satisfies the flow's declared output contract.
//!
//! ```text
//! caller ─▶ actions ─▶ FlowExecutor: validate ─▶ render ─▶ invoke ─▶ validate reply ─▶ typed result
//! ```
//!
//! The model is injected as an `Arc<dyn Model>`; nothing here holds global state.

pub mod actions;
pub mod config;
pub mod error;
pub mod executor;
pub mod flow;
pub mod flows;
pub mod media;
pub mod prompt;
pub mod schema;

pub use actions::{
    ActionOptions, IdentifyMaterialState, UpcyclingIdeasState, get_upcycling_ideas_action,
    identify_material_action, with_deadline,
};
pub use config::{ConfigError, ConfigResult, PipelineConfig};
pub use error::{FlowError, FlowErrorKind, InvocationResult};
pub use executor::FlowExecutor;
pub use flow::{FlowDefinition, PromptRenderer};
pub use flows::{
    IdentifyMaterialInput, MIN_IDEAS, MaterialIdentification, SuggestUpcyclingIdeasInput,
    UpcyclingIdeas, identify_material, suggest_upcycling_ideas,
};
pub use media::{MediaError, MediaRef};
pub use prompt::{PromptError, PromptPart, PromptPayload};
pub use schema::{
    FieldDescriptor, FieldKind, FieldValue, FromRecord, Presence, Record, Schema, ValidationError,
};
