//! Prompt payloads and the output-contract block every prompt carries.

use crate::media::{MediaError, MediaRef};
use crate::schema::{Schema, ValidationError};
use std::fmt::Write;
use thiserror::Error;
use upcycle_abstraction::{ChatMessage, ContentBlock, ImageSource, MessageContent};

/// A rendering failure. Always caused by the caller's input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    /// A media field does not hold a usable data URI.
    #[error("field '{field}': {source}")]
    InvalidMedia {
        /// Field holding the media reference.
        field: &'static str,
        /// What is wrong with it.
        source: MediaError,
    },

    /// The record lacks something the template needs.
    #[error(transparent)]
    Record(#[from] ValidationError),
}

/// One part of a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    /// Literal text.
    Text(String),
    /// An inline media blob.
    Media(MediaRef),
}

/// The ordered text and media sent to the model for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptPayload {
    parts: Vec<PromptPart>,
}

impl PromptPayload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends text, merging with a preceding text part.
    pub fn push_text(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            return;
        }
        match self.parts.last_mut() {
            Some(PromptPart::Text(last)) => last.push_str(text),
            _ => self.parts.push(PromptPart::Text(text.to_string())),
        }
    }

    /// Appends a media part.
    pub fn push_media(&mut self, media: MediaRef) {
        self.parts.push(PromptPart::Media(media));
    }

    /// Parts in order.
    pub fn parts(&self) -> &[PromptPart] {
        &self.parts
    }

    /// All text parts joined, media skipped.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(text) => Some(text.as_str()),
                PromptPart::Media(_) => None,
            })
            .collect()
    }

    /// Media parts in order.
    pub fn media(&self) -> impl Iterator<Item = &MediaRef> {
        self.parts.iter().filter_map(|p| match p {
            PromptPart::Media(media) => Some(media),
            PromptPart::Text(_) => None,
        })
    }

    /// Converts the payload into a single user message, consuming it.
    pub fn into_message(self) -> ChatMessage {
        let blocks = self
            .parts
            .into_iter()
            .map(|part| match part {
                PromptPart::Text(text) => ContentBlock::Text { text },
                PromptPart::Media(media) => ContentBlock::Image {
                    media_type: media.mime_type().to_string(),
                    source: ImageSource::Base64 { data: media.data().to_string() },
                },
            })
            .collect();
        ChatMessage::user(MessageContent::Blocks(blocks))
    }
}

/// Appends the reply contract: one line per output field with its type,
/// optionality and purpose, plus the instruction to answer in JSON.
pub fn append_output_contract(payload: &mut PromptPayload, schema: &Schema) {
    let mut block = String::from(
        "\n\nRespond with a single JSON object and nothing else. It has these fields:\n",
    );
    for field in schema.fields() {
        let _ = writeln!(
            block,
            "- {} ({}, {}): {}",
            field.name,
            field.kind.type_name(),
            if field.required { "required" } else { "optional" },
            field.description
        );
    }
    if schema.fields().iter().any(|f| !f.required) {
        block.push_str("Leave out optional fields you cannot determine instead of guessing.\n");
    }
    payload.push_text(block);
}
