//! Model implementations for Upcycle.
//!
//! This crate provides concrete implementations of the `Model` trait.
//!
//! # Supported Providers
//!
//! - **Mock**: Testing and development, with scripted replies
//! - **Gemini**: Google's Gemini models (API key required)

pub mod factory;
pub mod gemini;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;
use upcycle_abstraction::{
    ChatMessage, MessageContent, Model, ModelError, ModelParameters, ModelResponse, ModelUsage,
};

pub use factory::{ModelConfig, ModelFactory, ModelType};
pub use gemini::GeminiModel;

/// A mock implementation of the `Model` trait for testing and demonstration.
///
/// Without a script the mock echoes the conversation back. With
/// [`MockModel::with_replies`] it hands out the scripted replies in order and
/// keeps repeating the last one once the rest are used up. Every request is
/// recorded.
#[derive(Debug, Default)]
pub struct MockModel {
    id: String,
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    calls: AtomicUsize,
}

impl MockModel {
    /// Creates a new `MockModel` with the given ID.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self { id, ..Self::default() }
    }

    /// Creates a mock that answers with the given replies, one per call.
    #[must_use]
    pub fn with_replies(id: String, replies: Vec<Result<String, ModelError>>) -> Self {
        Self { id, replies: Mutex::new(replies.into()), ..Self::default() }
    }

    /// Creates a mock that always answers with the same text.
    #[must_use]
    pub fn with_reply(id: String, reply: impl Into<String>) -> Self {
        Self::with_replies(id, vec![Ok(reply.into())])
    }

    /// Number of generation calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every conversation the mock has been asked to complete, oldest first.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_reply(&self) -> Option<Result<String, ModelError>> {
        let mut replies = self.replies.lock().ok()?;
        // The last scripted reply sticks so a single-reply mock can serve many calls.
        if replies.len() > 1 { replies.pop_front() } else { replies.front().cloned() }
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        let messages = vec![ChatMessage::user(MessageContent::Text(prompt.to_string()))];
        self.generate_chat_completion(&messages, parameters).await
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        use std::fmt::Write;

        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        debug!(
            model_id = %self.id,
            message_count = messages.len(),
            parameters = ?parameters,
            "MockModel generating chat completion"
        );

        let response_content = match self.next_reply() {
            Some(reply) => reply?,
            None => {
                let mut conversation_summary = String::from("Conversation Summary:\n");
                for message in messages {
                    let _ = writeln!(
                        conversation_summary,
                        "  {}: {}",
                        message.role,
                        message.content.text()
                    );
                }
                format!("Mock chat response from {}\n{conversation_summary}", self.id)
            }
        };

        let prompt_tokens = messages.iter().map(|m| count_tokens(&m.content.text())).sum::<u32>();
        let completion_tokens = count_tokens(&response_content);
        let total_tokens = prompt_tokens + completion_tokens;

        Ok(ModelResponse {
            content: response_content,
            model_id: Some(self.id.clone()),
            usage: Some(ModelUsage { prompt_tokens, completion_tokens, total_tokens }),
        })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

/// Count tokens in a string (simplified: word count).
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
