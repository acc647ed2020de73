//! Completion provider abstraction.
//!
//! The dispatcher talks to the LLM through the [`CompletionProvider`]
//! trait and pattern-matches on the explicit result, so completion
//! failures never flow through the webhook layer as exceptions. Tests
//! substitute a scripted provider behind the same seam.

mod openai;

pub use openai::OpenAiProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message in the wire format chat-completion APIs expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Failure modes of a completion call.
///
/// A timed-out call is a failure like any other; there is no retry.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Response contained no content")]
    Empty,
}

/// Unified interface for completion services.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Request a completion for the given conversation history.
    ///
    /// The call waits at most the provider's configured timeout before
    /// failing with [`CompletionError::Timeout`].
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}
