//! Chat-completion clients used by the plan generator.
//!
//! The [`LlmClient`] trait is the seam between the generator and whatever
//! provider is configured. [`OpenAiClient`] is the live implementation; tests
//! substitute scripted clients.

mod openai;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::{LlmConfig, OpenAiClient};

/// Failures talking to an LLM provider. Never escapes the plan generator.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured for {0}")]
    MissingCredentials(&'static str),

    #[error("request to LLM provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM provider rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("LLM provider rate limit or quota exceeded")]
    RateLimited,

    #[error("LLM provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM response had no message content")]
    EmptyResponse,
}

/// A single chat-completion request: one system and one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Provider interface for one-shot chat completions.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Short provider name for logs (e.g. "openai").
    fn name(&self) -> &str;

    /// Send the request and return the assistant's raw text reply.
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

// Compile-time assertion: LlmClient must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn LlmClient) {}
};
