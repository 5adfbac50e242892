use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::openai::OpenAIClient;
use crate::chat::{ToolCallRequest, TranscriptMessage};
use crate::tool::ToolDescriptor;

/// Input for a model request.
#[derive(Debug, Clone)]
pub struct LLMInput {
    /// The model to use
    pub model: String,
    /// The request transcript, oldest first
    pub messages: Vec<TranscriptMessage>,
    /// The system prompt
    pub system_prompt: String,
    /// Tools the model may call; an empty list sends no tool block at all
    pub tools: Vec<ToolDescriptor>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Optional temperature (0.0 to 1.0)
    pub temperature: Option<f32>,
}

/// Output from a model response.
#[derive(Debug, Clone)]
pub struct LLMOutput {
    /// Text content, if the model produced any
    pub text: Option<String>,
    /// Tool calls the model requested, in model order
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the response finished
    pub finish_reason: FinishReason,
    /// Token usage statistics
    pub usage: Usage,
}

/// The reason the model finished generating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop point reached
    Stop,
    /// Stopped due to tool calls
    ToolCalls,
    /// Maximum tokens reached
    MaxTokens,
    /// Stopped due to an error
    Error,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    /// Number of input tokens
    pub input_tokens: u32,
    /// Number of output tokens
    pub output_tokens: u32,
}

/// Errors that can occur when communicating with the model endpoint.
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    /// An API error occurred
    #[error("API error: {0}")]
    ApiError(String),
    /// A network error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    /// The response from the model was invalid
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),
}

/// Trait for model clients.
///
/// One non-streaming completion per call; the turn handler issues at most
/// two per incoming message (first completion plus synthesis).
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Sends a request and returns the complete response.
    async fn complete(&self, input: LLMInput) -> Result<LLMOutput, LLMError>;
}

/// A builder for creating model clients.
#[derive(Debug, Default)]
pub struct LLMClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<std::time::Duration>,
}

impl LLMClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Creates a client for an OpenAI-compatible chat-completions endpoint.
    ///
    /// Falls back to the `OPENAI_API_KEY`, then `DEEPSEEK_API_KEY`,
    /// environment variables when no key was set explicitly.
    pub fn build_openai(self) -> Result<Arc<dyn LLMClient>, LLMError> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
            .ok_or_else(|| LLMError::AuthError("API key not provided".to_string()))?;

        Ok(Arc::new(OpenAIClient::new(
            api_key,
            self.base_url,
            self.timeout,
        )?))
    }
}
