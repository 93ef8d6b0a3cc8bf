use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use super::errors::ProviderError;
use crate::{message::Message, types::Tool};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderCompleteResponse {
    pub message: Message,
    pub model: String,
    pub usage: Usage,
}

impl ProviderCompleteResponse {
    pub fn new(message: Message, model: String, usage: Usage) -> Self {
        Self {
            message,
            model,
            usage,
        }
    }
}

/// Response from a structured-extraction call
#[derive(Debug, Clone)]
pub struct ProviderExtractResponse {
    /// The extracted JSON object
    pub data: serde_json::Value,
    pub model: String,
    pub usage: Usage,
}

impl ProviderExtractResponse {
    pub fn new(data: serde_json::Value, model: String, usage: Usage) -> Self {
        Self { data, model, usage }
    }
}

/// Incremental output of a streaming generate call.
///
/// Each item carries an assistant message holding only the newly generated
/// text, and usage once the backend reports it (normally on the last chunk).
pub type MessageStream = Pin<
    Box<dyn Stream<Item = Result<(Option<Message>, Option<Usage>), ProviderError>> + Send>,
>;

/// Language-model backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Non-streaming decide call.
    ///
    /// # Arguments
    /// * `system` - The persona prompt placed ahead of the conversation
    /// * `messages` - The conversation, which may include interleaved system and tool messages
    /// * `tools` - Tools the model may propose calls to; empty for a plain reply
    ///
    /// # Returns
    /// The assistant message, which either holds text or one or more tool requests.
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderCompleteResponse, ProviderError>;

    /// Structured extraction constrained to a JSON schema.
    ///
    /// # Errors
    /// * `ProviderError::ResponseParseError` if the model output is not JSON
    /// * other `ProviderError` variants for API/network failures
    async fn extract(
        &self,
        system: &str,
        messages: &[Message],
        schema: &serde_json::Value,
    ) -> Result<ProviderExtractResponse, ProviderError>;

    /// Streaming generate call with no tools offered.
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
    ) -> Result<MessageStream, ProviderError>;
}
