use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Usage data error: {0}")]
    UsageError(String),

    #[error("Invalid response: {0}")]
    ResponseParseError(String),
}

impl From<anyhow::Error> for ProviderError {
    fn from(error: anyhow::Error) -> Self {
        ProviderError::ExecutionError(error.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        ProviderError::ExecutionError(error.to_string())
    }
}

/// The `error` object of an OpenAI-compatible error body.
///
/// Some compatible servers send `code` as a number, so it is kept as a raw value.
#[derive(serde::Deserialize, Debug)]
pub struct OpenAIError {
    #[serde(default)]
    pub code: Option<Value>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

impl OpenAIError {
    pub fn code_str(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn is_context_length_exceeded(&self) -> bool {
        matches!(
            self.code_str().as_deref(),
            Some("context_length_exceeded") | Some("string_above_max_length")
        )
    }
}

impl std::fmt::Display for OpenAIError {
    /// `{"message": "Invalid API key", "code": "invalid_api_key", "type": "client_error"}`
    /// renders as `Invalid API key (code: invalid_api_key, type: client_error)`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(message) = &self.message {
            write!(f, "{}", message)?;
        }
        let details: Vec<String> = [
            self.code_str().map(|c| format!("code: {}", c)),
            self.error_type.as_ref().map(|t| format!("type: {}", t)),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !details.is_empty() {
            write!(f, " ({})", details.join(", "))?;
        }
        Ok(())
    }
}
