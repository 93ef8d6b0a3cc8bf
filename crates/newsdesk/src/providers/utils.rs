use reqwest::{Response, StatusCode};
use serde_json::{from_value, Value};

use super::base::Usage;
use crate::{
    model::ModelConfig,
    providers::errors::{OpenAIError, ProviderError},
};

#[derive(serde::Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

/// Handle response from OpenAI compatible endpoints
/// Error codes: https://platform.openai.com/docs/guides/error-codes
pub async fn handle_response_openai_compat(response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let payload = match response.json::<Value>().await {
        Ok(json) => json,
        Err(e) => return Err(ProviderError::RequestFailed(e.to_string())),
    };

    if status == StatusCode::OK {
        Ok(payload)
    } else {
        Err(map_error_status(status, payload))
    }
}

/// Check the status of a streaming response without consuming a successful body.
pub async fn handle_status_openai_compat(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let payload = serde_json::from_str(&body).unwrap_or(Value::String(body));
    Err(map_error_status(status, payload))
}

fn map_error_status(status: StatusCode, payload: Value) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(format!(
            "Authentication failed. Please ensure your API keys are valid and have the required permissions. \
            Status: {}. Response: {:?}",
            status, payload
        )),
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
            tracing::debug!(
                "Provider request failed with status: {}. Payload: {:?}",
                status,
                payload
            );
            match from_value::<OpenAIErrorResponse>(payload) {
                Ok(err_resp) => {
                    let err = err_resp.error;
                    if err.is_context_length_exceeded() {
                        ProviderError::ContextLengthExceeded(
                            err.message.unwrap_or_else(|| "Unknown error".to_string()),
                        )
                    } else {
                        ProviderError::RequestFailed(format!("{} (status {})", err, status.as_u16()))
                    }
                }
                Err(_) => ProviderError::RequestFailed(format!("Unknown error (status {})", status)),
            }
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(format!("{:?}", payload)),
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
            ProviderError::ServerError(format!("{:?}", payload))
        }
        _ => {
            tracing::debug!(
                "Provider request failed with status: {}. Payload: {:?}",
                status,
                payload
            );
            ProviderError::RequestFailed(format!("Request failed with status: {}", status))
        }
    }
}

/// Function names accepted by OpenAI-compatible tool calling: `^[a-zA-Z0-9_-]+$`
pub fn is_valid_function_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Extract the model name from a JSON object. Common with most providers to have this top level attribute.
pub fn get_model(data: &Value) -> String {
    data.get("model")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string()
}

pub fn emit_debug_trace(
    model_config: &ModelConfig,
    payload: &Value,
    response: &Value,
    usage: &Usage,
) {
    tracing::debug!(
        model_config = %serde_json::to_string_pretty(model_config).unwrap_or_default(),
        input = %serde_json::to_string_pretty(payload).unwrap_or_default(),
        output = %serde_json::to_string_pretty(response).unwrap_or_default(),
        input_tokens = ?usage.input_tokens.unwrap_or_default(),
        output_tokens = ?usage.output_tokens.unwrap_or_default(),
        total_tokens = ?usage.total_tokens.unwrap_or_default(),
    );
}
