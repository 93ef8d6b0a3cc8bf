use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    providers::{errors::ProviderError, Provider},
    Message,
};

/// Runs a schema-constrained decide call and decodes the result into `T`.
///
/// Output that does not match `T` is a `ResponseParseError`; it is never
/// patched up or defaulted.
pub async fn generate_structured_outputs<T: DeserializeOwned>(
    provider: &dyn Provider,
    system_prompt: &str,
    messages: &[Message],
    schema: &Value,
) -> Result<T, ProviderError> {
    let response = provider.extract(system_prompt, messages, schema).await?;
    tracing::debug!(model = %response.model, data = %response.data, "structured output");
    serde_json::from_value(response.data).map_err(|e| {
        ProviderError::ResponseParseError(format!("Output did not match schema: {}", e))
    })
}
