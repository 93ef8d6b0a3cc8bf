use std::collections::HashSet;

use anyhow::{anyhow, bail};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    message::{Message, MessageContent, Role},
    model::ModelConfig,
    providers::{base::Usage, errors::ProviderError, utils::is_valid_function_name},
    types::{Tool, ToolCall, ToolError},
};

/// Convert internal Message format to OpenAI's API message specification.
///
/// Tool responses become one `tool` message each, keyed by the request id.
/// Tool requests that failed to parse are not sent back to the backend.
pub fn format_messages(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();
    for message in messages {
        match message.role {
            Role::System | Role::User => {
                let role = if message.role == Role::System {
                    "system"
                } else {
                    "user"
                };
                messages_spec.push(json!({
                    "role": role,
                    "content": message.as_concat_text(),
                }));
            }
            Role::Assistant => {
                let text = message.as_concat_text();
                let tool_calls: Vec<Value> = message
                    .tool_requests()
                    .into_iter()
                    .filter_map(|request| match &request.tool_call {
                        Ok(call) => Some(json!({
                            "id": request.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })),
                        Err(e) => {
                            tracing::debug!("Dropping unparsable tool request {}: {}", request.id, e);
                            None
                        }
                    })
                    .collect();

                let mut converted = json!({ "role": "assistant" });
                if !text.is_empty() || tool_calls.is_empty() {
                    converted["content"] = json!(text);
                }
                if !tool_calls.is_empty() {
                    converted["tool_calls"] = json!(tool_calls);
                }
                messages_spec.push(converted);
            }
            Role::Tool => {
                for response in message
                    .content
                    .iter()
                    .filter_map(MessageContent::as_tool_response)
                {
                    let content = match &response.tool_result {
                        Ok(Value::String(text)) => text.clone(),
                        Ok(value) => value.to_string(),
                        Err(e) => format!("Error: {}", e),
                    };
                    messages_spec.push(json!({
                        "role": "tool",
                        "tool_call_id": response.id,
                        "content": content,
                    }));
                }
            }
        }
    }
    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn format_tools(tools: &[Tool]) -> anyhow::Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            bail!("Duplicate tool name: {}", tool.name);
        }
        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to internal Message format.
///
/// Tool calls with a malformed name or arguments are kept as `Err` requests so
/// the caller can decide how to fail; they are never coerced into valid calls.
pub fn response_to_message(response: &Value) -> anyhow::Result<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("Response contains no choices"))?;

    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(Value::as_str) {
        if !text.is_empty() {
            message = message.with_text(text);
        }
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let raw_arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default();
            let arguments = if raw_arguments.trim().is_empty() {
                "{}"
            } else {
                raw_arguments
            };

            if !is_valid_function_name(&function_name) {
                let error = ToolError::NotFound(format!(
                    "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                    function_name
                ));
                message = message.with_tool_request(id, Err(error));
                continue;
            }

            message = match serde_json::from_str::<Value>(arguments) {
                Ok(params) => {
                    message.with_tool_request(id, Ok(ToolCall::new(&function_name, params)))
                }
                Err(e) => {
                    let error = ToolError::InvalidParameters(format!(
                        "Could not interpret tool use parameters for id {}: {}",
                        id, e
                    ));
                    message.with_tool_request(id, Err(error))
                }
            };
        }
    }

    Ok(message)
}

pub fn get_usage(data: &Value) -> Result<Usage, ProviderError> {
    let usage = data
        .get("usage")
        .filter(|u| !u.is_null())
        .ok_or_else(|| ProviderError::UsageError("No usage data in response".to_string()))?;

    let read = |key: &str| usage.get(key).and_then(Value::as_i64).map(|v| v as i32);
    let input_tokens = read("prompt_tokens");
    let output_tokens = read("completion_tokens");
    let total_tokens = read("total_tokens").or(match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    });

    Ok(Usage::new(input_tokens, output_tokens, total_tokens))
}

pub fn create_request(
    model_config: &ModelConfig,
    system: &str,
    messages: &[Message],
    tools: &[Tool],
) -> anyhow::Result<Value> {
    let mut messages_spec = vec![json!({ "role": "system", "content": system })];
    messages_spec.extend(format_messages(messages));

    let mut payload = json!({
        "model": model_config.model_name,
        "messages": messages_spec,
    });

    if !tools.is_empty() {
        payload["tools"] = json!(format_tools(tools)?);
    }
    if let Some(temperature) = model_config.temperature {
        payload["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = model_config.max_tokens {
        payload["max_tokens"] = json!(max_tokens);
    }

    Ok(payload)
}

#[derive(Deserialize, Debug)]
struct StreamingChunk {
    #[serde(default)]
    choices: Vec<StreamingChoice>,
    usage: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct StreamingChoice {
    #[serde(default)]
    delta: StreamingDelta,
}

#[derive(Deserialize, Debug, Default)]
struct StreamingDelta {
    content: Option<String>,
}

/// Decode server-sent event lines from a streaming chat completion.
///
/// Lines that are not `data:` events are ignored and `data: [DONE]` ends the stream.
pub fn response_to_streaming_message<S>(
    stream: S,
) -> impl Stream<Item = anyhow::Result<(Option<Message>, Option<Usage>)>>
where
    S: Stream<Item = anyhow::Result<String>>,
{
    try_stream! {
        let mut stream = Box::pin(stream);
        while let Some(line) = stream.next().await {
            let line = line?;
            let data = match line.strip_prefix("data:") {
                Some(data) => data.trim(),
                None => continue,
            };
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                break;
            }

            let chunk: StreamingChunk = serde_json::from_str(data)
                .map_err(|e| anyhow!("Failed to parse streaming chunk: {}: {:?}", e, data))?;

            let usage = chunk
                .usage
                .map(|usage| json!({ "usage": usage }))
                .and_then(|wrapped| get_usage(&wrapped).ok());
            let text: String = chunk
                .choices
                .iter()
                .filter_map(|choice| choice.delta.content.as_deref())
                .collect();
            let message = if text.is_empty() {
                None
            } else {
                Some(Message::assistant().with_text(text))
            };

            if message.is_some() || usage.is_some() {
                yield (message, usage);
            }
        }
    }
}
