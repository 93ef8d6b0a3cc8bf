use std::{collections::HashMap, io, time::Duration};

use anyhow::Result;
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::{
    codec::{FramedRead, LinesCodec},
    io::StreamReader,
};

use super::{
    base::MessageStream,
    errors::ProviderError,
    formats::openai::{create_request, get_usage, response_to_message, response_to_streaming_message},
    utils::{emit_debug_trace, get_model, handle_response_openai_compat, handle_status_openai_compat},
};
use crate::{
    config::Config,
    message::Message,
    model::ModelConfig,
    providers::{Provider, ProviderCompleteResponse, ProviderExtractResponse, Usage},
    types::Tool,
};

pub const OPEN_AI_DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const OPEN_AI_DEFAULT_HOST: &str = "https://api.openai.com";
pub const OPEN_AI_DEFAULT_BASE_PATH: &str = "v1/chat/completions";
const OPEN_AI_DEFAULT_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    pub host: String,
    pub base_path: String,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub custom_headers: Option<HashMap<String, String>>,
    pub timeout: Option<u64>,
}

impl OpenAiProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: OPEN_AI_DEFAULT_HOST.to_string(),
            base_path: OPEN_AI_DEFAULT_BASE_PATH.to_string(),
            organization: None,
            project: None,
            custom_headers: None,
            timeout: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

#[derive(Debug)]
pub struct OpenAiProvider {
    client: Client,
    host: String,
    base_path: String,
    api_key: String,
    organization: Option<String>,
    project: Option<String>,
    model: ModelConfig,
    custom_headers: Option<HashMap<String, String>>,
}

impl OpenAiProvider {
    /// Read connection settings from `config`, environment first.
    pub fn from_settings(config: &Config, model: ModelConfig) -> Result<Self> {
        let api_key: String = config.get_secret("OPENAI_API_KEY")?;
        let host: String = config
            .get_param("OPENAI_HOST")
            .unwrap_or_else(|_| OPEN_AI_DEFAULT_HOST.to_string());
        let base_path: String = config
            .get_param("OPENAI_BASE_PATH")
            .unwrap_or_else(|_| OPEN_AI_DEFAULT_BASE_PATH.to_string());
        let organization: Option<String> = config.get_param("OPENAI_ORGANIZATION").ok();
        let project: Option<String> = config.get_param("OPENAI_PROJECT").ok();
        let custom_headers: Option<HashMap<String, String>> = config
            .get_secret::<String>("OPENAI_CUSTOM_HEADERS")
            .ok()
            .map(parse_custom_headers);
        let timeout: Option<u64> = config.get_param("OPENAI_TIMEOUT").ok();

        Self::from_config(
            OpenAiProviderConfig {
                api_key,
                host,
                base_path,
                organization,
                project,
                custom_headers,
                timeout,
            },
            model,
        )
    }

    pub fn from_config(config: OpenAiProviderConfig, model: ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(
                config.timeout.unwrap_or(OPEN_AI_DEFAULT_TIMEOUT_SECS),
            ))
            .build()?;

        Ok(Self {
            client,
            host: config.host,
            base_path: config.base_path,
            api_key: config.api_key,
            organization: config.organization,
            project: config.project,
            model,
            custom_headers: config.custom_headers,
        })
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    async fn send(&self, payload: &Value) -> Result<Response, ProviderError> {
        let base_url = url::Url::parse(&self.host)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid base URL: {e}")))?;
        let url = base_url.join(&self.base_path).map_err(|e| {
            ProviderError::RequestFailed(format!("Failed to construct endpoint URL: {e}"))
        })?;

        let mut request = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key));

        if let Some(org) = &self.organization {
            request = request.header("OpenAI-Organization", org);
        }
        if let Some(project) = &self.project {
            request = request.header("OpenAI-Project", project);
        }
        if let Some(custom_headers) = &self.custom_headers {
            for (key, value) in custom_headers {
                request = request.header(key, value);
            }
        }

        Ok(request.json(payload).send().await?)
    }

    async fn post(&self, payload: &Value) -> Result<Value, ProviderError> {
        let response = self.send(payload).await?;
        handle_response_openai_compat(response).await
    }
}

fn usage_or_default(response: &Value) -> Result<Usage, ProviderError> {
    match get_usage(response) {
        Ok(usage) => Ok(usage),
        Err(ProviderError::UsageError(e)) => {
            tracing::debug!("Failed to get usage data: {}", e);
            Ok(Usage::default())
        }
        Err(e) => Err(e),
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    #[tracing::instrument(
        skip(self, system, messages, tools),
        fields(model_config, input, output, input_tokens, output_tokens, total_tokens)
    )]
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderCompleteResponse, ProviderError> {
        let payload = create_request(&self.model, system, messages, tools)?;

        let response = self.post(&payload).await?;

        let message = response_to_message(&response)
            .map_err(|e| ProviderError::ResponseParseError(e.to_string()))?;
        let usage = usage_or_default(&response)?;
        let model = get_model(&response);
        emit_debug_trace(&self.model, &payload, &response, &usage);
        Ok(ProviderCompleteResponse::new(message, model, usage))
    }

    #[tracing::instrument(skip(self, system, messages, schema))]
    async fn extract(
        &self,
        system: &str,
        messages: &[Message],
        schema: &Value,
    ) -> Result<ProviderExtractResponse, ProviderError> {
        let mut payload = create_request(&self.model, system, messages, &[])?;
        payload["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": "extraction",
                "schema": schema,
                "strict": true
            }
        });

        let response = self.post(&payload).await?;

        let raw = response["choices"][0]["message"]
            .get("content")
            .cloned()
            .ok_or_else(|| {
                ProviderError::ResponseParseError("Missing content in extract response".into())
            })?;
        let data = match raw {
            Value::String(s) => serde_json::from_str(&s)
                .map_err(|e| ProviderError::ResponseParseError(format!("Invalid JSON: {}", e)))?,
            Value::Object(_) | Value::Array(_) => raw,
            other => {
                return Err(ProviderError::ResponseParseError(format!(
                    "Unexpected content type: {:?}",
                    other
                )))
            }
        };

        let usage = usage_or_default(&response)?;
        let model = get_model(&response);
        emit_debug_trace(&self.model, &payload, &response, &usage);
        Ok(ProviderExtractResponse::new(data, model, usage))
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
    ) -> Result<MessageStream, ProviderError> {
        let mut payload = create_request(&self.model, system, messages, &[])?;
        payload["stream"] = Value::Bool(true);
        payload["stream_options"] = json!({
            "include_usage": true,
        });

        let response = handle_status_openai_compat(self.send(&payload).await?).await?;
        let stream = response.bytes_stream().map_err(io::Error::other);

        let model_config = self.model.clone();
        Ok(Box::pin(try_stream! {
            let stream_reader = StreamReader::new(stream);
            let framed = FramedRead::new(stream_reader, LinesCodec::new())
                .map_err(anyhow::Error::from);

            let message_stream = response_to_streaming_message(framed);
            futures::pin_mut!(message_stream);
            while let Some(item) = message_stream.next().await {
                let (message, usage) = item.map_err(|e| {
                    ProviderError::RequestFailed(format!("Stream decode error: {}", e))
                })?;
                if let Some(usage) = &usage {
                    emit_debug_trace(&model_config, &payload, &json!({"stream": "done"}), usage);
                }
                yield (message, usage);
            }
        }))
    }
}

fn parse_custom_headers(s: String) -> HashMap<String, String> {
    s.split(',')
        .filter_map(|header| {
            let (key, value) = header.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
