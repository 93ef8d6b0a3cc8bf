use std::sync::Arc;

use anyhow::Result;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::info;

use crate::{
    agents::{
        presenter, question_answer, AgentError, DecisionPolicy, DenylistPolicy, EvaluatorKind,
        ModelEvaluator, RouteVerdict, Router, SpecialistAgent,
    },
    config::Config,
    message::Message,
    model::ModelConfig,
    providers::{self, openai::OPEN_AI_DEFAULT_MODEL, Provider},
    tools::{news::NewsApiClient, search::BraveSearchClient, web::PageFetcher},
};

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_QA_MODEL: &str = "gpt-4.1-mini";

/// Entry point for one conversation turn: route, then hand the turn to the chosen agent.
///
/// The session holds no conversation state; callers own the history.
pub struct TurnSession {
    router: Router,
    presenter: SpecialistAgent,
    question_answer: SpecialistAgent,
}

impl TurnSession {
    pub fn new(router: Router, presenter: SpecialistAgent, question_answer: SpecialistAgent) -> Self {
        Self {
            router,
            presenter,
            question_answer,
        }
    }

    /// Build providers, data-source clients and both agents from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider_name: String = config
            .get_optional_param("NEWSDESK_PROVIDER")?
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
        let temperature: Option<f32> = config.get_optional_param("NEWSDESK_TEMPERATURE")?;
        let max_tokens: Option<i32> = config.get_optional_param("NEWSDESK_MAX_TOKENS")?;
        let model: String = config
            .get_optional_param("NEWSDESK_MODEL")?
            .unwrap_or_else(|| OPEN_AI_DEFAULT_MODEL.to_string());
        let qa_model: String = config
            .get_optional_param("NEWSDESK_QA_MODEL")?
            .unwrap_or_else(|| DEFAULT_QA_MODEL.to_string());

        let default_provider = providers::create(
            &provider_name,
            config,
            ModelConfig::new(model)
                .with_temperature(temperature)
                .with_max_tokens(max_tokens),
        )?;
        let qa_provider = providers::create(
            &provider_name,
            config,
            ModelConfig::new(qa_model)
                .with_temperature(temperature)
                .with_max_tokens(max_tokens),
        )?;

        let evaluator_kind: EvaluatorKind = config
            .get_optional_param("NEWSDESK_EVALUATOR")?
            .unwrap_or_default();
        let evaluator: Arc<dyn DecisionPolicy> = match evaluator_kind {
            EvaluatorKind::Model => Arc::new(ModelEvaluator::new(Arc::clone(&qa_provider))?),
            EvaluatorKind::Rules => Arc::new(DenylistPolicy),
        };
        info!(provider = %provider_name, ?evaluator_kind, "building turn session");

        let fetcher = PageFetcher::from_config(config)?;
        Ok(Self::new(
            Router::new(Arc::clone(&default_provider))?,
            presenter(default_provider, NewsApiClient::from_config(config)?)?,
            question_answer(
                qa_provider,
                BraveSearchClient::from_config(config)?,
                fetcher,
                evaluator,
            )?,
        ))
    }

    fn agent(&self, verdict: RouteVerdict) -> &SpecialistAgent {
        match verdict {
            RouteVerdict::Presenter => &self.presenter,
            RouteVerdict::QuestionAnswer => &self.question_answer,
        }
    }

    /// Run one turn. Nothing happens until the stream is polled; each value is
    /// the full answer so far, and an error ends the stream.
    pub fn chat<'a>(
        &'a self,
        message: &'a str,
        history: &'a [Message],
    ) -> BoxStream<'a, Result<String, AgentError>> {
        Box::pin(try_stream! {
            let verdict = self.router.route(message, history).await?;
            let agent = self.agent(verdict);
            info!(agent = agent.name(), history = history.len(), "dispatching turn");

            let mut reply = agent.reply(message, history).await?;
            while let Some(text) = reply.next().await {
                yield text?;
            }
        })
    }
}

/// Lets tests and embedders share one backend across the router and both agents.
pub fn session_with_provider(
    provider: Arc<dyn Provider>,
    news: NewsApiClient,
    search: BraveSearchClient,
    fetcher: PageFetcher,
    evaluator: Arc<dyn DecisionPolicy>,
) -> Result<TurnSession, AgentError> {
    Ok(TurnSession::new(
        Router::new(Arc::clone(&provider))?,
        presenter(Arc::clone(&provider), news)?,
        question_answer(provider, search, fetcher, evaluator)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_malformed_evaluator_setting_fails_the_build() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().join("config.yaml"), dir.path().join("secrets.yaml"));
        let with_evaluator = |kind: &'static str| {
            [
                ("OPENAI_API_KEY", Some("sk-test")),
                ("NEWS_API_KEY", Some("news-test")),
                ("BRAVE_API_KEY", Some("brave-test")),
                ("NEWSDESK_EVALUATOR", Some(kind)),
            ]
        };

        temp_env::with_vars(with_evaluator("strict"), || {
            let err = TurnSession::from_config(&config).err().unwrap();
            assert!(err.to_string().contains("Failed to deserialize value"));
        });
        temp_env::with_vars(with_evaluator("rules"), || {
            assert!(TurnSession::from_config(&config).is_ok());
        });
    }
}
