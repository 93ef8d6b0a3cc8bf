use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::AgentError;
use crate::{
    generate_structured_outputs,
    message::Message,
    prompt_template::{render_global_file, PromptContext},
    providers::{errors::ProviderError, Provider},
};

/// Label older routing prompts answered with for the presenter
const LEGACY_PRESENTER_LABEL: &str = "Presenter LLM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteVerdict {
    Presenter,
    QuestionAnswer,
}

impl RouteVerdict {
    /// Anything that is not recognisably the presenter goes to question answering.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "presenter" | LEGACY_PRESENTER_LABEL => Self::Presenter,
            _ => Self::QuestionAnswer,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RouteDecision {
    agent: String,
}

/// Labels are not enumerated in the schema so older prompts answering with
/// the legacy label still reach [`RouteVerdict::from_label`].
fn route_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "agent": {
                "type": "string",
                "description": "Either \"presenter\" or \"question_answer\""
            }
        },
        "required": ["agent"],
        "additionalProperties": false
    })
}

pub struct Router {
    provider: Arc<dyn Provider>,
    system_prompt: String,
}

impl Router {
    pub fn new(provider: Arc<dyn Provider>) -> Result<Self, AgentError> {
        let system_prompt = render_global_file("router.md", &PromptContext::today())?;
        Ok(Self {
            provider,
            system_prompt,
        })
    }

    /// One classification call per turn. Unreadable output falls back to
    /// question answering; backend failures end the turn.
    pub async fn route(&self, message: &str, history: &[Message]) -> Result<RouteVerdict, AgentError> {
        let mut messages = history.to_vec();
        messages.push(Message::user().with_text(message));

        let decision: Result<RouteDecision, ProviderError> = generate_structured_outputs(
            self.provider.as_ref(),
            &self.system_prompt,
            &messages,
            &route_schema(),
        )
        .await;

        let verdict = match decision {
            Ok(decision) => RouteVerdict::from_label(&decision.agent),
            Err(ProviderError::ResponseParseError(e)) => {
                warn!(error = %e, "unreadable routing decision, defaulting to question answering");
                RouteVerdict::QuestionAnswer
            }
            Err(e) => return Err(e.into()),
        };
        info!(?verdict, "routed turn");
        Ok(verdict)
    }
}
