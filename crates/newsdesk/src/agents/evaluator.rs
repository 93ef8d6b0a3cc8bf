use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::AgentError;
use crate::{
    generate_structured_outputs,
    message::{Message, Role},
    prompt_template::{render_global_file, PromptContext},
    providers::Provider,
    tools::{outlets::paywalled_outlet_for, web::VISIT_WEBSITE_TOOL_NAME},
};

/// Verdict on a proposed decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub is_acceptable: bool,
    pub feedback: String,
}

impl Evaluation {
    pub fn accept(feedback: impl Into<String>) -> Self {
        Self {
            is_acceptable: true,
            feedback: feedback.into(),
        }
    }

    pub fn reject(feedback: impl Into<String>) -> Self {
        Self {
            is_acceptable: false,
            feedback: feedback.into(),
        }
    }
}

/// Audits a decision before any of its tool calls run
#[async_trait]
pub trait DecisionPolicy: Send + Sync {
    async fn evaluate(
        &self,
        decision: &Message,
        user_message: &str,
        history: &[Message],
    ) -> Result<Evaluation, AgentError>;
}

/// Which policy the question-answer agent uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorKind {
    #[default]
    Model,
    Rules,
}

/// A decision as the model and the evaluator see it: its text and its tool calls as JSON
pub fn describe_decision(decision: &Message) -> String {
    let tool_calls: Vec<Value> = decision
        .tool_requests()
        .into_iter()
        .map(|request| match &request.tool_call {
            Ok(call) => json!({
                "id": request.id,
                "name": call.name,
                "arguments": call.arguments,
            }),
            Err(e) => json!({ "id": request.id, "error": e.to_string() }),
        })
        .collect();
    let text = decision.as_concat_text();
    let described = json!({
        "content": if text.is_empty() { Value::Null } else { Value::String(text) },
        "tool_calls": tool_calls,
    });
    serde_json::to_string_pretty(&described).unwrap_or_else(|_| described.to_string())
}

fn describe_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Agent",
                Role::Tool => "Tool",
            };
            format!("{}: {}", role, m.as_concat_text())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn evaluation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "is_acceptable": { "type": "boolean" },
            "feedback": { "type": "string" }
        },
        "required": ["is_acceptable", "feedback"],
        "additionalProperties": false
    })
}

/// Asks a second model call to judge the decision against the paywall policy
pub struct ModelEvaluator {
    provider: Arc<dyn Provider>,
    system_prompt: String,
}

impl ModelEvaluator {
    pub fn new(provider: Arc<dyn Provider>) -> Result<Self, AgentError> {
        let system_prompt = render_global_file("evaluator.md", &PromptContext::today())?;
        Ok(Self {
            provider,
            system_prompt,
        })
    }
}

#[async_trait]
impl DecisionPolicy for ModelEvaluator {
    async fn evaluate(
        &self,
        decision: &Message,
        user_message: &str,
        history: &[Message],
    ) -> Result<Evaluation, AgentError> {
        let request = format!(
            "Here's the conversation between the User and the Agent: \n\n{}\n\n\
            Here's the latest message from the User: \n\n{}\n\n\
            Here's the latest response from the Agent: \n\n{}\n\n\
            Please evaluate the response, replying with whether it is acceptable and your feedback.",
            describe_history(history),
            user_message,
            describe_decision(decision)
        );

        let evaluation: Evaluation = generate_structured_outputs(
            self.provider.as_ref(),
            &self.system_prompt,
            &[Message::user().with_text(request)],
            &evaluation_schema(),
        )
        .await?;
        Ok(evaluation)
    }
}

/// Rejects any page visit aimed at a paywalled outlet, without a model call
#[derive(Debug, Clone, Copy, Default)]
pub struct DenylistPolicy;

#[async_trait]
impl DecisionPolicy for DenylistPolicy {
    async fn evaluate(
        &self,
        decision: &Message,
        _user_message: &str,
        _history: &[Message],
    ) -> Result<Evaluation, AgentError> {
        for request in decision.tool_requests() {
            let Ok(call) = &request.tool_call else {
                continue;
            };
            if call.name != VISIT_WEBSITE_TOOL_NAME {
                continue;
            }
            let Some(url) = call.arguments.get("url").and_then(Value::as_str) else {
                continue;
            };
            if let Some(outlet) = paywalled_outlet_for(url) {
                return Ok(Evaluation::reject(format!(
                    "{} is a paywalled outlet, so visit_website cannot fetch {}. \
                    Call find_internet_articles with a query describing the story instead.",
                    outlet.name, url
                )));
            }
        }
        Ok(Evaluation::accept("No paywalled outlet is targeted."))
    }
}
