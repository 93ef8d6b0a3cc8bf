use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use super::{describe_decision, AgentError, DecisionPolicy};
use crate::{
    message::{Message, MessageContent},
    providers::Provider,
    streaming::flush_on_paragraphs,
    tools::ToolRegistry,
};

/// Cumulative answer text, one value per flush
pub type ReplyStream = BoxStream<'static, Result<String, AgentError>>;

/// Steps of one turn, in the order they can occur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Deciding,
    Evaluating,
    Retrying,
    Executing,
    Synthesizing,
    Done,
}

fn enter(agent: &str, phase: TurnPhase) {
    info!(agent, ?phase, "turn phase");
}

/// System prompt for the single retry after a rejected decision
pub fn retry_prompt(system_prompt: &str, rejected: &Message, feedback: &str) -> String {
    format!(
        "{}\n\n## Previous answer rejected\n\
        You just tried to reply, but the quality control rejected your reply\n\
        ## Your attempted answer:\n{}\n\n\
        ## Reason for rejection:\n{}\n\n",
        system_prompt,
        describe_decision(rejected),
        feedback
    )
}

/// An agent that decides, optionally has the decision audited, runs the
/// chosen tools and streams a synthesized answer.
pub struct SpecialistAgent {
    name: String,
    provider: Arc<dyn Provider>,
    system_prompt: String,
    direct_instruction: String,
    synthesis_instruction: String,
    tools: ToolRegistry,
    evaluator: Option<Arc<dyn DecisionPolicy>>,
}

impl SpecialistAgent {
    /// `direct_instruction` closes the conversation when no tool is called,
    /// `synthesis_instruction` when tool results are present.
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
        system_prompt: impl Into<String>,
        direct_instruction: impl Into<String>,
        synthesis_instruction: impl Into<String>,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            system_prompt: system_prompt.into(),
            direct_instruction: direct_instruction.into(),
            synthesis_instruction: synthesis_instruction.into(),
            tools,
            evaluator: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn DecisionPolicy>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn decide(&self, system: &str, messages: &[Message]) -> Result<Message, AgentError> {
        let response = self
            .provider
            .complete(system, messages, &self.tools.tools())
            .await?;
        debug!(
            agent = %self.name,
            model = %response.model,
            tool_calls = ?response.message.tool_request_ids(),
            "decision"
        );
        Ok(response.message)
    }

    /// Run one turn. `history` is only read; the turn works on its own copy.
    ///
    /// Everything up to the synthesis call happens before this returns; the
    /// returned stream then yields the growing answer.
    #[instrument(skip_all, fields(agent = %self.name))]
    pub async fn reply(&self, message: &str, history: &[Message]) -> Result<ReplyStream, AgentError> {
        let mut messages = history.to_vec();
        messages.push(Message::user().with_text(message));

        enter(&self.name, TurnPhase::Deciding);
        let mut decision = self.decide(&self.system_prompt, &messages).await?;
        if !decision.contains_tool_call() {
            return self.synthesize(messages, &self.direct_instruction).await;
        }

        if let Some(evaluator) = &self.evaluator {
            enter(&self.name, TurnPhase::Evaluating);
            let evaluation = evaluator.evaluate(&decision, message, history).await?;
            if !evaluation.is_acceptable {
                warn!(agent = %self.name, feedback = %evaluation.feedback, "decision rejected, retrying once");
                enter(&self.name, TurnPhase::Retrying);
                let system = retry_prompt(&self.system_prompt, &decision, &evaluation.feedback);
                decision = self.decide(&system, &messages).await?;
                if !decision.contains_tool_call() {
                    return self.synthesize(messages, &self.direct_instruction).await;
                }
            }
        }

        enter(&self.name, TurnPhase::Executing);
        let mut executed = Message::assistant();
        let mut results = Vec::new();
        for content in &decision.content {
            let MessageContent::ToolRequest(request) = content else {
                executed = executed.with_content(content.clone());
                continue;
            };
            let call = request.tool_call.clone()?;
            if let Some(result) = self.tools.dispatch(&call).await? {
                executed = executed.with_content(content.clone());
                results.push(Message::tool().with_tool_response(&request.id, Ok(result)));
            }
        }

        messages.push(executed);
        messages.extend(results);
        self.synthesize(messages, &self.synthesis_instruction).await
    }

    async fn synthesize(
        &self,
        mut messages: Vec<Message>,
        instruction: &str,
    ) -> Result<ReplyStream, AgentError> {
        enter(&self.name, TurnPhase::Synthesizing);
        messages.push(Message::system().with_text(instruction));

        let deltas = self
            .provider
            .stream(&self.system_prompt, &messages)
            .await?
            .filter_map(|item| async move {
                match item {
                    Ok((Some(message), _)) => Some(Ok(message.as_concat_text())),
                    Ok((None, _)) => None,
                    Err(e) => Some(Err(AgentError::from(e))),
                }
            });

        let agent = self.name.clone();
        Ok(Box::pin(try_stream! {
            let answer = flush_on_paragraphs(deltas);
            futures::pin_mut!(answer);
            while let Some(text) = answer.next().await {
                yield text?;
            }
            enter(&agent, TurnPhase::Done);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;
    use serde_json::json;

    #[test]
    fn test_retry_prompt_carries_decision_and_feedback() {
        let rejected = Message::assistant().with_tool_request(
            "call_1",
            Ok(ToolCall::new("visit_website", json!({"url": "https://nytimes.com/a"}))),
        );
        let prompt = retry_prompt("You answer questions.", &rejected, "Paywalled, search instead.");

        assert!(prompt.starts_with("You answer questions.\n\n## Previous answer rejected\n"));
        assert!(prompt.contains(&describe_decision(&rejected)));
        assert!(prompt.ends_with("## Reason for rejection:\nPaywalled, search instead.\n\n"));
    }
}
