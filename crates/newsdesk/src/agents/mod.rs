mod evaluator;
mod presenter;
mod question_answer;
mod router;
mod specialist;

use thiserror::Error;

use crate::{providers::errors::ProviderError, types::ToolError};

pub use evaluator::{describe_decision, DecisionPolicy, DenylistPolicy, Evaluation, EvaluatorKind, ModelEvaluator};
pub use presenter::{presenter, PRESENTER_NAME};
pub use question_answer::{question_answer, QUESTION_ANSWER_NAME};
pub use router::{RouteVerdict, Router};
pub use specialist::{retry_prompt, ReplyStream, SpecialistAgent, TurnPhase};

/// A failure that ends the turn
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Tool call failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Failed to render prompt: {0}")]
    Template(#[from] minijinja::Error),
}
