use std::sync::Arc;

use super::{AgentError, DecisionPolicy, SpecialistAgent};
use crate::{
    prompt_template::{render_global_file, PromptContext},
    providers::Provider,
    tools::{
        search::{BraveSearchClient, FindArticlesTool},
        web::{PageFetcher, VisitWebsiteTool},
        ToolRegistry,
    },
};

pub const QUESTION_ANSWER_NAME: &str = "question_answer";

const DIRECT_INSTRUCTION: &str = "Answer the user's question directly from the conversation so far.";
const SYNTHESIS_INSTRUCTION: &str = "Use the tool results to answer the user's question. \
    Cite every article you used in the References section.";

/// Builds the follow-up question agent. Every tool decision is audited by `evaluator`
/// before it runs.
pub fn question_answer(
    provider: Arc<dyn Provider>,
    search: BraveSearchClient,
    fetcher: PageFetcher,
    evaluator: Arc<dyn DecisionPolicy>,
) -> Result<SpecialistAgent, AgentError> {
    let system_prompt = render_global_file("question_answer.md", &PromptContext::today())?;
    let tools = ToolRegistry::new()
        .with_handler(Arc::new(VisitWebsiteTool::new(fetcher.clone())))
        .with_handler(Arc::new(FindArticlesTool::new(
            search,
            fetcher,
            Arc::clone(&provider),
        )));

    Ok(SpecialistAgent::new(
        QUESTION_ANSWER_NAME,
        provider,
        system_prompt,
        DIRECT_INSTRUCTION,
        SYNTHESIS_INSTRUCTION,
        tools,
    )
    .with_evaluator(evaluator))
}
