use std::sync::Arc;

use super::{AgentError, SpecialistAgent};
use crate::{
    prompt_template::{render_global_file, PromptContext},
    providers::Provider,
    tools::{
        news::{CustomDomainTool, NewsApiClient, TodayNewsTool},
        ToolRegistry,
    },
};

pub const PRESENTER_NAME: &str = "presenter";

const DIRECT_INSTRUCTION: &str =
    "Reply to the user directly. If they asked for news, explain which request forms you understand.";
const SYNTHESIS_INSTRUCTION: &str =
    "Use the tool results to craft the news in the required markdown format.";

/// Builds the news presenter: today's briefing and `./ domain` digests, no evaluator.
pub fn presenter(provider: Arc<dyn Provider>, news: NewsApiClient) -> Result<SpecialistAgent, AgentError> {
    let system_prompt = render_global_file("presenter.md", &PromptContext::today())?;
    let tools = ToolRegistry::new()
        .with_handler(Arc::new(TodayNewsTool::new(news.clone())))
        .with_handler(Arc::new(CustomDomainTool::new(news)));

    Ok(SpecialistAgent::new(
        PRESENTER_NAME,
        provider,
        system_prompt,
        DIRECT_INSTRUCTION,
        SYNTHESIS_INSTRUCTION,
        tools,
    ))
}
