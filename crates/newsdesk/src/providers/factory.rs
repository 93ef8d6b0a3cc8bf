use std::sync::Arc;

use anyhow::Result;

use super::{base::Provider, openai::OpenAiProvider};
use crate::{config::Config, model::ModelConfig};

pub fn create(name: &str, config: &Config, model: ModelConfig) -> Result<Arc<dyn Provider>> {
    // Arc so one provider can back the router and both agents
    match name {
        "openai" => Ok(Arc::new(OpenAiProvider::from_settings(config, model)?)),
        _ => Err(anyhow::anyhow!("Unknown provider: {}", name)),
    }
}
