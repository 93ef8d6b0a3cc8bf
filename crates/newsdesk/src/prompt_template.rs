use chrono::Local;
use include_dir::{include_dir, Dir};
use minijinja::{Environment, UndefinedBehavior};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::tools::outlets::{PAYWALLED_OUTLETS, TRUSTED_OUTLETS};

static PROMPTS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

/// Every file under `src/prompts`, registered by file name (e.g. `router.md`)
static GLOBAL_ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    for file in PROMPTS_DIR.files() {
        let (Some(name), Some(source)) = (file.path().to_str(), file.contents_utf8()) else {
            continue;
        };
        if let Err(e) = env.add_template(name, source) {
            tracing::error!("Failed to load prompt template {}: {}", name, e);
        }
    }
    env
});

/// Values available to every prompt template
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub current_date: String,
    pub paywalled_sources: Vec<&'static str>,
    pub trusted_sources: Vec<&'static str>,
}

impl PromptContext {
    pub fn today() -> Self {
        Self {
            current_date: Local::now().format("%Y-%m-%d").to_string(),
            paywalled_sources: PAYWALLED_OUTLETS.iter().map(|o| o.name).collect(),
            trusted_sources: TRUSTED_OUTLETS.to_vec(),
        }
    }
}

pub fn render_global_file<T: Serialize>(name: &str, context: &T) -> Result<String, minijinja::Error> {
    GLOBAL_ENV.get_template(name)?.render(context)
}
