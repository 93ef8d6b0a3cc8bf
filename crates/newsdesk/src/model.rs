use serde::{Deserialize, Serialize};

/// Model name plus the sampling knobs sent with every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl ModelConfig {
    pub fn new(model_name: String) -> Self {
        Self {
            model_name,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temp: Option<f32>) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: Option<i32>) -> Self {
        self.max_tokens = tokens;
        self
    }
}
