pub mod agents;
pub mod config;
pub mod message;
mod model;
pub mod prompt_template;
pub mod providers;
pub mod session;
pub mod streaming;
mod structured_outputs;
pub mod tools;
pub mod types;

pub use message::Message;
pub use model::ModelConfig;
pub use session::TurnSession;
pub use structured_outputs::generate_structured_outputs;
