pub mod base;
pub mod errors;
mod factory;
pub mod formats;
pub mod openai;
pub mod utils;

pub use base::{MessageStream, Provider, ProviderCompleteResponse, ProviderExtractResponse, Usage};
pub use factory::create;
