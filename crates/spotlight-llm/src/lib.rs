pub mod client;
pub mod providers;
pub mod retry;
pub mod streaming;

pub use client::{validate_model_config, ModelClient, ModelEvent};
pub use providers::OpenAiClient;
pub use retry::RetryingClient;
