pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod payload;
pub mod traits;
pub mod types;

pub use config::EngineConfig;
pub use error::{Result, SpotlightError};
pub use event::{CanonicalEvent, FinishReason, ToolStatus, Usage};
pub use payload::{ExecutionPayload, ModelConfig, ToolConfig, Vault};
pub use types::*;
