use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpotlightError {
    // Configuration errors (fail before execution starts)
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Unknown workflow_id: {0}")]
    UnknownWorkflow(String),

    #[error("Unknown native tool: {0}")]
    UnknownTool(String),

    // Model backend errors
    #[error("Model backend error: {0}")]
    ModelBackend(String),

    #[error("Model produced no data within {0}s")]
    ModelTimeout(u64),

    // Native tool input errors (converted to tool outcomes by the dispatcher)
    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpotlightError {
    /// Status code carried by the wire `error` event.
    pub fn wire_code(&self) -> u16 {
        match self {
            Self::Config(_)
            | Self::ConfigNotFound(_)
            | Self::UnknownWorkflow(_)
            | Self::UnknownTool(_) => 400,
            _ => 500,
        }
    }

    /// Message safe to put on the wire. Configuration errors describe the
    /// caller's own request; everything else stays generic and the detail
    /// only goes to local logs.
    pub fn wire_message(&self) -> String {
        match self {
            Self::Config(_)
            | Self::ConfigNotFound(_)
            | Self::UnknownWorkflow(_)
            | Self::UnknownTool(_) => self.to_string(),
            Self::ModelBackend(_) | Self::ModelTimeout(_) => {
                "Model call failed, check the model configuration and network".to_string()
            }
            _ => "Workflow execution failed".to_string(),
        }
    }

    pub fn is_config(&self) -> bool {
        self.wire_code() == 400
    }
}

pub type Result<T> = std::result::Result<T, SpotlightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_400() {
        assert_eq!(SpotlightError::UnknownWorkflow("x".into()).wire_code(), 400);
        assert_eq!(SpotlightError::UnknownTool("x".into()).wire_code(), 400);
        assert_eq!(SpotlightError::Config("bad".into()).wire_code(), 400);
        assert!(SpotlightError::Config("bad".into()).is_config());
    }

    #[test]
    fn backend_errors_map_to_500_with_generic_message() {
        let err = SpotlightError::ModelBackend("HTTP 401: key sk-live-123 rejected".into());
        assert_eq!(err.wire_code(), 500);
        assert!(!err.wire_message().contains("sk-live-123"));

        let err = SpotlightError::Internal("index out of bounds at graph.rs:12".into());
        assert_eq!(err.wire_message(), "Workflow execution failed");
    }

    #[test]
    fn unknown_workflow_message_names_the_id() {
        let err = SpotlightError::UnknownWorkflow("unknown_workflow".into());
        assert_eq!(err.wire_message(), "Unknown workflow_id: unknown_workflow");
    }
}
