use thiserror::Error;

#[derive(Debug, Error)]
pub enum ItineroError {
    // Tool errors
    #[error("tool call failed: {tool}: {message}")]
    Tool {
        tool: String,
        message: String,
        transient: bool,
    },

    #[error("tool timeout after {timeout_ms}ms: {tool}")]
    ToolTimeout { tool: String, timeout_ms: u64 },

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    // Contract violations, always fatal and never retried
    #[error("validation failed: {0}")]
    Validation(String),

    // Parallel group aggregate failure
    #[error("parallel group '{group}' failed required branches: {failed:?}")]
    Branches { group: String, failed: Vec<String> },

    // Workflow cancelled; terminal, no resume
    #[error("workflow cancelled")]
    Cancelled,

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ItineroError {
    /// Whether the tool gateway may retry this failure.
    ///
    /// Timeouts are retryable until the budget is exhausted, at which point
    /// the gateway converts them into a permanent `Tool` failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Tool {
                transient: true,
                ..
            } | Self::ToolTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ItineroError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let transient = ItineroError::Tool {
            tool: "check_visa_requirements".into(),
            message: "503 upstream".into(),
            transient: true,
        };
        let permanent = ItineroError::Tool {
            tool: "check_visa_requirements".into(),
            message: "invalid nationality".into(),
            transient: false,
        };
        let timeout = ItineroError::ToolTimeout {
            tool: "query_multimodal_routes".into(),
            timeout_ms: 5000,
        };

        assert!(transient.is_transient());
        assert!(!permanent.is_transient());
        assert!(timeout.is_transient());
        assert!(!ItineroError::Validation("overlap".into()).is_transient());
        assert!(!ItineroError::Cancelled.is_transient());
    }
}
