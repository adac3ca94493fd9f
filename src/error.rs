//! Crate-wide error taxonomy.
//!
//! Leaf components return `OrchestratorError` (or convert into it); the
//! orchestrator loop is the single place that maps an error into a
//! user-visible `error` event. The `Tool` trait boundary keeps its own
//! `Result<ToolResult, String>` shape so third-party tool plug-ins are
//! simplest to write against.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("unsafe path: {0}")]
    PathUnsafe(String),

    #[error("denied: {0}")]
    PolicyDenied(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("output exceeded cap of {cap} bytes")]
    OutputCapExceeded { cap: usize, truncated: String },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("handler failure: {0}")]
    Handler(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl OrchestratorError {
    /// Whether this error class is eligible for a bounded backoff retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OrchestratorError::Transient(_))
            || matches!(self, OrchestratorError::Timeout(_))
    }

    /// Classify a free-form error message the way chunk-processing
    /// failures are classified: messages mentioning rate limiting,
    /// timeouts, or "temporary" are recoverable.
    pub fn classify_message(message: &str) -> bool {
        let lower = message.to_lowercase();
        lower.contains("rate limit") || lower.contains("timeout") || lower.contains("temporary")
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        OrchestratorError::Handler(e.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        OrchestratorError::Validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
