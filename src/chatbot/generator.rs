//! The seam between the conversation flow and the text-generation service.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::chatbot::prompt::PromptContext;

/// Errors from a generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Connection or transport failure.
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// Non-success status from the service (quota, bad request, outage).
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    /// The service refused to answer (safety filter).
    #[error("response blocked: {0}")]
    Blocked(String),
    #[error("empty response")]
    Empty,
}

impl GenerationError {
    /// Worth one more attempt: network trouble, timeouts and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Http(_) | GenerationError::Timeout(_) => true,
            GenerationError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Produces reply text for a built prompt.
///
/// Treated as a black box: no latency or retry behaviour is assumed beyond
/// "eventually returns text or fails".
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &PromptContext) -> Result<String, GenerationError>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GenerationError::Http("connection reset".into()).is_transient());
        assert!(GenerationError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(GenerationError::Api { status: 503, body: String::new() }.is_transient());
        assert!(!GenerationError::Api { status: 429, body: "quota".into() }.is_transient());
        assert!(!GenerationError::Api { status: 400, body: String::new() }.is_transient());
        assert!(!GenerationError::Blocked("SAFETY".into()).is_transient());
        assert!(!GenerationError::Empty.is_transient());
        assert!(!GenerationError::Parse("eof".into()).is_transient());
    }
}
