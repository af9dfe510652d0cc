//! Error taxonomy for parser generation and pagination crawling.

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;
use crate::storage::StorageError;

/// Result type used throughout the extraction pipeline.
pub type ExtractResult<T> = Result<T, ExtractError>;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Model output could not be turned into a usable code payload.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
    /// Generated code threw, lacked `extractProducts`, or returned a non-array.
    #[error("Execution error: {0}")]
    Execution(String),
    /// Routine ran but produced nothing recognizable as products.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("Navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },
    /// Page content could not be extracted within the retry budget.
    #[error("Content unavailable: {0}")]
    ContentUnavailable(String),
    /// No cached routine and nothing to generate one from.
    #[error("No extraction routine available for {0}")]
    NoParser(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Page host error: {0}")]
    Host(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Whether the reflection loop or the crawler absorbs this error locally
    /// instead of surfacing it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExtractError::MalformedResponse(_)
                | ExtractError::Execution(_)
                | ExtractError::ValidationFailed(_)
                | ExtractError::NavigationTimeout { .. }
                | ExtractError::ContentUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(ExtractError::MalformedResponse("x".into()).is_recoverable());
        assert!(ExtractError::ValidationFailed("x".into()).is_recoverable());
        assert!(ExtractError::NavigationTimeout {
            url: "https://x/list?page=2".into(),
            timeout: Duration::from_secs(30),
        }
        .is_recoverable());
        assert!(!ExtractError::NoParser("https://x/list".into()).is_recoverable());
        assert!(!ExtractError::Llm(LlmError::Connection("refused".into())).is_recoverable());
    }
}
