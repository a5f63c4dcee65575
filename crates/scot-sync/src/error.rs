//! Sync Errors
//!
//! Failure taxonomy shared by the transport, the orchestrator and the mutation flows.

use std::time::Duration;
use thiserror::Error;

/// Common result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Every way a request or a local precondition can fail.
///
/// `Clone` because a coalesced request hands the same outcome to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Backend unreachable, or answered with a non-2xx status
    #[error("network error: {0}")]
    Network(String),
    /// The request outlived its deadline
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// Superseded by a newer cycle or abandoned by the user
    #[error("request cancelled")]
    Cancelled,
    /// Well-formed envelope with a falsy `ok`
    #[error("{message}")]
    Api { message: String },
    /// Local precondition violated before anything was sent
    #[error("{0}")]
    Validation(String),
}

impl SyncError {
    pub fn api(message: impl Into<String>) -> Self {
        SyncError::Api { message: message.into() }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    /// Whether a write may be re-sent after this failure
    pub fn is_retryable(&self) -> bool {
        !self.is_cancelled() && !matches!(self, SyncError::Validation(_))
    }

    /// Text suitable for a toast or the sync-error banner
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Network(msg) if msg.is_empty() => "Network error".to_string(),
            SyncError::Network(msg) => msg.clone(),
            SyncError::Timeout(_) => "Request timed out".to_string(),
            SyncError::Cancelled => "Request cancelled".to_string(),
            SyncError::Api { message } => message.clone(),
            SyncError::Validation(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_backend_text() {
        assert_eq!(SyncError::api("Invalid id_token").user_message(), "Invalid id_token");
        assert_eq!(SyncError::Network("HTTP 502".into()).user_message(), "HTTP 502");
        assert_eq!(SyncError::Network(String::new()).user_message(), "Network error");
        assert_eq!(SyncError::Timeout(Duration::from_secs(15)).user_message(), "Request timed out");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SyncError::Network("down".into()).is_retryable());
        assert!(SyncError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(SyncError::api("nope").is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
        assert!(!SyncError::Validation("missing".into()).is_retryable());
    }

    #[test]
    fn test_timeout_display() {
        let err = SyncError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "request timed out after 1500ms");
    }
}
