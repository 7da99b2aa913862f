use std::time::Duration;

use async_trait::async_trait;

use crate::http::response::TransportResponse;

/// Why a request produced no HTTP response at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// A client able to issue a GET and hand back the status and body.
///
/// Implementations must be shareable across the concurrent workers of a
/// sample. Non-2xx statuses are responses, not errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_includes_duration() {
        let err = TransportError::Timeout(Duration::from_secs(20));
        assert_eq!(err.to_string(), "request timed out after 20s");
    }

    #[test]
    fn connect_display() {
        let err = TransportError::Connect("refused".to_string());
        assert_eq!(err.to_string(), "connection failed: refused");
    }
}
