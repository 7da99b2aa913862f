use serde::{Deserialize, Serialize};

/// Status code a server uses to confirm it is throttling the client.
pub const RATE_LIMITED_STATUS: u16 = 503;

/// A completed HTTP round-trip as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransportResponse {
    /// HTTP response status code (e.g. 200, 503).
    pub status: u16,

    /// Response body decoded as UTF-8 (replacement characters for invalid
    /// sequences).
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `true` when the server explicitly signalled throttling.
    pub fn is_rate_limited(&self) -> bool {
        self.status == RATE_LIMITED_STATUS
    }
}
