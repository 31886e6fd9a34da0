use thiserror::Error;

/// Transport-level failures while talking to an upstream service.
///
/// None of these carry an upstream *answer*: an HTTP response with any status
/// code and a readable body is a successful call as far as this layer is
/// concerned.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u128 },

    #[error("failed to connect to upstream: {0}")]
    Connect(String),

    #[error("upstream request failed: {0}")]
    Request(String),

    #[error("failed to read upstream response body: {0}")]
    Body(String),

    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },
}

impl UpstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Failed before any byte of a response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Connect(_) | Self::Request(_)
        )
    }
}
