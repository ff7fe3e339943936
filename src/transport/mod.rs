pub mod http;

pub use http::{probe_health, HealthReport, HttpTransport};

use async_trait::async_trait;
use serde_json::Value;

/// What the wire gave back before any interpretation. Status and body are
/// classified by the submission client, not here.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Failures below the HTTP layer. These are the only retryable errors.
#[derive(Debug, Clone)]
pub enum TransportError {
    Network(String),
    Timeout(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Network(msg) => write!(f, "network error: {msg}"),
            TransportError::Timeout(msg) => write!(f, "timeout: {msg}"),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, payload: &Value) -> Result<RawResponse, TransportError>;
}
