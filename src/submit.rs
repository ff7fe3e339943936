use crate::config::Endpoint;
use crate::transport::{RawResponse, Transport, TransportError};
use crate::util::excerpt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    RemoteRejected,
    MalformedResponse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RemoteRejected => "remote_rejected",
            ErrorKind::MalformedResponse => "malformed_response",
        }
    }
}

/// Terminal result of submitting one work unit. Failures are data handed to
/// the aggregator, not errors.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Success { body: Value },
    Failure { kind: ErrorKind, message: String },
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success { .. })
    }
}

/// Transport faults may clear up on their own; a rejection or an unparseable
/// body is deterministic for the same payload.
pub fn is_retryable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Network | ErrorKind::Timeout)
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_endpoint(cfg: &Endpoint) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_secs(cfg.retry_base_delay_seconds),
            max_delay: Duration::from_secs(cfg.retry_max_delay_seconds),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait after failed attempt `k` (1-based): `base * 2^(k-1)`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let millis = (self.base_delay.as_millis() as u64).saturating_mul(1u64 << exponent);
        Duration::from_millis(millis).min(self.max_delay)
    }
}

pub struct Submitter<T: Transport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> Submitter<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Sends one payload, retrying retryable failures per the policy. Always
    /// resolves to an outcome; the last observed failure wins on exhaustion.
    pub async fn submit(&self, payload: &Value) -> SubmissionOutcome {
        let mut attempt = 1u32;
        loop {
            let outcome = match self.transport.post_json(payload).await {
                Ok(raw) => classify_response(raw),
                Err(err) => failure_from_transport(err),
            };

            match outcome {
                SubmissionOutcome::Failure { kind, message }
                    if is_retryable(kind) && attempt < self.policy.max_attempts() =>
                {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        "attempt {attempt} failed ({}: {message}); retrying in {:.1}s",
                        kind.as_str(),
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}

fn failure_from_transport(err: TransportError) -> SubmissionOutcome {
    match err {
        TransportError::Network(message) => SubmissionOutcome::Failure {
            kind: ErrorKind::Network,
            message,
        },
        TransportError::Timeout(message) => SubmissionOutcome::Failure {
            kind: ErrorKind::Timeout,
            message,
        },
    }
}

/// HTTP-level classification. Pure; never consults the retry policy.
pub fn classify_response(raw: RawResponse) -> SubmissionOutcome {
    if !(200..300).contains(&raw.status) {
        return SubmissionOutcome::Failure {
            kind: ErrorKind::RemoteRejected,
            message: format!(
                "API request failed: {} - {}",
                raw.status,
                excerpt(&raw.body, BODY_EXCERPT_CHARS)
            ),
        };
    }

    match serde_json::from_str::<Value>(&raw.body) {
        Ok(body) => SubmissionOutcome::Success { body },
        Err(err) => SubmissionOutcome::Failure {
            kind: ErrorKind::MalformedResponse,
            message: format!("response body is not JSON: {err}"),
        },
    }
}
