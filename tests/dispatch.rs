use async_trait::async_trait;
use edit_relay::dispatch::{run_units, DispatchUnit, UnitKey};
use edit_relay::submit::{ErrorKind, RetryPolicy, SubmissionOutcome, Submitter};
use edit_relay::transport::{RawResponse, Transport, TransportError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 0,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    }
}

/// Tracks how many requests are in flight at once.
#[derive(Clone)]
struct GaugeTransport {
    current: Arc<AtomicUsize>,
    max_seen: Arc<AtomicUsize>,
}

impl GaugeTransport {
    fn new() -> Self {
        Self {
            current: Arc::new(AtomicUsize::new(0)),
            max_seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn max_seen(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for GaugeTransport {
    async fn post_json(&self, _payload: &Value) -> Result<RawResponse, TransportError> {
        let in_flight = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(in_flight, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(RawResponse {
            status: 200,
            body: r#"{"ok": true}"#.to_string(),
        })
    }
}

/// Rejects payloads whose id is even; accepts the rest.
struct SelectiveTransport;

#[async_trait]
impl Transport for SelectiveTransport {
    async fn post_json(&self, payload: &Value) -> Result<RawResponse, TransportError> {
        let id = payload["id"].as_u64().unwrap_or(0);
        if id % 2 == 0 {
            Ok(RawResponse {
                status: 400,
                body: format!("rejected id {id}"),
            })
        } else {
            Ok(RawResponse {
                status: 200,
                body: format!(r#"{{"id": {id}}}"#),
            })
        }
    }
}

fn unit(i: usize) -> DispatchUnit {
    DispatchUnit {
        key: UnitKey {
            source: format!("file-{i}.json"),
            chunk_index: None,
        },
        payload: json!({"id": i}),
    }
}

#[tokio::test]
async fn cap_bounds_in_flight_submissions() {
    let transport = GaugeTransport::new();
    let submitter = Submitter::new(transport.clone(), fast_policy());

    let units: Vec<DispatchUnit> = (0..50).map(unit).collect();
    let outcomes = run_units(&submitter, units, 5).await;

    assert_eq!(outcomes.len(), 50);
    assert!(outcomes.iter().all(|(_, o)| o.is_success()));
    assert!(
        transport.max_seen() <= 5,
        "saw {} in flight",
        transport.max_seen()
    );
    // The cap should actually be reached, not just respected.
    assert!(transport.max_seen() >= 2);
}

#[tokio::test]
async fn outcomes_keep_their_unit_keys() {
    let submitter = Submitter::new(SelectiveTransport, fast_policy());

    let units: Vec<DispatchUnit> = (0..10).map(unit).collect();
    let outcomes = run_units(&submitter, units, 3).await;

    assert_eq!(outcomes.len(), 10);
    for (i, (key, outcome)) in outcomes.iter().enumerate() {
        assert_eq!(key.source, format!("file-{i}.json"));
        match outcome {
            SubmissionOutcome::Success { body } => {
                assert_eq!(i % 2, 1);
                assert_eq!(body["id"].as_u64(), Some(i as u64));
            }
            SubmissionOutcome::Failure { kind, message } => {
                assert_eq!(i % 2, 0, "unexpected failure for {key}");
                assert_eq!(*kind, ErrorKind::RemoteRejected);
                assert!(message.contains(&format!("rejected id {i}")));
            }
        }
    }
}

#[tokio::test]
async fn failures_do_not_starve_siblings() {
    // Every unit resolves even when half the batch is rejected outright.
    let submitter = Submitter::new(SelectiveTransport, fast_policy());

    let units: Vec<DispatchUnit> = (0..20).map(unit).collect();
    let outcomes = run_units(&submitter, units, 4).await;

    let successes = outcomes.iter().filter(|(_, o)| o.is_success()).count();
    assert_eq!(successes, 10);
    assert_eq!(outcomes.len(), 20);
}
