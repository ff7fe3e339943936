use crate::submit::{SubmissionOutcome, Submitter};
use crate::transport::Transport;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Stable identity of one submission, independent of completion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitKey {
    pub source: String,
    /// 1-based for chunk submissions, None for whole documents.
    pub chunk_index: Option<u32>,
}

impl std::fmt::Display for UnitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.chunk_index {
            Some(i) => write!(f, "{}#chunk{}", self.source, i),
            None => write!(f, "{}", self.source),
        }
    }
}

pub struct DispatchUnit {
    pub key: UnitKey,
    pub payload: Value,
}

/// Runs every unit through the submitter with at most `max_concurrency`
/// submissions in flight. Failures never cancel sibling units, and the
/// returned outcomes line up with the input units one-to-one.
pub async fn run_units<T: Transport>(
    submitter: &Submitter<T>,
    units: Vec<DispatchUnit>,
    max_concurrency: usize,
) -> Vec<(UnitKey, SubmissionOutcome)> {
    let gate = Arc::new(Semaphore::new(max_concurrency.max(1)));

    let tasks: Vec<_> = units
        .into_iter()
        .map(|unit| {
            let gate = gate.clone();
            async move {
                // The gate is never closed, so ok() always holds a permit
                // for the duration of the submission.
                let _permit = gate.acquire().await.ok();
                debug!("submitting {}", unit.key);
                let outcome = submitter.submit(&unit.payload).await;
                (unit.key, outcome)
            }
        })
        .collect();

    join_all(tasks).await
}
