use crate::chunk_plan::ChunkPlan;
use crate::document::DocumentShape;
use crate::report::{ChunkRecord, FileOutcome};
use crate::submit::SubmissionOutcome;
use crate::util::now_rfc3339;
use serde_json::{json, Value};
use tracing::warn;

/// One chunk's terminal result, plus where its response body was written.
#[derive(Debug)]
pub struct ChunkResult {
    pub chunk_index: u32,
    pub outcome: SubmissionOutcome,
    pub response_file: Option<String>,
}

/// Per-file rollup of chunk results. `merged` is populated only when every
/// chunk succeeded and reassembly found a mergeable shape.
#[derive(Debug)]
pub struct ChunkAggregate {
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
    pub records: Vec<ChunkRecord>,
    pub merged: Option<Value>,
}

pub fn aggregate_whole(
    source: &str,
    outcome: &SubmissionOutcome,
    response_file: Option<String>,
) -> FileOutcome {
    match outcome {
        SubmissionOutcome::Success { body } => FileOutcome::Success {
            source: source.to_string(),
            response_bytes: serde_json::to_string(body).map(|s| s.len()).unwrap_or(0),
            response_file,
            timestamp: now_rfc3339(),
        },
        SubmissionOutcome::Failure { kind, message } => FileOutcome::Error {
            source: source.to_string(),
            error_kind: kind.as_str().to_string(),
            error_message: message.clone(),
            timestamp: now_rfc3339(),
        },
    }
}

/// Re-imposes chunk order, counts successes, and attempts the merge. Merge
/// failure is soft: the aggregate still reports every chunk.
pub fn aggregate_chunked(plan: &ChunkPlan, mut results: Vec<ChunkResult>) -> ChunkAggregate {
    results.sort_by_key(|r| r.chunk_index);

    let total = results.len() as u32;
    let successful = results.iter().filter(|r| r.outcome.is_success()).count() as u32;
    let failed = total - successful;

    let merged = if failed == 0 && total > 1 {
        let merged = merge_chunk_responses(plan, &results);
        if merged.is_none() {
            warn!("could not merge chunk responses for {}", plan.source);
        }
        merged
    } else {
        None
    };

    let records = results
        .iter()
        .map(|r| match &r.outcome {
            SubmissionOutcome::Success { .. } => ChunkRecord {
                chunk_index: r.chunk_index,
                status: "success".to_string(),
                response_file: r.response_file.clone(),
                error_kind: None,
                error_message: None,
            },
            SubmissionOutcome::Failure { kind, message } => ChunkRecord {
                chunk_index: r.chunk_index,
                status: "error".to_string(),
                response_file: None,
                error_kind: Some(kind.as_str().to_string()),
                error_message: Some(message.clone()),
            },
        })
        .collect();

    ChunkAggregate {
        total,
        successful,
        failed,
        records,
        merged,
    }
}

/// Reassembles one logical document from successful chunk responses in
/// chunk_index order (callers pass results pre-sorted). Total over its
/// inputs: any shape mismatch yields None instead of an error.
pub fn merge_chunk_responses(plan: &ChunkPlan, results: &[ChunkResult]) -> Option<Value> {
    let mut merged_items: Vec<Value> = Vec::with_capacity(plan.total_items);

    for result in results {
        let body = match &result.outcome {
            SubmissionOutcome::Success { body } => body,
            SubmissionOutcome::Failure { .. } => return None,
        };
        let items = response_items(&plan.shape, body)?;
        merged_items.extend(items.iter().cloned());
    }

    match &plan.shape {
        DocumentShape::ObjectWithList { field } => {
            let mut map = plan.template.clone();
            let total_items = merged_items.len();
            map.insert(field.clone(), Value::Array(merged_items));
            map.insert(
                "merged_info".to_string(),
                json!({
                    "original_file": plan.source,
                    "chunk_count": results.len(),
                    "total_items": total_items,
                }),
            );
            Some(Value::Object(map))
        }
        _ => Some(Value::Array(merged_items)),
    }
}

/// Locates one chunk's item list inside its response body. The endpoint may
/// wrap the document in a `processed_data` envelope; root-list chunks were
/// submitted wrapped in `{"data": ...}` and may come back either way.
fn response_items<'a>(shape: &DocumentShape, body: &'a Value) -> Option<&'a Vec<Value>> {
    let doc = body.get("processed_data").unwrap_or(body);

    match shape {
        DocumentShape::ObjectWithList { field } => doc.get(field)?.as_array(),
        _ => match doc {
            Value::Array(items) => Some(items),
            Value::Object(_) => doc.get("data")?.as_array(),
            _ => None,
        },
    }
}
