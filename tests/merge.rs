use edit_relay::chunk_plan::{plan, ChunkPlan, WorkUnit};
use edit_relay::merge::{aggregate_chunked, aggregate_whole, merge_chunk_responses, ChunkResult};
use edit_relay::report::FileOutcome;
use edit_relay::submit::{ErrorKind, SubmissionOutcome};
use serde_json::{json, Value};

fn items(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({"id": i})).collect()
}

fn chunked_plan(doc: Value, threshold: usize) -> ChunkPlan {
    match plan("input.json", doc, "data", threshold) {
        WorkUnit::Chunked(plan) => plan,
        WorkUnit::Whole(_) => panic!("expected a chunked work unit"),
    }
}

/// Response the endpoint would send back for one chunk: the edited chunk
/// document inside a processed_data envelope.
fn enveloped_response(plan: &ChunkPlan, index: usize) -> SubmissionOutcome {
    let chunk = &plan.chunks[index];
    SubmissionOutcome::Success {
        body: json!({
            "status": "success",
            "processed_data": plan.request_payload(chunk),
        }),
    }
}

fn failure(kind: ErrorKind) -> SubmissionOutcome {
    SubmissionOutcome::Failure {
        kind,
        message: "boom".to_string(),
    }
}

fn result(index: u32, outcome: SubmissionOutcome) -> ChunkResult {
    ChunkResult {
        chunk_index: index,
        outcome,
        response_file: None,
    }
}

#[test]
fn counts_and_skipped_merge_on_partial_failure() {
    let plan = chunked_plan(json!({"data": items(8)}), 2);
    assert_eq!(plan.total_chunks(), 4);

    let results = vec![
        result(1, enveloped_response(&plan, 0)),
        result(2, enveloped_response(&plan, 1)),
        result(3, failure(ErrorKind::Network)),
        result(4, enveloped_response(&plan, 3)),
    ];

    let aggregate = aggregate_chunked(&plan, results);
    assert_eq!(aggregate.total, 4);
    assert_eq!(aggregate.successful, 3);
    assert_eq!(aggregate.failed, 1);
    assert!(aggregate.merged.is_none());

    assert_eq!(aggregate.records.len(), 4);
    assert_eq!(aggregate.records[2].status, "error");
    assert_eq!(aggregate.records[2].error_kind.as_deref(), Some("network"));
}

#[test]
fn merge_reassembles_in_chunk_order() {
    let original = items(5);
    let doc = json!({"batch": "b-1", "data": original.clone()});
    let plan = chunked_plan(doc, 2);
    assert_eq!(plan.total_chunks(), 3);

    // Deliver results out of order; the aggregator re-imposes chunk order.
    let results = vec![
        result(3, enveloped_response(&plan, 2)),
        result(1, enveloped_response(&plan, 0)),
        result(2, enveloped_response(&plan, 1)),
    ];

    let aggregate = aggregate_chunked(&plan, results);
    assert_eq!(aggregate.failed, 0);

    let merged = aggregate.merged.expect("merge should succeed");
    assert_eq!(merged["batch"], "b-1");
    assert_eq!(merged["data"].as_array().map(|a| a.len()), Some(5));
    assert_eq!(merged["data"], json!(original));
    assert_eq!(merged["merged_info"]["original_file"], "input.json");
    assert_eq!(merged["merged_info"]["chunk_count"], 3);
    assert_eq!(merged["merged_info"]["total_items"], 5);
}

#[test]
fn merge_accepts_bare_responses() {
    let plan = chunked_plan(json!({"data": items(4)}), 2);

    // No processed_data envelope, just the chunk document.
    let results: Vec<ChunkResult> = (0..2)
        .map(|i| {
            result(
                i as u32 + 1,
                SubmissionOutcome::Success {
                    body: plan.request_payload(&plan.chunks[i]),
                },
            )
        })
        .collect();

    let merged = merge_chunk_responses(&plan, &results).expect("merge should succeed");
    assert_eq!(merged["data"].as_array().map(|a| a.len()), Some(4));
}

#[test]
fn root_list_merge_returns_a_bare_list() {
    let original = items(5);
    let plan = chunked_plan(Value::Array(original.clone()), 2);

    let results: Vec<ChunkResult> = plan
        .chunks
        .iter()
        .enumerate()
        .map(|(i, _)| result(i as u32 + 1, enveloped_response(&plan, i)))
        .collect();

    let merged = merge_chunk_responses(&plan, &results).expect("merge should succeed");
    assert_eq!(merged, json!(original));
}

#[test]
fn shape_mismatch_skips_merge_softly() {
    let plan = chunked_plan(json!({"data": items(4)}), 2);

    let results = vec![
        result(1, enveloped_response(&plan, 0)),
        result(
            2,
            SubmissionOutcome::Success {
                body: json!({"status": "success", "processed_data": {"rows": []}}),
            },
        ),
    ];

    let aggregate = aggregate_chunked(&plan, results);
    assert_eq!(aggregate.successful, 2);
    assert_eq!(aggregate.failed, 0);
    assert!(aggregate.merged.is_none());
    assert_eq!(aggregate.records.len(), 2);
}

#[test]
fn whole_outcomes_map_directly() {
    let success = aggregate_whole(
        "small.json",
        &SubmissionOutcome::Success {
            body: json!({"ok": true}),
        },
        Some("out/response_small.json".to_string()),
    );
    match success {
        FileOutcome::Success {
            source,
            response_bytes,
            response_file,
            ..
        } => {
            assert_eq!(source, "small.json");
            assert!(response_bytes > 0);
            assert_eq!(response_file.as_deref(), Some("out/response_small.json"));
        }
        other => panic!("expected success outcome, got {}", other.status()),
    }

    let failed = aggregate_whole("small.json", &failure(ErrorKind::Timeout), None);
    match failed {
        FileOutcome::Error {
            error_kind,
            error_message,
            ..
        } => {
            assert_eq!(error_kind, "timeout");
            assert_eq!(error_message, "boom");
        }
        other => panic!("expected error outcome, got {}", other.status()),
    }
}
