use crate::{
    chunk_plan::{plan, ChunkPlan, WorkUnit},
    config::Config,
    dispatch::{run_units, DispatchUnit, UnitKey},
    merge,
    merge::ChunkResult,
    report::{FileOutcome, RunSummary},
    submit::{SubmissionOutcome, Submitter},
    transport::Transport,
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

pub struct Pipeline<T: Transport> {
    cfg: Config,
    submitter: Submitter<T>,
}

enum PlannedFile {
    Whole { name: String },
    Chunked { plan: ChunkPlan },
    Failed { outcome: FileOutcome },
}

impl<T: Transport> Pipeline<T> {
    pub fn new(cfg: &Config, submitter: Submitter<T>) -> Self {
        Self {
            cfg: cfg.clone(),
            submitter,
        }
    }

    /// Processes every *.json file in `input_dir`, writing response bodies
    /// under `run_dir`. Only directory enumeration failure is fatal; every
    /// per-file problem degrades to an error outcome in the summary.
    pub async fn run_dir(&self, input_dir: &Path, run_dir: &Path) -> Result<RunSummary> {
        let run_started = Instant::now();
        let started = now_rfc3339();

        let files = discover_json_files(input_dir)?;
        if files.is_empty() {
            warn!("no JSON files found in {}", input_dir.display());
        } else {
            info!("found {} JSON files to process", files.len());
        }

        let responses_dir = run_dir.join("responses");
        if self.cfg.output.write_responses || self.cfg.output.write_merged {
            ensure_dir(&responses_dir)?;
        }

        // Everything is read and planned before the first request goes out;
        // the dispatcher sees one flat unit list across all files.
        let mut planned: Vec<PlannedFile> = Vec::with_capacity(files.len());
        let mut units: Vec<DispatchUnit> = Vec::new();

        for path in &files {
            let name = file_name_of(path);
            match read_document(path) {
                Ok(doc) => match plan(
                    &name,
                    doc,
                    &self.cfg.source.list_field,
                    self.cfg.chunking.threshold,
                ) {
                    WorkUnit::Whole(payload) => {
                        units.push(DispatchUnit {
                            key: UnitKey {
                                source: name.clone(),
                                chunk_index: None,
                            },
                            payload,
                        });
                        planned.push(PlannedFile::Whole { name });
                    }
                    WorkUnit::Chunked(chunk_plan) => {
                        info!(
                            "splitting {} items in {} into {} chunks",
                            chunk_plan.total_items,
                            name,
                            chunk_plan.total_chunks()
                        );
                        for slice in &chunk_plan.chunks {
                            units.push(DispatchUnit {
                                key: UnitKey {
                                    source: name.clone(),
                                    chunk_index: Some(slice.index),
                                },
                                payload: chunk_plan.request_payload(slice),
                            });
                        }
                        planned.push(PlannedFile::Chunked { plan: chunk_plan });
                    }
                },
                Err((kind, message)) => {
                    warn!("skipping {name}: {message}");
                    planned.push(PlannedFile::Failed {
                        outcome: FileOutcome::Error {
                            source: name,
                            error_kind: kind,
                            error_message: message,
                            timestamp: now_rfc3339(),
                        },
                    });
                }
            }
        }

        let outcomes = run_units(&self.submitter, units, self.cfg.run.max_concurrency).await;

        let mut by_source: HashMap<String, Vec<(Option<u32>, SubmissionOutcome)>> = HashMap::new();
        for (key, outcome) in outcomes {
            by_source
                .entry(key.source)
                .or_default()
                .push((key.chunk_index, outcome));
        }

        let mut file_outcomes = Vec::with_capacity(planned.len());
        for planned_file in planned {
            match planned_file {
                PlannedFile::Failed { outcome } => file_outcomes.push(outcome),
                PlannedFile::Whole { name } => {
                    file_outcomes.push(self.finish_whole(&name, &mut by_source, &responses_dir));
                }
                PlannedFile::Chunked { plan } => {
                    file_outcomes.push(self.finish_chunked(plan, &mut by_source, &responses_dir));
                }
            }
        }

        let summary = RunSummary {
            started,
            finished: now_rfc3339(),
            elapsed_seconds: run_started.elapsed().as_secs_f64(),
            files: file_outcomes,
        };
        let (ok, chunked, errors) = summary.counts();
        info!(
            "completed {} files in {:.2}s (success={ok} chunked={chunked} error={errors})",
            summary.files.len(),
            summary.elapsed_seconds
        );
        Ok(summary)
    }

    fn finish_whole(
        &self,
        name: &str,
        by_source: &mut HashMap<String, Vec<(Option<u32>, SubmissionOutcome)>>,
        responses_dir: &Path,
    ) -> FileOutcome {
        let recorded = by_source.remove(name).unwrap_or_default();
        let Some((_, outcome)) = recorded.into_iter().next() else {
            return FileOutcome::Error {
                source: name.to_string(),
                error_kind: "dispatch".to_string(),
                error_message: "no outcome recorded for submission".to_string(),
                timestamp: now_rfc3339(),
            };
        };

        let response_file = match &outcome {
            SubmissionOutcome::Success { body } if self.cfg.output.write_responses => {
                write_response_file(responses_dir, &format!("response_{name}"), body)
            }
            _ => None,
        };

        if outcome.is_success() {
            info!("processed {name} successfully");
        }
        merge::aggregate_whole(name, &outcome, response_file)
    }

    fn finish_chunked(
        &self,
        plan: ChunkPlan,
        by_source: &mut HashMap<String, Vec<(Option<u32>, SubmissionOutcome)>>,
        responses_dir: &Path,
    ) -> FileOutcome {
        let name = plan.source.clone();
        let total = plan.total_chunks();
        let recorded = by_source.remove(&name).unwrap_or_default();

        let results: Vec<ChunkResult> = recorded
            .into_iter()
            .map(|(index, outcome)| {
                let chunk_index = index.unwrap_or(0);
                let response_file = match &outcome {
                    SubmissionOutcome::Success { body } if self.cfg.output.write_responses => {
                        write_response_file(
                            responses_dir,
                            &format!("response_{name}_chunk{chunk_index}of{total}.json"),
                            body,
                        )
                    }
                    _ => None,
                };
                ChunkResult {
                    chunk_index,
                    outcome,
                    response_file,
                }
            })
            .collect();

        let aggregate = merge::aggregate_chunked(&plan, results);
        if aggregate.failed == 0 {
            info!("all {total} chunks processed successfully for {name}");
        } else {
            warn!(
                "{} of {total} chunks failed for {name}",
                aggregate.failed
            );
        }

        let merged_file = match &aggregate.merged {
            Some(doc) if self.cfg.output.write_merged => {
                write_response_file(responses_dir, &format!("merged_response_{name}"), doc)
            }
            _ => None,
        };

        FileOutcome::Chunked {
            source: name,
            total_chunks: aggregate.total,
            successful_chunks: aggregate.successful,
            failed_chunks: aggregate.failed,
            chunks: aggregate.records,
            merged_file,
            timestamp: now_rfc3339(),
        }
    }
}

fn discover_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("enumerating source directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("reading directory entry in {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            files.push(path);
        }
    }
    // Deterministic processing order regardless of directory iteration.
    files.sort();
    Ok(files)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_document(path: &Path) -> std::result::Result<Value, (String, String)> {
    let raw =
        std::fs::read_to_string(path).map_err(|err| ("io".to_string(), err.to_string()))?;
    serde_json::from_str(&raw).map_err(|err| ("json_decode".to_string(), err.to_string()))
}

/// Response persistence is best-effort; a failed write downgrades to a
/// missing path in the report, never a failed run.
fn write_response_file(dir: &Path, filename: &str, body: &Value) -> Option<String> {
    let path = dir.join(filename);
    let serialized = match serde_json::to_string_pretty(body) {
        Ok(serialized) => serialized,
        Err(err) => {
            warn!("could not serialize response for {}: {err}", path.display());
            return None;
        }
    };
    match std::fs::write(&path, serialized) {
        Ok(()) => Some(path.display().to_string()),
        Err(err) => {
            warn!("could not write {}: {err}", path.display());
            None
        }
    }
}
