use crate::util::ensure_dir;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Terminal result for one source file.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Success {
        source: String,
        response_bytes: usize,
        response_file: Option<String>,
        timestamp: String,
    },
    Chunked {
        source: String,
        total_chunks: u32,
        successful_chunks: u32,
        failed_chunks: u32,
        chunks: Vec<ChunkRecord>,
        merged_file: Option<String>,
        timestamp: String,
    },
    Error {
        source: String,
        error_kind: String,
        error_message: String,
        timestamp: String,
    },
}

impl FileOutcome {
    pub fn source(&self) -> &str {
        match self {
            FileOutcome::Success { source, .. } => source,
            FileOutcome::Chunked { source, .. } => source,
            FileOutcome::Error { source, .. } => source,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            FileOutcome::Success { .. } => "success",
            FileOutcome::Chunked { .. } => "chunked",
            FileOutcome::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkRecord {
    pub chunk_index: u32,
    pub status: String,
    pub response_file: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

/// Everything one invocation produced. Immutable once built.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub started: String,
    pub finished: String,
    pub elapsed_seconds: f64,
    pub files: Vec<FileOutcome>,
}

impl RunSummary {
    /// (success, chunked, error) file counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for f in &self.files {
            match f {
                FileOutcome::Success { .. } => counts.0 += 1,
                FileOutcome::Chunked { .. } => counts.1 += 1,
                FileOutcome::Error { .. } => counts.2 += 1,
            }
        }
        counts
    }
}

/// One row per file, shaped for tabular export.
#[derive(Debug, Serialize)]
pub struct SummaryRow {
    pub filename: String,
    pub status: String,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub total_chunks: Option<u32>,
    pub successful_chunks: Option<u32>,
    pub failed_chunks: Option<u32>,
    pub response_file: Option<String>,
    pub merged_file: Option<String>,
    pub elapsed_seconds: f64,
    pub timestamp: String,
}

/// Per-chunk breakdown for chunked files, keyed by (filename, chunk_index).
#[derive(Debug, Serialize)]
pub struct ChunkDetailRow {
    pub filename: String,
    pub chunk_index: u32,
    pub status: String,
    pub response_file: Option<String>,
    pub error_message: Option<String>,
}

pub fn build_rows(summary: &RunSummary) -> (Vec<SummaryRow>, Vec<ChunkDetailRow>) {
    let mut rows = Vec::with_capacity(summary.files.len());
    let mut chunk_rows = Vec::new();

    for file in &summary.files {
        match file {
            FileOutcome::Success {
                source,
                response_file,
                timestamp,
                ..
            } => rows.push(SummaryRow {
                filename: source.clone(),
                status: "success".to_string(),
                error_kind: None,
                error_message: None,
                total_chunks: None,
                successful_chunks: None,
                failed_chunks: None,
                response_file: response_file.clone(),
                merged_file: None,
                elapsed_seconds: summary.elapsed_seconds,
                timestamp: timestamp.clone(),
            }),
            FileOutcome::Chunked {
                source,
                total_chunks,
                successful_chunks,
                failed_chunks,
                chunks,
                merged_file,
                timestamp,
            } => {
                rows.push(SummaryRow {
                    filename: source.clone(),
                    status: "chunked".to_string(),
                    error_kind: None,
                    error_message: None,
                    total_chunks: Some(*total_chunks),
                    successful_chunks: Some(*successful_chunks),
                    failed_chunks: Some(*failed_chunks),
                    response_file: None,
                    merged_file: merged_file.clone(),
                    elapsed_seconds: summary.elapsed_seconds,
                    timestamp: timestamp.clone(),
                });
                for chunk in chunks {
                    chunk_rows.push(ChunkDetailRow {
                        filename: source.clone(),
                        chunk_index: chunk.chunk_index,
                        status: chunk.status.clone(),
                        response_file: chunk.response_file.clone(),
                        error_message: chunk.error_message.clone(),
                    });
                }
            }
            FileOutcome::Error {
                source,
                error_kind,
                error_message,
                timestamp,
            } => rows.push(SummaryRow {
                filename: source.clone(),
                status: "error".to_string(),
                error_kind: Some(error_kind.clone()),
                error_message: Some(error_message.clone()),
                total_chunks: None,
                successful_chunks: None,
                failed_chunks: None,
                response_file: None,
                merged_file: None,
                elapsed_seconds: summary.elapsed_seconds,
                timestamp: timestamp.clone(),
            }),
        }
    }

    (rows, chunk_rows)
}

/// Narrow write interface the run hands its rows to. Export adapters live
/// behind this seam.
pub trait ResultSink {
    fn write(&mut self, rows: &[SummaryRow], chunk_rows: &[ChunkDetailRow]) -> Result<()>;
}

pub struct JsonFileSink {
    report_path: PathBuf,
    chunk_details_path: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: &Path, report_filename: &str, chunk_details_filename: &str) -> Self {
        Self {
            report_path: dir.join(report_filename),
            chunk_details_path: dir.join(chunk_details_filename),
        }
    }
}

impl ResultSink for JsonFileSink {
    fn write(&mut self, rows: &[SummaryRow], chunk_rows: &[ChunkDetailRow]) -> Result<()> {
        if let Some(parent) = self.report_path.parent() {
            ensure_dir(parent)?;
        }
        std::fs::write(&self.report_path, serde_json::to_string_pretty(rows)?)
            .with_context(|| format!("writing report: {}", self.report_path.display()))?;

        // Chunk details only exist for runs that split something.
        if !chunk_rows.is_empty() {
            std::fs::write(
                &self.chunk_details_path,
                serde_json::to_string_pretty(chunk_rows)?,
            )
            .with_context(|| {
                format!("writing chunk details: {}", self.chunk_details_path.display())
            })?;
        }
        Ok(())
    }
}
