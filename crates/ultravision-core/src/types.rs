//! Core data types for the UltraVision batch pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Per-file metadata recorded with every output record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Source path as given to the run
    pub file: String,

    /// Size in bytes of the payload that was sent
    pub size_bytes: u64,

    /// MIME type derived from the file extension
    pub mime: String,

    /// SHA-256 of the original file bytes (dedup and resume key)
    pub sha256: String,

    /// Pixel width, when the image could be decoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Pixel height, when the image could be decoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// A group of files sent together in one chat-completions request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Position of the batch in the run, starting at 0
    pub index: usize,
    /// Files in send order
    pub files: Vec<PathBuf>,
}

/// Outcome of delivering one batch.
#[derive(Debug, Clone)]
pub enum BatchResult {
    /// The remote call succeeded; `response` is the raw JSON body.
    Success {
        files: Vec<PathBuf>,
        metas: Vec<FileMeta>,
        response: Value,
    },
    /// Retries were exhausted (or nothing in the batch was readable).
    Failure {
        files: Vec<PathBuf>,
        metas: Vec<FileMeta>,
        error: String,
    },
}

impl BatchResult {
    /// Files the batch was built from.
    pub fn files(&self) -> &[PathBuf] {
        match self {
            BatchResult::Success { files, .. } | BatchResult::Failure { files, .. } => files,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchResult::Success { .. })
    }
}

/// One persisted record per successful batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Files in the batch
    pub files: Vec<String>,

    /// Text extracted from the response
    pub text: String,

    /// Raw response body
    pub raw: Value,

    /// Per-file metadata, in batch order
    pub meta: Vec<FileMeta>,
}

/// A batch that exhausted its retries, as written to the failure log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBatch {
    pub files: Vec<String>,
    pub error: String,
}

/// Counters and locations reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Files matched by discovery (after the limit)
    pub discovered: usize,
    /// Files skipped because their content was already batched in this run
    pub duplicates: usize,
    /// Files skipped because their hash was found in previous output
    pub resumed: usize,
    /// Files that could not be read
    pub unreadable: usize,
    /// Batches dispatched
    pub batches: usize,
    /// Batches written to the output
    pub succeeded: usize,
    /// Batches written to the failure log
    pub failed: usize,
    /// Output file
    pub output_path: PathBuf,
    /// Output format name
    pub format: String,
    /// Failure log, when any batch failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_log: Option<PathBuf>,
}

pub(crate) fn display_paths(files: &[PathBuf]) -> Vec<String> {
    files.iter().map(|f| f.display().to_string()).collect()
}
