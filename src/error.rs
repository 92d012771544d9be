//! Error types for the ledger.
//!
//! File-level upload failures carry the exact message shown to the caller.
//! Row-level failures are not errors at all: a bad row is simply dropped.

use thiserror::Error;

/// Reasons an uploaded file is rejected before any row is parsed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("Expected csv file with extension: '.csv', found file type of '.{0}'")]
    WrongExtension(String),

    #[error("CSV file is larger than {} MB", mebibytes(.limit_bytes))]
    TooLarge { limit_bytes: u64 },

    #[error("CSV file is corrupt")]
    Corrupt,

    /// The multipart form had no `transactions` file field
    #[error("No file was submitted.")]
    Missing,
}

/// Errors surfaced by the ingestion pipeline
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

fn mebibytes(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}
