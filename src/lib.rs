// Tax Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod record;
pub mod report;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::{init_tracing, LedgerConfig};
pub use db::{setup_database, SqliteStore, TransactionStore};
pub use error::{LedgerError, UploadError};
pub use ingest::{
    import_upload, parse_csv, parse_row, validate_upload, ParsedRows, DEFAULT_MAX_UPLOAD_BYTES,
};
pub use record::{
    classify_memo, to_major_units, EntryType, MemoType, TransactionRecord, TransactionView,
    MAX_MEMO_LEN,
};
pub use report::{build_report, generate_report, Report};
