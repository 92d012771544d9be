//! Runtime configuration shared by the CLI and the server.
//!
//! Every option can be given as a flag or through its environment variable.

use clap::Args;
use std::path::PathBuf;

use crate::ingest::DEFAULT_MAX_UPLOAD_BYTES;

#[derive(Debug, Clone, Args)]
pub struct LedgerConfig {
    /// SQLite database file
    #[arg(long, env = "LEDGER_DB_PATH", default_value = "ledger.db")]
    pub db_path: PathBuf,

    /// Largest accepted upload, in bytes
    #[arg(long, env = "LEDGER_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            db_path: PathBuf::from("ledger.db"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
