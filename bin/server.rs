// Tax Ledger - Web Server

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use tax_ledger::api::{router, AppState};
use tax_ledger::{init_tracing, LedgerConfig, SqliteStore};

/// HTTP server for CSV uploads and the income/expense report
#[derive(Debug, Parser)]
#[command(name = "tax-ledger-server", version)]
struct ServerArgs {
    #[command(flatten)]
    config: LedgerConfig,

    /// Address to listen on
    #[arg(long, env = "LEDGER_BIND", default_value = "0.0.0.0:3000")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = ServerArgs::parse();

    let store = SqliteStore::open(&args.config.db_path)?;
    let app = router(AppState::new(store, args.config.max_upload_bytes));

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", args.bind))?;

    info!("Server running on http://{}", args.bind);
    info!("   Upload: POST /api/v1/tax/transactions/");
    info!("   Report: GET  /api/v1/tax/report/");

    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
