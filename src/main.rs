use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use tax_ledger::{
    generate_report, import_upload, init_tracing, LedgerConfig, SqliteStore, TransactionStore,
    TransactionView,
};

/// Import CSV ledgers and report income against expenses
#[derive(Debug, Parser)]
#[command(name = "tax-ledger", version)]
struct Cli {
    #[command(flatten)]
    config: LedgerConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a headerless `date,type,amount,memo` CSV file
    Import {
        /// Path to the .csv file
        file: PathBuf,
    },
    /// Print expenses, gross revenue and net revenue as JSON
    Report,
    /// Print every stored transaction, one JSON object per line
    List,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let store = SqliteStore::open(&cli.config.db_path)?;

    match cli.command {
        Command::Import { file } => run_import(&store, &file, cli.config.max_upload_bytes)?,
        Command::Report => run_report(&store)?,
        Command::List => run_list(&store)?,
    }

    Ok(())
}

fn run_import(store: &SqliteStore, file: &Path, max_upload_bytes: u64) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    info!("Importing {:?}", file);
    let created = import_upload(store, &file_name, &bytes, max_upload_bytes)?;

    println!("✓ Imported {} transactions from {}", created.len(), file_name);
    println!("✓ Ledger now holds {} transactions", store.count()?);

    Ok(())
}

fn run_report(store: &SqliteStore) -> Result<()> {
    let report = generate_report(store)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_list(store: &SqliteStore) -> Result<()> {
    for record in store.all()? {
        println!("{}", serde_json::to_string(&TransactionView::from(&record))?);
    }
    Ok(())
}
