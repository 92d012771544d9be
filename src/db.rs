use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::record::{EntryType, TransactionRecord, MAX_MEMO_LEN};

/// Datastore seam for the ingestion pipeline and report aggregator.
///
/// Records are keyed by their UUID. The set is flat and append-only.
pub trait TransactionStore {
    /// Store all records as one write. Either every record lands or none does.
    fn insert_many(&self, records: &[TransactionRecord]) -> Result<usize>;

    /// Every stored record, oldest date first
    fn all(&self) -> Result<Vec<TransactionRecord>>;

    fn count(&self) -> Result<i64>;
}

/// SQLite-backed store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file in WAL mode and ensure the schema exists
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {:?}", db_path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        setup_database(&conn)?;
        info!("Database opened: {:?}", db_path);
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY NOT NULL,
                date TEXT NOT NULL,
                entry_type TEXT NOT NULL CHECK (entry_type IN ('income', 'expense')),
                amount INTEGER NOT NULL,
                memo TEXT NOT NULL CHECK (length(memo) <= {})
            )",
            MAX_MEMO_LEN
        ),
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_date ON transactions(date)",
        [],
    )?;

    Ok(())
}

impl TransactionStore for SqliteStore {
    fn insert_many(&self, records: &[TransactionRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO transactions (id, date, entry_type, amount, memo)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for record in records {
                stmt.execute(params![
                    record.id.to_string(),
                    record.date.format("%Y-%m-%d").to_string(),
                    record.entry_type.code(),
                    record.amount_minor,
                    record.memo,
                ])
                .with_context(|| format!("Failed to insert transaction {}", record.id))?;
            }
        }
        tx.commit().context("Failed to commit bulk insert")?;

        Ok(records.len())
    }

    fn all(&self) -> Result<Vec<TransactionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, entry_type, amount, memo
             FROM transactions
             ORDER BY date, id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, date, entry_type, amount_minor, memo)| -> Result<TransactionRecord> {
                Ok(TransactionRecord {
                    id: Uuid::parse_str(&id)
                        .with_context(|| format!("Invalid transaction id {:?}", id))?,
                    date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                        .with_context(|| format!("Invalid date {:?} on {}", date, id))?,
                    entry_type: EntryType::parse(&entry_type)
                        .with_context(|| format!("Invalid entry type {:?} on {}", entry_type, id))?,
                    amount_minor,
                    memo,
                })
            })
            .collect()
    }

    fn count(&self) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

        Ok(count)
    }
}
