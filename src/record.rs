// Ledger entry model
// One income or expense line, amounts held as integer cents

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

/// Longest memo the ledger stores
pub const MAX_MEMO_LEN: usize = 16;

// ============================================================================
// ENTRY TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    /// Storage code, also the wire value
    pub fn code(&self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
        }
    }

    /// Case-insensitive parse; anything other than income/expense is rejected
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "income" => Some(EntryType::Income),
            "expense" => Some(EntryType::Expense),
            _ => None,
        }
    }
}

// ============================================================================
// MEMO CLASSIFICATION
// ============================================================================

/// Display classification of a memo, derived at read time and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoType {
    #[serde(rename = "Job Address")]
    JobAddress,
    #[serde(rename = "Expense Category")]
    ExpenseCategory,
}

fn address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\s+\w+\s*\w*$").expect("address regex"))
}

/// Classify a memo as a street address or an expense category.
///
/// Addresses look like `<digits> <word>[ <word>]`, e.g. "123 Main St".
pub fn classify_memo(memo: &str) -> MemoType {
    if address_re().is_match(memo) {
        MemoType::JobAddress
    } else {
        MemoType::ExpenseCategory
    }
}

// ============================================================================
// MONEY
// ============================================================================

/// Minor units (cents) to major units, rounded to 2 decimal places.
///
/// Accepts `i128` so ledger-wide totals can be converted without overflow.
pub fn to_major_units(minor: impl Into<i128>) -> f64 {
    ((minor.into() as f64 / 100.0) * 100.0).round() / 100.0
}

// ============================================================================
// TRANSACTION RECORD
// ============================================================================

/// A single ledger entry.
///
/// Records are created in bulk by the importer and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Stable identity, generated once at creation
    pub id: Uuid,
    pub date: NaiveDate,
    pub entry_type: EntryType,
    /// Signed amount in cents
    pub amount_minor: i64,
    pub memo: String,
}

impl TransactionRecord {
    pub fn new(date: NaiveDate, entry_type: EntryType, amount_minor: i64, memo: String) -> Self {
        TransactionRecord {
            id: Uuid::new_v4(),
            date,
            entry_type,
            amount_minor,
            memo,
        }
    }

    /// Amount in dollars
    pub fn amount_major(&self) -> f64 {
        to_major_units(self.amount_minor)
    }

    pub fn memo_type(&self) -> MemoType {
        classify_memo(&self.memo)
    }
}

/// Wire shape of a stored record, with derived fields filled in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: Uuid,
    pub date: NaiveDate,
    pub entry_type: EntryType,
    pub memo: String,
    pub amount: f64,
    pub memo_type: MemoType,
}

impl From<&TransactionRecord> for TransactionView {
    fn from(record: &TransactionRecord) -> Self {
        TransactionView {
            id: record.id,
            date: record.date,
            entry_type: record.entry_type,
            memo: record.memo.clone(),
            amount: record.amount_major(),
            memo_type: record.memo_type(),
        }
    }
}
