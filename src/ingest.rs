// CSV ingestion pipeline
// Uploaded bytes → file checks → row-by-row parse → one bulk insert

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::db::TransactionStore;
use crate::error::{LedgerError, UploadError};
use crate::record::{EntryType, TransactionRecord, MAX_MEMO_LEN};

/// Default upload ceiling: 2.5 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2_621_440;

// ============================================================================
// FILE-LEVEL VALIDATION
// ============================================================================

/// Extension is everything after the last dot; a name without a dot is its own extension
pub fn file_extension(file_name: &str) -> &str {
    file_name.rsplit('.').next().unwrap_or(file_name)
}

/// Reject the whole upload unless it is a `.csv` within the size limit and valid UTF-8.
///
/// Checks run in order: extension, size, encoding. Nothing is parsed until all pass.
pub fn validate_upload<'a>(
    file_name: &str,
    bytes: &'a [u8],
    max_bytes: u64,
) -> Result<&'a str, UploadError> {
    let extension = file_extension(file_name);
    if extension != "csv" {
        return Err(UploadError::WrongExtension(extension.to_string()));
    }

    if bytes.len() as u64 > max_bytes {
        return Err(UploadError::TooLarge {
            limit_bytes: max_bytes,
        });
    }

    std::str::from_utf8(bytes).map_err(|e| {
        warn!("Uploaded file {} is not valid UTF-8: {}", file_name, e);
        UploadError::Corrupt
    })
}

// ============================================================================
// FIELD PARSERS
// ============================================================================

/// `YYYY-MM-DD`
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

pub fn parse_entry_type(value: &str) -> Option<EntryType> {
    EntryType::parse(value)
}

/// Decimal amount to cents, truncating anything past the second fractional digit.
///
/// Plain decimals ("1000.0", "-45.99", ".5") are converted exactly. Other
/// float spellings ("1e3") go through f64 and are truncated after scaling.
pub fn parse_amount(value: &str) -> Option<i64> {
    parse_decimal_minor(value).or_else(|| {
        let parsed: f64 = value.parse().ok()?;
        let minor = (parsed * 100.0).trunc();
        if minor.is_finite() && minor.abs() < i64::MAX as f64 {
            Some(minor as i64)
        } else {
            None
        }
    })
}

fn parse_decimal_minor(value: &str) -> Option<i64> {
    let (negative, unsigned) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let cents: String = fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(2)
        .collect();
    let cents: i64 = cents.parse().ok()?;

    let minor = whole.checked_mul(100)?.checked_add(cents)?;
    Some(if negative { -minor } else { minor })
}

/// Trimmed memo, rejected when empty or longer than the stored column
pub fn parse_memo(value: &str) -> Option<String> {
    let memo = value.trim();
    if memo.is_empty() || memo.chars().count() > MAX_MEMO_LEN {
        return None;
    }
    Some(memo.to_string())
}

// ============================================================================
// ROW & FILE PARSING
// ============================================================================

/// Build a record from one CSV row `[date, type, amount, memo, ...]`.
///
/// Returns `None` if any field fails; extra trailing fields are ignored.
pub fn parse_row<'r, I>(fields: I) -> Option<TransactionRecord>
where
    I: IntoIterator<Item = &'r str>,
{
    let mut fields = fields.into_iter();
    let date = parse_date(fields.next()?.trim())?;
    let entry_type = parse_entry_type(fields.next()?.trim())?;
    let amount_minor = parse_amount(fields.next()?.trim())?;
    let memo = parse_memo(fields.next()?)?;

    Some(TransactionRecord::new(date, entry_type, amount_minor, memo))
}

/// Result of parsing a whole file
#[derive(Debug, Default)]
pub struct ParsedRows {
    pub records: Vec<TransactionRecord>,
    /// Rows that failed validation; kept for logging only
    pub dropped: usize,
}

/// Parse headerless, comma-delimited text. Malformed rows are dropped silently.
pub fn parse_csv(text: &str) -> ParsedRows {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut parsed = ParsedRows::default();

    for result in reader.records() {
        match result.ok().and_then(|row| parse_row(row.iter())) {
            Some(record) => parsed.records.push(record),
            None => parsed.dropped += 1,
        }
    }

    parsed
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Validate an uploaded file, parse it, and persist the surviving rows in one bulk write.
///
/// Returns the records that were stored, in file order.
pub fn import_upload<S>(
    store: &S,
    file_name: &str,
    bytes: &[u8],
    max_bytes: u64,
) -> Result<Vec<TransactionRecord>, LedgerError>
where
    S: TransactionStore + ?Sized,
{
    let text = validate_upload(file_name, bytes, max_bytes).map_err(|e| {
        warn!("Rejected upload {}: {}", file_name, e);
        e
    })?;

    let parsed = parse_csv(text);
    debug!(
        "Parsed {}: {} valid rows, {} dropped",
        file_name,
        parsed.records.len(),
        parsed.dropped
    );

    let created = store.insert_many(&parsed.records)?;
    info!("{} transactions created from uploaded file", created);

    Ok(parsed.records)
}
