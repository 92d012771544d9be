// Income / expense report over the whole ledger

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::db::TransactionStore;
use crate::record::{to_major_units, EntryType, TransactionRecord};

/// Aggregate totals in major units (dollars)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub expenses: f64,
    #[serde(rename = "gross-revenue")]
    pub gross_revenue: f64,
    #[serde(rename = "net-revenue")]
    pub net_revenue: f64,
}

/// Build the report from a slice of records.
///
/// Totals are summed in cents as `i128`, wide enough for any number of
/// `i64` rows the store can hand back. Net revenue is taken from the cent
/// totals before conversion, so it never picks up a rounding difference.
pub fn build_report(records: &[TransactionRecord]) -> Report {
    let mut expenses: i128 = 0;
    let mut gross_revenue: i128 = 0;

    for record in records {
        let amount = i128::from(record.amount_minor);
        match record.entry_type {
            EntryType::Expense => expenses += amount,
            EntryType::Income => gross_revenue += amount,
        }
    }

    Report {
        expenses: to_major_units(expenses),
        gross_revenue: to_major_units(gross_revenue),
        net_revenue: to_major_units(gross_revenue - expenses),
    }
}

/// Full scan of the store
pub fn generate_report<S>(store: &S) -> Result<Report>
where
    S: TransactionStore + ?Sized,
{
    let records = store.all()?;
    Ok(build_report(&records))
}
