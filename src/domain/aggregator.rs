use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Cents, CommissionCategory, CommissionTransaction, ProviderRef, TransactionStatus, split_shares,
};

/// Number of calendar months covered by the monthly breakdown.
pub const MONTHLY_WINDOW: usize = 6;

/// Commission totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBucket {
    pub year: i32,
    pub month: u32,
    /// "YYYY-MM"
    pub label: String,
    pub total: Cents,
    pub transaction_count: i64,
    pub prescription_count: i64,
    pub lab_booking_count: i64,
}

impl MonthlyBucket {
    fn empty(year: i32, month: u32) -> Self {
        Self {
            year,
            month,
            label: format!("{:04}-{:02}", year, month),
            total: 0,
            transaction_count: 0,
            prescription_count: 0,
            lab_booking_count: 0,
        }
    }
}

/// Aggregated view over a set of commission transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSummary {
    pub gross: Cents,
    pub host_share: Cents,
    pub developer_share: Cents,
    pub transaction_count: i64,
    pub prescription_count: i64,
    pub lab_booking_count: i64,
    /// Oldest month first, ending with the month of `as_of`
    pub monthly: Vec<MonthlyBucket>,
}

/// The `MONTHLY_WINDOW` (year, month) pairs ending with the month of `as_of`, oldest first.
pub fn month_window(as_of: DateTime<Utc>) -> Vec<(i32, u32)> {
    let current = as_of.year() * 12 + as_of.month0() as i32;
    (0..MONTHLY_WINDOW as i32)
        .rev()
        .map(|back| {
            let index = current - back;
            (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
        })
        .collect()
}

/// Summarize transactions: gross total, 70/30 split, category counts and
/// the last six monthly buckets. Every row counts toward the totals; only
/// rows dated inside the window land in a bucket.
pub fn summarize(transactions: &[CommissionTransaction], as_of: DateTime<Utc>) -> CommissionSummary {
    let mut monthly: Vec<MonthlyBucket> = month_window(as_of)
        .into_iter()
        .map(|(year, month)| MonthlyBucket::empty(year, month))
        .collect();

    let mut gross: Cents = 0;
    let mut prescription_count = 0;
    let mut lab_booking_count = 0;

    for tx in transactions {
        gross += tx.amount_cents;
        let is_prescription = tx.category == CommissionCategory::Prescription;
        let is_lab_booking = tx.category == CommissionCategory::LabBooking;
        prescription_count += is_prescription as i64;
        lab_booking_count += is_lab_booking as i64;

        let date = tx.transaction_date;
        if let Some(bucket) = monthly
            .iter_mut()
            .find(|b| b.year == date.year() && b.month == date.month())
        {
            bucket.total += tx.amount_cents;
            bucket.transaction_count += 1;
            bucket.prescription_count += is_prescription as i64;
            bucket.lab_booking_count += is_lab_booking as i64;
        }
    }

    let split = split_shares(gross);

    CommissionSummary {
        gross,
        host_share: split.host,
        developer_share: split.developer,
        transaction_count: transactions.len() as i64,
        prescription_count,
        lab_booking_count,
        monthly,
    }
}

/// Transactions belonging to one provider.
pub fn filter_by_provider(
    transactions: &[CommissionTransaction],
    provider: ProviderRef,
) -> Vec<CommissionTransaction> {
    transactions
        .iter()
        .filter(|tx| tx.provider == provider)
        .cloned()
        .collect()
}

/// Transactions in a given status.
pub fn filter_by_status(
    transactions: &[CommissionTransaction],
    status: TransactionStatus,
) -> Vec<CommissionTransaction> {
    transactions
        .iter()
        .filter(|tx| tx.status == status)
        .cloned()
        .collect()
}
