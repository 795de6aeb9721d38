use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Cents, CommissionSummary, CommissionTransaction, PayoutRequest, PayoutStatus, Provider,
    ProviderBalance, ProviderKind, compute_balance, filter_by_provider, summarize,
};

/// Number of transactions shown on a provider dashboard.
pub const RECENT_TRANSACTIONS: usize = 10;

/// Platform-wide view for administrators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDashboard {
    pub as_of: DateTime<Utc>,
    pub summary: CommissionSummary,
    pub pharmacy_count: i64,
    pub laboratory_count: i64,
    pub pending_payout_count: i64,
    pub pending_payout_amount: Cents,
    pub total_paid_out: Cents,
    pub providers: Vec<ProviderRow>,
}

/// One line of the admin per-provider breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRow {
    pub provider_id: uuid::Uuid,
    pub name: String,
    pub kind: ProviderKind,
    pub gross: Cents,
    pub transaction_count: i64,
    pub balance: ProviderBalance,
}

/// A pharmacy's or laboratory's view of its own commissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDashboard {
    pub as_of: DateTime<Utc>,
    pub provider: Provider,
    pub summary: CommissionSummary,
    pub balance: ProviderBalance,
    pub payouts: Vec<PayoutRequest>,
    /// Newest first
    pub recent_transactions: Vec<CommissionTransaction>,
}

/// Build the admin dashboard from a full scan of the ledger.
pub fn build_admin_dashboard(
    providers: &[Provider],
    transactions: &[CommissionTransaction],
    payouts: &[PayoutRequest],
    as_of: DateTime<Utc>,
) -> AdminDashboard {
    let count_kind = |kind: ProviderKind| providers.iter().filter(|p| p.kind == kind).count() as i64;

    let outstanding = payouts
        .iter()
        .filter(|p| matches!(p.status, PayoutStatus::Pending | PayoutStatus::Processing));

    let rows = providers
        .iter()
        .map(|provider| {
            let own = filter_by_provider(transactions, provider.reference());
            ProviderRow {
                provider_id: provider.id,
                name: provider.name.clone(),
                kind: provider.kind,
                gross: own.iter().map(|tx| tx.amount_cents).sum(),
                transaction_count: own.len() as i64,
                balance: compute_balance(provider.reference(), &own, payouts),
            }
        })
        .collect();

    AdminDashboard {
        as_of,
        summary: summarize(transactions, as_of),
        pharmacy_count: count_kind(ProviderKind::Pharmacy),
        laboratory_count: count_kind(ProviderKind::Laboratory),
        pending_payout_count: outstanding.clone().count() as i64,
        pending_payout_amount: outstanding.map(|p| p.requested_amount).sum(),
        total_paid_out: payouts
            .iter()
            .filter(|p| p.status == PayoutStatus::Completed)
            .map(|p| p.requested_amount)
            .sum(),
        providers: rows,
    }
}

/// Build a provider dashboard from that provider's own rows.
pub fn build_provider_dashboard(
    provider: Provider,
    transactions: &[CommissionTransaction],
    payouts: Vec<PayoutRequest>,
    as_of: DateTime<Utc>,
) -> ProviderDashboard {
    let reference = provider.reference();
    let own = filter_by_provider(transactions, reference);
    let balance = compute_balance(reference, &own, &payouts);

    let mut recent = own.clone();
    recent.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));
    recent.truncate(RECENT_TRANSACTIONS);

    ProviderDashboard {
        as_of,
        summary: summarize(&own, as_of),
        provider,
        balance,
        payouts,
        recent_transactions: recent,
    }
}
