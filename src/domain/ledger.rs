use serde::{Deserialize, Serialize};

use super::{Cents, CommissionTransaction, PayoutRequest, PayoutStatus, ProviderRef};

/// Where a provider's commission money stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderBalance {
    /// Sum of completed commissions
    pub earned: Cents,
    /// Pending and processing payouts
    pub reserved: Cents,
    /// Completed payouts
    pub paid_out: Cents,
    /// earned - reserved - paid_out
    pub available: Cents,
}

impl ProviderBalance {
    pub fn new(earned: Cents, reserved: Cents, paid_out: Cents) -> Self {
        Self {
            earned,
            reserved,
            paid_out,
            available: earned - reserved - paid_out,
        }
    }
}

/// Compute a provider's balance from its ledger rows.
/// Only completed commissions count as earned; failed payouts release their funds.
pub fn compute_balance(
    provider: ProviderRef,
    transactions: &[CommissionTransaction],
    payouts: &[PayoutRequest],
) -> ProviderBalance {
    let earned = transactions
        .iter()
        .filter(|tx| tx.provider == provider && tx.is_completed())
        .map(|tx| tx.amount_cents)
        .sum();

    let (reserved, paid_out) = payouts
        .iter()
        .filter(|p| p.provider == provider)
        .fold((0, 0), |(reserved, paid_out), p| match p.status {
            PayoutStatus::Pending | PayoutStatus::Processing => {
                (reserved + p.requested_amount, paid_out)
            }
            PayoutStatus::Completed => (reserved, paid_out + p.requested_amount),
            PayoutStatus::Failed => (reserved, paid_out),
        });

    ProviderBalance::new(earned, reserved, paid_out)
}

/// Check that a withdrawal fits in the available balance.
pub fn validate_payout(requested: Cents, balance: &ProviderBalance) -> Result<(), PayoutError> {
    if requested <= 0 {
        return Err(PayoutError::NonPositiveAmount(requested));
    }
    if requested > balance.available {
        return Err(PayoutError::ExceedsAvailableBalance {
            available: balance.available,
            requested,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutError {
    NonPositiveAmount(Cents),
    ExceedsAvailableBalance { available: Cents, requested: Cents },
}

impl std::fmt::Display for PayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutError::NonPositiveAmount(amount) => {
                write!(f, "Payout amount must be positive, got {} cents", amount)
            }
            PayoutError::ExceedsAvailableBalance {
                available,
                requested,
            } => write!(
                f,
                "Payout of {} cents exceeds available balance of {} cents",
                requested, available
            ),
        }
    }
}

impl std::error::Error for PayoutError {}
