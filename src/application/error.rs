use thiserror::Error;

use crate::domain::{Cents, ProviderKind, TransactionStatus};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Commission transaction not found: {0}")]
    CommissionNotFound(String),

    #[error("Payout request not found: {0}")]
    PayoutNotFound(String),

    #[error("Provider {provider} is a {actual}, expected a {expected}")]
    ProviderKindMismatch {
        provider: String,
        expected: ProviderKind,
        actual: ProviderKind,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid payment details: {0}")]
    InvalidPaymentDetails(String),

    #[error("Cannot move {id} from {from} to {to}")]
    InvalidStatusTransition {
        id: String,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error(
        "Insufficient balance for provider {provider}: available {available}, requested {requested}"
    )]
    InsufficientBalance {
        provider: String,
        available: Cents,
        requested: Cents,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
