use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, DEFAULT_COMMISSION_CENTS, ProviderRef};

pub type CommissionId = Uuid;

/// What kind of billable event produced a commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionCategory {
    Prescription,
    LabBooking,
    Other,
}

impl CommissionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionCategory::Prescription => "prescription",
            CommissionCategory::LabBooking => "lab_booking",
            CommissionCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "prescription" => Some(CommissionCategory::Prescription),
            "lab_booking" | "lab-booking" | "lab" => Some(CommissionCategory::LabBooking),
            "other" => Some(CommissionCategory::Other),
            _ => None,
        }
    }

    /// Derive a category from a free-text description.
    /// A row has exactly one category, so a description mentioning both
    /// "prescription" and "lab" counts once, as a prescription. Callers that
    /// know better pass the category explicitly.
    pub fn classify(description: &str) -> Self {
        let description = description.to_lowercase();
        if description.contains("prescription") {
            CommissionCategory::Prescription
        } else if description.contains("lab") {
            CommissionCategory::LabBooking
        } else {
            CommissionCategory::Other
        }
    }
}

impl std::fmt::Display for CommissionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle shared by commission transactions and payout requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "processing" => Some(TransactionStatus::Processing),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed
        )
    }

    /// Transitions allowed for commission transactions.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger row recording a fixed-fee billable event for one provider.
/// Rows are never deleted; only their status changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionTransaction {
    pub id: CommissionId,
    pub provider: ProviderRef,
    pub prescription_id: Option<String>,
    pub lab_booking_id: Option<String>,
    pub amount_cents: Cents,
    pub description: String,
    pub category: CommissionCategory,
    pub status: TransactionStatus,
    /// When the billable event happened
    pub transaction_date: DateTime<Utc>,
    /// When the row was written
    pub recorded_at: DateTime<Utc>,
}

impl CommissionTransaction {
    /// Create a completed commission. The category is derived from the description
    /// unless overridden with `with_category`.
    pub fn new(
        provider: ProviderRef,
        amount_cents: Cents,
        description: impl Into<String>,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        assert!(amount_cents > 0, "Commission amount must be positive");
        let description = description.into();
        Self {
            id: Uuid::new_v4(),
            provider,
            prescription_id: None,
            lab_booking_id: None,
            amount_cents,
            category: CommissionCategory::classify(&description),
            description,
            status: TransactionStatus::Completed,
            transaction_date,
            recorded_at: Utc::now(),
        }
    }

    /// Default-fee commission for an uploaded prescription.
    pub fn for_prescription(
        provider: ProviderRef,
        prescription_id: impl Into<String>,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        let mut commission = Self::new(
            provider,
            DEFAULT_COMMISSION_CENTS,
            "Prescription upload commission",
            transaction_date,
        );
        commission.prescription_id = Some(prescription_id.into());
        commission.category = CommissionCategory::Prescription;
        commission
    }

    /// Default-fee commission for a laboratory booking.
    pub fn for_lab_booking(
        provider: ProviderRef,
        booking_id: impl Into<String>,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        let mut commission = Self::new(
            provider,
            DEFAULT_COMMISSION_CENTS,
            "Lab booking commission",
            transaction_date,
        );
        commission.lab_booking_id = Some(booking_id.into());
        commission.category = CommissionCategory::LabBooking;
        commission
    }

    pub fn with_category(mut self, category: CommissionCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_prescription_id(mut self, prescription_id: impl Into<String>) -> Self {
        self.prescription_id = Some(prescription_id.into());
        self
    }

    pub fn with_lab_booking_id(mut self, booking_id: impl Into<String>) -> Self {
        self.lab_booking_id = Some(booking_id.into());
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}
