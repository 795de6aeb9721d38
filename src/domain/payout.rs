use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, ProviderRef, TransactionStatus};

pub type PayoutId = Uuid;

/// Payout requests share the commission status values.
pub type PayoutStatus = TransactionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    QrCode,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::QrCode => "qr_code",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bank_transfer" | "bank-transfer" | "bank" => Some(PaymentMethod::BankTransfer),
            "qr_code" | "qr-code" | "qr" => Some(PaymentMethod::QrCode),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the money goes. Persisted as JSON next to the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentDetails {
    Bank {
        bank_name: String,
        account_name: String,
        account_number: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
    },
    Qr {
        /// Reference or payload of the provider's payment QR code
        qr_reference: String,
    },
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentDetails::Bank { .. } => PaymentMethod::BankTransfer,
            PaymentDetails::Qr { .. } => PaymentMethod::QrCode,
        }
    }

    /// Returns the name of the first required field that is blank.
    pub fn missing_field(&self) -> Option<&'static str> {
        match self {
            PaymentDetails::Bank {
                bank_name,
                account_name,
                account_number,
                ..
            } => {
                if bank_name.trim().is_empty() {
                    Some("bank_name")
                } else if account_name.trim().is_empty() {
                    Some("account_name")
                } else if account_number.trim().is_empty() {
                    Some("account_number")
                } else {
                    None
                }
            }
            PaymentDetails::Qr { qr_reference } => {
                qr_reference.trim().is_empty().then_some("qr_reference")
            }
        }
    }
}

/// A provider's request to withdraw part of its commission balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: PayoutId,
    pub provider: ProviderRef,
    pub requested_amount: Cents,
    pub payment_method: PaymentMethod,
    pub payment_details: PaymentDetails,
    pub status: PayoutStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl PayoutRequest {
    pub fn new(provider: ProviderRef, requested_amount: Cents, payment_details: PaymentDetails) -> Self {
        assert!(requested_amount > 0, "Payout amount must be positive");
        Self {
            id: Uuid::new_v4(),
            provider,
            requested_amount,
            payment_method: payment_details.method(),
            payment_details,
            status: PayoutStatus::Pending,
            requested_at: Utc::now(),
            processed_at: None,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Payouts go pending -> processing -> completed, or straight from
    /// pending to completed or failed. Completed and failed are final.
    pub fn can_transition_to(&self, next: PayoutStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self.status, next),
            (Pending, Processing) | (Pending, Completed) | (Pending, Failed) | (Processing, Completed)
        )
    }

    /// Apply a status change, stamping `processed_at` when the request settles.
    pub fn transition(
        &mut self,
        next: PayoutStatus,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        if !self.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.processed_at = Some(at);
        }
        Ok(())
    }

    /// Whether this request holds funds against the provider balance.
    pub fn reserves_funds(&self) -> bool {
        self.status != PayoutStatus::Failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: TransactionStatus,
    pub to: TransactionStatus,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot move from {} to {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> PaymentDetails {
        PaymentDetails::Bank {
            bank_name: "Commercial Bank".into(),
            account_name: "City Pharmacy".into(),
            account_number: "8001234567".into(),
            branch: None,
        }
    }

    fn request(amount: Cents) -> PayoutRequest {
        PayoutRequest::new(ProviderRef::pharmacy(Uuid::new_v4()), amount, bank())
    }

    #[test]
    fn test_new_request_is_pending() {
        let payout = request(5000);
        assert_eq!(payout.status, PayoutStatus::Pending);
        assert_eq!(payout.payment_method, PaymentMethod::BankTransfer);
        assert!(payout.processed_at.is_none());
        assert!(payout.reserves_funds());
    }

    #[test]
    fn test_processing_then_completed() {
        let mut payout = request(5000);
        let now = Utc::now();
        payout.transition(PayoutStatus::Processing, now).unwrap();
        assert!(payout.processed_at.is_none());
        payout.transition(PayoutStatus::Completed, now).unwrap();
        assert_eq!(payout.processed_at, Some(now));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut payout = request(5000);
        payout.transition(PayoutStatus::Failed, Utc::now()).unwrap();
        assert!(!payout.reserves_funds());

        let err = payout
            .transition(PayoutStatus::Completed, Utc::now())
            .unwrap_err();
        assert_eq!(err.from, PayoutStatus::Failed);
        assert_eq!(err.to, PayoutStatus::Completed);
    }

    #[test]
    fn test_processing_cannot_fail() {
        let mut payout = request(5000);
        payout.transition(PayoutStatus::Processing, Utc::now()).unwrap();
        assert!(payout.transition(PayoutStatus::Failed, Utc::now()).is_err());
    }

    #[test]
    fn test_payment_details_json_shape() {
        let details = PaymentDetails::Qr {
            qr_reference: "lankaqr://pay/123".into(),
        };
        let json = serde_json::to_string(&details).unwrap();
        assert_eq!(json, r#"{"type":"qr","qr_reference":"lankaqr://pay/123"}"#);
        assert_eq!(details.method(), PaymentMethod::QrCode);
    }

    #[test]
    fn test_missing_field() {
        assert_eq!(bank().missing_field(), None);
        let blank = PaymentDetails::Bank {
            bank_name: "BOC".into(),
            account_name: " ".into(),
            account_number: "1".into(),
            branch: None,
        };
        assert_eq!(blank.missing_field(), Some("account_name"));
    }
}
