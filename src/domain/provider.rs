use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProviderId = Uuid;

/// The two kinds of marketplace providers that earn commissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Pharmacy,
    Laboratory,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Pharmacy => "pharmacy",
            ProviderKind::Laboratory => "laboratory",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pharmacy" => Some(ProviderKind::Pharmacy),
            "laboratory" | "lab" => Some(ProviderKind::Laboratory),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(VerificationStatus::Pending),
            "verified" => Some(VerificationStatus::Verified),
            "rejected" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed reference to the pharmacy or laboratory a ledger row belongs to.
/// Stored as two nullable foreign-key columns, exactly one of which is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderRef {
    pub kind: ProviderKind,
    pub id: ProviderId,
}

impl ProviderRef {
    pub fn pharmacy(id: ProviderId) -> Self {
        Self {
            kind: ProviderKind::Pharmacy,
            id,
        }
    }

    pub fn laboratory(id: ProviderId) -> Self {
        Self {
            kind: ProviderKind::Laboratory,
            id,
        }
    }

    pub fn pharmacy_id(&self) -> Option<ProviderId> {
        (self.kind == ProviderKind::Pharmacy).then_some(self.id)
    }

    pub fn laboratory_id(&self) -> Option<ProviderId> {
        (self.kind == ProviderKind::Laboratory).then_some(self.id)
    }

    /// Rebuild a reference from the two foreign-key columns.
    /// Returns None unless exactly one of them is set.
    pub fn from_columns(
        pharmacy_id: Option<ProviderId>,
        laboratory_id: Option<ProviderId>,
    ) -> Option<Self> {
        match (pharmacy_id, laboratory_id) {
            (Some(id), None) => Some(Self::pharmacy(id)),
            (None, Some(id)) => Some(Self::laboratory(id)),
            _ => None,
        }
    }
}

/// Identity and verification metadata for a pharmacy or laboratory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub kind: ProviderKind,
    pub name: String,
    pub registration_number: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub verification: VerificationStatus,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl Provider {
    pub fn new(kind: ProviderKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            registration_number: None,
            address: None,
            phone: None,
            email: None,
            verification: VerificationStatus::Pending,
            created_at: Utc::now(),
            verified_at: None,
        }
    }

    pub fn with_registration_number(mut self, registration_number: impl Into<String>) -> Self {
        self.registration_number = Some(registration_number.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn reference(&self) -> ProviderRef {
        ProviderRef {
            kind: self.kind,
            id: self.id,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verification == VerificationStatus::Verified
    }
}
