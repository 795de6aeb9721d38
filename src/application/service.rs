use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::{
    Cents, CommissionCategory, CommissionId, CommissionSummary, CommissionTransaction,
    PaymentDetails, PayoutId, PayoutRequest, PayoutStatus, Provider, ProviderBalance, ProviderId,
    ProviderKind, TransactionStatus, VerificationStatus, summarize,
};
use crate::storage::{CommissionQuery, PayoutInsert, Repository};

use super::{
    AdminDashboard, AppError, ProviderDashboard, build_admin_dashboard, build_provider_dashboard,
};

/// Application service: the single mutation path for the ledger.
/// The CLI and the HTTP API both go through it.
pub struct CommissionService {
    repo: Repository,
    /// Serializes balance-checked payout inserts within this process
    payout_lock: Mutex<()>,
}

/// Registration data for a pharmacy or laboratory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProvider {
    pub kind: ProviderKind,
    pub name: String,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// A manually recorded commission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCommission {
    pub provider_id: ProviderId,
    pub amount_cents: Cents,
    pub description: String,
    /// Derived from the description when absent
    #[serde(default)]
    pub category: Option<CommissionCategory>,
    /// Defaults to completed
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    /// Defaults to now
    #[serde(default)]
    pub transaction_date: Option<DateTime<Utc>>,
}

/// A provider's withdrawal request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayout {
    pub provider_id: ProviderId,
    pub amount_cents: Cents,
    pub payment_details: PaymentDetails,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Filter for querying commission transactions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommissionFilter {
    pub pharmacy_id: Option<ProviderId>,
    pub laboratory_id: Option<ProviderId>,
    pub status: Option<TransactionStatus>,
}

impl CommissionService {
    /// Create a new commission service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            payout_lock: Mutex::new(()),
        }
    }

    /// Open (creating if needed) and migrate the database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Provider operations
    // ========================

    /// Register a pharmacy or laboratory. New providers await verification.
    pub async fn register_provider(&self, input: NewProvider) -> Result<Provider, AppError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("provider name is required".into()));
        }

        let mut provider = Provider::new(input.kind, name);
        provider.registration_number = input.registration_number;
        provider.address = input.address;
        provider.phone = input.phone;
        provider.email = input.email;

        self.repo.save_provider(&provider).await?;
        info!(provider_id = %provider.id, kind = %provider.kind, name = %provider.name, "registered provider");
        Ok(provider)
    }

    /// Get a provider by ID.
    pub async fn get_provider(&self, id: ProviderId) -> Result<Provider, AppError> {
        self.repo
            .get_provider(id)
            .await?
            .ok_or_else(|| AppError::ProviderNotFound(id.to_string()))
    }

    /// Get a provider and check that it is of the expected kind.
    async fn get_provider_of_kind(
        &self,
        id: ProviderId,
        expected: ProviderKind,
    ) -> Result<Provider, AppError> {
        let provider = self.get_provider(id).await?;
        if provider.kind != expected {
            return Err(AppError::ProviderKindMismatch {
                provider: id.to_string(),
                expected,
                actual: provider.kind,
            });
        }
        Ok(provider)
    }

    /// List providers, optionally of one kind.
    pub async fn list_providers(&self, kind: Option<ProviderKind>) -> Result<Vec<Provider>, AppError> {
        Ok(self.repo.list_providers(kind).await?)
    }

    /// Change a provider's verification status.
    pub async fn set_verification(
        &self,
        id: ProviderId,
        verification: VerificationStatus,
    ) -> Result<Provider, AppError> {
        let verified_at = (verification == VerificationStatus::Verified).then(Utc::now);
        if !self
            .repo
            .update_verification(id, verification, verified_at)
            .await?
        {
            return Err(AppError::ProviderNotFound(id.to_string()));
        }
        info!(provider_id = %id, verification = %verification, "updated provider verification");
        self.get_provider(id).await
    }

    // ========================
    // Commission operations
    // ========================

    /// Record the fixed commission for a prescription uploaded to a pharmacy.
    pub async fn record_prescription_commission(
        &self,
        pharmacy_id: ProviderId,
        prescription_id: &str,
        date: DateTime<Utc>,
    ) -> Result<CommissionTransaction, AppError> {
        let pharmacy = self
            .get_provider_of_kind(pharmacy_id, ProviderKind::Pharmacy)
            .await?;
        let commission =
            CommissionTransaction::for_prescription(pharmacy.reference(), prescription_id, date);
        self.store_commission(commission).await
    }

    /// Record the fixed commission for a laboratory booking.
    pub async fn record_lab_booking_commission(
        &self,
        laboratory_id: ProviderId,
        booking_id: &str,
        date: DateTime<Utc>,
    ) -> Result<CommissionTransaction, AppError> {
        let laboratory = self
            .get_provider_of_kind(laboratory_id, ProviderKind::Laboratory)
            .await?;
        let commission =
            CommissionTransaction::for_lab_booking(laboratory.reference(), booking_id, date);
        self.store_commission(commission).await
    }

    /// Record an arbitrary commission entry.
    pub async fn record_commission(
        &self,
        input: NewCommission,
    ) -> Result<CommissionTransaction, AppError> {
        if input.amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Commission amount must be positive".to_string(),
            ));
        }
        if input.description.trim().is_empty() {
            return Err(AppError::InvalidInput("description is required".into()));
        }

        let provider = self.get_provider(input.provider_id).await?;
        let mut commission = CommissionTransaction::new(
            provider.reference(),
            input.amount_cents,
            input.description,
            input.transaction_date.unwrap_or_else(Utc::now),
        );
        if let Some(category) = input.category {
            commission = commission.with_category(category);
        }
        if let Some(status) = input.status {
            commission = commission.with_status(status);
        }

        self.store_commission(commission).await
    }

    async fn store_commission(
        &self,
        commission: CommissionTransaction,
    ) -> Result<CommissionTransaction, AppError> {
        self.repo.save_commission(&commission).await?;
        info!(
            commission_id = %commission.id,
            provider_id = %commission.provider.id,
            amount_cents = commission.amount_cents,
            category = %commission.category,
            "recorded commission"
        );
        Ok(commission)
    }

    /// Get a commission transaction by ID.
    pub async fn get_commission(&self, id: CommissionId) -> Result<CommissionTransaction, AppError> {
        self.repo
            .get_commission(id)
            .await?
            .ok_or_else(|| AppError::CommissionNotFound(id.to_string()))
    }

    /// List all commission transactions.
    pub async fn list_all_commissions(&self) -> Result<Vec<CommissionTransaction>, AppError> {
        Ok(self.repo.list_commissions().await?)
    }

    /// List commissions earned by a pharmacy.
    pub async fn list_pharmacy_commissions(
        &self,
        pharmacy_id: ProviderId,
    ) -> Result<Vec<CommissionTransaction>, AppError> {
        Ok(self.repo.list_commissions_for_pharmacy(pharmacy_id).await?)
    }

    /// List commissions earned by a laboratory.
    pub async fn list_laboratory_commissions(
        &self,
        laboratory_id: ProviderId,
    ) -> Result<Vec<CommissionTransaction>, AppError> {
        Ok(self
            .repo
            .list_commissions_for_laboratory(laboratory_id)
            .await?)
    }

    /// List commissions with filters.
    pub async fn list_commissions(
        &self,
        filter: CommissionFilter,
    ) -> Result<Vec<CommissionTransaction>, AppError> {
        Ok(self
            .repo
            .list_commissions_filtered(&CommissionQuery {
                pharmacy_id: filter.pharmacy_id,
                laboratory_id: filter.laboratory_id,
                status: filter.status,
            })
            .await?)
    }

    /// Move a commission to a new status.
    pub async fn update_commission_status(
        &self,
        id: CommissionId,
        next: TransactionStatus,
    ) -> Result<CommissionTransaction, AppError> {
        let commission = self.get_commission(id).await?;
        let invalid = || AppError::InvalidStatusTransition {
            id: id.to_string(),
            from: commission.status,
            to: next,
        };

        if !commission.status.can_transition_to(next) {
            return Err(invalid());
        }
        if !self
            .repo
            .update_commission_status(id, commission.status, next)
            .await?
        {
            return Err(invalid());
        }

        info!(commission_id = %id, from = %commission.status, to = %next, "commission status changed");
        Ok(CommissionTransaction {
            status: next,
            ..commission
        })
    }

    /// Aggregate commissions, globally or for one provider.
    pub async fn summarize(
        &self,
        provider_id: Option<ProviderId>,
        as_of: DateTime<Utc>,
    ) -> Result<CommissionSummary, AppError> {
        let transactions = match provider_id {
            Some(id) => {
                let provider = self.get_provider(id).await?;
                self.repo
                    .list_commissions_for_provider(provider.reference())
                    .await?
            }
            None => self.repo.list_commissions().await?,
        };
        Ok(summarize(&transactions, as_of))
    }

    // ========================
    // Payout operations
    // ========================

    /// Current balance of a provider.
    pub async fn provider_balance(&self, provider_id: ProviderId) -> Result<ProviderBalance, AppError> {
        let provider = self.get_provider(provider_id).await?;
        Ok(self.repo.provider_balance(provider.reference()).await?)
    }

    /// Submit a payout request. The amount is checked against the available
    /// balance inside the same database transaction that stores the request.
    pub async fn request_payout(&self, input: NewPayout) -> Result<PayoutRequest, AppError> {
        if input.amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Payout amount must be positive".to_string(),
            ));
        }
        if let Some(field) = input.payment_details.missing_field() {
            return Err(AppError::InvalidPaymentDetails(format!(
                "{} is required",
                field
            )));
        }

        let provider = self.get_provider(input.provider_id).await?;
        let mut payout =
            PayoutRequest::new(provider.reference(), input.amount_cents, input.payment_details);
        if let Some(notes) = input.notes {
            payout = payout.with_notes(notes);
        }

        let _guard = self.payout_lock.lock().await;
        match self.repo.insert_payout_within_balance(&payout).await? {
            PayoutInsert::Inserted(balance) => {
                info!(
                    payout_id = %payout.id,
                    provider_id = %provider.id,
                    amount_cents = payout.requested_amount,
                    available_before = balance.available,
                    "payout requested"
                );
                Ok(payout)
            }
            PayoutInsert::Rejected(balance) => {
                warn!(
                    provider_id = %provider.id,
                    requested = payout.requested_amount,
                    available = balance.available,
                    "payout rejected: insufficient balance"
                );
                Err(AppError::InsufficientBalance {
                    provider: provider.id.to_string(),
                    available: balance.available,
                    requested: payout.requested_amount,
                })
            }
        }
    }

    /// Get a payout request by ID.
    pub async fn get_payout(&self, id: PayoutId) -> Result<PayoutRequest, AppError> {
        self.repo
            .get_payout(id)
            .await?
            .ok_or_else(|| AppError::PayoutNotFound(id.to_string()))
    }

    /// List payout requests, newest first.
    pub async fn list_payouts(
        &self,
        provider_id: Option<ProviderId>,
        status: Option<PayoutStatus>,
    ) -> Result<Vec<PayoutRequest>, AppError> {
        Ok(self.repo.list_payouts(provider_id, status).await?)
    }

    /// Admin picks up a pending request.
    pub async fn start_processing(&self, id: PayoutId) -> Result<PayoutRequest, AppError> {
        self.transition_payout(id, PayoutStatus::Processing, None)
            .await
    }

    /// Admin marks a request paid.
    pub async fn complete_payout(
        &self,
        id: PayoutId,
        notes: Option<String>,
    ) -> Result<PayoutRequest, AppError> {
        self.transition_payout(id, PayoutStatus::Completed, notes)
            .await
    }

    /// Admin rejects a pending request, releasing its reserved funds.
    pub async fn fail_payout(
        &self,
        id: PayoutId,
        reason: Option<String>,
    ) -> Result<PayoutRequest, AppError> {
        self.transition_payout(id, PayoutStatus::Failed, reason)
            .await
    }

    async fn transition_payout(
        &self,
        id: PayoutId,
        next: PayoutStatus,
        notes: Option<String>,
    ) -> Result<PayoutRequest, AppError> {
        let mut payout = self.get_payout(id).await?;
        let from = payout.status;
        let invalid = || AppError::InvalidStatusTransition {
            id: id.to_string(),
            from,
            to: next,
        };

        payout.transition(next, Utc::now()).map_err(|_| invalid())?;

        // Compare-and-set on the stored status so concurrent admins cannot both win
        if !self
            .repo
            .update_payout_status(id, from, next, payout.processed_at, notes.as_deref())
            .await?
        {
            return Err(invalid());
        }

        if notes.is_some() {
            payout.notes = notes;
        }
        info!(payout_id = %id, from = %from, to = %next, "payout status changed");
        Ok(payout)
    }

    // ========================
    // Dashboards
    // ========================

    /// Platform-wide dashboard, recomputed from a full scan.
    pub async fn admin_dashboard(&self, as_of: DateTime<Utc>) -> Result<AdminDashboard, AppError> {
        let providers = self.repo.list_providers(None).await?;
        let transactions = self.repo.list_commissions().await?;
        let payouts = self.repo.list_payouts(None, None).await?;
        Ok(build_admin_dashboard(
            &providers,
            &transactions,
            &payouts,
            as_of,
        ))
    }

    /// Dashboard for a single pharmacy or laboratory.
    pub async fn provider_dashboard(
        &self,
        provider_id: ProviderId,
        as_of: DateTime<Utc>,
    ) -> Result<ProviderDashboard, AppError> {
        let provider = self.get_provider(provider_id).await?;
        let transactions = self
            .repo
            .list_commissions_for_provider(provider.reference())
            .await?;
        let payouts = self.repo.list_payouts(Some(provider_id), None).await?;
        Ok(build_provider_dashboard(
            provider,
            &transactions,
            payouts,
            as_of,
        ))
    }
}
