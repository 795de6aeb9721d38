use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    CommissionCategory, CommissionId, CommissionTransaction, PaymentMethod, PayoutId,
    PayoutRequest, PayoutStatus, Provider, ProviderBalance, ProviderId, ProviderKind, ProviderRef,
    TransactionStatus, VerificationStatus, validate_payout,
};

use super::MIGRATION_001_INITIAL;

const PROVIDER_COLUMNS: &str = "id, kind, name, registration_number, address, phone, email, verification, created_at, verified_at";

const COMMISSION_COLUMNS: &str = "id, pharmacy_id, laboratory_id, prescription_id, lab_booking_id, amount_cents, description, category, status, transaction_date, recorded_at";

const PAYOUT_COLUMNS: &str = "id, pharmacy_id, laboratory_id, requested_amount, payment_method, payment_details, status, requested_at, processed_at, notes";

/// Outcome of a balance-checked payout insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutInsert {
    /// The request was stored; carries the balance it was checked against
    Inserted(ProviderBalance),
    /// The request exceeded the available balance and was not stored
    Rejected(ProviderBalance),
}

/// Equality filters for listing commission transactions.
#[derive(Debug, Clone, Default)]
pub struct CommissionQuery {
    pub pharmacy_id: Option<ProviderId>,
    pub laboratory_id: Option<ProviderId>,
    pub status: Option<TransactionStatus>,
}

/// Repository for persisting and querying providers, commissions and payouts.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Provider operations
    // ========================

    /// Save a new provider.
    pub async fn save_provider(&self, provider: &Provider) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO providers (id, kind, name, registration_number, address, phone, email, verification, created_at, verified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(provider.id.to_string())
        .bind(provider.kind.as_str())
        .bind(&provider.name)
        .bind(&provider.registration_number)
        .bind(&provider.address)
        .bind(&provider.phone)
        .bind(&provider.email)
        .bind(provider.verification.as_str())
        .bind(format_timestamp(provider.created_at))
        .bind(provider.verified_at.map(format_timestamp))
        .execute(&self.pool)
        .await
        .context("Failed to save provider")?;
        Ok(())
    }

    /// Get a provider by ID.
    pub async fn get_provider(&self, id: ProviderId) -> Result<Option<Provider>> {
        let query = format!("SELECT {} FROM providers WHERE id = ?", PROVIDER_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch provider")?;

        row.as_ref().map(Self::row_to_provider).transpose()
    }

    /// List providers, optionally only one kind, ordered by name.
    pub async fn list_providers(&self, kind: Option<ProviderKind>) -> Result<Vec<Provider>> {
        let rows = match kind {
            Some(kind) => {
                let query = format!(
                    "SELECT {} FROM providers WHERE kind = ? ORDER BY name",
                    PROVIDER_COLUMNS
                );
                sqlx::query(&query)
                    .bind(kind.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let query = format!("SELECT {} FROM providers ORDER BY name", PROVIDER_COLUMNS);
                sqlx::query(&query).fetch_all(&self.pool).await
            }
        }
        .context("Failed to list providers")?;

        rows.iter().map(Self::row_to_provider).collect()
    }

    /// Update a provider's verification status.
    pub async fn update_verification(
        &self,
        id: ProviderId,
        verification: VerificationStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE providers SET verification = ?, verified_at = ? WHERE id = ?")
            .bind(verification.as_str())
            .bind(verified_at.map(format_timestamp))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update provider verification")?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_provider(row: &sqlx::sqlite::SqliteRow) -> Result<Provider> {
        let kind_str: String = row.get("kind");
        let verification_str: String = row.get("verification");
        let verified_at: Option<String> = row.get("verified_at");

        Ok(Provider {
            id: parse_id(row.get("id"), "provider ID")?,
            kind: ProviderKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid provider kind: {}", kind_str))?,
            name: row.get("name"),
            registration_number: row.get("registration_number"),
            address: row.get("address"),
            phone: row.get("phone"),
            email: row.get("email"),
            verification: VerificationStatus::from_str(&verification_str).ok_or_else(|| {
                anyhow::anyhow!("Invalid verification status: {}", verification_str)
            })?,
            created_at: parse_timestamp(row.get("created_at"), "created_at")?,
            verified_at: verified_at
                .map(|s| parse_timestamp(s, "verified_at"))
                .transpose()?,
        })
    }

    // ========================
    // Commission operations
    // ========================

    /// Save a new commission transaction.
    pub async fn save_commission(&self, commission: &CommissionTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO commission_transactions (id, pharmacy_id, laboratory_id, prescription_id, lab_booking_id, amount_cents, description, category, status, transaction_date, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(commission.id.to_string())
        .bind(commission.provider.pharmacy_id().map(|id| id.to_string()))
        .bind(commission.provider.laboratory_id().map(|id| id.to_string()))
        .bind(&commission.prescription_id)
        .bind(&commission.lab_booking_id)
        .bind(commission.amount_cents)
        .bind(&commission.description)
        .bind(commission.category.as_str())
        .bind(commission.status.as_str())
        .bind(format_timestamp(commission.transaction_date))
        .bind(format_timestamp(commission.recorded_at))
        .execute(&self.pool)
        .await
        .context("Failed to save commission transaction")?;
        Ok(())
    }

    /// Get a commission transaction by ID.
    pub async fn get_commission(&self, id: CommissionId) -> Result<Option<CommissionTransaction>> {
        let query = format!(
            "SELECT {} FROM commission_transactions WHERE id = ?",
            COMMISSION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch commission transaction")?;

        row.as_ref().map(Self::row_to_commission).transpose()
    }

    /// List every commission transaction, oldest first.
    pub async fn list_commissions(&self) -> Result<Vec<CommissionTransaction>> {
        self.list_commissions_filtered(&CommissionQuery::default())
            .await
    }

    /// List commissions earned by a pharmacy.
    pub async fn list_commissions_for_pharmacy(
        &self,
        pharmacy_id: ProviderId,
    ) -> Result<Vec<CommissionTransaction>> {
        self.list_commissions_filtered(&CommissionQuery {
            pharmacy_id: Some(pharmacy_id),
            ..Default::default()
        })
        .await
    }

    /// List commissions earned by a laboratory.
    pub async fn list_commissions_for_laboratory(
        &self,
        laboratory_id: ProviderId,
    ) -> Result<Vec<CommissionTransaction>> {
        self.list_commissions_filtered(&CommissionQuery {
            laboratory_id: Some(laboratory_id),
            ..Default::default()
        })
        .await
    }

    /// List commissions for whichever kind of provider the reference points at.
    pub async fn list_commissions_for_provider(
        &self,
        provider: ProviderRef,
    ) -> Result<Vec<CommissionTransaction>> {
        match provider.kind {
            ProviderKind::Pharmacy => self.list_commissions_for_pharmacy(provider.id).await,
            ProviderKind::Laboratory => self.list_commissions_for_laboratory(provider.id).await,
        }
    }

    /// List commissions matching every filter that is set.
    pub async fn list_commissions_filtered(
        &self,
        filter: &CommissionQuery,
    ) -> Result<Vec<CommissionTransaction>> {
        let mut query = format!(
            "SELECT {} FROM commission_transactions WHERE 1=1",
            COMMISSION_COLUMNS
        );

        let pharmacy_id = filter.pharmacy_id.map(|id| id.to_string());
        let laboratory_id = filter.laboratory_id.map(|id| id.to_string());

        if pharmacy_id.is_some() {
            query.push_str(" AND pharmacy_id = ?");
        }
        if laboratory_id.is_some() {
            query.push_str(" AND laboratory_id = ?");
        }
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        query.push_str(" ORDER BY transaction_date, recorded_at");

        let mut sql_query = sqlx::query(&query);
        if let Some(ref id) = pharmacy_id {
            sql_query = sql_query.bind(id);
        }
        if let Some(ref id) = laboratory_id {
            sql_query = sql_query.bind(id);
        }
        if let Some(status) = filter.status {
            sql_query = sql_query.bind(status.as_str());
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list commission transactions")?;

        rows.iter().map(Self::row_to_commission).collect()
    }

    /// Move a commission from `from` to `to`.
    /// Returns false when the row is missing or no longer in `from`.
    pub async fn update_commission_status(
        &self,
        id: CommissionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE commission_transactions SET status = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to update commission status")?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_commission(row: &sqlx::sqlite::SqliteRow) -> Result<CommissionTransaction> {
        let category_str: String = row.get("category");
        let status_str: String = row.get("status");

        Ok(CommissionTransaction {
            id: parse_id(row.get("id"), "commission ID")?,
            provider: row_to_provider_ref(row)?,
            prescription_id: row.get("prescription_id"),
            lab_booking_id: row.get("lab_booking_id"),
            amount_cents: row.get("amount_cents"),
            description: row.get("description"),
            category: CommissionCategory::from_str(&category_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid category: {}", category_str))?,
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid status: {}", status_str))?,
            transaction_date: parse_timestamp(row.get("transaction_date"), "transaction_date")?,
            recorded_at: parse_timestamp(row.get("recorded_at"), "recorded_at")?,
        })
    }

    // ========================
    // Payout operations
    // ========================

    /// Compute a provider's balance using SQL aggregation.
    pub async fn provider_balance(&self, provider: ProviderRef) -> Result<ProviderBalance> {
        fetch_balance(&self.pool, provider).await
    }

    /// Insert a payout request if it fits in the provider's available balance.
    /// The balance check and the insert run in one transaction.
    pub async fn insert_payout_within_balance(&self, payout: &PayoutRequest) -> Result<PayoutInsert> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin payout transaction")?;

        let balance = fetch_balance(&mut *tx, payout.provider).await?;
        if validate_payout(payout.requested_amount, &balance).is_err() {
            tx.rollback()
                .await
                .context("Failed to roll back payout transaction")?;
            return Ok(PayoutInsert::Rejected(balance));
        }

        let details_json = serde_json::to_string(&payout.payment_details)?;

        sqlx::query(
            r#"
            INSERT INTO payout_requests (id, pharmacy_id, laboratory_id, requested_amount, payment_method, payment_details, status, requested_at, processed_at, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payout.id.to_string())
        .bind(payout.provider.pharmacy_id().map(|id| id.to_string()))
        .bind(payout.provider.laboratory_id().map(|id| id.to_string()))
        .bind(payout.requested_amount)
        .bind(payout.payment_method.as_str())
        .bind(&details_json)
        .bind(payout.status.as_str())
        .bind(format_timestamp(payout.requested_at))
        .bind(payout.processed_at.map(format_timestamp))
        .bind(&payout.notes)
        .execute(&mut *tx)
        .await
        .context("Failed to save payout request")?;

        tx.commit()
            .await
            .context("Failed to commit payout transaction")?;

        Ok(PayoutInsert::Inserted(balance))
    }

    /// Get a payout request by ID.
    pub async fn get_payout(&self, id: PayoutId) -> Result<Option<PayoutRequest>> {
        let query = format!("SELECT {} FROM payout_requests WHERE id = ?", PAYOUT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch payout request")?;

        row.as_ref().map(Self::row_to_payout).transpose()
    }

    /// List payout requests, newest first, optionally for one provider and/or status.
    pub async fn list_payouts(
        &self,
        provider_id: Option<ProviderId>,
        status: Option<PayoutStatus>,
    ) -> Result<Vec<PayoutRequest>> {
        let mut query = format!("SELECT {} FROM payout_requests WHERE 1=1", PAYOUT_COLUMNS);
        let provider_id = provider_id.map(|id| id.to_string());

        if provider_id.is_some() {
            query.push_str(" AND (pharmacy_id = ? OR laboratory_id = ?)");
        }
        if status.is_some() {
            query.push_str(" AND status = ?");
        }
        query.push_str(" ORDER BY requested_at DESC");

        let mut sql_query = sqlx::query(&query);
        if let Some(ref id) = provider_id {
            sql_query = sql_query.bind(id).bind(id);
        }
        if let Some(status) = status {
            sql_query = sql_query.bind(status.as_str());
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list payout requests")?;

        rows.iter().map(Self::row_to_payout).collect()
    }

    /// Move a payout from `from` to `to`.
    /// Returns false when the row is missing or was changed concurrently.
    pub async fn update_payout_status(
        &self,
        id: PayoutId,
        from: PayoutStatus,
        to: PayoutStatus,
        processed_at: Option<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payout_requests
            SET status = ?, processed_at = COALESCE(?, processed_at), notes = COALESCE(?, notes)
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(processed_at.map(format_timestamp))
        .bind(notes)
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to update payout status")?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_payout(row: &sqlx::sqlite::SqliteRow) -> Result<PayoutRequest> {
        let method_str: String = row.get("payment_method");
        let status_str: String = row.get("status");
        let details_json: String = row.get("payment_details");
        let processed_at: Option<String> = row.get("processed_at");

        Ok(PayoutRequest {
            id: parse_id(row.get("id"), "payout ID")?,
            provider: row_to_provider_ref(row)?,
            requested_amount: row.get("requested_amount"),
            payment_method: PaymentMethod::from_str(&method_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid payment method: {}", method_str))?,
            payment_details: serde_json::from_str(&details_json)
                .context("Invalid payment details JSON")?,
            status: PayoutStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid status: {}", status_str))?,
            requested_at: parse_timestamp(row.get("requested_at"), "requested_at")?,
            processed_at: processed_at
                .map(|s| parse_timestamp(s, "processed_at"))
                .transpose()?,
            notes: row.get("notes"),
        })
    }
}

/// Earned, reserved and paid-out totals for one provider in a single query.
async fn fetch_balance<'e, E>(executor: E, provider: ProviderRef) -> Result<ProviderBalance>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let column = match provider.kind {
        ProviderKind::Pharmacy => "pharmacy_id",
        ProviderKind::Laboratory => "laboratory_id",
    };
    let query = format!(
        r#"
        SELECT
            (SELECT COALESCE(SUM(amount_cents), 0) FROM commission_transactions
                WHERE {column} = ? AND status = 'completed') AS earned,
            (SELECT COALESCE(SUM(requested_amount), 0) FROM payout_requests
                WHERE {column} = ? AND status IN ('pending', 'processing')) AS reserved,
            (SELECT COALESCE(SUM(requested_amount), 0) FROM payout_requests
                WHERE {column} = ? AND status = 'completed') AS paid_out
        "#
    );
    let id = provider.id.to_string();

    let row = sqlx::query(&query)
        .bind(&id)
        .bind(&id)
        .bind(&id)
        .fetch_one(executor)
        .await
        .context("Failed to compute provider balance")?;

    Ok(ProviderBalance::new(
        row.get("earned"),
        row.get("reserved"),
        row.get("paid_out"),
    ))
}

fn row_to_provider_ref(row: &sqlx::sqlite::SqliteRow) -> Result<ProviderRef> {
    let pharmacy_id: Option<String> = row.get("pharmacy_id");
    let laboratory_id: Option<String> = row.get("laboratory_id");

    let pharmacy_id = pharmacy_id.map(|s| parse_id(s, "pharmacy ID")).transpose()?;
    let laboratory_id = laboratory_id
        .map(|s| parse_id(s, "laboratory ID"))
        .transpose()?;

    ProviderRef::from_columns(pharmacy_id, laboratory_id)
        .ok_or_else(|| anyhow::anyhow!("Row must reference exactly one pharmacy or laboratory"))
}

fn parse_id(value: String, what: &str) -> Result<Uuid> {
    Uuid::parse_str(&value).with_context(|| format!("Invalid {}", what))
}

/// Fixed-width UTC text so that string ordering in SQL matches time ordering.
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: String, what: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(&value)
        .with_context(|| format!("Invalid {} timestamp", what))?
        .with_timezone(&Utc))
}
