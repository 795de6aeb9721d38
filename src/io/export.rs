use std::collections::HashMap;
use std::io::Write;

use anyhow::Result;

use crate::application::{CommissionFilter, CommissionService};
use crate::domain::{PaymentDetails, PayoutStatus, ProviderId, ProviderRef};

/// Exporter for writing ledger data as CSV
pub struct Exporter<'a> {
    service: &'a CommissionService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a CommissionService) -> Self {
        Self { service }
    }

    async fn provider_names(&self) -> Result<HashMap<ProviderId, String>> {
        Ok(self
            .service
            .list_providers(None)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect())
    }

    /// Export commission transactions to CSV, oldest first
    pub async fn export_commissions_csv<W: Write>(
        &self,
        writer: W,
        filter: CommissionFilter,
    ) -> Result<usize> {
        let transactions = self.service.list_commissions(filter).await?;
        let names = self.provider_names().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "transaction_date",
            "provider_kind",
            "provider_id",
            "provider_name",
            "category",
            "reference",
            "amount_cents",
            "status",
            "description",
        ])?;

        for tx in &transactions {
            let reference = tx
                .prescription_id
                .as_deref()
                .or(tx.lab_booking_id.as_deref())
                .unwrap_or_default();

            csv_writer.write_record([
                tx.id.to_string(),
                tx.transaction_date.to_rfc3339(),
                tx.provider.kind.as_str().to_string(),
                tx.provider.id.to_string(),
                provider_name(&names, tx.provider),
                tx.category.as_str().to_string(),
                reference.to_string(),
                tx.amount_cents.to_string(),
                tx.status.as_str().to_string(),
                tx.description.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transactions.len())
    }

    /// Export payout requests to CSV, newest first
    pub async fn export_payouts_csv<W: Write>(
        &self,
        writer: W,
        provider_id: Option<ProviderId>,
        status: Option<PayoutStatus>,
    ) -> Result<usize> {
        let payouts = self.service.list_payouts(provider_id, status).await?;
        let names = self.provider_names().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "requested_at",
            "provider_kind",
            "provider_id",
            "provider_name",
            "amount_cents",
            "payment_method",
            "payment_account",
            "status",
            "processed_at",
            "notes",
        ])?;

        for payout in &payouts {
            let account = match &payout.payment_details {
                PaymentDetails::Bank {
                    bank_name,
                    account_number,
                    ..
                } => format!("{} {}", bank_name, account_number),
                PaymentDetails::Qr { qr_reference } => qr_reference.clone(),
            };

            csv_writer.write_record([
                payout.id.to_string(),
                payout.requested_at.to_rfc3339(),
                payout.provider.kind.as_str().to_string(),
                payout.provider.id.to_string(),
                provider_name(&names, payout.provider),
                payout.requested_amount.to_string(),
                payout.payment_method.as_str().to_string(),
                account,
                payout.status.as_str().to_string(),
                payout
                    .processed_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_default(),
                payout.notes.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(payouts.len())
    }
}

fn provider_name(names: &HashMap<ProviderId, String>, provider: ProviderRef) -> String {
    names
        .get(&provider.id)
        .cloned()
        .unwrap_or_else(|| "?".to_string())
}
