// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use commission_ledger::application::{CommissionService, NewPayout, NewProvider};
use commission_ledger::domain::{PaymentDetails, Provider, ProviderKind};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(CommissionService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = CommissionService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn bank_details() -> PaymentDetails {
    PaymentDetails::Bank {
        bank_name: "Commercial Bank".into(),
        account_name: "City Pharmacy (Pvt) Ltd".into(),
        account_number: "8001234567".into(),
        branch: Some("Colombo 03".into()),
    }
}

pub fn payout(provider: &Provider, amount_cents: i64) -> NewPayout {
    NewPayout {
        provider_id: provider.id,
        amount_cents,
        payment_details: bank_details(),
        notes: None,
    }
}

/// Test fixture: a pharmacy and a laboratory
pub struct StandardProviders {
    pub pharmacy: Provider,
    pub laboratory: Provider,
}

impl StandardProviders {
    pub async fn create(service: &CommissionService) -> Result<Self> {
        let pharmacy = service
            .register_provider(NewProvider {
                kind: ProviderKind::Pharmacy,
                name: "City Pharmacy".into(),
                registration_number: Some("PH-2231".into()),
                address: Some("12 Galle Road, Colombo".into()),
                phone: None,
                email: None,
            })
            .await?;
        let laboratory = service
            .register_provider(NewProvider {
                kind: ProviderKind::Laboratory,
                name: "Lanka Labs".into(),
                registration_number: None,
                address: None,
                phone: Some("+94 11 234 5678".into()),
                email: Some("desk@lankalabs.lk".into()),
            })
            .await?;
        Ok(Self {
            pharmacy,
            laboratory,
        })
    }

    /// Record `count` prescription commissions for the pharmacy on `date`
    pub async fn prescriptions(
        &self,
        service: &CommissionService,
        count: usize,
        date: DateTime<Utc>,
    ) -> Result<()> {
        for i in 0..count {
            service
                .record_prescription_commission(self.pharmacy.id, &format!("RX-{}", i), date)
                .await?;
        }
        Ok(())
    }

    /// Record `count` lab booking commissions for the laboratory on `date`
    pub async fn lab_bookings(
        &self,
        service: &CommissionService,
        count: usize,
        date: DateTime<Utc>,
    ) -> Result<()> {
        for i in 0..count {
            service
                .record_lab_booking_commission(self.laboratory.id, &format!("LB-{}", i), date)
                .await?;
        }
        Ok(())
    }
}
