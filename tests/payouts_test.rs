mod common;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use commission_ledger::application::{AppError, NewPayout};
use commission_ledger::domain::{PaymentDetails, PaymentMethod, PayoutStatus};
use common::{StandardProviders, bank_details, payout, test_service};

#[tokio::test]
async fn test_request_payout_within_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    providers.prescriptions(&service, 3, Utc::now()).await?;

    let request = service
        .request_payout(payout(&providers.pharmacy, 20_000))
        .await?;
    assert_eq!(request.status, PayoutStatus::Pending);
    assert_eq!(request.payment_method, PaymentMethod::BankTransfer);
    assert!(request.processed_at.is_none());

    let stored = service.get_payout(request.id).await?;
    assert_eq!(stored.payment_details, bank_details());
    assert_eq!(stored.provider.pharmacy_id(), Some(providers.pharmacy.id));

    let balance = service.provider_balance(providers.pharmacy.id).await?;
    assert_eq!(balance.earned, 30_000);
    assert_eq!(balance.reserved, 20_000);
    assert_eq!(balance.available, 10_000);

    Ok(())
}

#[tokio::test]
async fn test_payout_exceeding_balance_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    providers.lab_bookings(&service, 1, Utc::now()).await?;

    let result = service
        .request_payout(payout(&providers.laboratory, 10_001))
        .await;
    match result {
        Err(AppError::InsufficientBalance {
            available,
            requested,
            ..
        }) => {
            assert_eq!(available, 10_000);
            assert_eq!(requested, 10_001);
        }
        other => panic!("expected insufficient balance, got {:?}", other.map(|p| p.id)),
    }

    assert!(
        service
            .list_payouts(Some(providers.laboratory.id), None)
            .await?
            .is_empty()
    );

    // Exactly the available balance is fine
    service
        .request_payout(payout(&providers.laboratory, 10_000))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_pending_payouts_reserve_funds() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    providers.prescriptions(&service, 1, Utc::now()).await?;

    service
        .request_payout(payout(&providers.pharmacy, 6_000))
        .await?;
    // A second request may not spend the same money twice
    let second = service
        .request_payout(payout(&providers.pharmacy, 6_000))
        .await;
    assert!(matches!(second, Err(AppError::InsufficientBalance { .. })));

    service
        .request_payout(payout(&providers.pharmacy, 4_000))
        .await?;
    assert_eq!(
        service.provider_balance(providers.pharmacy.id).await?.available,
        0
    );

    Ok(())
}

#[tokio::test]
async fn test_concurrent_payout_requests_do_not_overdraw() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);
    let providers = StandardProviders::create(&service).await?;
    providers.prescriptions(&service, 1, Utc::now()).await?;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let service = Arc::clone(&service);
        let request = payout(&providers.pharmacy, 4_000);
        handles.push(tokio::spawn(
            async move { service.request_payout(request).await },
        ));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await?.is_ok() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 2);
    assert_eq!(
        service.provider_balance(providers.pharmacy.id).await?.available,
        2_000
    );
    Ok(())
}

#[tokio::test]
async fn test_payout_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    providers.prescriptions(&service, 1, Utc::now()).await?;

    let result = service.request_payout(payout(&providers.pharmacy, 0)).await;
    assert!(matches!(result, Err(AppError::InvalidAmount(_))));

    let result = service
        .request_payout(NewPayout {
            provider_id: providers.pharmacy.id,
            amount_cents: 1_000,
            payment_details: PaymentDetails::Bank {
                bank_name: "Sampath Bank".into(),
                account_name: "City Pharmacy".into(),
                account_number: "".into(),
                branch: None,
            },
            notes: None,
        })
        .await;
    assert!(matches!(result, Err(AppError::InvalidPaymentDetails(_))));

    let result = service
        .request_payout(NewPayout {
            provider_id: uuid::Uuid::new_v4(),
            amount_cents: 1_000,
            payment_details: bank_details(),
            notes: None,
        })
        .await;
    assert!(matches!(result, Err(AppError::ProviderNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_payout_lifecycle() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    providers.lab_bookings(&service, 2, Utc::now()).await?;

    let request = service
        .request_payout(NewPayout {
            provider_id: providers.laboratory.id,
            amount_cents: 15_000,
            payment_details: PaymentDetails::Qr {
                qr_reference: "LANKAQR-0042".into(),
            },
            notes: Some("March payout".into()),
        })
        .await?;
    assert_eq!(request.payment_method, PaymentMethod::QrCode);

    let processing = service.start_processing(request.id).await?;
    assert_eq!(processing.status, PayoutStatus::Processing);
    assert!(processing.processed_at.is_none());

    // Processing payouts still reserve funds
    let balance = service.provider_balance(providers.laboratory.id).await?;
    assert_eq!(balance.reserved, 15_000);
    assert_eq!(balance.available, 5_000);

    let completed = service
        .complete_payout(request.id, Some("Paid via LankaQR".into()))
        .await?;
    assert_eq!(completed.status, PayoutStatus::Completed);
    assert!(completed.processed_at.is_some());

    let stored = service.get_payout(request.id).await?;
    assert_eq!(stored.status, PayoutStatus::Completed);
    assert_eq!(stored.notes.as_deref(), Some("Paid via LankaQR"));
    assert!(stored.processed_at.is_some());

    let balance = service.provider_balance(providers.laboratory.id).await?;
    assert_eq!(balance.reserved, 0);
    assert_eq!(balance.paid_out, 15_000);
    assert_eq!(balance.available, 5_000);

    Ok(())
}

#[tokio::test]
async fn test_failed_payout_releases_funds() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    providers.prescriptions(&service, 1, Utc::now()).await?;

    let request = service
        .request_payout(payout(&providers.pharmacy, 10_000))
        .await?;
    assert_eq!(
        service.provider_balance(providers.pharmacy.id).await?.available,
        0
    );

    let failed = service
        .fail_payout(request.id, Some("Account number mismatch".into()))
        .await?;
    assert_eq!(failed.status, PayoutStatus::Failed);
    assert!(failed.processed_at.is_some());
    assert_eq!(
        service.provider_balance(providers.pharmacy.id).await?.available,
        10_000
    );

    // The money can be requested again
    service
        .request_payout(payout(&providers.pharmacy, 10_000))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_terminal_payouts_are_immutable() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    providers.prescriptions(&service, 2, Utc::now()).await?;

    let paid = service
        .request_payout(payout(&providers.pharmacy, 5_000))
        .await?;
    service.complete_payout(paid.id, None).await?;

    for result in [
        service.start_processing(paid.id).await,
        service.complete_payout(paid.id, None).await,
        service.fail_payout(paid.id, None).await,
    ] {
        assert!(matches!(
            result,
            Err(AppError::InvalidStatusTransition { .. })
        ));
    }

    let rejected = service
        .request_payout(payout(&providers.pharmacy, 5_000))
        .await?;
    service.fail_payout(rejected.id, None).await?;
    let result = service.complete_payout(rejected.id, None).await;
    assert!(matches!(
        result,
        Err(AppError::InvalidStatusTransition { .. })
    ));

    // Processing payouts may only complete
    let in_flight = service
        .request_payout(payout(&providers.pharmacy, 5_000))
        .await?;
    service.start_processing(in_flight.id).await?;
    let result = service.fail_payout(in_flight.id, None).await;
    assert!(matches!(
        result,
        Err(AppError::InvalidStatusTransition { .. })
    ));
    assert_eq!(
        service.get_payout(in_flight.id).await?.status,
        PayoutStatus::Processing
    );

    Ok(())
}

#[tokio::test]
async fn test_list_payouts_filters() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    providers.prescriptions(&service, 2, Utc::now()).await?;
    providers.lab_bookings(&service, 2, Utc::now()).await?;

    let first = service
        .request_payout(payout(&providers.pharmacy, 1_000))
        .await?;
    service
        .request_payout(payout(&providers.pharmacy, 2_000))
        .await?;
    service
        .request_payout(payout(&providers.laboratory, 3_000))
        .await?;
    service.start_processing(first.id).await?;

    let all = service.list_payouts(None, None).await?;
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].requested_at >= w[1].requested_at));

    let pharmacy = service
        .list_payouts(Some(providers.pharmacy.id), None)
        .await?;
    assert_eq!(pharmacy.len(), 2);

    let processing = service
        .list_payouts(None, Some(PayoutStatus::Processing))
        .await?;
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].id, first.id);

    assert!(matches!(
        service.get_payout(uuid::Uuid::new_v4()).await,
        Err(AppError::PayoutNotFound(_))
    ));
    Ok(())
}
