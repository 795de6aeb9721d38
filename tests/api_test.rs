mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use commission_ledger::api::router;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{StandardProviders, test_service};

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let app = router(Arc::new(service), Duration::from_secs(5));

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
    Ok(())
}

#[tokio::test]
async fn test_register_and_list_providers() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let app = router(Arc::new(service), Duration::from_secs(5));

    let (status, pharmacy) = send(
        &app,
        "POST",
        "/api/pharmacies",
        Some(json!({ "name": "Union Chemists", "phone": "+94 81 222 3344" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pharmacy["kind"], "pharmacy");
    assert_eq!(pharmacy["verification"], "pending");

    let (status, _) = send(
        &app,
        "POST",
        "/api/laboratories",
        Some(json!({ "name": "Asiri Labs" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, list) = send(&app, "GET", "/api/pharmacies", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["name"], "Union Chemists");

    let id = pharmacy["id"].as_str().unwrap();
    let (status, verified) = send(
        &app,
        "POST",
        &format!("/api/providers/{}/verification", id),
        Some(json!({ "status": "verified" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["verification"], "verified");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/providers/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Provider not found"));

    Ok(())
}

#[tokio::test]
async fn test_billable_events_and_commission_queries() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    let app = router(Arc::new(service), Duration::from_secs(5));

    let (status, tx) = send(
        &app,
        "POST",
        "/api/prescriptions/commission",
        Some(json!({
            "pharmacy_id": providers.pharmacy.id,
            "prescription_id": "RX-5001",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tx["amount_cents"], 10_000);
    assert_eq!(tx["category"], "prescription");
    assert_eq!(tx["status"], "completed");

    let (status, _) = send(
        &app,
        "POST",
        "/api/lab-bookings/commission",
        Some(json!({
            "laboratory_id": providers.laboratory.id,
            "booking_id": "LB-77",
            "transaction_date": "2024-02-14T09:30:00Z",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // A laboratory cannot earn prescription commissions
    let (status, _) = send(
        &app,
        "POST",
        "/api/prescriptions/commission",
        Some(json!({
            "pharmacy_id": providers.laboratory.id,
            "prescription_id": "RX-5002",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, list) = send(
        &app,
        "GET",
        &format!("/api/commissions?laboratory_id={}", providers.laboratory.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["lab_booking_id"], "LB-77");

    let (status, list) = send(&app, "GET", "/api/commissions?status=pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());

    let id = tx["id"].as_str().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/api/commissions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["prescription_id"], "RX-5001");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/commissions/{}/status", id),
        Some(json!({ "status": "pending" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn test_payout_flow_over_http() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    providers
        .prescriptions(&service, 2, chrono::Utc::now())
        .await?;
    let app = router(Arc::new(service), Duration::from_secs(5));

    let (status, body) = send(
        &app,
        "POST",
        "/api/payouts",
        Some(json!({
            "provider_id": providers.pharmacy.id,
            "amount_cents": 25_000,
            "payment_details": { "type": "qr", "qr_reference": "LANKAQR-9" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("Insufficient balance"));

    let (status, payout) = send(
        &app,
        "POST",
        "/api/payouts",
        Some(json!({
            "provider_id": providers.pharmacy.id,
            "amount_cents": 15_000,
            "payment_details": {
                "type": "bank",
                "bank_name": "Bank of Ceylon",
                "account_name": "City Pharmacy",
                "account_number": "0071234",
            },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payout["status"], "pending");
    assert_eq!(payout["payment_method"], "bank_transfer");

    let id = payout["id"].as_str().unwrap();
    let (status, processing) =
        send(&app, "POST", &format!("/api/payouts/{}/process", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(processing["status"], "processing");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/payouts/{}/fail", id),
        Some(json!({ "notes": "too late" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, completed) = send(
        &app,
        "POST",
        &format!("/api/payouts/{}/complete", id),
        Some(json!({ "notes": "Transferred" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["notes"], "Transferred");
    assert!(completed["processed_at"].is_string());

    let (status, list) = send(
        &app,
        "GET",
        &format!(
            "/api/payouts?provider_id={}&status=completed",
            providers.pharmacy.id
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, dashboard) = send(
        &app,
        "GET",
        &format!("/api/dashboard/providers/{}", providers.pharmacy.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["balance"]["paid_out"], 15_000);
    assert_eq!(dashboard["balance"]["available"], 5_000);

    let (status, admin) = send(&app, "GET", "/api/dashboard/admin", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(admin["summary"]["gross"], 20_000);
    assert_eq!(admin["total_paid_out"], 15_000);

    Ok(())
}

#[tokio::test]
async fn test_invalid_payment_details_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    providers
        .lab_bookings(&service, 1, chrono::Utc::now())
        .await?;
    let app = router(Arc::new(service), Duration::from_secs(5));

    let (status, body) = send(
        &app,
        "POST",
        "/api/payouts",
        Some(json!({
            "provider_id": providers.laboratory.id,
            "amount_cents": 1_000,
            "payment_details": { "type": "qr", "qr_reference": "" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("qr_reference"));
    Ok(())
}

#[tokio::test]
async fn test_complete_and_fail_accept_empty_body() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let providers = StandardProviders::create(&service).await?;
    providers
        .prescriptions(&service, 1, chrono::Utc::now())
        .await?;
    let first = service
        .request_payout(common::payout(&providers.pharmacy, 5_000))
        .await?;
    let second = service
        .request_payout(common::payout(&providers.pharmacy, 5_000))
        .await?;
    let app = router(Arc::new(service), Duration::from_secs(5));

    let (status, completed) = send(
        &app,
        "POST",
        &format!("/api/payouts/{}/complete", first.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    assert!(completed["notes"].is_null());

    let (status, failed) = send(
        &app,
        "POST",
        &format!("/api/payouts/{}/fail", second.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["status"], "failed");

    Ok(())
}
