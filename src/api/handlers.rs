use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::application::{
    AdminDashboard, CommissionFilter, CommissionService, NewCommission, NewPayout, NewProvider,
    ProviderDashboard,
};
use crate::domain::{
    CommissionId, CommissionTransaction, PayoutId, PayoutRequest, Provider, ProviderId,
    ProviderKind,
};

use super::models::{
    ApiError, LabBookingCommissionRequest, PayoutActionRequest, PayoutQuery,
    PrescriptionCommissionRequest, RegisterProviderRequest, StatusRequest, VerificationRequest,
};

pub type AppState = Arc<CommissionService>;

pub async fn health() -> &'static str {
    "OK"
}

// Providers

pub async fn list_pharmacies(
    State(service): State<AppState>,
) -> Result<Json<Vec<Provider>>, ApiError> {
    Ok(Json(service.list_providers(Some(ProviderKind::Pharmacy)).await?))
}

pub async fn list_laboratories(
    State(service): State<AppState>,
) -> Result<Json<Vec<Provider>>, ApiError> {
    Ok(Json(
        service
            .list_providers(Some(ProviderKind::Laboratory))
            .await?,
    ))
}

pub async fn register_pharmacy(
    State(service): State<AppState>,
    Json(req): Json<RegisterProviderRequest>,
) -> Result<(StatusCode, Json<Provider>), ApiError> {
    register(&service, ProviderKind::Pharmacy, req).await
}

pub async fn register_laboratory(
    State(service): State<AppState>,
    Json(req): Json<RegisterProviderRequest>,
) -> Result<(StatusCode, Json<Provider>), ApiError> {
    register(&service, ProviderKind::Laboratory, req).await
}

async fn register(
    service: &CommissionService,
    kind: ProviderKind,
    req: RegisterProviderRequest,
) -> Result<(StatusCode, Json<Provider>), ApiError> {
    let provider = service
        .register_provider(NewProvider {
            kind,
            name: req.name,
            registration_number: req.registration_number,
            address: req.address,
            phone: req.phone,
            email: req.email,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(provider)))
}

pub async fn get_provider(
    State(service): State<AppState>,
    Path(provider_id): Path<ProviderId>,
) -> Result<Json<Provider>, ApiError> {
    Ok(Json(service.get_provider(provider_id).await?))
}

pub async fn set_verification(
    State(service): State<AppState>,
    Path(provider_id): Path<ProviderId>,
    Json(req): Json<VerificationRequest>,
) -> Result<Json<Provider>, ApiError> {
    Ok(Json(service.set_verification(provider_id, req.status).await?))
}

// Commissions

pub async fn prescription_commission(
    State(service): State<AppState>,
    Json(req): Json<PrescriptionCommissionRequest>,
) -> Result<(StatusCode, Json<CommissionTransaction>), ApiError> {
    let commission = service
        .record_prescription_commission(
            req.pharmacy_id,
            &req.prescription_id,
            req.transaction_date.unwrap_or_else(Utc::now),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(commission)))
}

pub async fn lab_booking_commission(
    State(service): State<AppState>,
    Json(req): Json<LabBookingCommissionRequest>,
) -> Result<(StatusCode, Json<CommissionTransaction>), ApiError> {
    let commission = service
        .record_lab_booking_commission(
            req.laboratory_id,
            &req.booking_id,
            req.transaction_date.unwrap_or_else(Utc::now),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(commission)))
}

pub async fn list_commissions(
    State(service): State<AppState>,
    Query(filter): Query<CommissionFilter>,
) -> Result<Json<Vec<CommissionTransaction>>, ApiError> {
    Ok(Json(service.list_commissions(filter).await?))
}

pub async fn record_commission(
    State(service): State<AppState>,
    Json(req): Json<NewCommission>,
) -> Result<(StatusCode, Json<CommissionTransaction>), ApiError> {
    let commission = service.record_commission(req).await?;
    Ok((StatusCode::CREATED, Json(commission)))
}

pub async fn get_commission(
    State(service): State<AppState>,
    Path(commission_id): Path<CommissionId>,
) -> Result<Json<CommissionTransaction>, ApiError> {
    Ok(Json(service.get_commission(commission_id).await?))
}

pub async fn update_commission_status(
    State(service): State<AppState>,
    Path(commission_id): Path<CommissionId>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<CommissionTransaction>, ApiError> {
    Ok(Json(
        service
            .update_commission_status(commission_id, req.status)
            .await?,
    ))
}

// Payouts

pub async fn list_payouts(
    State(service): State<AppState>,
    Query(query): Query<PayoutQuery>,
) -> Result<Json<Vec<PayoutRequest>>, ApiError> {
    Ok(Json(
        service
            .list_payouts(query.provider_id, query.status)
            .await?,
    ))
}

pub async fn request_payout(
    State(service): State<AppState>,
    Json(req): Json<NewPayout>,
) -> Result<(StatusCode, Json<PayoutRequest>), ApiError> {
    let payout = service.request_payout(req).await?;
    Ok((StatusCode::CREATED, Json(payout)))
}

pub async fn get_payout(
    State(service): State<AppState>,
    Path(payout_id): Path<PayoutId>,
) -> Result<Json<PayoutRequest>, ApiError> {
    Ok(Json(service.get_payout(payout_id).await?))
}

pub async fn process_payout(
    State(service): State<AppState>,
    Path(payout_id): Path<PayoutId>,
) -> Result<Json<PayoutRequest>, ApiError> {
    Ok(Json(service.start_processing(payout_id).await?))
}

pub async fn complete_payout(
    State(service): State<AppState>,
    Path(payout_id): Path<PayoutId>,
    body: Option<Json<PayoutActionRequest>>,
) -> Result<Json<PayoutRequest>, ApiError> {
    let notes = body.and_then(|Json(req)| req.notes);
    Ok(Json(service.complete_payout(payout_id, notes).await?))
}

pub async fn fail_payout(
    State(service): State<AppState>,
    Path(payout_id): Path<PayoutId>,
    body: Option<Json<PayoutActionRequest>>,
) -> Result<Json<PayoutRequest>, ApiError> {
    let notes = body.and_then(|Json(req)| req.notes);
    Ok(Json(service.fail_payout(payout_id, notes).await?))
}

// Dashboards

pub async fn admin_dashboard(
    State(service): State<AppState>,
) -> Result<Json<AdminDashboard>, ApiError> {
    Ok(Json(service.admin_dashboard(Utc::now()).await?))
}

pub async fn provider_dashboard(
    State(service): State<AppState>,
    Path(provider_id): Path<ProviderId>,
) -> Result<Json<ProviderDashboard>, ApiError> {
    Ok(Json(
        service
            .provider_dashboard(provider_id, Utc::now())
            .await?,
    ))
}
