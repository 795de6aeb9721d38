use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::application::AppError;
use crate::domain::{PayoutStatus, ProviderId, TransactionStatus, VerificationStatus};

// Request bodies

#[derive(Debug, Deserialize)]
pub struct RegisterProviderRequest {
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

#[derive(Debug, Deserialize)]
pub struct VerificationRequest {
    pub status: VerificationStatus,
}

#[derive(Debug, Deserialize)]
pub struct PrescriptionCommissionRequest {
    pub pharmacy_id: ProviderId,
    pub prescription_id: String,
    #[serde(default)]
    pub transaction_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct LabBookingCommissionRequest {
    pub laboratory_id: ProviderId,
    pub booking_id: String,
    #[serde(default)]
    pub transaction_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TransactionStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayoutActionRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayoutQuery {
    pub provider_id: Option<ProviderId>,
    pub status: Option<PayoutStatus>,
}

// Error response

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Newtype so `AppError` can be returned from handlers.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::ProviderNotFound(_)
            | AppError::CommissionNotFound(_)
            | AppError::PayoutNotFound(_) => StatusCode::NOT_FOUND,
            AppError::ProviderKindMismatch { .. }
            | AppError::InvalidAmount(_)
            | AppError::InvalidInput(_)
            | AppError::InvalidPaymentDetails(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidStatusTransition { .. } => StatusCode::CONFLICT,
            AppError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self.0 {
            AppError::Database(err) => {
                error!(error = ?err, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
