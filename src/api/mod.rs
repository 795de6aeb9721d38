//! JSON REST API over [`CommissionService`].

mod handlers;
pub mod models;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::application::CommissionService;
use crate::config::ServerConfig;

pub use handlers::AppState;

/// Build the application router with its middleware stack.
pub fn router(service: Arc<CommissionService>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/pharmacies",
            get(handlers::list_pharmacies).post(handlers::register_pharmacy),
        )
        .route(
            "/api/laboratories",
            get(handlers::list_laboratories).post(handlers::register_laboratory),
        )
        .route("/api/providers/{provider_id}", get(handlers::get_provider))
        .route(
            "/api/providers/{provider_id}/verification",
            post(handlers::set_verification),
        )
        .route(
            "/api/prescriptions/commission",
            post(handlers::prescription_commission),
        )
        .route(
            "/api/lab-bookings/commission",
            post(handlers::lab_booking_commission),
        )
        .route(
            "/api/commissions",
            get(handlers::list_commissions).post(handlers::record_commission),
        )
        .route("/api/commissions/{commission_id}", get(handlers::get_commission))
        .route(
            "/api/commissions/{commission_id}/status",
            post(handlers::update_commission_status),
        )
        .route(
            "/api/payouts",
            get(handlers::list_payouts).post(handlers::request_payout),
        )
        .route("/api/payouts/{payout_id}", get(handlers::get_payout))
        .route(
            "/api/payouts/{payout_id}/process",
            post(handlers::process_payout),
        )
        .route(
            "/api/payouts/{payout_id}/complete",
            post(handlers::complete_payout),
        )
        .route("/api/payouts/{payout_id}/fail", post(handlers::fail_payout))
        .route("/api/dashboard/admin", get(handlers::admin_dashboard))
        .route(
            "/api/dashboard/providers/{provider_id}",
            get(handlers::provider_dashboard),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(service: CommissionService, config: &ServerConfig) -> Result<()> {
    let app = router(Arc::new(service), config.request_timeout());

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler, run until the process is killed
        std::future::pending::<()>().await;
    }
}
