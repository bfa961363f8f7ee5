//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    bills, connections, health, notifications, payments, reports, usage, webhooks,
};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for usage endpoints.
/// This prevents overload from high-volume meter reporting.
const USAGE_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Usage (Service API Key auth, rate-limited)
/// - `POST /v1/usage` - Record a meter reading delta
/// - `POST /v1/usage/batch` - Record multiple meter readings
///
/// ## Bills (Zero-ID JWT auth)
/// - `GET /v1/bills/me` - Current user's bills
/// - `GET /v1/bills/me/unpaid` - Current user's unpaid bills with projected dues
/// - `GET /v1/bills/:id` - One bill (owner or admin)
/// - `POST /v1/bills/:id/pay` - Record a manual payment
/// - `POST /v1/bills/pay-all` - Settle all of the user's unpaid bills
///
/// ## Payments (Zero-ID JWT auth)
/// - `POST /v1/payments/bill/:id` - Open a gateway session for one bill
/// - `POST /v1/payments/bills` - Open a gateway session for all unpaid bills
/// - `POST /v1/payments/connection/:id` - Open a session for a connection fee
/// - `GET /v1/payments/:reference` - Look up a payment session
///
/// ## Notifications (Zero-ID JWT auth)
/// - `GET /v1/notifications` - Current user's notifications, newest first
///
/// ## Connections (admin create/settle; owner or admin read)
/// - `POST /v1/connections` - Issue a connection fee request
/// - `GET /v1/connections/:id` - One connection request
/// - `PUT /v1/connections/:id/paid` - Mark a connection fee paid out-of-band
///
/// ## Admin (Admin API Key auth)
/// - `POST /v1/bills/generate` - Generate bills for all meters
/// - `POST /v1/bills/generate/:meter_id` - Generate one bill
/// - `GET /v1/bills` - List bills with filters
/// - `PUT /v1/bills/:id/status` - Force a bill's payment status
/// - `DELETE /v1/bills/:id` - Delete a bill record
/// - `GET /v1/reports/:period` - Monthly revenue report
/// - `POST /v1/sweeps/overdue` - Flag past-due bills
/// - `POST /v1/sweeps/reminders` - Send due-soon reminders
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/payment` - Midtrans transaction status callbacks
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Create concurrency-limited usage routes
    // Usage endpoints take high-volume traffic from meter collectors, so they
    // have a higher concurrency limit but are still protected from overload.
    let usage_routes = Router::new()
        .route("/", post(usage::record_usage))
        .route("/batch", post(usage::record_usage_batch))
        .layer(ConcurrencyLimitLayer::new(USAGE_MAX_CONCURRENT_REQUESTS));

    // Create concurrency-limited API routes
    let api_routes = Router::new()
        // Bills
        .route("/bills/me", get(bills::list_my_bills))
        .route("/bills/me/unpaid", get(bills::list_my_unpaid_bills))
        .route("/bills/pay-all", post(bills::pay_all_bills))
        .route("/bills/generate", post(bills::generate_bills))
        .route(
            "/bills/generate/:meter_id",
            post(bills::generate_bill_for_meter),
        )
        .route("/bills", get(bills::list_bills))
        .route("/bills/:id", get(bills::get_bill))
        .route("/bills/:id", delete(bills::delete_bill))
        .route("/bills/:id/pay", post(bills::pay_bill))
        .route("/bills/:id/status", put(bills::update_bill_status))
        // Payments
        .route("/payments/bill/:id", post(payments::create_bill_payment))
        .route("/payments/bills", post(payments::create_multi_bill_payment))
        .route(
            "/payments/connection/:id",
            post(payments::create_connection_payment),
        )
        .route("/payments/:reference", get(payments::get_payment_session))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        // Connection requests
        .route("/connections", post(connections::create_connection_request))
        .route("/connections/:id", get(connections::get_connection_request))
        .route(
            "/connections/:id/paid",
            put(connections::mark_connection_paid),
        )
        // Reports and sweeps
        .route("/reports/:period", get(reports::monthly_report))
        .route("/sweeps/overdue", post(bills::run_overdue_sweep))
        .route("/sweeps/reminders", post(bills::run_reminder_sweep))
        // Usage routes (with their own concurrency limit)
        .nest("/usage", usage_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - delivery is controlled by the gateway)
        .route("/webhooks/payment", post(webhooks::payment_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
