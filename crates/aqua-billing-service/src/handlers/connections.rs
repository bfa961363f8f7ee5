//! Connection (installation) request handlers.
//!
//! The survey and technician workflow lives elsewhere; billing records the
//! installation fee, sells a payment session for it (see
//! [`super::payments`]), and tracks whether it has been paid. Connection fees
//! never touch any meter ledger.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use aqua_billing_core::{ConnectionRequest, ConnectionRequestId, NotificationCategory, UserId};
use aqua_billing_store::Store;

use crate::auth::{Actor, AdminAuth, AuthUser};
use crate::billing::{notify, notify_connection_paid};
use crate::error::ApiError;
use crate::state::AppState;

/// Connection request creation payload.
#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    /// The requesting customer.
    pub user_id: String,
    /// Installation fee in rupiah.
    pub total_cost: i64,
    /// Free-form operator notes.
    pub notes: Option<String>,
}

/// Create a connection request with its installation fee (admin).
pub async fn create_connection_request(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Json(body): Json<CreateConnectionRequest>,
) -> Result<(StatusCode, Json<ConnectionRequest>), ApiError> {
    let user_id = body
        .user_id
        .parse::<UserId>()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;
    if body.total_cost <= 0 {
        return Err(ApiError::BadRequest("total_cost must be positive".into()));
    }

    let mut request = ConnectionRequest::new(user_id, body.total_cost);
    request.notes = body.notes;
    state.store.put_connection_request(&request)?;

    notify(
        state.store.as_ref(),
        user_id,
        "Connection Fee Issued",
        format!(
            "Your connection installation fee is Rp{}. Pay it to schedule installation.",
            request.total_cost
        ),
        NotificationCategory::Billing,
        Some(format!("/connections/{}", request.id)),
    );

    tracing::info!(
        admin_id = %auth.admin_id,
        request_id = %request.id,
        user_id = %user_id,
        total_cost = %request.total_cost,
        "Connection request created"
    );

    Ok((StatusCode::CREATED, Json(request)))
}

/// Get a connection request. Customers see their own; admins see any.
pub async fn get_connection_request(
    State(state): State<Arc<AppState>>,
    admin: Option<AdminAuth>,
    user: Option<AuthUser>,
    Path(request_id): Path<String>,
) -> Result<Json<ConnectionRequest>, ApiError> {
    let actor = Actor::resolve(admin, user)?;

    let request_id = parse_request_id(&request_id)?;
    let request = fetch_request(&state, &request_id)?;

    if !actor.may_access(&request.user_id) {
        return Err(ApiError::Forbidden);
    }

    Ok(Json(request))
}

/// Force a connection fee paid, out-of-band (admin). No ledger effect.
pub async fn mark_connection_paid(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(request_id): Path<String>,
) -> Result<Json<ConnectionRequest>, ApiError> {
    let request_id = parse_request_id(&request_id)?;
    let mut request = fetch_request(&state, &request_id)?;

    if request.is_paid {
        return Err(ApiError::Conflict("connection fee already paid".into()));
    }

    request.mark_paid(Utc::now());
    state.store.put_connection_request(&request)?;
    notify_connection_paid(state.store.as_ref(), &request);

    tracing::info!(
        admin_id = %auth.admin_id,
        request_id = %request.id,
        "Connection fee marked paid"
    );

    Ok(Json(request))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_request_id(raw: &str) -> Result<ConnectionRequestId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid connection request ID".into()))
}

fn fetch_request(
    state: &AppState,
    request_id: &ConnectionRequestId,
) -> Result<ConnectionRequest, ApiError> {
    state
        .store
        .get_connection_request(request_id)?
        .ok_or_else(|| ApiError::NotFound("Connection request not found".into()))
}
