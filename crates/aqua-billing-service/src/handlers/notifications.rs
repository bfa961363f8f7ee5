//! Customer notification handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use aqua_billing_core::NotificationRecord;
use aqua_billing_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Page size when the query does not give one.
const DEFAULT_LIMIT: usize = 50;

/// Largest page size a single request may ask for.
const MAX_LIMIT: usize = 200;

/// Notification list query.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    /// Maximum records to return (default 50, capped at 200).
    pub limit: Option<usize>,
}

/// Notification list response.
#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    /// The caller's notifications, newest first.
    pub notifications: Vec<NotificationRecord>,
    /// Number of notifications returned.
    pub count: usize,
}

/// List the caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let notifications = state
        .store
        .list_notifications_by_user(&auth.user_id, limit)?;
    let count = notifications.len();
    Ok(Json(NotificationsResponse {
        notifications,
        count,
    }))
}
