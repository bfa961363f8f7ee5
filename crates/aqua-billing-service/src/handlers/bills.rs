//! Bill handlers: customer views, manual settlement, and admin operations.
//!
//! Manual settlement (cash desk, bank transfer recorded out-of-band) runs
//! through the same store compound operation as gateway settlement, so late
//! fees, ledger credits, and duplicate protection behave identically on both
//! paths.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aqua_billing_core::{Bill, BillId, BillPeriod, MeterId, UserId};
use aqua_billing_store::Store;

use crate::auth::{Actor, AdminAuth, AuthUser};
use crate::billing::generator::{self, GenerationSummary};
use crate::billing::notify_settlement;
use crate::billing::overdue::{self, OverdueSummary, ReminderSummary};
use crate::error::ApiError;
use crate::state::AppState;

/// Payment method recorded when none is given on a manual settlement.
const DEFAULT_MANUAL_METHOD: &str = "MANUAL";

// ============================================================================
// Customer Endpoints
// ============================================================================

/// Bill list response.
#[derive(Debug, Serialize)]
pub struct BillListResponse {
    /// The bills, newest period first.
    pub bills: Vec<Bill>,
    /// Number of bills returned.
    pub count: usize,
}

/// List the caller's bills.
pub async fn list_my_bills(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BillListResponse>, ApiError> {
    let bills = state.store.list_bills_by_user(&auth.user_id)?;
    let count = bills.len();
    Ok(Json(BillListResponse { bills, count }))
}

/// An unpaid bill with its dues projected to the current clock.
///
/// The projected fee is never persisted; settlement recomputes it
/// authoritatively at payment time.
#[derive(Debug, Serialize)]
pub struct UnpaidBill {
    /// The bill as persisted.
    pub bill: Bill,
    /// Whole days past due (zero or negative before the due date).
    pub days_late: i64,
    /// Late fee if the bill were settled now.
    pub late_fee: i64,
    /// Amount owed if the bill were settled now.
    pub total_with_fee: i64,
}

/// Unpaid bill list response.
#[derive(Debug, Serialize)]
pub struct UnpaidBillsResponse {
    /// Unpaid bills, newest period first.
    pub bills: Vec<UnpaidBill>,
    /// Number of unpaid bills.
    pub count: usize,
    /// Sum owed across all unpaid bills, projected fees included.
    pub total_due: i64,
}

/// List the caller's unpaid bills with dues computed as of now.
pub async fn list_my_unpaid_bills(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<UnpaidBillsResponse>, ApiError> {
    let now = Utc::now();
    let bills: Vec<UnpaidBill> = state
        .store
        .list_bills_by_user(&auth.user_id)?
        .into_iter()
        .filter(|bill| !bill.is_paid)
        .map(|bill| project_dues(bill, now))
        .collect();

    let count = bills.len();
    let total_due = bills.iter().map(|b| b.total_with_fee).sum();
    Ok(Json(UnpaidBillsResponse {
        bills,
        count,
        total_due,
    }))
}

/// Get a single bill. Customers see their own bills; admins see any.
pub async fn get_bill(
    State(state): State<Arc<AppState>>,
    admin: Option<AdminAuth>,
    user: Option<AuthUser>,
    Path(bill_id): Path<String>,
) -> Result<Json<Bill>, ApiError> {
    let actor = Actor::resolve(admin, user)?;

    let bill_id = parse_bill_id(&bill_id)?;
    let bill = fetch_bill(&state, &bill_id)?;

    if !actor.may_access(&bill.user_id) {
        return Err(ApiError::Forbidden);
    }

    Ok(Json(bill))
}

/// Manual settlement request.
#[derive(Debug, Default, Deserialize)]
pub struct PayBillRequest {
    /// How the payment was taken (e.g. "MANUAL", "TRANSFER").
    pub method: Option<String>,
}

/// Settle one owned, unpaid bill out-of-band.
pub async fn pay_bill(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(bill_id): Path<String>,
    body: Option<Json<PayBillRequest>>,
) -> Result<Json<Bill>, ApiError> {
    let bill_id = parse_bill_id(&bill_id)?;
    let bill = fetch_bill(&state, &bill_id)?;

    if bill.user_id != auth.user_id {
        return Err(ApiError::Forbidden);
    }
    if bill.is_paid {
        return Err(ApiError::Conflict("bill already paid".into()));
    }

    let method = payment_method(body);
    let now = Utc::now();
    let settled = state.store.settle_bills(&[bill_id], &method, now)?;
    // A concurrent settlement between our check and the locked write leaves
    // nothing for us to settle.
    let Some(bill) = settled.into_iter().next() else {
        return Err(ApiError::Conflict("bill already paid".into()));
    };

    notify_settlement(state.store.as_ref(), std::slice::from_ref(&bill));
    tracing::info!(
        bill_id = %bill.id,
        user_id = %auth.user_id,
        method = %method,
        total_due = %bill.total_due,
        "Bill settled manually"
    );

    Ok(Json(bill))
}

/// Pay-all response.
#[derive(Debug, Serialize)]
pub struct PayAllResponse {
    /// Bills settled by this call.
    pub bills: Vec<Bill>,
    /// Number of bills settled.
    pub count: usize,
    /// Total collected, fixed late fees included.
    pub total_paid: i64,
}

/// Settle every unpaid bill of the caller out-of-band.
pub async fn pay_all_bills(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Option<Json<PayBillRequest>>,
) -> Result<Json<PayAllResponse>, ApiError> {
    let unpaid: Vec<BillId> = state
        .store
        .list_bills_by_user(&auth.user_id)?
        .into_iter()
        .filter(|bill| !bill.is_paid)
        .map(|bill| bill.id)
        .collect();

    if unpaid.is_empty() {
        return Err(ApiError::NotFound("No unpaid bills".into()));
    }

    let method = payment_method(body);
    let now = Utc::now();
    let bills = state.store.settle_bills(&unpaid, &method, now)?;
    notify_settlement(state.store.as_ref(), &bills);

    let count = bills.len();
    let total_paid = bills.iter().map(|bill| bill.total_due).sum();
    tracing::info!(
        user_id = %auth.user_id,
        count = %count,
        total_paid = %total_paid,
        method = %method,
        "All unpaid bills settled manually"
    );

    Ok(Json(PayAllResponse {
        bills,
        count,
        total_paid,
    }))
}

// ============================================================================
// Admin Endpoints
// ============================================================================

/// Bill generation request.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    /// Billing period `YYYY-MM`. Defaults to the current month.
    pub period: Option<String>,
}

/// Generate bills for every meter (admin).
pub async fn generate_bills(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    body: Option<Json<GenerateRequest>>,
) -> Result<(StatusCode, Json<GenerationSummary>), ApiError> {
    let now = Utc::now();
    let period = parse_period_or_current(body.and_then(|Json(b)| b.period), now)?;

    tracing::info!(admin_id = %auth.admin_id, period = %period, "Bill generation requested");
    let summary = generator::generate_for_all(state.store.as_ref(), period, now)?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// Generate a bill for one meter (admin).
pub async fn generate_bill_for_meter(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(meter_id): Path<String>,
    body: Option<Json<GenerateRequest>>,
) -> Result<(StatusCode, Json<Bill>), ApiError> {
    let meter_id = meter_id
        .parse::<MeterId>()
        .map_err(|_| ApiError::BadRequest("Invalid meter ID".into()))?;
    let now = Utc::now();
    let period = parse_period_or_current(body.and_then(|Json(b)| b.period), now)?;

    let bill = generator::generate_for_meter(state.store.as_ref(), &meter_id, period, now)?;
    Ok((StatusCode::CREATED, Json(bill)))
}

/// Admin bill query filters. All fields are optional conjuncts.
#[derive(Debug, Default, Deserialize)]
pub struct BillFilter {
    /// Keep only bills with this paid state.
    pub paid: Option<bool>,
    /// Keep only bills for this period (`YYYY-MM`).
    pub period: Option<String>,
    /// Keep only bills of this customer.
    pub user_id: Option<String>,
    /// Keep only bills of this meter.
    pub meter_id: Option<String>,
    /// Keep only bills with this overdue flag.
    pub overdue: Option<bool>,
}

/// List bills across all customers with optional filters (admin).
pub async fn list_bills(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Query(filter): Query<BillFilter>,
) -> Result<Json<BillListResponse>, ApiError> {
    let period = filter
        .period
        .as_deref()
        .map(str::parse::<BillPeriod>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let user_id = filter
        .user_id
        .as_deref()
        .map(str::parse::<UserId>)
        .transpose()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;
    let meter_id = filter
        .meter_id
        .as_deref()
        .map(str::parse::<MeterId>)
        .transpose()
        .map_err(|_| ApiError::BadRequest("Invalid meter ID".into()))?;

    // The per-user index is the selective one; scan everything otherwise.
    let unfiltered = match user_id {
        Some(user_id) => state.store.list_bills_by_user(&user_id)?,
        None => state.store.list_bills()?,
    };

    let bills: Vec<Bill> = unfiltered
        .into_iter()
        .filter(|b| filter.paid.map_or(true, |paid| b.is_paid == paid))
        .filter(|b| period.map_or(true, |p| b.period == p))
        .filter(|b| meter_id.map_or(true, |m| b.meter_id == m))
        .filter(|b| filter.overdue.map_or(true, |o| b.is_overdue == o))
        .collect();

    let count = bills.len();
    Ok(Json(BillListResponse { bills, count }))
}

/// Admin status override request.
#[derive(Debug, Deserialize)]
pub struct UpdateBillStatusRequest {
    /// Desired paid state.
    pub is_paid: bool,
    /// Payment method recorded when forcing PAID. Defaults to "MANUAL".
    pub payment_method: Option<String>,
}

/// Force a bill's paid state either way (admin override).
///
/// Forcing PAID runs the normal settlement (late fee fixed, ledger credited,
/// notification written). Forcing UNPAID reverses the settlement and restores
/// the meter's unbilled counter; it is the only sanctioned PAID to UNPAID
/// transition.
pub async fn update_bill_status(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(bill_id): Path<String>,
    Json(body): Json<UpdateBillStatusRequest>,
) -> Result<Json<Bill>, ApiError> {
    let bill_id = parse_bill_id(&bill_id)?;
    let existing = fetch_bill(&state, &bill_id)?;
    let now = Utc::now();

    let bill = if body.is_paid {
        if existing.is_paid {
            return Err(ApiError::Conflict("bill already paid".into()));
        }
        let method = body
            .payment_method
            .unwrap_or_else(|| DEFAULT_MANUAL_METHOD.to_string());
        let settled = state.store.settle_bills(&[bill_id], &method, now)?;
        let Some(bill) = settled.into_iter().next() else {
            return Err(ApiError::Conflict("bill already paid".into()));
        };
        notify_settlement(state.store.as_ref(), std::slice::from_ref(&bill));
        bill
    } else {
        // InvalidState (bill not settled) surfaces as 409.
        state.store.reverse_settlement(&bill_id, now)?
    };

    tracing::info!(
        admin_id = %auth.admin_id,
        bill_id = %bill.id,
        is_paid = %bill.is_paid,
        "Bill status overridden"
    );

    Ok(Json(bill))
}

/// Delete a bill outright (admin escape hatch). No ledger adjustment: the
/// unbilled counter tracks ingested usage, not issued bills.
pub async fn delete_bill(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(bill_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let bill_id = parse_bill_id(&bill_id)?;
    state.store.delete_bill(&bill_id)?;

    tracing::info!(admin_id = %auth.admin_id, bill_id = %bill_id, "Bill deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Run the overdue sweep now (admin).
pub async fn run_overdue_sweep(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
) -> Result<Json<OverdueSummary>, ApiError> {
    tracing::info!(admin_id = %auth.admin_id, "Overdue sweep requested");
    let summary = overdue::mark_overdue(state.store.as_ref(), Utc::now())?;
    Ok(Json(summary))
}

/// Run the due-soon reminder sweep now (admin).
pub async fn run_reminder_sweep(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
) -> Result<Json<ReminderSummary>, ApiError> {
    tracing::info!(admin_id = %auth.admin_id, "Reminder sweep requested");
    let summary = overdue::send_due_reminders(state.store.as_ref(), Utc::now())?;
    Ok(Json(summary))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_bill_id(raw: &str) -> Result<BillId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid bill ID".into()))
}

fn fetch_bill(state: &AppState, bill_id: &BillId) -> Result<Bill, ApiError> {
    state
        .store
        .get_bill(bill_id)?
        .ok_or_else(|| ApiError::NotFound("Bill not found".into()))
}

fn project_dues(bill: Bill, now: DateTime<Utc>) -> UnpaidBill {
    let days_late = bill.days_late(now);
    let late_fee = bill.late_fee_at(now);
    let total_with_fee = bill.base_due() + late_fee;
    UnpaidBill {
        bill,
        days_late,
        late_fee,
        total_with_fee,
    }
}

fn payment_method(body: Option<Json<PayBillRequest>>) -> String {
    body.and_then(|Json(b)| b.method)
        .unwrap_or_else(|| DEFAULT_MANUAL_METHOD.to_string())
}

fn parse_period_or_current(
    raw: Option<String>,
    now: DateTime<Utc>,
) -> Result<BillPeriod, ApiError> {
    match raw {
        Some(s) => s.parse().map_err(|e: aqua_billing_core::PeriodError| {
            ApiError::BadRequest(e.to_string())
        }),
        None => Ok(BillPeriod::containing(now)),
    }
}
