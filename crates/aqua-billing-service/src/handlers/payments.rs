//! Hosted-payment session handlers.
//!
//! Each endpoint prices what the customer owes right now, asks the gateway
//! for a hosted session, and persists a [`PaymentSession`] keyed by the
//! encoded reference so the webhook can correlate the callback later. No bill
//! or ledger state changes here; settlement happens only when the gateway
//! calls back.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use aqua_billing_core::{
    Bill, BillId, ConnectionRequestId, PaymentReference, PaymentSession, UserId,
};
use aqua_billing_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::midtrans::{
    Callbacks, CustomerDetails, ItemDetail, PaymentGateway, SnapRequest, TransactionDetails,
};
use crate::state::AppState;

/// Response for a created payment session.
#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    /// The gateway order id (encoded payment reference).
    pub order_id: String,
    /// Token for the gateway's hosted payment page.
    pub token: String,
    /// Redirect URL for the gateway's hosted payment page.
    pub redirect_url: String,
    /// Amount the customer is asked to pay, in rupiah.
    pub gross_amount: i64,
    /// Bills the session will settle.
    pub covered_bills: Vec<BillId>,
}

/// Create a hosted-payment session for one owned, unpaid bill.
pub async fn create_bill_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(bill_id): Path<String>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), ApiError> {
    let bill_id = bill_id
        .parse::<BillId>()
        .map_err(|_| ApiError::BadRequest("Invalid bill ID".into()))?;
    let bill = state
        .store
        .get_bill(&bill_id)?
        .ok_or_else(|| ApiError::NotFound("Bill not found".into()))?;

    if bill.user_id != auth.user_id {
        return Err(ApiError::Forbidden);
    }
    if bill.is_paid {
        return Err(ApiError::Conflict("bill already paid".into()));
    }

    let now = Utc::now();
    let late_fee = bill.late_fee_at(now);
    let gross_amount = bill.base_due() + late_fee;

    let mut items = vec![
        ItemDetail::new(
            format!("WATER-{}", bill.id),
            format!("Water usage {} ({} m3)", bill.period, bill.usage_delta),
            bill.water_charge,
        ),
        ItemDetail::new("SERVICE-FEE", "Service fee", bill.service_fee),
    ];
    if late_fee > 0 {
        items.push(ItemDetail::new("LATE-FEE", "Late fee", late_fee));
    }

    let reference = PaymentReference::bill(bill.id);
    let response = open_session(
        &state,
        reference,
        auth.user_id,
        vec![bill.id],
        gross_amount,
        items,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Create one hosted-payment session covering all of the caller's unpaid
/// bills. The covered set is captured now; bills generated afterwards are
/// not settled by this session.
pub async fn create_multi_bill_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), ApiError> {
    let mut unpaid: Vec<Bill> = state
        .store
        .list_bills_by_user(&auth.user_id)?
        .into_iter()
        .filter(|bill| !bill.is_paid)
        .collect();

    if unpaid.is_empty() {
        return Err(ApiError::NotFound("No unpaid bills".into()));
    }
    unpaid.sort_by_key(|bill| bill.due_date);

    let now = Utc::now();
    let mut gross_amount = 0;
    let mut items = Vec::with_capacity(unpaid.len());
    let mut covered = Vec::with_capacity(unpaid.len());
    for bill in &unpaid {
        let amount = bill.base_due() + bill.late_fee_at(now);
        gross_amount += amount;
        items.push(ItemDetail::new(
            bill.id.to_string(),
            format!("Water bill {}", bill.period),
            amount,
        ));
        covered.push(bill.id);
    }

    let reference = PaymentReference::multi_bill(auth.user_id, now);
    let response = open_session(
        &state,
        reference,
        auth.user_id,
        covered,
        gross_amount,
        items,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Create a hosted-payment session for an owned, unpaid connection fee.
pub async fn create_connection_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(request_id): Path<String>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), ApiError> {
    let request_id = request_id
        .parse::<ConnectionRequestId>()
        .map_err(|_| ApiError::BadRequest("Invalid connection request ID".into()))?;
    let request = state
        .store
        .get_connection_request(&request_id)?
        .ok_or_else(|| ApiError::NotFound("Connection request not found".into()))?;

    if request.user_id != auth.user_id {
        return Err(ApiError::Forbidden);
    }
    if request.is_paid {
        return Err(ApiError::Conflict("connection fee already paid".into()));
    }

    let items = vec![ItemDetail::new(
        request.id.to_string(),
        "Connection installation fee",
        request.total_cost,
    )];

    let reference = PaymentReference::connection_fee(request.id, Utc::now());
    let response = open_session(
        &state,
        reference,
        auth.user_id,
        Vec::new(),
        request.total_cost,
        items,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Look up one of the caller's payment sessions by its order id.
pub async fn get_payment_session(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(reference): Path<String>,
) -> Result<Json<PaymentSession>, ApiError> {
    let session = state
        .store
        .get_session(&reference)?
        .ok_or_else(|| ApiError::NotFound("Payment session not found".into()))?;

    if session.user_id != auth.user_id {
        return Err(ApiError::Forbidden);
    }

    Ok(Json(session))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Ask the gateway for a hosted session and persist its record.
async fn open_session(
    state: &AppState,
    reference: PaymentReference,
    user_id: UserId,
    covered_bills: Vec<BillId>,
    gross_amount: i64,
    item_details: Vec<ItemDetail>,
) -> Result<CreatePaymentResponse, ApiError> {
    let Some(gateway) = &state.gateway else {
        return Err(ApiError::ExternalService(
            "payment gateway is not configured".into(),
        ));
    };

    let order_id = reference.to_string();
    let request = SnapRequest {
        transaction_details: TransactionDetails {
            order_id: order_id.clone(),
            gross_amount,
        },
        customer_details: customer_details(state, &user_id)?,
        item_details,
        callbacks: Some(Callbacks::for_frontend(&state.config.frontend_url)),
    };

    let snap = gateway.create_transaction(request).await?;

    let session = PaymentSession::new(
        reference,
        user_id,
        covered_bills,
        gross_amount,
        snap.token.clone(),
        snap.redirect_url.clone(),
    );
    state.store.put_session(&session)?;

    tracing::info!(
        order_id = %order_id,
        user_id = %user_id,
        gross_amount = %gross_amount,
        covered = %session.covered_bills.len(),
        "Payment session created"
    );

    Ok(CreatePaymentResponse {
        order_id,
        token: snap.token,
        redirect_url: snap.redirect_url,
        gross_amount,
        covered_bills: session.covered_bills,
    })
}

/// Gateway customer details from the directory, if the profile exists.
fn customer_details(
    state: &AppState,
    user_id: &UserId,
) -> Result<Option<CustomerDetails>, ApiError> {
    let profile = state.store.get_customer(user_id)?;
    Ok(profile.map(|p| CustomerDetails {
        first_name: p.full_name,
        email: p.email,
        phone: p.phone,
    }))
}
