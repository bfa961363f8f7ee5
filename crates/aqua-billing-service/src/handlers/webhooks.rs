//! Payment gateway webhook handler.
//!
//! Midtrans reports every transaction lifecycle change to this one endpoint.
//! The handler verifies the callback signature, decodes the order id into a
//! [`PaymentReference`], and applies the settlement rules exactly once. The
//! gateway retries on non-2xx responses, so every callback that has been
//! dealt with (including duplicates and callbacks whose target no longer
//! exists) is acknowledged with 200; only signature failures, undecodable
//! order ids, and store errors are rejected.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aqua_billing_core::{
    Bill, BillId, ConnectionRequestId, FraudStatus, GatewayStatus, NotificationCategory,
    PaymentReference, SessionStatus, UserId,
};
use aqua_billing_store::Store;

use crate::billing::{notify, notify_connection_paid, notify_settlement};
use crate::crypto::{constant_time_eq, midtrans_signature};
use crate::error::ApiError;
use crate::state::AppState;

/// Payment method recorded when the callback does not name a channel.
const DEFAULT_GATEWAY_METHOD: &str = "MIDTRANS";

/// Title used for payment-pending notifications.
const PENDING_TITLE: &str = "Payment Pending";

/// Title used for payment-failure notifications.
const FAILURE_TITLE: &str = "Payment Failed";

/// Gateway transaction callback payload (the fields this service acts on).
#[derive(Debug, Deserialize)]
pub struct PaymentNotification {
    /// The order id issued at session creation.
    pub order_id: String,
    /// Gateway status code (e.g. "200").
    pub status_code: String,
    /// Amount as formatted by the gateway (e.g. "105000.00"). Kept as the
    /// raw wire string: it is signature input, never arithmetic input.
    pub gross_amount: String,
    /// SHA-512 signature over order id, status code, amount, and server key.
    pub signature_key: Option<String>,
    /// Transaction lifecycle status.
    pub transaction_status: String,
    /// Fraud review status accompanying card captures.
    pub fraud_status: Option<String>,
    /// Payment channel (e.g. "qris", "bank_transfer").
    pub payment_type: Option<String>,
}

/// Webhook acknowledgement body.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Always "ok" once the callback has been dealt with.
    pub status: String,
}

/// What processing a callback amounted to. Every variant is acknowledged
/// with 200; the distinction exists for logs and tests.
#[derive(Debug)]
enum Outcome {
    /// Funds applied: bills settled or a connection fee marked paid.
    Settled { bills: usize },
    /// Duplicate delivery; the target was already paid.
    AlreadySettled,
    /// Pending status noted, no state change.
    PendingNoted,
    /// Terminal failure noted; session closed, no financial effect.
    FailureNoted,
    /// A status this service does not act on.
    Ignored,
    /// The referenced bill or request no longer exists.
    TargetMissing,
}

/// Handle a gateway transaction status callback.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PaymentNotification>,
) -> Result<Json<WebhookAck>, ApiError> {
    tracing::info!(
        order_id = %body.order_id,
        transaction_status = %body.transaction_status,
        payment_type = ?body.payment_type,
        "Received payment callback"
    );

    verify_signature(&state, &body)?;

    let reference = body.order_id.parse::<PaymentReference>().map_err(|e| {
        tracing::warn!(order_id = %body.order_id, error = %e, "Undecodable order id");
        ApiError::BadRequest(e.to_string())
    })?;

    let status = GatewayStatus::from_wire(&body.transaction_status);
    let fraud = body.fraud_status.as_deref().map(FraudStatus::from_wire);
    let now = Utc::now();

    let outcome = if status.settles(fraud.as_ref()) {
        let method = body
            .payment_type
            .as_deref()
            .unwrap_or(DEFAULT_GATEWAY_METHOD);
        settle(&state, reference, &body.order_id, method, now)?
    } else if status == GatewayStatus::Pending {
        note_pending(&state, &reference, &body.order_id)?
    } else if status.is_failure() {
        note_failure(&state, &reference, &body.order_id, &status, now)?
    } else {
        // Captures awaiting fraud review land here too: settlement arrives
        // as a later callback.
        tracing::info!(
            order_id = %body.order_id,
            transaction_status = %status.as_str(),
            fraud_status = ?body.fraud_status,
            "Callback status not actionable"
        );
        Outcome::Ignored
    };

    tracing::info!(
        order_id = %body.order_id,
        outcome = ?outcome,
        "Payment callback processed"
    );

    Ok(Json(WebhookAck {
        status: "ok".into(),
    }))
}

// ============================================================================
// Settlement Dispatch
// ============================================================================

fn settle(
    state: &AppState,
    reference: PaymentReference,
    order_id: &str,
    method: &str,
    now: DateTime<Utc>,
) -> Result<Outcome, ApiError> {
    match reference {
        PaymentReference::Bill(bill_id) => settle_single(state, bill_id, order_id, method, now),
        PaymentReference::MultiBill { user_id, .. } => {
            settle_multi(state, user_id, order_id, method, now)
        }
        PaymentReference::ConnectionFee { request_id, .. } => {
            settle_connection(state, request_id, order_id, now)
        }
    }
}

fn settle_single(
    state: &AppState,
    bill_id: BillId,
    order_id: &str,
    method: &str,
    now: DateTime<Utc>,
) -> Result<Outcome, ApiError> {
    let Some(bill) = state.store.get_bill(&bill_id)? else {
        tracing::warn!(
            order_id = %order_id,
            bill_id = %bill_id,
            "Callback references a missing bill"
        );
        return Ok(Outcome::TargetMissing);
    };
    if bill.is_paid {
        tracing::info!(order_id = %order_id, bill_id = %bill_id, "Duplicate settlement callback");
        return Ok(Outcome::AlreadySettled);
    }

    let settled = state.store.settle_bills(&[bill_id], method, now)?;
    if settled.is_empty() {
        // A concurrent callback or manual payment settled it first.
        return Ok(Outcome::AlreadySettled);
    }

    finish_settlement(state, order_id, &settled, now);
    tracing::info!(
        order_id = %order_id,
        bill_id = %bill_id,
        method = %method,
        "Bill settled from callback"
    );
    Ok(Outcome::Settled {
        bills: settled.len(),
    })
}

fn settle_multi(
    state: &AppState,
    user_id: UserId,
    order_id: &str,
    method: &str,
    now: DateTime<Utc>,
) -> Result<Outcome, ApiError> {
    // The covered set is the session's captured list; bills generated after
    // the session was issued are never settled by it. For unknown references
    // (stale or issued before sessions were persisted) fall back to the live
    // unpaid set.
    let covered: Vec<BillId> = match state.store.get_session(order_id)? {
        Some(session) => session.covered_bills,
        None => {
            tracing::warn!(
                order_id = %order_id,
                user_id = %user_id,
                "No session for aggregate callback; using live unpaid set"
            );
            state
                .store
                .list_bills_by_user(&user_id)?
                .into_iter()
                .filter(|bill| !bill.is_paid)
                .map(|bill| bill.id)
                .collect()
        }
    };

    if covered.is_empty() {
        tracing::info!(order_id = %order_id, user_id = %user_id, "No bills left to settle");
        return Ok(Outcome::AlreadySettled);
    }

    // settle_bills skips already-paid entries, yielding the snapshot-
    // intersect-unpaid behavior with one ledger credit per meter.
    let settled = state.store.settle_bills(&covered, method, now)?;
    if settled.is_empty() {
        tracing::info!(order_id = %order_id, user_id = %user_id, "Duplicate aggregate callback");
        return Ok(Outcome::AlreadySettled);
    }

    finish_settlement(state, order_id, &settled, now);
    tracing::info!(
        order_id = %order_id,
        user_id = %user_id,
        bills = %settled.len(),
        method = %method,
        "Aggregate payment settled"
    );
    Ok(Outcome::Settled {
        bills: settled.len(),
    })
}

fn settle_connection(
    state: &AppState,
    request_id: ConnectionRequestId,
    order_id: &str,
    now: DateTime<Utc>,
) -> Result<Outcome, ApiError> {
    let Some(mut request) = state.store.get_connection_request(&request_id)? else {
        tracing::warn!(
            order_id = %order_id,
            request_id = %request_id,
            "Callback references a missing connection request"
        );
        return Ok(Outcome::TargetMissing);
    };
    if request.is_paid {
        tracing::info!(order_id = %order_id, request_id = %request_id, "Duplicate fee callback");
        return Ok(Outcome::AlreadySettled);
    }

    request.mark_paid(now);
    state.store.put_connection_request(&request)?;

    mark_session(state, order_id, SessionStatus::Settled, now);
    notify_connection_paid(state.store.as_ref(), &request);
    tracing::info!(
        order_id = %order_id,
        request_id = %request.id,
        total_cost = %request.total_cost,
        "Connection fee settled from callback"
    );
    Ok(Outcome::Settled { bills: 0 })
}

// ============================================================================
// Non-Settling Callbacks
// ============================================================================

fn note_pending(
    state: &AppState,
    reference: &PaymentReference,
    order_id: &str,
) -> Result<Outcome, ApiError> {
    let Some(user_id) = reference_user(state, reference)? else {
        tracing::warn!(order_id = %order_id, "Pending callback for a missing target");
        return Ok(Outcome::TargetMissing);
    };

    notify(
        state.store.as_ref(),
        user_id,
        PENDING_TITLE,
        "Your payment is awaiting completion. Finish it before the session expires.".to_string(),
        NotificationCategory::Payment,
        Some(format!("/payments/{order_id}")),
    );
    Ok(Outcome::PendingNoted)
}

fn note_failure(
    state: &AppState,
    reference: &PaymentReference,
    order_id: &str,
    status: &GatewayStatus,
    now: DateTime<Utc>,
) -> Result<Outcome, ApiError> {
    let session_status = if *status == GatewayStatus::Expire {
        SessionStatus::Expired
    } else {
        SessionStatus::Failed
    };
    mark_session(state, order_id, session_status, now);

    let Some(user_id) = reference_user(state, reference)? else {
        tracing::warn!(order_id = %order_id, "Failure callback for a missing target");
        return Ok(Outcome::TargetMissing);
    };

    let message = if *status == GatewayStatus::Expire {
        "Your payment session expired before completion. Open a new one to pay."
    } else {
        "Your payment was not completed. No amount was charged."
    };
    notify(
        state.store.as_ref(),
        user_id,
        FAILURE_TITLE,
        message.to_string(),
        NotificationCategory::Warning,
        Some(format!("/payments/{order_id}")),
    );

    tracing::info!(
        order_id = %order_id,
        transaction_status = %status.as_str(),
        "Payment attempt failed; no financial effect"
    );
    Ok(Outcome::FailureNoted)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Verify the callback signature when a server key is configured.
///
/// The signature is `sha512(order_id + status_code + gross_amount +
/// server_key)` over the exact wire strings. Without a configured key, or
/// with verification switched off, the callback is accepted with a warning
/// (development mode).
fn verify_signature(state: &AppState, body: &PaymentNotification) -> Result<(), ApiError> {
    let Some(server_key) = &state.config.midtrans_server_key else {
        tracing::warn!("Midtrans server key not configured - skipping signature verification");
        return Ok(());
    };
    if !state.config.verify_webhook_signature {
        tracing::warn!("Webhook signature verification disabled by config");
        return Ok(());
    }

    let expected = midtrans_signature(
        &body.order_id,
        &body.status_code,
        &body.gross_amount,
        server_key,
    );
    let provided = body.signature_key.as_deref().unwrap_or("");
    if !constant_time_eq(&expected, provided) {
        tracing::warn!(order_id = %body.order_id, "Invalid webhook signature");
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// The customer a callback concerns, resolved from its reference.
fn reference_user(
    state: &AppState,
    reference: &PaymentReference,
) -> Result<Option<UserId>, ApiError> {
    match reference {
        PaymentReference::Bill(bill_id) => {
            Ok(state.store.get_bill(bill_id)?.map(|bill| bill.user_id))
        }
        PaymentReference::MultiBill { user_id, .. } => Ok(Some(*user_id)),
        PaymentReference::ConnectionFee { request_id, .. } => Ok(state
            .store
            .get_connection_request(request_id)?
            .map(|request| request.user_id)),
    }
}

/// Mark settled bills' session and fan out success notifications.
/// Best-effort: the settlement has already committed when this runs.
fn finish_settlement(state: &AppState, order_id: &str, bills: &[Bill], now: DateTime<Utc>) {
    mark_session(state, order_id, SessionStatus::Settled, now);
    notify_settlement(state.store.as_ref(), bills);
}

/// Update the session record for this order id, if one exists.
fn mark_session(state: &AppState, order_id: &str, status: SessionStatus, now: DateTime<Utc>) {
    let result = state.store.get_session(order_id).and_then(|session| {
        let Some(mut session) = session else {
            return Ok(());
        };
        session.mark(status, now);
        state.store.put_session(&session)
    });
    if let Err(e) = result {
        tracing::warn!(order_id = %order_id, error = %e, "Failed to update payment session");
    }
}
