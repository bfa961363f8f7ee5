//! Billing domain services: bill generation and the overdue/reminder sweeps.
//!
//! These are plain functions over `&dyn Store` plus typed inputs, shared by
//! the HTTP handlers, the in-process scheduler, and the integration tests.

pub mod generator;
pub mod overdue;

use aqua_billing_core::{
    Bill, BillingError, ConnectionRequest, NotificationCategory, NotificationRecord, UserId,
};
use aqua_billing_store::{Store, StoreError};

/// Title used for payment-success notifications.
pub(crate) const PAYMENT_SUCCESS_TITLE: &str = "Payment Successful";

/// Lift a store error into the domain error space.
pub(crate) fn from_store(err: StoreError) -> BillingError {
    match err {
        StoreError::NotFound { entity, id } => BillingError::NotFound { entity, id },
        StoreError::Serialization(msg) => BillingError::Serialization(msg),
        other => BillingError::Storage(other.to_string()),
    }
}

/// Write a notification, logging instead of failing the caller.
///
/// Notification writes are bookkeeping around financial mutations that have
/// already committed, so a failure here is logged and swallowed.
pub(crate) fn notify(
    store: &dyn Store,
    user_id: UserId,
    title: &str,
    message: String,
    category: NotificationCategory,
    link: Option<String>,
) {
    let record = NotificationRecord::new(user_id, title, message, category, link);
    if let Err(e) = store.put_notification(&record) {
        tracing::warn!(
            user_id = %user_id,
            title = %title,
            error = %e,
            "Failed to write notification"
        );
    }
}

/// Write a payment-success notification for each settled bill.
pub(crate) fn notify_settlement(store: &dyn Store, bills: &[Bill]) {
    for bill in bills {
        notify(
            store,
            bill.user_id,
            PAYMENT_SUCCESS_TITLE,
            format!(
                "Your water bill for {} (Rp{}) has been paid.",
                bill.period, bill.total_due
            ),
            NotificationCategory::Payment,
            Some(format!("/bills/{}", bill.id)),
        );
    }
}

/// Write the paid confirmation for a connection fee.
pub(crate) fn notify_connection_paid(store: &dyn Store, request: &ConnectionRequest) {
    notify(
        store,
        request.user_id,
        "Connection Fee Paid",
        format!(
            "Your connection installation fee of Rp{} has been paid.",
            request.total_cost
        ),
        NotificationCategory::Payment,
        Some(format!("/connections/{}", request.id)),
    );
}
