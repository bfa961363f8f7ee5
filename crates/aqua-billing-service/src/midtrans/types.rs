//! Midtrans Snap API types.

use serde::{Deserialize, Serialize};

/// Request body for `POST /snap/v1/transactions`.
#[derive(Debug, Clone, Serialize)]
pub struct SnapRequest {
    /// Order id and amount.
    pub transaction_details: TransactionDetails,

    /// Payer details shown on the hosted checkout page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_details: Option<CustomerDetails>,

    /// Line items; Midtrans requires these to sum to `gross_amount`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub item_details: Vec<ItemDetail>,

    /// Post-payment redirect URLs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callbacks: Option<Callbacks>,
}

/// Order id and gross amount for a Snap transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetails {
    /// The gateway order id (our encoded payment reference).
    pub order_id: String,
    /// Total amount in whole rupiah.
    pub gross_amount: i64,
}

/// Payer details.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetails {
    /// Payer display name.
    pub first_name: String,
    /// Payer email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Payer phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A single line item on the hosted checkout page.
#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    /// Item id (unique within the transaction).
    pub id: String,
    /// Unit price in whole rupiah.
    pub price: i64,
    /// Quantity.
    pub quantity: u32,
    /// Display name.
    pub name: String,
}

impl ItemDetail {
    /// Create a quantity-one line item.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: i64) -> Self {
        Self {
            id: id.into(),
            price,
            quantity: 1,
            name: name.into(),
        }
    }
}

/// Post-payment redirect URLs.
#[derive(Debug, Clone, Serialize)]
pub struct Callbacks {
    /// Redirect after a finished payment.
    pub finish: String,
    /// Redirect after a gateway error.
    pub error: String,
    /// Redirect while the payment is pending.
    pub pending: String,
}

impl Callbacks {
    /// Build the standard callback set under the frontend base URL.
    #[must_use]
    pub fn for_frontend(frontend_url: &str) -> Self {
        Self {
            finish: format!("{frontend_url}/payment/finish"),
            error: format!("{frontend_url}/payment/error"),
            pending: format!("{frontend_url}/payment/pending"),
        }
    }
}

/// A created Snap session.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapSession {
    /// Snap token for the embedded widget.
    pub token: String,
    /// Hosted checkout URL.
    pub redirect_url: String,
}

/// Error body returned by the Snap API.
#[derive(Debug, Deserialize)]
pub struct MidtransErrorResponse {
    /// Human-readable error messages.
    #[serde(default)]
    pub error_messages: Vec<String>,
}
