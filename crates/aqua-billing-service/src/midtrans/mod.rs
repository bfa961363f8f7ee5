//! Midtrans integration for payment sessions.
//!
//! Midtrans handles:
//! - Snap payment sessions (hosted checkout for bills and connection fees)
//! - Asynchronous payment notifications (see `handlers::webhooks`)
//!
//! The [`PaymentGateway`] trait is the seam between handlers and the live
//! API, so integration tests can substitute a recording stub.

pub mod client;
pub mod types;

pub use client::{MidtransClient, MidtransError, PaymentGateway, SANDBOX_BASE_URL};
pub use types::*;
