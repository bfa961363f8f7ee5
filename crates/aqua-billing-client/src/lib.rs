//! Aqua-Billing Client SDK.
//!
//! This crate provides a client library for services to interact with the
//! aqua-billing API, primarily the metering pipeline that reports consumption
//! deltas.
//!
//! # Example
//!
//! ```no_run
//! use aqua_billing_client::AquaBillingClient;
//!
//! # async fn example() -> Result<(), aqua_billing_client::ClientError> {
//! let client = AquaBillingClient::new(
//!     "http://aqua-billing.utility-system.svc:8080",
//!     "your-service-api-key",
//! );
//!
//! // Report a meter reading delta (m3 since the previous reading)
//! let response = client.report_reading("meter-uuid", 8).await?;
//!
//! println!("Cumulative usage: {} m3", response.cumulative_usage);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{AquaBillingClient, ClientOptions};
pub use error::ClientError;
pub use types::*;
