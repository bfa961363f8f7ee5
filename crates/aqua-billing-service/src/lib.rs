//! Aqua-Billing HTTP API Service.
//!
//! This crate provides the HTTP API for the aqua-billing service, including:
//!
//! - Meter usage ingestion
//! - Monthly bill generation and settlement
//! - Midtrans Snap payment sessions and webhooks
//! - Connection (installation) fee requests
//! - Overdue flagging, reminders, and monthly reports
//!
//! # Authentication
//!
//! The service supports three authentication methods:
//!
//! 1. **Zero-ID JWT tokens** - For end-customer requests (portal, mobile app)
//! 2. **Service API keys** - For meter collectors reporting usage
//! 3. **Admin API keys** - For back-office operations

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers that never await still need async signatures

pub mod auth;
pub mod billing;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod midtrans;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use jobs::spawn_schedulers;
pub use midtrans::{MidtransClient, MidtransError, PaymentGateway};
pub use routes::create_router;
pub use state::AppState;
