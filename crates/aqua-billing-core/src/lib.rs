//! Core types and utilities for aqua-billing.
//!
//! This crate provides the foundational types used throughout the
//! aqua-billing platform:
//!
//! - **Identifiers**: `UserId`, `MeterId`, `BillId`, `TariffId`,
//!   `ConnectionRequestId`, `NotificationId`
//! - **Tariffs**: `TariffTier`, `compute_charge`
//! - **Meters**: `Meter` and its ledger transitions
//! - **Bills**: `Bill`, `BillPeriod`, due-date and late-fee rules
//! - **Payments**: `PaymentReference`, `GatewayStatus`, `PaymentSession`
//! - **Notifications**: `NotificationRecord`
//!
//! # Units
//!
//! Money is whole rupiah stored as `i64`; water usage is whole cubic meters
//! stored as `i64`. Neither has fractional units anywhere in the system, so
//! no floating point appears in any financial path.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bill;
pub mod connection;
pub mod customer;
pub mod error;
pub mod ids;
pub mod meter;
pub mod notification;
pub mod payment;
pub mod tariff;

pub use bill::{
    days_late, due_date_after, late_fee, Bill, BillPeriod, PeriodError, DUE_DAY_OF_MONTH,
    LATE_FEE_PERCENT, LATE_FEE_PERIOD_DAYS,
};
pub use connection::ConnectionRequest;
pub use customer::CustomerProfile;
pub use error::{BillingError, Result};
pub use ids::{
    BillId, ConnectionRequestId, IdError, MeterId, NotificationId, TariffId, UserId,
};
pub use meter::Meter;
pub use notification::{NotificationCategory, NotificationRecord};
pub use payment::{
    FraudStatus, GatewayStatus, PaymentReference, PaymentSession, ReferenceError, SessionStatus,
};
pub use tariff::{compute_charge, ChargeBreakdown, TariffTier, USAGE_THRESHOLD_UNITS};
