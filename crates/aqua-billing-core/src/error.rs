//! Error types for aqua-billing.

use crate::ids::IdError;

/// Result type for aqua-billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur in aqua-billing operations.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// A bill already exists for the meter and period.
    #[error("bill already exists: meter={meter_id}, period={period}")]
    BillAlreadyExists {
        /// The meter the duplicate was generated for.
        meter_id: String,
        /// The billing period (`YYYY-MM`).
        period: String,
    },

    /// The bill is already settled.
    #[error("bill already paid: {bill_id}")]
    BillAlreadyPaid {
        /// The bill ID.
        bill_id: String,
    },

    /// Meter reading regressed: period end is below period start.
    #[error("negative usage for meter {meter_id}: start={start}, end={end}")]
    NegativeUsage {
        /// The meter with the regressed reading.
        meter_id: String,
        /// Cumulative reading at the start of the period.
        start: i64,
        /// Cumulative reading at the end of the period.
        end: i64,
    },

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity kind (meter, bill, tariff, ...).
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// External service error (payment gateway, Zero-ID).
    #[error("external service error: {service} - {message}")]
    ExternalService {
        /// The service that failed.
        service: String,
        /// Error message.
        message: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Invalid amount or quantity.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Request or payload validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}
