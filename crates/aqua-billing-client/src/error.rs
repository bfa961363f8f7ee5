//! Client error types.

/// Errors that can occur when using the aqua-billing client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The meter being read does not exist.
    #[error("meter not found: {meter_id}")]
    MeterNotFound {
        /// The meter ID.
        meter_id: String,
    },

    /// The reading was rejected by the domain (e.g. a negative delta).
    #[error("invalid reading: {message}")]
    InvalidReading {
        /// Why the reading was rejected.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
