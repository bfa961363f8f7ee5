//! Error types for aqua-billing storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity kind (meter, bill, tariff, ...).
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// A uniqueness guard rejected the write.
    #[error("{entity} already exists: {key}")]
    AlreadyExists {
        /// The entity kind.
        entity: &'static str,
        /// The conflicting key.
        key: String,
    },

    /// The operation is not valid for the record's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}
