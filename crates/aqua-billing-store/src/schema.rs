//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Tariff tier records, keyed by `tariff_id`.
    pub const TARIFFS: &str = "tariffs";

    /// Customer directory entries, keyed by `user_id`.
    pub const CUSTOMERS: &str = "customers";

    /// Meter records, keyed by `meter_id`.
    pub const METERS: &str = "meters";

    /// Index: meters by owner, keyed by `user_id || meter_id`.
    /// Value is empty (index only).
    pub const METERS_BY_USER: &str = "meters_by_user";

    /// Bill records, keyed by `bill_id`.
    pub const BILLS: &str = "bills";

    /// Index: one bill per meter and period, keyed by
    /// `meter_id || "YYYY-MM"`. Value is the 16-byte bill id. This index is
    /// both the idempotency guard for generation and the previous-period
    /// lookup path.
    pub const BILLS_BY_METER_PERIOD: &str = "bills_by_meter_period";

    /// Index: bills by customer, keyed by `user_id || bill_id`.
    /// Value is empty (index only).
    pub const BILLS_BY_USER: &str = "bills_by_user";

    /// Payment sessions, keyed by the encoded gateway reference string.
    pub const SESSIONS: &str = "sessions";

    /// Connection (installation) requests, keyed by `request_id`.
    pub const CONNECTION_REQUESTS: &str = "connection_requests";

    /// Notification log, keyed by `user_id || notification_id`. ULID ids
    /// make each customer's log time-ordered on disk.
    pub const NOTIFICATIONS: &str = "notifications";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::TARIFFS,
        cf::CUSTOMERS,
        cf::METERS,
        cf::METERS_BY_USER,
        cf::BILLS,
        cf::BILLS_BY_METER_PERIOD,
        cf::BILLS_BY_USER,
        cf::SESSIONS,
        cf::CONNECTION_REQUESTS,
        cf::NOTIFICATIONS,
    ]
}
