//! `RocksDB` storage layer for aqua-billing.
//!
//! This crate provides persistent storage for tariffs, meters, bills,
//! payment sessions, connection requests, and notifications using `RocksDB`
//! with column families for efficient indexing.
//!
//! # Architecture
//!
//! See [`schema::cf`] for the column family layout. Beyond plain get/put,
//! the [`Store`] trait carries compound operations (`record_usage`,
//! `insert_bill`, `settle_bills`, `reverse_settlement`) that perform their
//! read-check-write cycles under per-meter striped locks and commit through
//! a single `WriteBatch`, so callers never compose partial financial writes
//! themselves.
//!
//! # Example
//!
//! ```no_run
//! use aqua_billing_store::{RocksStore, Store};
//! use aqua_billing_core::{Meter, TariffId, UserId};
//!
//! let store = RocksStore::open("/tmp/aqua-billing-db").unwrap();
//!
//! let meter = Meter::new(UserId::generate(), TariffId::generate(), "M-0001");
//! store.put_meter(&meter).unwrap();
//!
//! let updated = store.record_usage(&meter.id, 5).unwrap();
//! assert_eq!(updated.unbilled_usage, 5);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};

use aqua_billing_core::{
    Bill, BillId, BillPeriod, ConnectionRequest, ConnectionRequestId, CustomerProfile, Meter,
    MeterId, NotificationRecord, PaymentSession, TariffId, TariffTier, UserId,
};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Tariff Operations
    // =========================================================================

    /// Insert or update a tariff tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_tariff(&self, tier: &TariffTier) -> Result<()>;

    /// Get a tariff tier by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_tariff(&self, tariff_id: &TariffId) -> Result<Option<TariffTier>>;

    /// List all tariff tiers.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_tariffs(&self) -> Result<Vec<TariffTier>>;

    // =========================================================================
    // Customer Operations
    // =========================================================================

    /// Insert or update a customer directory entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_customer(&self, profile: &CustomerProfile) -> Result<()>;

    /// Get a customer directory entry by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_customer(&self, user_id: &UserId) -> Result<Option<CustomerProfile>>;

    // =========================================================================
    // Meter Operations
    // =========================================================================

    /// Register a meter (or overwrite its record wholesale).
    ///
    /// Not for counter updates: usage and payment counters move only through
    /// [`Store::record_usage`], [`Store::credit_payment`],
    /// [`Store::reverse_payment`], and [`Store::settle_bills`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_meter(&self, meter: &Meter) -> Result<()>;

    /// Get a meter by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_meter(&self, meter_id: &MeterId) -> Result<Option<Meter>>;

    /// List all meters.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_meters(&self) -> Result<Vec<Meter>>;

    /// List the meters owned by a customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_meters_by_user(&self, user_id: &UserId) -> Result<Vec<Meter>>;

    // =========================================================================
    // Meter Ledger Operations
    // =========================================================================

    /// Apply a usage reading: raises the meter's cumulative and unbilled
    /// counters by `amount` atomically, and returns the updated meter.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the meter doesn't exist.
    /// - `StoreError::InvalidState` if `amount` is negative.
    fn record_usage(&self, meter_id: &MeterId, amount: i64) -> Result<Meter>;

    /// Apply a payment credit: lowers the meter's unbilled counter by
    /// `usage_amount`, floored at zero, and returns the updated meter.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the meter doesn't exist.
    fn credit_payment(&self, meter_id: &MeterId, usage_amount: i64) -> Result<Meter>;

    /// Undo a payment credit: raises the meter's unbilled counter back by
    /// `usage_amount`, and returns the updated meter.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the meter doesn't exist.
    fn reverse_payment(&self, meter_id: &MeterId, usage_amount: i64) -> Result<Meter>;

    // =========================================================================
    // Bill Operations
    // =========================================================================

    /// Insert a newly generated bill, maintaining the per-meter-period and
    /// per-user indexes and advancing the meter's `next_due_date`, all in one
    /// atomic write.
    ///
    /// # Errors
    ///
    /// - `StoreError::AlreadyExists` if a bill for the same meter and period
    ///   exists (generation idempotency guard).
    /// - `StoreError::NotFound` if the meter doesn't exist.
    fn insert_bill(&self, bill: &Bill) -> Result<()>;

    /// Flag a bill overdue if it is still unpaid and not yet flagged.
    ///
    /// The check-and-set runs under the meter's lock stripe so a sweep pass
    /// cannot clobber a settlement that lands between its read and write.
    /// Returns the updated bill, or `None` when the bill is missing, already
    /// paid, or already flagged.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn mark_bill_overdue(&self, bill_id: &BillId, now: DateTime<Utc>) -> Result<Option<Bill>>;

    /// Get a bill by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_bill(&self, bill_id: &BillId) -> Result<Option<Bill>>;

    /// Get the bill for a meter and period, if one was generated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_bill_for_period(&self, meter_id: &MeterId, period: BillPeriod) -> Result<Option<Bill>>;

    /// List all bills (admin queries and reports).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_bills(&self) -> Result<Vec<Bill>>;

    /// List a customer's bills, newest period first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_bills_by_user(&self, user_id: &UserId) -> Result<Vec<Bill>>;

    /// Delete a bill and its index entries.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the bill doesn't exist.
    fn delete_bill(&self, bill_id: &BillId) -> Result<()>;

    // =========================================================================
    // Settlement Compound Operations
    // =========================================================================

    /// Settle the given bills exactly once.
    ///
    /// Re-checks `is_paid` under the meter locks, fixes late fees at `now`,
    /// credits each affected meter's unbilled counter once with the summed
    /// usage of its settled bills, and commits everything in a single atomic
    /// write. Bills already settled (duplicate gateway delivery) or missing
    /// are skipped. Returns the bills actually settled by this call, which is
    /// empty for a pure duplicate.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if a bill's meter is missing (data
    /// integrity failure; nothing is written).
    fn settle_bills(
        &self,
        bill_ids: &[BillId],
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Bill>>;

    /// Reverse a settlement (admin override): clears the bill's payment
    /// fields and raises the meter's unbilled counter back by the bill's
    /// usage, in one atomic write. Returns the updated bill.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the bill or its meter doesn't exist.
    /// - `StoreError::InvalidState` if the bill is not settled.
    fn reverse_settlement(&self, bill_id: &BillId, now: DateTime<Utc>) -> Result<Bill>;

    // =========================================================================
    // Payment Session Operations
    // =========================================================================

    /// Insert or update a payment session, keyed by its encoded reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_session(&self, session: &PaymentSession) -> Result<()>;

    /// Get a payment session by its encoded reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_session(&self, reference: &str) -> Result<Option<PaymentSession>>;

    // =========================================================================
    // Connection Request Operations
    // =========================================================================

    /// Insert or update a connection request.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_connection_request(&self, request: &ConnectionRequest) -> Result<()>;

    /// Get a connection request by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_connection_request(
        &self,
        request_id: &ConnectionRequestId,
    ) -> Result<Option<ConnectionRequest>>;

    // =========================================================================
    // Notification Operations
    // =========================================================================

    /// Append a notification to the customer's log.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_notification(&self, notification: &NotificationRecord) -> Result<()>;

    /// List a customer's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_notifications_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>>;

    /// Whether the customer already has a notification with this title and
    /// link written at or after `since_ms` (Unix milliseconds). Used by the
    /// reminder sweep for same-day de-duplication.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_notification_since(
        &self,
        user_id: &UserId,
        since_ms: u64,
        title: &str,
        link: Option<&str>,
    ) -> Result<bool>;
}
