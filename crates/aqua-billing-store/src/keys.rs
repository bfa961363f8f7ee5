//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families. UUID-based ids encode as their 16 raw bytes; billing
//! periods encode as the canonical `YYYY-MM` string, whose byte order matches
//! chronological order.

use aqua_billing_core::{
    BillId, BillPeriod, ConnectionRequestId, MeterId, NotificationId, TariffId, UserId,
};

/// Create a tariff key from a tariff ID.
#[must_use]
pub fn tariff_key(tariff_id: &TariffId) -> Vec<u8> {
    tariff_id.as_bytes().to_vec()
}

/// Create a customer key from a user ID.
#[must_use]
pub fn customer_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a meter key from a meter ID.
#[must_use]
pub fn meter_key(meter_id: &MeterId) -> Vec<u8> {
    meter_id.as_bytes().to_vec()
}

/// Create a bill key from a bill ID.
#[must_use]
pub fn bill_key(bill_id: &BillId) -> Vec<u8> {
    bill_id.as_bytes().to_vec()
}

/// Create a connection request key from a request ID.
#[must_use]
pub fn connection_request_key(request_id: &ConnectionRequestId) -> Vec<u8> {
    request_id.as_bytes().to_vec()
}

/// Create a session key from an encoded payment reference.
#[must_use]
pub fn session_key(reference: &str) -> Vec<u8> {
    reference.as_bytes().to_vec()
}

/// Prefix for iterating any per-user index.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a user-meter index key.
///
/// Format: `user_id (16 bytes) || meter_id (16 bytes)`
#[must_use]
pub fn user_meter_key(user_id: &UserId, meter_id: &MeterId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(meter_id.as_bytes());
    key
}

/// Create a user-bill index key.
///
/// Format: `user_id (16 bytes) || bill_id (16 bytes)`
#[must_use]
pub fn user_bill_key(user_id: &UserId, bill_id: &BillId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(bill_id.as_bytes());
    key
}

/// Create a meter-period index key.
///
/// Format: `meter_id (16 bytes) || "YYYY-MM" (7 bytes)`
///
/// The period's canonical string form is zero-padded, so keys for one meter
/// sort chronologically.
#[must_use]
pub fn meter_period_key(meter_id: &MeterId, period: BillPeriod) -> Vec<u8> {
    let period_str = period.to_string();
    let mut key = Vec::with_capacity(16 + period_str.len());
    key.extend_from_slice(meter_id.as_bytes());
    key.extend_from_slice(period_str.as_bytes());
    key
}

/// Create a notification key.
///
/// Format: `user_id (16 bytes) || notification_id (16 bytes)`
///
/// Since notification IDs are ULIDs, each customer's log is time-ordered.
#[must_use]
pub fn notification_key(user_id: &UserId, notification_id: &NotificationId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&notification_id.to_bytes());
    key
}

/// Lower bound for scanning a customer's notifications written at or after
/// the given Unix timestamp in milliseconds.
#[must_use]
pub fn notification_scan_start(user_id: &UserId, since_ms: u64) -> Vec<u8> {
    notification_key(user_id, &NotificationId::range_start(since_ms))
}

/// Extract the meter ID from a user-meter index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_meter_id_from_user_key(key: &[u8]) -> MeterId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    MeterId::from_uuid(uuid::Uuid::from_bytes(bytes))
}

/// Extract the bill ID from a user-bill index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_bill_id_from_user_key(key: &[u8]) -> BillId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    BillId::from_uuid(uuid::Uuid::from_bytes(bytes))
}

/// Decode a 16-byte bill id stored as an index value.
///
/// # Panics
///
/// Panics if the value is not at least 16 bytes.
#[must_use]
pub fn bill_id_from_index_value(value: &[u8]) -> BillId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&value[..16]);
    BillId::from_uuid(uuid::Uuid::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_keys_are_raw_uuid_bytes() {
        let meter_id = MeterId::generate();
        assert_eq!(meter_key(&meter_id).len(), 16);
        let bill_id = BillId::generate();
        assert_eq!(bill_key(&bill_id).len(), 16);
    }

    #[test]
    fn user_bill_key_format() {
        let user_id = UserId::generate();
        let bill_id = BillId::generate();
        let key = user_bill_key(&user_id, &bill_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], bill_id.as_bytes());
        assert_eq!(extract_bill_id_from_user_key(&key), bill_id);
    }

    #[test]
    fn user_meter_key_roundtrip() {
        let user_id = UserId::generate();
        let meter_id = MeterId::generate();
        let key = user_meter_key(&user_id, &meter_id);

        assert_eq!(key.len(), 32);
        assert_eq!(extract_meter_id_from_user_key(&key), meter_id);
    }

    #[test]
    fn meter_period_keys_sort_chronologically_per_meter() {
        let meter_id = MeterId::generate();
        let dec = meter_period_key(&meter_id, BillPeriod::new(2023, 12).unwrap());
        let jan = meter_period_key(&meter_id, BillPeriod::new(2024, 1).unwrap());

        assert_eq!(dec.len(), 23);
        assert!(dec < jan);
    }

    #[test]
    fn notification_scan_start_bounds_the_day() {
        let user_id = UserId::generate();
        let start = notification_scan_start(&user_id, 1_700_000_000_000);
        let id = NotificationId::range_start(1_700_000_000_500);
        let later = notification_key(&user_id, &id);

        assert_eq!(start.len(), 32);
        assert!(start < later);
    }
}
