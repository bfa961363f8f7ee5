//! Meter records and the usage ledger transitions.
//!
//! A meter carries two counters: `cumulative_usage`, the lifetime reading
//! (monotonically non-decreasing), and `unbilled_usage`, consumption the
//! customer has not yet paid for. Usage ingestion raises both; a successful
//! payment lowers `unbilled_usage` by the paid usage amount, floored at zero.
//! These transitions are the only writers of either counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MeterId, TariffId, UserId};

/// A water meter: one billable connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meter {
    /// The meter ID.
    pub id: MeterId,

    /// The customer the meter belongs to.
    pub user_id: UserId,

    /// The tariff tier charged against this meter.
    pub tariff_id: TariffId,

    /// Human-readable meter number printed on the device.
    pub serial: String,

    /// Lifetime consumption in m³. Never decreases.
    pub cumulative_usage: i64,

    /// Consumption not yet covered by a successful payment, in m³.
    /// Never negative.
    pub unbilled_usage: i64,

    /// Due date of the most recently generated bill, if any.
    pub next_due_date: Option<DateTime<Utc>>,

    /// When the meter was registered.
    pub created_at: DateTime<Utc>,

    /// When the meter was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Meter {
    /// Register a new meter with zeroed counters.
    #[must_use]
    pub fn new(user_id: UserId, tariff_id: TariffId, serial: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: MeterId::generate(),
            user_id,
            tariff_id,
            serial: serial.into(),
            cumulative_usage: 0,
            unbilled_usage: 0,
            next_due_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a usage reading: raises both counters by `amount` (m³).
    /// Callers validate `amount >= 0` before applying.
    pub fn record_usage(&mut self, amount: i64, now: DateTime<Utc>) {
        self.cumulative_usage += amount;
        self.unbilled_usage += amount;
        self.updated_at = now;
    }

    /// Apply a successful payment covering `usage_amount` m³:
    /// `unbilled_usage` drops by that amount, floored at zero.
    pub fn credit_payment(&mut self, usage_amount: i64, now: DateTime<Utc>) {
        self.unbilled_usage = (self.unbilled_usage - usage_amount).max(0);
        self.updated_at = now;
    }

    /// Undo a payment credit (admin reversed a settlement): `unbilled_usage`
    /// rises back by the reversed usage amount.
    pub fn reverse_payment(&mut self, usage_amount: i64, now: DateTime<Utc>) {
        self.unbilled_usage += usage_amount;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meter() -> Meter {
        Meter::new(UserId::generate(), TariffId::generate(), "M-001")
    }

    #[test]
    fn record_usage_raises_both_counters() {
        let mut m = meter();
        m.record_usage(5, Utc::now());
        m.record_usage(3, Utc::now());
        assert_eq!(m.cumulative_usage, 8);
        assert_eq!(m.unbilled_usage, 8);
    }

    #[test]
    fn credit_payment_lowers_only_the_unbilled_counter() {
        let mut m = meter();
        m.record_usage(12, Utc::now());
        m.credit_payment(7, Utc::now());
        assert_eq!(m.cumulative_usage, 12);
        assert_eq!(m.unbilled_usage, 5);
    }

    #[test]
    fn credit_payment_floors_at_zero() {
        let mut m = meter();
        m.record_usage(7, Utc::now());
        m.credit_payment(10, Utc::now());
        assert_eq!(m.unbilled_usage, 0);
        assert_eq!(m.cumulative_usage, 7);
    }

    #[test]
    fn reverse_payment_restores_unbilled_usage() {
        let mut m = meter();
        m.record_usage(12, Utc::now());
        m.credit_payment(12, Utc::now());
        m.reverse_payment(12, Utc::now());
        assert_eq!(m.unbilled_usage, 12);
    }
}
