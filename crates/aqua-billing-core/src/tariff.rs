//! Tariff tiers and the water charge calculator.
//!
//! Charges are tiered: consumption up to [`USAGE_THRESHOLD_UNITS`] is billed
//! at the tier's lower rate, anything above it at the higher rate, plus the
//! tier's flat monthly service fee. All amounts are whole rupiah as `i64`;
//! there is no fractional currency anywhere in the system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TariffId;

/// Consumption threshold (in m³) separating the two tariff rates.
///
/// Usage up to and including this many units is billed at
/// `rate_below_threshold`; the excess at `rate_above_threshold`.
pub const USAGE_THRESHOLD_UNITS: i64 = 10;

/// A tariff tier: the rate table for one customer class.
///
/// Tiers are reference data, referenced by meters via [`TariffId`] and never
/// mutated by billing operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffTier {
    /// The tier ID.
    pub id: TariffId,

    /// Customer class name (e.g. "Household A", "Commercial").
    pub name: String,

    /// Rate per unit for usage up to the threshold, in rupiah.
    pub rate_below_threshold: i64,

    /// Rate per unit for usage above the threshold, in rupiah.
    pub rate_above_threshold: i64,

    /// Flat monthly service fee in rupiah (0 if the class has none).
    pub service_fee: i64,

    /// When the tier was created.
    pub created_at: DateTime<Utc>,

    /// When the tier was last updated.
    pub updated_at: DateTime<Utc>,
}

impl TariffTier {
    /// Create a new tariff tier.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        rate_below_threshold: i64,
        rate_above_threshold: i64,
        service_fee: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TariffId::generate(),
            name: name.into(),
            rate_below_threshold,
            rate_above_threshold,
            service_fee,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The result of charging a usage delta against a tariff tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeBreakdown {
    /// Tiered water charge in rupiah.
    pub water_charge: i64,

    /// Flat service fee in rupiah.
    pub service_fee: i64,

    /// `water_charge + service_fee`.
    pub total_due: i64,
}

/// Compute the charge for a usage delta under a tariff tier.
///
/// Pure integer arithmetic; negative deltas are treated as zero usage (the
/// caller rejects regressed readings before charging).
#[must_use]
pub fn compute_charge(usage_delta: i64, tier: &TariffTier) -> ChargeBreakdown {
    let usage = usage_delta.max(0);
    let water_charge = if usage <= USAGE_THRESHOLD_UNITS {
        usage * tier.rate_below_threshold
    } else {
        USAGE_THRESHOLD_UNITS * tier.rate_below_threshold
            + (usage - USAGE_THRESHOLD_UNITS) * tier.rate_above_threshold
    };
    ChargeBreakdown {
        water_charge,
        service_fee: tier.service_fee,
        total_due: water_charge + tier.service_fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(below: i64, above: i64, fee: i64) -> TariffTier {
        TariffTier::new("Household A", below, above, fee)
    }

    #[test]
    fn usage_below_threshold_uses_lower_rate_only() {
        let breakdown = compute_charge(8, &tier(10, 15, 5000));
        assert_eq!(breakdown.water_charge, 80);
        assert_eq!(breakdown.service_fee, 5000);
        assert_eq!(breakdown.total_due, 5080);
    }

    #[test]
    fn usage_above_threshold_splits_across_rates() {
        // 10 units at 10 + 5 units at 15
        let breakdown = compute_charge(15, &tier(10, 15, 5000));
        assert_eq!(breakdown.water_charge, 175);
        assert_eq!(breakdown.total_due, 5175);
    }

    #[test]
    fn usage_exactly_at_threshold_stays_on_lower_rate() {
        let breakdown = compute_charge(10, &tier(10, 15, 0));
        assert_eq!(breakdown.water_charge, 100);
        assert_eq!(breakdown.total_due, 100);
    }

    #[test]
    fn zero_usage_charges_only_the_service_fee() {
        let breakdown = compute_charge(0, &tier(1500, 3000, 6000));
        assert_eq!(breakdown.water_charge, 0);
        assert_eq!(breakdown.total_due, 6000);
    }

    #[test]
    fn negative_delta_is_clamped_to_zero() {
        let breakdown = compute_charge(-3, &tier(1500, 3000, 6000));
        assert_eq!(breakdown.water_charge, 0);
        assert_eq!(breakdown.total_due, 6000);
    }
}
