//! Bill records, billing periods, and the overdue/late-fee rules.
//!
//! A [`Bill`] charges one meter for one calendar period. Periods serialize as
//! the zero-padded string `YYYY-MM`; that exact form is used in storage index
//! keys and previous-period lookups, so it must never change shape.
//!
//! # Late fees
//!
//! Unpaid bills accrue 2% of the base amount per 30-day month past the due
//! date, months rounded up, amount rounded to the nearest rupiah. The fee is
//! computed from the due date and the clock, never stored incrementally: the
//! value persisted on the bill is the one fixed at settlement time.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::tariff::ChargeBreakdown;
use crate::{BillId, MeterId, UserId};

// ============================================================================
// Constants
// ============================================================================

/// Day of the month bills fall due (the 25th of the month after generation).
pub const DUE_DAY_OF_MONTH: u32 = 25;

/// Late fee percentage per elapsed late-fee period.
pub const LATE_FEE_PERCENT: i64 = 2;

/// Length of one late-fee accrual period in days.
pub const LATE_FEE_PERIOD_DAYS: i64 = 30;

// ============================================================================
// Billing periods
// ============================================================================

/// A calendar billing period (year and month).
///
/// The canonical text form is `YYYY-MM`, zero-padded. String ordering of the
/// canonical form matches chronological ordering, which storage index keys
/// rely on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillPeriod {
    year: i32,
    month: u32,
}

impl BillPeriod {
    /// Create a period from a year and a 1-based month.
    ///
    /// # Errors
    ///
    /// Returns an error if the month is not 1-12 or the year is outside
    /// 1970-9999 (the range the zero-padded text form can represent).
    pub const fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if month < 1 || month > 12 {
            return Err(PeriodError::MonthOutOfRange(month));
        }
        if year < 1970 || year > 9999 {
            return Err(PeriodError::YearOutOfRange(year));
        }
        Ok(Self { year, month })
    }

    /// The period containing the given instant (UTC calendar).
    #[must_use]
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// The year component.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// The 1-based month component.
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// The period immediately before this one.
    #[must_use]
    pub const fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The period immediately after this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The first calendar day of the period.
    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .expect("a validated period is a valid calendar month")
    }
}

impl FromStr for BillPeriod {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year_str, month_str) = s.split_once('-').ok_or(PeriodError::InvalidFormat)?;
        if year_str.len() != 4 || month_str.len() != 2 {
            return Err(PeriodError::InvalidFormat);
        }
        let year: i32 = year_str.parse().map_err(|_| PeriodError::InvalidFormat)?;
        let month: u32 = month_str.parse().map_err(|_| PeriodError::InvalidFormat)?;
        Self::new(year, month)
    }
}

impl fmt::Display for BillPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Debug for BillPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BillPeriod({self})")
    }
}

impl TryFrom<String> for BillPeriod {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BillPeriod> for String {
    fn from(period: BillPeriod) -> Self {
        period.to_string()
    }
}

/// Errors that can occur when parsing billing periods.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    /// The input is not of the form `YYYY-MM`.
    #[error("invalid billing period format (expected YYYY-MM)")]
    InvalidFormat,

    /// The month component is not 1-12.
    #[error("month out of range: {0}")]
    MonthOutOfRange(u32),

    /// The year component cannot be represented as four digits.
    #[error("year out of range: {0}")]
    YearOutOfRange(i32),
}

// ============================================================================
// Due dates and late fees
// ============================================================================

/// The due date for a bill generated at the given instant: midnight UTC on
/// the 25th of the following month.
#[must_use]
pub fn due_date_after(now: DateTime<Utc>) -> DateTime<Utc> {
    let next = BillPeriod::containing(now).next();
    NaiveDate::from_ymd_opt(next.year(), next.month(), DUE_DAY_OF_MONTH)
        .expect("every month has a 25th")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc()
}

/// Whole days elapsed past the due date. Zero or negative means the bill is
/// not yet late.
#[must_use]
pub fn days_late(due_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - due_date).num_days()
}

/// Late fee in rupiah for a bill `days_late` days past due.
///
/// 2% of the base amount per 30-day month, months rounded up, result rounded
/// to the nearest rupiah. Exact integer arithmetic.
#[must_use]
pub fn late_fee(base_due: i64, days_late: i64) -> i64 {
    if days_late <= 0 || base_due <= 0 {
        return 0;
    }
    let months = (days_late + LATE_FEE_PERIOD_DAYS - 1) / LATE_FEE_PERIOD_DAYS;
    (base_due * LATE_FEE_PERCENT * months + 50) / 100
}

// ============================================================================
// Bills
// ============================================================================

/// A bill charging one meter for one calendar period.
///
/// Bills are created once by the generator and mutated only by the overdue
/// sweep (`is_overdue`) and settlement (`is_paid`, `paid_at`, `late_fee`).
/// The invariant `total_due == water_charge + service_fee + late_fee` holds
/// at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    /// The bill ID.
    pub id: BillId,

    /// The customer billed.
    pub user_id: UserId,

    /// The meter billed.
    pub meter_id: MeterId,

    /// The calendar period covered.
    pub period: BillPeriod,

    /// Cumulative meter reading at the start of the period (previous bill's
    /// end reading, 0 for a meter's first bill).
    pub period_start_usage: i64,

    /// Cumulative meter reading at the end of the period.
    pub period_end_usage: i64,

    /// Usage charged for this period (`period_end_usage - period_start_usage`).
    pub usage_delta: i64,

    /// Tiered water charge in rupiah.
    pub water_charge: i64,

    /// Flat service fee in rupiah.
    pub service_fee: i64,

    /// Late fee fixed at settlement time, 0 until then.
    pub late_fee: i64,

    /// Amount owed: `water_charge + service_fee + late_fee`.
    pub total_due: i64,

    /// Whether the bill has been settled.
    pub is_paid: bool,

    /// When the bill was settled.
    pub paid_at: Option<DateTime<Utc>>,

    /// How the bill was settled (gateway payment type or "MANUAL").
    pub payment_method: Option<String>,

    /// When payment falls due.
    pub due_date: DateTime<Utc>,

    /// Whether the overdue sweep has flagged this bill.
    pub is_overdue: bool,

    /// Free-form operator notes.
    pub notes: Option<String>,

    /// When the bill was created.
    pub created_at: DateTime<Utc>,

    /// When the bill was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Create a new unpaid bill from a charge breakdown.
    #[must_use]
    pub fn new(
        user_id: UserId,
        meter_id: MeterId,
        period: BillPeriod,
        period_start_usage: i64,
        period_end_usage: i64,
        charge: ChargeBreakdown,
        due_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BillId::generate(),
            user_id,
            meter_id,
            period,
            period_start_usage,
            period_end_usage,
            usage_delta: period_end_usage - period_start_usage,
            water_charge: charge.water_charge,
            service_fee: charge.service_fee,
            late_fee: 0,
            total_due: charge.total_due,
            is_paid: false,
            paid_at: None,
            payment_method: None,
            due_date,
            is_overdue: false,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The amount owed before any late fee.
    #[must_use]
    pub const fn base_due(&self) -> i64 {
        self.water_charge + self.service_fee
    }

    /// Whole days this bill is past due at `now` (zero or negative if not
    /// yet late).
    #[must_use]
    pub fn days_late(&self, now: DateTime<Utc>) -> i64 {
        days_late(self.due_date, now)
    }

    /// The late fee this bill would carry if settled at `now`.
    #[must_use]
    pub fn late_fee_at(&self, now: DateTime<Utc>) -> i64 {
        late_fee(self.base_due(), self.days_late(now))
    }

    /// Settle the bill at `now`: fix the late fee, fold it into the total,
    /// and record the payment method.
    pub fn settle(&mut self, payment_method: impl Into<String>, now: DateTime<Utc>) {
        let fee = self.late_fee_at(now);
        self.late_fee = fee;
        self.total_due = self.base_due() + fee;
        self.is_paid = true;
        self.paid_at = Some(now);
        self.payment_method = Some(payment_method.into());
        self.updated_at = now;
    }

    /// Undo a settlement (admin override): clear the payment fields and drop
    /// the fixed late fee so a later settlement recomputes it.
    pub fn reverse_settlement(&mut self, now: DateTime<Utc>) {
        self.is_paid = false;
        self.paid_at = None;
        self.payment_method = None;
        self.late_fee = 0;
        self.total_due = self.base_due();
        self.updated_at = now;
    }

    /// Flag the bill as overdue.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) {
        self.is_overdue = true;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::ChargeBreakdown;
    use chrono::TimeZone;

    fn period(year: i32, month: u32) -> BillPeriod {
        BillPeriod::new(year, month).unwrap()
    }

    fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn unpaid_bill(base_due: i64, due_date: DateTime<Utc>) -> Bill {
        Bill::new(
            UserId::generate(),
            MeterId::generate(),
            period(2024, 5),
            0,
            12,
            ChargeBreakdown {
                water_charge: base_due,
                service_fee: 0,
                total_due: base_due,
            },
            due_date,
        )
    }

    #[test]
    fn period_display_is_zero_padded() {
        assert_eq!(period(2024, 5).to_string(), "2024-05");
        assert_eq!(period(2024, 12).to_string(), "2024-12");
    }

    #[test]
    fn period_parse_roundtrip() {
        let parsed: BillPeriod = "2024-05".parse().unwrap();
        assert_eq!(parsed, period(2024, 5));
        assert_eq!(parsed.to_string(), "2024-05");
    }

    #[test]
    fn period_parse_rejects_malformed_input() {
        assert!("2024-5".parse::<BillPeriod>().is_err());
        assert!("24-05".parse::<BillPeriod>().is_err());
        assert!("2024-13".parse::<BillPeriod>().is_err());
        assert!("2024-00".parse::<BillPeriod>().is_err());
        assert!("2024-05-01".parse::<BillPeriod>().is_err());
        assert!("202405".parse::<BillPeriod>().is_err());
    }

    #[test]
    fn period_previous_and_next_cross_year_boundaries() {
        assert_eq!(period(2024, 1).previous(), period(2023, 12));
        assert_eq!(period(2023, 12).next(), period(2024, 1));
        assert_eq!(period(2024, 6).previous(), period(2024, 5));
    }

    #[test]
    fn period_ordering_matches_string_ordering() {
        let earlier = period(2023, 12);
        let later = period(2024, 1);
        assert!(earlier < later);
        assert!(earlier.to_string() < later.to_string());
    }

    #[test]
    fn period_containing_uses_utc_calendar() {
        let at = Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap();
        assert_eq!(BillPeriod::containing(at), period(2024, 5));
    }

    #[test]
    fn period_serde_uses_canonical_string() {
        let json = serde_json::to_string(&period(2024, 5)).unwrap();
        assert_eq!(json, "\"2024-05\"");
        let parsed: BillPeriod = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, period(2024, 5));
    }

    #[test]
    fn due_date_is_25th_of_next_month() {
        assert_eq!(due_date_after(utc(2024, 5, 14)), utc(2024, 6, 25));
        // year rollover
        assert_eq!(due_date_after(utc(2024, 12, 1)), utc(2025, 1, 25));
    }

    #[test]
    fn late_fee_accrues_two_percent_per_started_month() {
        // 40 days late: 2 months started, 2% each
        assert_eq!(late_fee(100_000, 40), 4_000);
        assert_eq!(late_fee(100_000, 30), 2_000);
        assert_eq!(late_fee(100_000, 31), 4_000);
        assert_eq!(late_fee(100_000, 1), 2_000);
    }

    #[test]
    fn late_fee_is_zero_on_or_before_the_due_date() {
        assert_eq!(late_fee(100_000, 0), 0);
        assert_eq!(late_fee(100_000, -5), 0);
    }

    #[test]
    fn late_fee_rounds_to_the_nearest_rupiah() {
        // 12345 * 0.02 = 246.9 -> 247
        assert_eq!(late_fee(12_345, 10), 247);
        // 12320 * 0.02 = 246.4 -> 246
        assert_eq!(late_fee(12_320, 10), 246);
    }

    #[test]
    fn settle_fixes_the_fee_and_folds_it_into_the_total() {
        let due = utc(2024, 6, 25);
        let mut bill = unpaid_bill(100_000, due);
        let paid_at = due + chrono::Duration::days(40);

        bill.settle("gopay", paid_at);

        assert!(bill.is_paid);
        assert_eq!(bill.late_fee, 4_000);
        assert_eq!(bill.total_due, 104_000);
        assert_eq!(bill.paid_at, Some(paid_at));
        assert_eq!(bill.payment_method.as_deref(), Some("gopay"));
    }

    #[test]
    fn settle_on_time_carries_no_fee() {
        let due = utc(2024, 6, 25);
        let mut bill = unpaid_bill(100_000, due);

        bill.settle("MANUAL", due - chrono::Duration::days(3));

        assert!(bill.is_paid);
        assert_eq!(bill.late_fee, 0);
        assert_eq!(bill.total_due, 100_000);
    }

    #[test]
    fn reverse_settlement_restores_the_base_amount() {
        let due = utc(2024, 6, 25);
        let mut bill = unpaid_bill(100_000, due);
        bill.settle("gopay", due + chrono::Duration::days(40));

        bill.reverse_settlement(utc(2024, 9, 1));

        assert!(!bill.is_paid);
        assert_eq!(bill.late_fee, 0);
        assert_eq!(bill.total_due, 100_000);
        assert!(bill.paid_at.is_none());
        assert!(bill.payment_method.is_none());
    }

    #[test]
    fn days_late_counts_whole_days_past_due() {
        let due = utc(2024, 6, 25);
        assert_eq!(days_late(due, utc(2024, 6, 25)), 0);
        assert_eq!(days_late(due, utc(2024, 6, 26)), 1);
        assert_eq!(days_late(due, utc(2024, 8, 4)), 40);
        assert_eq!(days_late(due, utc(2024, 6, 20)), -5);
    }
}
