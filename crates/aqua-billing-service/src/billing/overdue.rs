//! Overdue flagging and due-date reminder sweeps.
//!
//! Both sweeps scan the full bill set and act on a filtered slice. They are
//! idempotent: the overdue sweep is guarded by the `is_overdue` flag (checked
//! again under the meter lock inside the store), the reminder sweep by a
//! same-day lookup of the notification log.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use aqua_billing_core::{BillingError, NotificationCategory};
use aqua_billing_store::Store;

use super::{from_store, notify};

/// Title used for overdue-warning notifications.
const OVERDUE_TITLE: &str = "Bill Overdue";

/// Title used for due-soon reminder notifications.
const REMINDER_TITLE: &str = "Payment Reminder";

/// How far ahead of the due date reminders start.
const REMINDER_WINDOW_DAYS: i64 = 3;

/// Result of one overdue sweep.
#[derive(Debug, Serialize)]
pub struct OverdueSummary {
    /// Bills newly flagged overdue by this run.
    pub marked: usize,
}

/// Flag every unpaid bill past its due date.
///
/// Bills that are settled or flagged between the scan and the write are
/// skipped by the store's locked check-and-set, so a sweep racing a payment
/// never resurrects state.
///
/// # Errors
///
/// Returns an error only if the bill listing itself fails; per-bill store
/// failures are logged and skipped.
pub fn mark_overdue(
    store: &dyn Store,
    now: DateTime<Utc>,
) -> Result<OverdueSummary, BillingError> {
    let bills = store.list_bills().map_err(from_store)?;

    let mut marked = 0;
    for bill in bills {
        if bill.is_paid || bill.is_overdue || bill.due_date >= now {
            continue;
        }

        match store.mark_bill_overdue(&bill.id, now) {
            Ok(Some(updated)) => {
                marked += 1;
                notify(
                    store,
                    updated.user_id,
                    OVERDUE_TITLE,
                    format!(
                        "Your water bill for {} (Rp{}) is {} day(s) past due. A late fee will \
                         be added when you pay.",
                        updated.period,
                        updated.total_due,
                        updated.days_late(now)
                    ),
                    NotificationCategory::Warning,
                    Some(format!("/bills/{}", updated.id)),
                );
            }
            // Settled or flagged by a concurrent writer after our scan.
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(bill_id = %bill.id, error = %e, "Overdue flagging failed");
            }
        }
    }

    tracing::info!(marked = %marked, "Overdue sweep finished");
    Ok(OverdueSummary { marked })
}

/// Result of one reminder sweep.
#[derive(Debug, Serialize)]
pub struct ReminderSummary {
    /// Reminders written by this run.
    pub sent: usize,
    /// Bills skipped because today's reminder already exists.
    pub already_reminded: usize,
}

/// Remind customers about unpaid bills due within the next three days.
///
/// At most one reminder per bill per calendar day: before writing, the sweep
/// checks the customer's notification log for a same-day record with the same
/// title and bill link.
///
/// # Errors
///
/// Returns an error only if the bill listing itself fails; per-bill store
/// failures are logged and skipped.
pub fn send_due_reminders(
    store: &dyn Store,
    now: DateTime<Utc>,
) -> Result<ReminderSummary, BillingError> {
    let bills = store.list_bills().map_err(from_store)?;

    let window_end = now + Duration::days(REMINDER_WINDOW_DAYS);
    let midnight_ms = midnight_ms(now);

    let mut sent = 0;
    let mut already_reminded = 0;
    for bill in bills {
        if bill.is_paid || bill.due_date <= now || bill.due_date > window_end {
            continue;
        }

        let link = format!("/bills/{}", bill.id);
        match store.has_notification_since(
            &bill.user_id,
            midnight_ms,
            REMINDER_TITLE,
            Some(&link),
        ) {
            Ok(true) => {
                already_reminded += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(bill_id = %bill.id, error = %e, "Reminder lookup failed");
                continue;
            }
        }

        let days_left = (bill.due_date - now).num_days();
        notify(
            store,
            bill.user_id,
            REMINDER_TITLE,
            format!(
                "Your water bill for {} (Rp{}) is due in {} day(s), on {}.",
                bill.period,
                bill.total_due,
                days_left,
                bill.due_date.format("%Y-%m-%d")
            ),
            NotificationCategory::Warning,
            Some(link),
        );
        sent += 1;
    }

    tracing::info!(
        sent = %sent,
        already_reminded = %already_reminded,
        "Reminder sweep finished"
    );
    Ok(ReminderSummary {
        sent,
        already_reminded,
    })
}

/// Unix milliseconds of the UTC midnight preceding `now`.
#[allow(clippy::cast_sign_loss)]
fn midnight_ms(now: DateTime<Utc>) -> u64 {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc();
    midnight.timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_billing_core::{compute_charge, Bill, BillPeriod, Meter, TariffTier, UserId};
    use aqua_billing_store::RocksStore;
    use tempfile::TempDir;

    fn test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn seed_meter(store: &RocksStore) -> (Meter, TariffTier) {
        let tier = TariffTier::new("residential", 10, 15, 5000);
        store.put_tariff(&tier).unwrap();
        let meter = Meter::new(UserId::generate(), tier.id, "MTR-001");
        store.put_meter(&meter).unwrap();
        (meter, tier)
    }

    fn bill_due_at(
        store: &RocksStore,
        meter: &Meter,
        tier: &TariffTier,
        month: u32,
        due_date: DateTime<Utc>,
    ) -> Bill {
        let bill = Bill::new(
            meter.user_id,
            meter.id,
            BillPeriod::new(2024, month).unwrap(),
            0,
            8,
            compute_charge(8, tier),
            due_date,
        );
        store.insert_bill(&bill).unwrap();
        bill
    }

    #[test]
    fn overdue_sweep_flags_each_bill_once() {
        let (store, _dir) = test_store();
        let (meter, tier) = seed_meter(&store);
        let now = Utc::now();
        let bill = bill_due_at(&store, &meter, &tier, 6, now - Duration::days(5));

        let first = mark_overdue(&store, now).unwrap();
        assert_eq!(first.marked, 1);
        assert!(store.get_bill(&bill.id).unwrap().unwrap().is_overdue);

        let second = mark_overdue(&store, now).unwrap();
        assert_eq!(second.marked, 0);

        let notifications = store.list_notifications_by_user(&meter.user_id, 10).unwrap();
        let warnings: Vec<_> = notifications
            .iter()
            .filter(|n| n.title == "Bill Overdue")
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("5 day(s) past due"));
    }

    #[test]
    fn overdue_sweep_ignores_paid_and_future_bills() {
        let (store, _dir) = test_store();
        let (meter, tier) = seed_meter(&store);
        let now = Utc::now();

        let paid = bill_due_at(&store, &meter, &tier, 5, now - Duration::days(10));
        store.settle_bills(&[paid.id], "MANUAL", now).unwrap();
        bill_due_at(&store, &meter, &tier, 6, now + Duration::days(10));

        let summary = mark_overdue(&store, now).unwrap();
        assert_eq!(summary.marked, 0);
    }

    #[test]
    fn reminders_cover_only_the_three_day_window() {
        let (store, _dir) = test_store();
        let (meter, tier) = seed_meter(&store);
        let now = Utc::now();

        bill_due_at(&store, &meter, &tier, 5, now + Duration::days(2)); // reminded
        bill_due_at(&store, &meter, &tier, 6, now + Duration::days(10)); // too far out
        bill_due_at(&store, &meter, &tier, 7, now - Duration::days(1)); // already past due

        let summary = send_due_reminders(&store, now).unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.already_reminded, 0);

        let notifications = store.list_notifications_by_user(&meter.user_id, 10).unwrap();
        let reminders: Vec<_> = notifications
            .iter()
            .filter(|n| n.title == "Payment Reminder")
            .collect();
        assert_eq!(reminders.len(), 1);
        assert!(reminders[0].message.contains("due in 2 day(s)"));
    }

    #[test]
    fn reminders_are_deduplicated_within_a_day() {
        let (store, _dir) = test_store();
        let (meter, tier) = seed_meter(&store);
        let now = Utc::now();
        bill_due_at(&store, &meter, &tier, 6, now + Duration::days(1));

        let first = send_due_reminders(&store, now).unwrap();
        assert_eq!(first.sent, 1);

        let second = send_due_reminders(&store, now).unwrap();
        assert_eq!(second.sent, 0);
        assert_eq!(second.already_reminded, 1);
    }

    #[test]
    fn settling_a_bill_stops_its_reminders() {
        let (store, _dir) = test_store();
        let (meter, tier) = seed_meter(&store);
        let now = Utc::now();
        let bill = bill_due_at(&store, &meter, &tier, 6, now + Duration::days(1));

        store.settle_bills(&[bill.id], "MANUAL", now).unwrap();

        let summary = send_due_reminders(&store, now).unwrap();
        assert_eq!(summary.sent, 0);
    }
}
