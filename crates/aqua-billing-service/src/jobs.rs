//! Scheduled background jobs.
//!
//! Three recurring jobs keep the billing cycle moving without operator
//! action:
//!
//! - monthly bill generation, on the 1st at 00:01 UTC
//! - the overdue sweep, daily at 00:05 UTC
//! - due-soon reminders, daily at 08:00 UTC
//!
//! Each job is a detached task that sleeps until its next wall-clock fire
//! time, runs once, and reschedules. A failed run is logged and the job
//! keeps its schedule. Every job is also exposed as an admin endpoint for
//! manual runs, so a missed window can be recovered by hand.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Utc};

use aqua_billing_core::BillPeriod;
use aqua_billing_store::RocksStore;

use crate::billing::{generator, overdue};
use crate::state::AppState;

/// Minute past midnight (UTC) at which monthly generation runs on the 1st.
const GENERATION_MINUTE: u32 = 1;

/// Minute past midnight (UTC) at which the overdue sweep runs daily.
const OVERDUE_SWEEP_MINUTE: u32 = 5;

/// Hour (UTC) at which due-soon reminders go out daily.
const REMINDER_HOUR: u32 = 8;

/// Spawn the recurring billing jobs.
///
/// Does nothing when the scheduler is disabled; tests and single-shot
/// tooling drive the admin sweep endpoints instead.
pub fn spawn_schedulers(state: &AppState) {
    if !state.config.enable_scheduler {
        tracing::info!("Scheduler disabled by config");
        return;
    }

    tokio::spawn(run_generation_job(Arc::clone(&state.store)));
    tokio::spawn(run_overdue_job(Arc::clone(&state.store)));
    tokio::spawn(run_reminder_job(Arc::clone(&state.store)));
    tracing::info!("Billing schedulers started");
}

async fn run_generation_job(store: Arc<RocksStore>) {
    loop {
        sleep_until(next_generation_run(Utc::now())).await;

        let now = Utc::now();
        let period = BillPeriod::containing(now);
        match generator::generate_for_all(store.as_ref(), period, now) {
            Ok(summary) => tracing::info!(
                period = %summary.period,
                generated = summary.generated.len(),
                skipped = summary.skipped_existing.len(),
                failed = summary.failed.len(),
                "Monthly bill generation finished"
            ),
            Err(e) => tracing::warn!(error = %e, "Monthly bill generation failed"),
        }
    }
}

async fn run_overdue_job(store: Arc<RocksStore>) {
    loop {
        sleep_until(next_daily_run(Utc::now(), 0, OVERDUE_SWEEP_MINUTE)).await;

        match overdue::mark_overdue(store.as_ref(), Utc::now()) {
            Ok(summary) => tracing::info!(marked = summary.marked, "Overdue sweep finished"),
            Err(e) => tracing::warn!(error = %e, "Overdue sweep failed"),
        }
    }
}

async fn run_reminder_job(store: Arc<RocksStore>) {
    loop {
        sleep_until(next_daily_run(Utc::now(), REMINDER_HOUR, 0)).await;

        match overdue::send_due_reminders(store.as_ref(), Utc::now()) {
            Ok(summary) => tracing::info!(
                sent = summary.sent,
                already_reminded = summary.already_reminded,
                "Reminder sweep finished"
            ),
            Err(e) => tracing::warn!(error = %e, "Reminder sweep failed"),
        }
    }
}

/// Sleep until `target`. Targets are computed strictly in the future; a
/// target that has already passed by the time this runs yields immediately.
async fn sleep_until(target: DateTime<Utc>) {
    let wait = (target - Utc::now()).to_std().unwrap_or_default();
    tokio::time::sleep(wait).await;
}

/// The next 1st-of-month generation slot strictly after `now`.
fn next_generation_run(now: DateTime<Utc>) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(0, GENERATION_MINUTE, 0).expect("fixed job time is valid");
    let first = now
        .date_naive()
        .with_day(1)
        .expect("every month has a first day");

    let candidate = first.and_time(time).and_utc();
    if candidate > now {
        candidate
    } else {
        let next_first = first
            .checked_add_months(Months::new(1))
            .expect("next month is representable");
        next_first.and_time(time).and_utc()
    }
}

/// The next daily slot at `hour:minute` UTC strictly after `now`.
fn next_daily_run(now: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).expect("fixed job time is valid");
    let today = now.date_naive().and_time(time).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}
