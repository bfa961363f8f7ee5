//! Monthly bill generation.
//!
//! One bill per (meter, period). Usage for the period is the difference
//! between the meter's current cumulative reading and the previous period's
//! closing reading, so generation never consumes the unbilled counter and is
//! safe to re-run: a second attempt for the same period is rejected by the
//! store's uniqueness guard.

use chrono::{DateTime, Utc};
use serde::Serialize;

use aqua_billing_core::{
    compute_charge, due_date_after, Bill, BillId, BillPeriod, BillingError, MeterId,
    NotificationCategory,
};
use aqua_billing_store::{Store, StoreError};

use super::{from_store, notify};

/// Title used for new-bill notifications.
const NEW_BILL_TITLE: &str = "New Bill Issued";

/// Generate the bill for one meter and period.
///
/// # Errors
///
/// - `BillingError::BillAlreadyExists` if the (meter, period) bill exists,
///   which makes re-runs safe.
/// - `BillingError::NegativeUsage` if the meter's cumulative reading is below
///   the previous period's closing reading.
/// - `BillingError::NotFound` if the meter or its tariff tier is missing.
pub fn generate_for_meter(
    store: &dyn Store,
    meter_id: &MeterId,
    period: BillPeriod,
    now: DateTime<Utc>,
) -> Result<Bill, BillingError> {
    let meter = store
        .get_meter(meter_id)
        .map_err(from_store)?
        .ok_or_else(|| BillingError::NotFound {
            entity: "meter",
            id: meter_id.to_string(),
        })?;

    if store
        .get_bill_for_period(meter_id, period)
        .map_err(from_store)?
        .is_some()
    {
        return Err(BillingError::BillAlreadyExists {
            meter_id: meter_id.to_string(),
            period: period.to_string(),
        });
    }

    // Closing reading of the previous period; zero for a first bill.
    let period_start_usage = store
        .get_bill_for_period(meter_id, period.previous())
        .map_err(from_store)?
        .map_or(0, |previous| previous.period_end_usage);

    let period_end_usage = meter.cumulative_usage;

    if period_end_usage < period_start_usage {
        return Err(BillingError::NegativeUsage {
            meter_id: meter_id.to_string(),
            start: period_start_usage,
            end: period_end_usage,
        });
    }

    let tier = store
        .get_tariff(&meter.tariff_id)
        .map_err(from_store)?
        .ok_or_else(|| BillingError::NotFound {
            entity: "tariff",
            id: meter.tariff_id.to_string(),
        })?;

    let charge = compute_charge(period_end_usage - period_start_usage, &tier);
    let due_date = due_date_after(now);

    let bill = Bill::new(
        meter.user_id,
        meter.id,
        period,
        period_start_usage,
        period_end_usage,
        charge,
        due_date,
    );

    // The store inserts the bill, its indexes, and the meter's next_due_date
    // in one write; a concurrent generator for the same period loses here.
    store.insert_bill(&bill).map_err(|e| match e {
        StoreError::AlreadyExists { .. } => BillingError::BillAlreadyExists {
            meter_id: meter_id.to_string(),
            period: period.to_string(),
        },
        other => from_store(other),
    })?;

    tracing::info!(
        meter_id = %meter.id,
        user_id = %meter.user_id,
        period = %period,
        usage = %bill.usage_delta,
        total_due = %bill.total_due,
        "Bill generated"
    );

    notify(
        store,
        meter.user_id,
        NEW_BILL_TITLE,
        format!(
            "Your water bill for {} is Rp{}, due {}.",
            period,
            bill.total_due,
            due_date.format("%Y-%m-%d")
        ),
        NotificationCategory::Billing,
        Some(format!("/bills/{}", bill.id)),
    );

    Ok(bill)
}

/// A bill created by a batch run.
#[derive(Debug, Serialize)]
pub struct GeneratedBill {
    /// The meter the bill was generated for.
    pub meter_id: MeterId,
    /// The new bill.
    pub bill_id: BillId,
    /// Amount due.
    pub total_due: i64,
}

/// A meter whose generation attempt failed.
#[derive(Debug, Serialize)]
pub struct FailedMeter {
    /// The meter that failed.
    pub meter_id: MeterId,
    /// Why it failed.
    pub reason: String,
}

/// Per-meter outcomes of one batch generation run.
#[derive(Debug, Serialize)]
pub struct GenerationSummary {
    /// The period bills were generated for (`YYYY-MM`).
    pub period: String,
    /// Bills created by this run.
    pub generated: Vec<GeneratedBill>,
    /// Meters that already had a bill for the period.
    pub skipped_existing: Vec<MeterId>,
    /// Meters whose generation failed, with the reason.
    pub failed: Vec<FailedMeter>,
}

/// Generate bills for every meter, independently.
///
/// One meter's failure (regressed reading, missing tariff) never aborts the
/// batch; it is reported in the summary and the run continues.
///
/// # Errors
///
/// Returns an error only if the meter listing itself fails.
pub fn generate_for_all(
    store: &dyn Store,
    period: BillPeriod,
    now: DateTime<Utc>,
) -> Result<GenerationSummary, BillingError> {
    let meters = store.list_meters().map_err(from_store)?;

    let mut summary = GenerationSummary {
        period: period.to_string(),
        generated: Vec::new(),
        skipped_existing: Vec::new(),
        failed: Vec::new(),
    };

    for meter in meters {
        match generate_for_meter(store, &meter.id, period, now) {
            Ok(bill) => summary.generated.push(GeneratedBill {
                meter_id: meter.id,
                bill_id: bill.id,
                total_due: bill.total_due,
            }),
            Err(BillingError::BillAlreadyExists { .. }) => {
                summary.skipped_existing.push(meter.id);
            }
            Err(e) => {
                tracing::warn!(meter_id = %meter.id, error = %e, "Bill generation failed");
                summary.failed.push(FailedMeter {
                    meter_id: meter.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        period = %summary.period,
        generated = %summary.generated.len(),
        skipped = %summary.skipped_existing.len(),
        failed = %summary.failed.len(),
        "Batch generation finished"
    );

    Ok(summary)
}
