//! Monthly billing reports (admin).

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use aqua_billing_core::BillPeriod;
use aqua_billing_store::Store;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Aggregate figures for one billing period.
#[derive(Debug, Serialize)]
pub struct MonthlyReport {
    /// The period reported (`YYYY-MM`).
    pub period: String,
    /// Bills issued for the period.
    pub bill_count: usize,
    /// Water consumption billed, in m³.
    pub total_usage: i64,
    /// Amount billed before late fees, in rupiah.
    pub total_billed: i64,
    /// Amount collected from settled bills, fixed late fees included.
    pub total_paid: i64,
    /// Amount still outstanding (base dues of unpaid bills).
    pub total_unpaid: i64,
    /// Late fees collected on settled bills.
    pub total_late_fees: i64,
    /// Distinct customers with at least one settled bill in the period.
    pub paid_customers: usize,
    /// Distinct customers with at least one outstanding bill in the period.
    pub unpaid_customers: usize,
}

/// Build the aggregate report for one billing period.
pub async fn monthly_report(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(period): Path<String>,
) -> Result<Json<MonthlyReport>, ApiError> {
    let period = period
        .parse::<BillPeriod>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut report = MonthlyReport {
        period: period.to_string(),
        bill_count: 0,
        total_usage: 0,
        total_billed: 0,
        total_paid: 0,
        total_unpaid: 0,
        total_late_fees: 0,
        paid_customers: 0,
        unpaid_customers: 0,
    };

    let mut paid_customers = HashSet::new();
    let mut unpaid_customers = HashSet::new();

    for bill in state.store.list_bills()? {
        if bill.period != period {
            continue;
        }
        report.bill_count += 1;
        report.total_usage += bill.usage_delta;
        report.total_billed += bill.base_due();
        if bill.is_paid {
            report.total_paid += bill.total_due;
            report.total_late_fees += bill.late_fee;
            paid_customers.insert(bill.user_id);
        } else {
            report.total_unpaid += bill.base_due();
            unpaid_customers.insert(bill.user_id);
        }
    }

    report.paid_customers = paid_customers.len();
    report.unpaid_customers = unpaid_customers.len();

    Ok(Json(report))
}
