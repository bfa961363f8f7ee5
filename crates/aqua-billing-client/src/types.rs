//! Request and response types for the aqua-billing client.

use serde::{Deserialize, Serialize};

use aqua_billing_core::Bill;

/// A single meter reading delta.
#[derive(Debug, Clone, Serialize)]
pub struct MeterReading {
    /// Meter ID being read.
    pub meter_id: String,
    /// Consumption since the previous reading, in m³. Must be non-negative.
    pub amount: i64,
}

/// Usage ingestion response.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageResponse {
    /// Whether the reading was recorded.
    pub success: bool,
    /// Meter ID.
    pub meter_id: String,
    /// Lifetime consumption after this reading.
    pub cumulative_usage: i64,
    /// Unpaid consumption after this reading.
    pub unbilled_usage: i64,
}

/// Batch usage ingestion request.
#[derive(Debug, Clone, Serialize)]
pub struct BatchUsageRequest {
    /// List of readings.
    pub readings: Vec<MeterReading>,
}

/// Batch usage ingestion response.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchUsageResponse {
    /// Results for each reading, in request order.
    pub results: Vec<BatchUsageResult>,
    /// Total readings recorded.
    pub processed: usize,
    /// Total readings rejected.
    pub failed: usize,
}

/// Result for a single reading in a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchUsageResult {
    /// Meter ID as given in the request.
    pub meter_id: String,
    /// Whether the reading was recorded.
    pub success: bool,
    /// Error message if rejected.
    pub error: Option<String>,
    /// Lifetime consumption after the reading (if recorded).
    pub cumulative_usage: Option<i64>,
}

/// Bill listing response.
#[derive(Debug, Clone, Deserialize)]
pub struct BillListResponse {
    /// The bills, newest period first.
    pub bills: Vec<Bill>,
    /// Number of bills.
    pub count: usize,
}

/// An unpaid bill with its dues projected to the time of the request.
#[derive(Debug, Clone, Deserialize)]
pub struct UnpaidBill {
    /// The bill as persisted.
    pub bill: Bill,
    /// Whole days past due (zero or negative before the due date).
    pub days_late: i64,
    /// Late fee if the bill were settled now.
    pub late_fee: i64,
    /// Amount owed if the bill were settled now.
    pub total_with_fee: i64,
}

/// Unpaid bill listing response.
#[derive(Debug, Clone, Deserialize)]
pub struct UnpaidBillsResponse {
    /// Unpaid bills, newest period first.
    pub bills: Vec<UnpaidBill>,
    /// Number of unpaid bills.
    pub count: usize,
    /// Sum owed across all unpaid bills, projected fees included.
    pub total_due: i64,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}
