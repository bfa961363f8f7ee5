//! Usage ingestion handlers.
//!
//! Meter readings arrive from the metering pipeline as non-negative deltas in
//! m³. Each reading raises the meter's cumulative and unbilled counters in one
//! atomic store operation; the bill generator later charges the span between
//! consecutive period-end readings.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use aqua_billing_core::{Meter, MeterId};
use aqua_billing_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// A single meter reading delta.
#[derive(Debug, Deserialize)]
pub struct UsageRequest {
    /// Meter ID being read.
    pub meter_id: String,
    /// Consumption since the previous reading, in m³. Must be non-negative.
    pub amount: i64,
}

/// Usage ingestion response.
#[derive(Debug, Serialize)]
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

/// Record a single meter reading.
pub async fn record_usage(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<UsageRequest>,
) -> Result<Json<UsageResponse>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        meter_id = %body.meter_id,
        amount = %body.amount,
        "Processing meter reading"
    );

    let meter = apply_reading(&state, &body)?;

    tracing::info!(
        service = %auth.service_name,
        meter_id = %meter.id,
        amount = %body.amount,
        cumulative_usage = %meter.cumulative_usage,
        "Meter reading recorded"
    );

    Ok(Json(UsageResponse {
        success: true,
        meter_id: meter.id.to_string(),
        cumulative_usage: meter.cumulative_usage,
        unbilled_usage: meter.unbilled_usage,
    }))
}

/// Batch usage ingestion request.
#[derive(Debug, Deserialize)]
pub struct BatchUsageRequest {
    /// List of readings.
    pub readings: Vec<UsageRequest>,
}

/// Batch usage ingestion response.
#[derive(Debug, Serialize)]
pub struct BatchUsageResponse {
    /// Results for each reading, in request order.
    pub results: Vec<BatchUsageResult>,
    /// Total readings recorded.
    pub processed: usize,
    /// Total readings rejected.
    pub failed: usize,
}

/// Result for a single reading in a batch.
#[derive(Debug, Serialize)]
pub struct BatchUsageResult {
    /// Meter ID as given in the request.
    pub meter_id: String,
    /// Whether the reading was recorded.
    pub success: bool,
    /// Error message if rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Lifetime consumption after the reading (if recorded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_usage: Option<i64>,
}

/// Record a batch of meter readings.
///
/// Readings are applied independently; a rejected reading (unknown meter,
/// negative delta) is reported in its result slot and does not stop the rest
/// of the batch.
pub async fn record_usage_batch(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<BatchUsageRequest>,
) -> Result<Json<BatchUsageResponse>, ApiError> {
    let mut results = Vec::with_capacity(body.readings.len());
    let mut processed = 0;
    let mut failed = 0;

    for reading in &body.readings {
        match apply_reading(&state, reading) {
            Ok(meter) => {
                results.push(BatchUsageResult {
                    meter_id: reading.meter_id.clone(),
                    success: true,
                    error: None,
                    cumulative_usage: Some(meter.cumulative_usage),
                });
                processed += 1;
            }
            Err(e) => {
                tracing::warn!(
                    service = %auth.service_name,
                    meter_id = %reading.meter_id,
                    error = %e,
                    "Meter reading rejected"
                );
                results.push(BatchUsageResult {
                    meter_id: reading.meter_id.clone(),
                    success: false,
                    error: Some(e.to_string()),
                    cumulative_usage: None,
                });
                failed += 1;
            }
        }
    }

    tracing::info!(
        service = %auth.service_name,
        processed = %processed,
        failed = %failed,
        "Meter reading batch finished"
    );

    Ok(Json(BatchUsageResponse {
        results,
        processed,
        failed,
    }))
}

/// Validate and apply one reading.
fn apply_reading(state: &AppState, reading: &UsageRequest) -> Result<Meter, ApiError> {
    let meter_id = reading
        .meter_id
        .parse::<MeterId>()
        .map_err(|_| ApiError::BadRequest("Invalid meter ID".into()))?;

    if reading.amount < 0 {
        return Err(ApiError::Unprocessable(format!(
            "negative usage delta: {}",
            reading.amount
        )));
    }

    let meter = state.store.record_usage(&meter_id, reading.amount)?;
    Ok(meter)
}
