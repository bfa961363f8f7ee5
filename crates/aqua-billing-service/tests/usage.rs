//! Meter usage reporting integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

use aqua_billing_store::Store;

// ============================================================================
// Report Usage
// ============================================================================

#[tokio::test]
async fn record_usage_raises_both_counters() {
    let harness = TestHarness::new();
    let tariff = harness.seed_tariff(10, 15, 5_000);
    let meter = harness.seed_meter(harness.test_user_id, &tariff);

    let response = harness
        .server
        .post("/v1/usage")
        .add_header("x-api-key", &harness.service_api_key)
        .add_header("x-service-name", "meter-collector")
        .json(&json!({
            "meter_id": meter.id.to_string(),
            "amount": 8
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["cumulative_usage"], 8);
    assert_eq!(body["unbilled_usage"], 8);

    // A second reading accumulates rather than replaces.
    let response = harness
        .server
        .post("/v1/usage")
        .add_header("x-api-key", &harness.service_api_key)
        .add_header("x-service-name", "meter-collector")
        .json(&json!({
            "meter_id": meter.id.to_string(),
            "amount": 5
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["cumulative_usage"], 13);
    assert_eq!(body["unbilled_usage"], 13);
}

#[tokio::test]
async fn record_usage_without_api_key_fails() {
    let harness = TestHarness::new();
    let tariff = harness.seed_tariff(10, 15, 5_000);
    let meter = harness.seed_meter(harness.test_user_id, &tariff);

    let response = harness
        .server
        .post("/v1/usage")
        .json(&json!({
            "meter_id": meter.id.to_string(),
            "amount": 8
        }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn record_usage_with_wrong_api_key_fails() {
    let harness = TestHarness::new();
    let tariff = harness.seed_tariff(10, 15, 5_000);
    let meter = harness.seed_meter(harness.test_user_id, &tariff);

    let response = harness
        .server
        .post("/v1/usage")
        .add_header("x-api-key", "not-the-key")
        .json(&json!({
            "meter_id": meter.id.to_string(),
            "amount": 8
        }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn record_usage_unknown_meter_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/usage")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "meter_id": "00000000-0000-4000-8000-000000000000",
            "amount": 8
        }))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn record_negative_usage_is_rejected() {
    let harness = TestHarness::new();
    let tariff = harness.seed_tariff(10, 15, 5_000);
    let meter = harness.seed_meter(harness.test_user_id, &tariff);

    let response = harness
        .server
        .post("/v1/usage")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "meter_id": meter.id.to_string(),
            "amount": -3
        }))
        .await;

    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "unprocessable");

    // The rejected reading left the meter untouched.
    let stored = harness.store.get_meter(&meter.id).unwrap().unwrap();
    assert_eq!(stored.cumulative_usage, 0);
    assert_eq!(stored.unbilled_usage, 0);
}

// ============================================================================
// Batch Usage
// ============================================================================

#[tokio::test]
async fn record_usage_batch_success() {
    let harness = TestHarness::new();
    let tariff = harness.seed_tariff(10, 15, 5_000);
    let meter_a = harness.seed_meter(harness.test_user_id, &tariff);
    let meter_b = harness.seed_meter(harness.test_user_id, &tariff);

    let response = harness
        .server
        .post("/v1/usage/batch")
        .add_header("x-api-key", &harness.service_api_key)
        .add_header("x-service-name", "meter-collector")
        .json(&json!({
            "readings": [
                { "meter_id": meter_a.id.to_string(), "amount": 4 },
                { "meter_id": meter_b.id.to_string(), "amount": 9 }
            ]
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["processed"], 2);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["results"][0]["cumulative_usage"], 4);
    assert_eq!(body["results"][1]["cumulative_usage"], 9);
}

#[tokio::test]
async fn batch_isolates_a_bad_reading() {
    let harness = TestHarness::new();
    let tariff = harness.seed_tariff(10, 15, 5_000);
    let meter_a = harness.seed_meter(harness.test_user_id, &tariff);
    let meter_b = harness.seed_meter(harness.test_user_id, &tariff);
    let meter_c = harness.seed_meter(harness.test_user_id, &tariff);

    let response = harness
        .server
        .post("/v1/usage/batch")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "readings": [
                { "meter_id": meter_a.id.to_string(), "amount": 4 },
                { "meter_id": meter_b.id.to_string(), "amount": -2 },
                { "meter_id": meter_c.id.to_string(), "amount": 6 }
            ]
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["processed"], 2);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["results"][1]["success"], false);
    assert!(body["results"][1]["error"].as_str().is_some());

    // The good readings landed; the bad one changed nothing.
    let stored_a = harness.store.get_meter(&meter_a.id).unwrap().unwrap();
    let stored_b = harness.store.get_meter(&meter_b.id).unwrap().unwrap();
    let stored_c = harness.store.get_meter(&meter_c.id).unwrap().unwrap();
    assert_eq!(stored_a.cumulative_usage, 4);
    assert_eq!(stored_b.cumulative_usage, 0);
    assert_eq!(stored_c.cumulative_usage, 6);
}
