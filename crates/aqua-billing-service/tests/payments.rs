//! Payment session integration tests: hosted checkout creation against the
//! stub gateway, ownership checks, and session lookup.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{TestHarness, STUB_SNAP_TOKEN};
use serde_json::json;

use aqua_billing_core::{Bill, BillId, BillPeriod, ChargeBreakdown, Meter};
use aqua_billing_store::Store;

// ============================================================================
// Helpers
// ============================================================================

async fn report_usage(harness: &TestHarness, meter: &Meter, amount: i64) {
    harness
        .server
        .post("/v1/usage")
        .add_header("x-api-key", &harness.service_api_key)
        .json(&json!({
            "meter_id": meter.id.to_string(),
            "amount": amount
        }))
        .await
        .assert_status_ok();
}

async fn generate_bill(harness: &TestHarness, meter: &Meter, period: &str) -> serde_json::Value {
    let response = harness
        .server
        .post(&format!("/v1/bills/generate/{}", meter.id))
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({ "period": period }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

/// One generated bill for the harness user: tariff 10/15 + 5,000 fee,
/// 8 m3 of usage, total due 5,080.
async fn seed_standard_bill(harness: &TestHarness) -> (Meter, serde_json::Value) {
    let tariff = harness.seed_tariff(10, 15, 5_000);
    let meter = harness.seed_meter(harness.test_user_id, &tariff);
    report_usage(harness, &meter, 8).await;
    let bill = generate_bill(harness, &meter, "2025-01").await;
    (meter, bill)
}

async fn create_connection_request(harness: &TestHarness, total_cost: i64) -> serde_json::Value {
    let response = harness
        .server
        .post("/v1/connections")
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "total_cost": total_cost,
            "notes": "New installation, Jl. Merdeka 12"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

// ============================================================================
// Single Bill Sessions
// ============================================================================

#[tokio::test]
async fn bill_session_prices_the_bill_and_records_the_order() {
    let harness = TestHarness::new();
    harness.seed_customer(harness.test_user_id, "Budi Santoso");
    let (_, bill) = seed_standard_bill(&harness).await;
    let bill_id = bill["id"].as_str().unwrap();

    let response = harness
        .server
        .post(&format!("/v1/payments/bill/{bill_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["order_id"], format!("BILLING-{bill_id}"));
    assert_eq!(body["token"], STUB_SNAP_TOKEN);
    assert_eq!(body["gross_amount"], 5_080);
    assert_eq!(body["covered_bills"][0], *bill_id);
    assert!(body["redirect_url"].as_str().unwrap().contains(STUB_SNAP_TOKEN));

    // The gateway saw one request whose line items sum to the gross amount
    // and carry the customer profile.
    assert_eq!(harness.gateway.request_count(), 1);
    let request = harness.gateway.last_request().unwrap();
    assert_eq!(request.transaction_details.order_id, format!("BILLING-{bill_id}"));
    assert_eq!(request.transaction_details.gross_amount, 5_080);
    let item_total: i64 = request
        .item_details
        .iter()
        .map(|i| i.price * i64::from(i.quantity))
        .sum();
    assert_eq!(item_total, 5_080);
    assert_eq!(request.customer_details.unwrap().first_name, "Budi Santoso");

    // Creating the session changes no billing state.
    let stored: serde_json::Value = harness
        .server
        .get(&format!("/v1/bills/{bill_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(stored["is_paid"], false);
}

#[tokio::test]
async fn overdue_bill_session_adds_a_late_fee_line() {
    let harness = TestHarness::new();
    let tariff = harness.seed_tariff(10, 15, 5_000);
    let meter = harness.seed_meter(harness.test_user_id, &tariff);

    let charge = ChargeBreakdown {
        water_charge: 95_000,
        service_fee: 5_000,
        total_due: 100_000,
    };
    let due = Utc::now() - Duration::days(40) - Duration::hours(1);
    let period: BillPeriod = "2025-01".parse().unwrap();
    let bill = Bill::new(harness.test_user_id, meter.id, period, 0, 40, charge, due);
    harness.store.insert_bill(&bill).unwrap();

    let response = harness
        .server
        .post(&format!("/v1/payments/bill/{}", bill.id))
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    // 2% of the base per 30-day block, two blocks begun at day 40.
    assert_eq!(body["gross_amount"], 104_000);

    let request = harness.gateway.last_request().unwrap();
    let late_fee_line = request
        .item_details
        .iter()
        .find(|i| i.id == "LATE-FEE")
        .expect("late fee line item");
    assert_eq!(late_fee_line.price, 4_000);
}

#[tokio::test]
async fn bill_session_enforces_ownership_and_state() {
    let harness = TestHarness::new();
    let (_, bill) = seed_standard_bill(&harness).await;
    let bill_id = bill["id"].as_str().unwrap();

    // Someone else's bill.
    harness
        .server
        .post(&format!("/v1/payments/bill/{bill_id}"))
        .add_header("authorization", TestHarness::other_user_auth_header())
        .await
        .assert_status_forbidden();

    // Unknown bill.
    harness
        .server
        .post(&format!("/v1/payments/bill/{}", BillId::generate()))
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status_not_found();

    // Already paid.
    harness
        .server
        .post(&format!("/v1/bills/{bill_id}/pay"))
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status_ok();
    harness
        .server
        .post(&format!("/v1/payments/bill/{bill_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status(StatusCode::CONFLICT);

    // None of the rejected attempts reached the gateway.
    assert_eq!(harness.gateway.request_count(), 0);
}

// ============================================================================
// Multi-Bill Sessions
// ============================================================================

#[tokio::test]
async fn multi_bill_session_covers_every_unpaid_bill() {
    let harness = TestHarness::new();
    let tariff = harness.seed_tariff(10, 15, 5_000);
    let meter = harness.seed_meter(harness.test_user_id, &tariff);

    report_usage(&harness, &meter, 5).await;
    generate_bill(&harness, &meter, "2025-01").await;
    report_usage(&harness, &meter, 7).await;
    generate_bill(&harness, &meter, "2025-02").await;
    report_usage(&harness, &meter, 3).await;
    generate_bill(&harness, &meter, "2025-03").await;

    let response = harness
        .server
        .post("/v1/payments/bills")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    let order_id = body["order_id"].as_str().unwrap();
    assert!(order_id.starts_with("BILLING-MULTI-"));
    assert_eq!(body["covered_bills"].as_array().unwrap().len(), 3);
    // 50 + 70 + 30 of water plus three 5,000 service fees.
    assert_eq!(body["gross_amount"], 15_150);

    let request = harness.gateway.last_request().unwrap();
    assert_eq!(request.item_details.len(), 3);

    // Session creation settles nothing.
    let unpaid: serde_json::Value = harness
        .server
        .get("/v1/bills/me/unpaid")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(unpaid["count"], 3);
}

#[tokio::test]
async fn multi_bill_session_without_unpaid_bills_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/payments/bills")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_not_found();
    assert_eq!(harness.gateway.request_count(), 0);
}

// ============================================================================
// Connection Fee Sessions
// ============================================================================

#[tokio::test]
async fn connection_session_charges_the_installation_fee() {
    let harness = TestHarness::new();
    let request = create_connection_request(&harness, 250_000).await;
    let request_id = request["id"].as_str().unwrap();

    let response = harness
        .server
        .post(&format!("/v1/payments/connection/{request_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    let order_id = body["order_id"].as_str().unwrap();
    assert!(order_id.starts_with("RAB-"));
    assert_eq!(body["gross_amount"], 250_000);
    assert_eq!(body["covered_bills"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn connection_session_rejects_foreign_and_paid_requests() {
    let harness = TestHarness::new();
    let request = create_connection_request(&harness, 250_000).await;
    let request_id = request["id"].as_str().unwrap();

    harness
        .server
        .post(&format!("/v1/payments/connection/{request_id}"))
        .add_header("authorization", TestHarness::other_user_auth_header())
        .await
        .assert_status_forbidden();

    harness
        .server
        .put(&format!("/v1/connections/{request_id}/paid"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .await
        .assert_status_ok();

    harness
        .server
        .post(&format!("/v1/payments/connection/{request_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status(StatusCode::CONFLICT);
}

// ============================================================================
// Gateway Availability and Session Lookup
// ============================================================================

#[tokio::test]
async fn session_creation_without_a_gateway_is_bad_gateway() {
    let harness = TestHarness::without_gateway();
    let (_, bill) = seed_standard_bill(&harness).await;
    let bill_id = bill["id"].as_str().unwrap();

    let response = harness
        .server
        .post(&format!("/v1/payments/bill/{bill_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "external_service_error");
}

#[tokio::test]
async fn session_lookup_is_owner_only() {
    let harness = TestHarness::new();
    let (_, bill) = seed_standard_bill(&harness).await;
    let bill_id = bill["id"].as_str().unwrap();

    let created: serde_json::Value = harness
        .server
        .post(&format!("/v1/payments/bill/{bill_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    let order_id = created["order_id"].as_str().unwrap();

    let response = harness
        .server
        .get(&format!("/v1/payments/{order_id}"))
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["reference"], *order_id);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["gross_amount"], 5_080);
    assert_eq!(body["snap_token"], STUB_SNAP_TOKEN);

    harness
        .server
        .get(&format!("/v1/payments/{order_id}"))
        .add_header("authorization", TestHarness::other_user_auth_header())
        .await
        .assert_status_forbidden();

    harness
        .server
        .get("/v1/payments/BILLING-MULTI-unknown")
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status_not_found();
}
