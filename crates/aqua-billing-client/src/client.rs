//! Aqua-billing HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BatchUsageRequest, BatchUsageResponse, BillListResponse, MeterReading,
    UnpaidBillsResponse, UsageResponse,
};

/// Aqua-billing API client.
///
/// Provides methods for reporting meter readings and querying bills.
#[derive(Debug, Clone)]
pub struct AquaBillingClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl AquaBillingClient {
    /// Create a new aqua-billing client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the aqua-billing service (e.g., `"http://aqua-billing:8080"`)
    /// * `api_key` - Service API key for authentication
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new aqua-billing client with custom options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with default settings).
    #[must_use]
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            service_name: options.service_name,
        }
    }

    /// Report one meter reading delta.
    ///
    /// This is a convenience method that constructs the reading for you.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn report_reading(
        &self,
        meter_id: impl Into<String>,
        amount: i64,
    ) -> Result<UsageResponse, ClientError> {
        self.report_usage(MeterReading {
            meter_id: meter_id.into(),
            amount,
        })
        .await
    }

    /// Report a meter reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn report_usage(&self, reading: MeterReading) -> Result<UsageResponse, ClientError> {
        let url = format!("{}/v1/usage", self.base_url);
        tracing::debug!(
            meter_id = %reading.meter_id,
            amount = %reading.amount,
            "Reporting meter reading"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&reading)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Report multiple meter readings in a batch.
    ///
    /// Readings are applied independently on the server; a rejected reading
    /// is reported in its result slot and does not fail the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn report_usage_batch(
        &self,
        readings: Vec<MeterReading>,
    ) -> Result<BatchUsageResponse, ClientError> {
        let url = format!("{}/v1/usage/batch", self.base_url);
        tracing::debug!(readings = %readings.len(), "Reporting meter reading batch");
        let request = BatchUsageRequest { readings };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a customer's bills (requires user JWT, not service API key).
    ///
    /// This method is typically used by the customer-facing app, not by services.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_my_bills(&self, user_jwt: &str) -> Result<BillListResponse, ClientError> {
        let url = format!("{}/v1/bills/me", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a customer's unpaid bills with projected late fees (requires user
    /// JWT, not service API key).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_unpaid_bills(
        &self,
        user_jwt: &str,
    ) -> Result<UnpaidBillsResponse, ClientError> {
        let url = format!("{}/v1/bills/me/unpaid", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code.as_str();
                let message = api_error.error.message;

                // Map specific error codes to typed errors
                match code {
                    "not_found" if message.contains("meter") => Err(ClientError::MeterNotFound {
                        meter_id: message.replace("meter not found: ", ""),
                    }),
                    "unprocessable" => Err(ClientError::InvalidReading { message }),
                    _ => Err(ClientError::Api {
                        code: code.to_string(),
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use aqua_billing_core::{Bill, ChargeBreakdown};
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn client_creation() {
        let client = AquaBillingClient::new("http://localhost:8080", "test-api-key");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = AquaBillingClient::new("http://localhost:8080/", "test-api-key");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn client_options() {
        let options = ClientOptions::with_service_name("meter-gateway");
        let client = AquaBillingClient::with_options("http://localhost:8080", "key", options);
        assert_eq!(client.service_name, "meter-gateway");
    }

    #[tokio::test]
    async fn report_reading_posts_the_delta() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/usage"))
            .and(header("x-api-key", "test-key"))
            .and(header("x-service-name", "meter-gateway"))
            .and(body_json(json!({ "meter_id": "MTR-1", "amount": 8 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "meter_id": "MTR-1",
                "cumulative_usage": 8,
                "unbilled_usage": 8
            })))
            .expect(1)
            .mount(&server)
            .await;

        let options = ClientOptions::with_service_name("meter-gateway");
        let client = AquaBillingClient::with_options(server.uri(), "test-key", options);

        let response = client.report_reading("MTR-1", 8).await.unwrap();
        assert!(response.success);
        assert_eq!(response.meter_id, "MTR-1");
        assert_eq!(response.cumulative_usage, 8);
        assert_eq!(response.unbilled_usage, 8);
    }

    #[tokio::test]
    async fn unknown_meter_maps_to_a_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/usage"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": "not_found", "message": "meter not found: MTR-9" }
            })))
            .mount(&server)
            .await;

        let client = AquaBillingClient::new(server.uri(), "test-key");
        let error = client.report_reading("MTR-9", 8).await.unwrap_err();

        match error {
            ClientError::MeterNotFound { meter_id } => assert_eq!(meter_id, "MTR-9"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn rejected_reading_maps_to_invalid_reading() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/usage"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "error": { "code": "unprocessable", "message": "negative usage delta: -2" }
            })))
            .mount(&server)
            .await;

        let client = AquaBillingClient::new(server.uri(), "test-key");
        let error = client.report_reading("MTR-1", -2).await.unwrap_err();

        match error {
            ClientError::InvalidReading { message } => assert!(message.contains("-2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn batch_decodes_mixed_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/usage/batch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "meter_id": "MTR-1", "success": true, "cumulative_usage": 12 },
                    { "meter_id": "MTR-2", "success": false, "error": "negative usage delta: -2" }
                ],
                "processed": 1,
                "failed": 1
            })))
            .mount(&server)
            .await;

        let client = AquaBillingClient::new(server.uri(), "test-key");
        let readings = vec![
            MeterReading {
                meter_id: "MTR-1".to_string(),
                amount: 12,
            },
            MeterReading {
                meter_id: "MTR-2".to_string(),
                amount: -2,
            },
        ];

        let response = client.report_usage_batch(readings).await.unwrap();
        assert_eq!(response.processed, 1);
        assert_eq!(response.failed, 1);
        assert!(response.results[0].success);
        assert_eq!(response.results[0].cumulative_usage, Some(12));
        assert!(!response.results[1].success);
        assert!(response.results[1].error.as_deref().unwrap().contains("-2"));
    }

    #[tokio::test]
    async fn unpaid_bills_decode_with_projected_fees() {
        let bill = Bill::new(
            aqua_billing_core::UserId::generate(),
            aqua_billing_core::MeterId::generate(),
            "2025-01".parse().unwrap(),
            0,
            40,
            ChargeBreakdown {
                water_charge: 95_000,
                service_fee: 5_000,
                total_due: 100_000,
            },
            Utc::now() - ChronoDuration::days(40),
        );

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/bills/me/unpaid"))
            .and(header("authorization", "Bearer user-jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bills": [{
                    "bill": serde_json::to_value(&bill).unwrap(),
                    "days_late": 40,
                    "late_fee": 4_000,
                    "total_with_fee": 104_000
                }],
                "count": 1,
                "total_due": 104_000
            })))
            .mount(&server)
            .await;

        let client = AquaBillingClient::new(server.uri(), "test-key");
        let response = client.get_unpaid_bills("user-jwt").await.unwrap();

        assert_eq!(response.count, 1);
        assert_eq!(response.total_due, 104_000);
        assert_eq!(response.bills[0].bill.id, bill.id);
        assert_eq!(response.bills[0].late_fee, 4_000);
        assert_eq!(response.bills[0].total_with_fee, 104_000);
    }

    #[tokio::test]
    async fn other_api_errors_pass_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/bills/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "code": "unauthorized", "message": "unauthorized" }
            })))
            .mount(&server)
            .await;

        let client = AquaBillingClient::new(server.uri(), "test-key");
        let error = client.get_my_bills("bad-jwt").await.unwrap_err();

        match error {
            ClientError::Api { code, status, .. } => {
                assert_eq!(code, "unauthorized");
                assert_eq!(status, 401);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_bodies_are_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/usage"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = AquaBillingClient::new(server.uri(), "test-key");
        let error = client.report_reading("MTR-1", 8).await.unwrap_err();

        match error {
            ClientError::Api { code, status, .. } => {
                assert_eq!(code, "unknown");
                assert_eq!(status, 500);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
