//! Midtrans Snap API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::types::{MidtransErrorResponse, SnapRequest, SnapSession};

/// Midtrans sandbox base URL.
pub const SANDBOX_BASE_URL: &str = "https://app.sandbox.midtrans.com";

/// Error type for Midtrans operations.
#[derive(Debug, thiserror::Error)]
pub enum MidtransError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Midtrans API returned an error.
    #[error("Midtrans API error ({status}): {message}")]
    Api {
        /// HTTP status returned by the gateway.
        status: u16,
        /// Joined `error_messages` from the response body.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// The outbound payment gateway seam.
///
/// Session creation performs no local mutation, so implementations are safe
/// to retry on timeout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session for the given transaction.
    async fn create_transaction(&self, request: SnapRequest) -> Result<SnapSession, MidtransError>;
}

/// Midtrans Snap API client.
#[derive(Debug, Clone)]
pub struct MidtransClient {
    client: Client,
    base_url: String,
    server_key: String,
}

impl MidtransClient {
    /// Create a new Midtrans client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API base URL (sandbox or production)
    /// * `server_key` - Merchant server key (`SB-Mid-server-...` in sandbox)
    /// * `timeout` - Outbound request timeout
    ///
    /// # Errors
    ///
    /// Returns `MidtransError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(
        base_url: impl Into<String>,
        server_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MidtransError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MidtransError::Configuration(format!("HTTP client: {e}")))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            client,
            base_url,
            server_key: server_key.into(),
        })
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, MidtransError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse the gateway's error body
        let error_body: Result<MidtransErrorResponse, _> = response.json().await;

        let message = match error_body {
            Ok(body) if !body.error_messages.is_empty() => body.error_messages.join("; "),
            _ => format!("HTTP {status}"),
        };

        Err(MidtransError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    async fn create_transaction(
        &self,
        request: SnapRequest,
    ) -> Result<SnapSession, MidtransError> {
        tracing::debug!(
            order_id = %request.transaction_details.order_id,
            gross_amount = %request.transaction_details.gross_amount,
            "Creating Midtrans Snap transaction"
        );

        let response = self
            .client
            .post(format!("{}/snap/v1/transactions", self.base_url))
            .basic_auth(&self.server_key, Option::<&str>::None)
            .json(&request)
            .send()
            .await?;

        Self::handle_response(response).await
    }
}
