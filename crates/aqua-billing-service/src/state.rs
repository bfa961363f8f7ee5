//! Application state.

use std::sync::Arc;
use std::time::Duration;

use aqua_billing_store::RocksStore;

use crate::config::ServiceConfig;
use crate::midtrans::{MidtransClient, PaymentGateway};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Payment gateway for Snap sessions (optional).
    pub gateway: Option<Arc<dyn PaymentGateway>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        // Create the Midtrans client if configured
        let gateway: Option<Arc<dyn PaymentGateway>> =
            config.midtrans_server_key.as_ref().and_then(|key| {
                match MidtransClient::new(
                    &config.midtrans_base_url,
                    key,
                    Duration::from_secs(config.gateway_timeout_seconds),
                ) {
                    Ok(client) => {
                        tracing::info!(
                            base_url = %config.midtrans_base_url,
                            "Midtrans integration enabled"
                        );
                        Some(Arc::new(client) as Arc<dyn PaymentGateway>)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create Midtrans client");
                        None
                    }
                }
            });

        if gateway.is_none() {
            tracing::warn!("Midtrans not configured - gateway payments will not be available");
        }

        Self {
            store,
            config,
            gateway,
        }
    }

    /// Create an application state with an explicit gateway (test seam).
    #[must_use]
    pub fn with_gateway(
        store: Arc<RocksStore>,
        config: ServiceConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            store,
            config,
            gateway: Some(gateway),
        }
    }

    /// Check if a payment gateway is configured.
    #[must_use]
    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }
}
