//! Common test utilities for aqua-billing integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use aqua_billing_core::{CustomerProfile, Meter, TariffTier, UserId};
use aqua_billing_service::crypto::midtrans_signature;
use aqua_billing_service::midtrans::{MidtransError, PaymentGateway, SnapRequest, SnapSession};
use aqua_billing_service::{create_router, AppState, ServiceConfig};
use aqua_billing_store::{RocksStore, Store};

/// Server key used to sign webhook callbacks in tests.
pub const TEST_SERVER_KEY: &str = "test-server-key";

/// Snap token the stub gateway hands out.
pub const STUB_SNAP_TOKEN: &str = "stub-snap-token";

/// A recording payment gateway that always succeeds.
pub struct StubGateway {
    /// Every Snap request the service sent, in order.
    pub requests: Mutex<Vec<SnapRequest>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of sessions the service opened.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The most recent Snap request, if any.
    pub fn last_request(&self) -> Option<SnapRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_transaction(
        &self,
        request: SnapRequest,
    ) -> Result<SnapSession, MidtransError> {
        self.requests.lock().unwrap().push(request);
        Ok(SnapSession {
            token: STUB_SNAP_TOKEN.into(),
            redirect_url: format!(
                "https://app.sandbox.midtrans.com/snap/v2/vtweb/{STUB_SNAP_TOKEN}"
            ),
        })
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct store handle for seeding tariffs, meters, and profiles.
    pub store: Arc<RocksStore>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// The service API key for meter-collector requests.
    pub service_api_key: String,
    /// The admin API key for back-office requests.
    pub admin_api_key: String,
    /// The recording gateway stub (unused when built without a gateway).
    pub gateway: Arc<StubGateway>,
}

impl TestHarness {
    /// Create a new test harness with a fresh database and a stub gateway.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Create a harness without a payment gateway or server key, for testing
    /// the unconfigured paths.
    pub fn without_gateway() -> Self {
        Self::build(false)
    }

    fn build(with_gateway: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let service_api_key = "test-service-key".to_string();
        let admin_api_key = "test-admin-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            auth_base_url: "http://localhost".into(),
            auth_audience: "aqua-billing".into(),
            service_api_key: Some(service_api_key.clone()),
            admin_api_key: Some(admin_api_key.clone()),
            midtrans_base_url: "https://app.sandbox.midtrans.com".into(),
            midtrans_server_key: with_gateway.then(|| TEST_SERVER_KEY.to_string()),
            verify_webhook_signature: true,
            frontend_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            gateway_timeout_seconds: 30,
            enable_scheduler: false,
        };

        let gateway = Arc::new(StubGateway::new());
        let state = if with_gateway {
            let dyn_gateway: Arc<dyn PaymentGateway> = Arc::clone(&gateway);
            AppState::with_gateway(Arc::clone(&store), config, dyn_gateway)
        } else {
            AppState::new(Arc::clone(&store), config)
        };
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            store,
            _temp_dir: temp_dir,
            test_user_id,
            service_api_key,
            admin_api_key,
            gateway,
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_user_id)
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> String {
        let other_user = UserId::generate();
        format!("Bearer test-token:{other_user}")
    }

    /// Sign a webhook callback the way the gateway does.
    pub fn webhook_signature(&self, order_id: &str, status_code: &str, gross: &str) -> String {
        midtrans_signature(order_id, status_code, gross, TEST_SERVER_KEY)
    }

    /// Seed a tariff tier.
    pub fn seed_tariff(&self, rate_below: i64, rate_above: i64, service_fee: i64) -> TariffTier {
        let tier = TariffTier::new("Residential", rate_below, rate_above, service_fee);
        self.store.put_tariff(&tier).expect("Failed to seed tariff");
        tier
    }

    /// Seed a meter owned by `user_id` on the given tariff.
    pub fn seed_meter(&self, user_id: UserId, tariff: &TariffTier) -> Meter {
        let meter = Meter::new(user_id, tariff.id, format!("SN-{user_id}"));
        self.store.put_meter(&meter).expect("Failed to seed meter");
        meter
    }

    /// Seed a customer profile so gateway sessions carry payer details.
    pub fn seed_customer(&self, user_id: UserId, name: &str) -> CustomerProfile {
        let profile = CustomerProfile::new(user_id, name)
            .with_email("customer@example.com")
            .with_phone("+628123456789");
        self.store
            .put_customer(&profile)
            .expect("Failed to seed customer");
        profile
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
