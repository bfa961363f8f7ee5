//! Service configuration.

use serde::Deserialize;
use std::path::Path;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/aqua-billing").
    pub data_dir: String,

    /// ZID JWT validation base URL (default: `<https://zid.zero.tech>`).
    pub auth_base_url: String,

    /// Expected JWT audience (default: "aqua-billing").
    pub auth_audience: String,

    /// Service API key for device/service-to-service auth.
    pub service_api_key: Option<String>,

    /// Admin API key for privileged endpoints.
    pub admin_api_key: Option<String>,

    /// Midtrans API base URL (default: the sandbox).
    pub midtrans_base_url: String,

    /// Midtrans merchant server key (optional; payments disabled without it).
    pub midtrans_server_key: Option<String>,

    /// Whether to verify webhook signatures when a server key is configured.
    pub verify_webhook_signature: bool,

    /// Frontend URL for payment redirect callbacks.
    pub frontend_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Outbound gateway call timeout in seconds.
    pub gateway_timeout_seconds: u64,

    /// Whether to run the in-process schedulers (generation, sweeps).
    pub enable_scheduler: bool,
}

/// Midtrans secrets file structure.
#[derive(Debug, Deserialize)]
struct MidtransSecrets {
    server_key: String,
    #[serde(default)]
    base_url: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        // Try to load Midtrans secrets from file first, then fall back to env vars
        let (midtrans_server_key, midtrans_base_url) = load_midtrans_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/aqua-billing".into()),
            auth_base_url: std::env::var("AUTH_BASE_URL")
                .unwrap_or_else(|_| "https://zid.zero.tech".into()),
            auth_audience: std::env::var("AUTH_AUDIENCE")
                .unwrap_or_else(|_| "aqua-billing".into()),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            midtrans_base_url,
            midtrans_server_key,
            verify_webhook_signature: std::env::var("VERIFY_WEBHOOK_SIGNATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            gateway_timeout_seconds: std::env::var("GATEWAY_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            enable_scheduler: std::env::var("ENABLE_SCHEDULER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        }
    }
}

/// Load Midtrans secrets from file or environment.
fn load_midtrans_secrets() -> (Option<String>, String) {
    // Try multiple paths for the secrets file
    let secret_paths = [
        ".secrets/midtrans.json",
        "aqua-billing/.secrets/midtrans.json",
        "crates/aqua-billing-service/.secrets/midtrans.json",
        "../.secrets/midtrans.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<MidtransSecrets>(path) {
            tracing::info!(path = %path, "Loaded Midtrans secrets from file");
            return (
                Some(secrets.server_key),
                secrets.base_url.unwrap_or_else(default_midtrans_base_url),
            );
        }
    }

    // Fall back to environment variables
    tracing::debug!("Midtrans secrets file not found, using environment variables");
    (
        std::env::var("MIDTRANS_SERVER_KEY").ok(),
        std::env::var("MIDTRANS_BASE_URL").unwrap_or_else(|_| default_midtrans_base_url()),
    )
}

fn default_midtrans_base_url() -> String {
    crate::midtrans::SANDBOX_BASE_URL.to_string()
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/aqua-billing".into(),
            auth_base_url: "https://zid.zero.tech".into(),
            auth_audience: "aqua-billing".into(),
            service_api_key: None,
            admin_api_key: None,
            midtrans_base_url: default_midtrans_base_url(),
            midtrans_server_key: None,
            verify_webhook_signature: true,
            frontend_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            gateway_timeout_seconds: 30,
            enable_scheduler: true,
        }
    }
}
