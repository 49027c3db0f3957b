//! Mythic SDK
//!
//! A Rust client core for the Mythic Beasts provisioning APIs.
//!
//! This SDK provides:
//! - Bearer-token management with a sliding expiry and single-flight sign-in
//! - An authenticated request executor on a shared `reqwest` connection pool
//! - JSON helpers with expected-status validation
//! - A provisioning poller that waits for asynchronous resource creation
//! - Per-family service handles (VPS, Raspberry Pi, proxy)
//!
//! # Token expiry policy
//!
//! The auth service extends a session every time its token is used, so the
//! client measures expiry from the last use rather than from sign-in. A token
//! that has been issued but never attached to a request is never considered
//! expired. Holding a token without using it therefore never triggers a
//! refresh; the first request after a long idle period may be rejected by the
//! server instead.
//!
//! # Example
//!
//! ```no_run
//! use mythic_sdk::{status_is, Client, ClientConfig};
//! use reqwest::StatusCode;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(Client::new(
//!     ClientConfig::new().with_credentials("YOUR_API_KEYID", "YOUR_API_SECRET"),
//! )?);
//! let cancel = CancellationToken::new();
//!
//! // Plain JSON read; signs in on first use
//! let zones: serde_json::Value = client
//!     .vps()
//!     .get_json_as("/vps/zones", &[StatusCode::OK], &cancel)
//!     .await?;
//!
//! // Create a server and wait for it to come up
//! let server: serde_json::Value = client
//!     .vps()
//!     .provision(
//!         "/vps/servers/web1",
//!         "web1",
//!         &serde_json::json!({"product": "VPSX16", "disk_size": 10240}),
//!         Duration::from_secs(300),
//!         &status_is("status", "running", |id| format!("/vps/servers/{}", id)),
//!         &cancel,
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod mythic_api;

// Re-export commonly used types and functions
pub use config::{
    ClientConfig, DEFAULT_AUTH_URL, DEFAULT_USER_AGENT, PI_BASE_URL, PROXY_BASE_URL, VPS_BASE_URL,
};
pub use mythic_api::{
    auth::basic_auth,
    client::{read_response, ApiResponse, Client},
    json::{decode_json, expect_status},
    poll::{status_is, CompletionCheck, StatusIs},
    service::{truncate_body, Service},
    token::{token_expired, TokenManager, REFRESH_MARGIN},
    types::{ApiError, AuthResponse, Credentials},
    url::resolve_url,
};
