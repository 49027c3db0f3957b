//! Client configuration
//!
//! Defaults target the public Mythic Beasts endpoints. Every field can be
//! overridden with the `with_*` builders, or read from the environment with
//! [`ClientConfig::from_env`].

use crate::mythic_api::types::Credentials;
use std::time::Duration;

/// Auth service used to exchange API keys for bearer tokens
pub const DEFAULT_AUTH_URL: &str = "https://auth.mythic-beasts.com";

/// Base URL for the VPS API
pub const VPS_BASE_URL: &str = "https://api.mythic-beasts.com/beta";

/// Base URL for the Raspberry Pi API
pub const PI_BASE_URL: &str = "https://api.mythic-beasts.com/beta";

/// Base URL for the IPv4-to-IPv6 proxy API
pub const PROXY_BASE_URL: &str = "https://api.mythic-beasts.com/proxy";

/// User-Agent sent when the caller does not set one
pub const DEFAULT_USER_AGENT: &str = concat!("mythic-sdk-rs/", env!("CARGO_PKG_VERSION"));

/// Wait between provisioning polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Timeout applied to each HTTP round trip
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_KEY_ID: &str = "MYTHIC_API_KEY_ID";
const ENV_SECRET: &str = "MYTHIC_API_SECRET";
const ENV_AUTH_URL: &str = "MYTHIC_AUTH_URL";
const ENV_USER_AGENT: &str = "MYTHIC_USER_AGENT";

/// Settings for a [`Client`](crate::Client)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key used to sign in. `None` runs the client unauthenticated.
    pub credentials: Option<Credentials>,
    /// Auth service base URL; the client posts to `{auth_url}/login`
    pub auth_url: String,
    /// User-Agent header value; empty disables the default header
    pub user_agent: String,
    /// Wait between provisioning polls
    pub poll_interval: Duration,
    /// Timeout for a single HTTP round trip
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from environment variables
    ///
    /// Reads `MYTHIC_API_KEY_ID` and `MYTHIC_API_SECRET` for credentials, and
    /// `MYTHIC_AUTH_URL` / `MYTHIC_USER_AGENT` as optional overrides. Unset
    /// variables fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        match (std::env::var(ENV_KEY_ID), std::env::var(ENV_SECRET)) {
            (Ok(key_id), Ok(secret)) => {
                config.credentials = Some(Credentials::new(key_id, secret));
            }
            _ => {
                tracing::debug!(
                    "{} or {} not set, client will be unauthenticated",
                    ENV_KEY_ID,
                    ENV_SECRET
                );
            }
        }

        if let Ok(auth_url) = std::env::var(ENV_AUTH_URL) {
            tracing::debug!("Using auth URL from {}: {}", ENV_AUTH_URL, auth_url);
            config.auth_url = auth_url;
        }
        if let Ok(user_agent) = std::env::var(ENV_USER_AGENT) {
            config.user_agent = user_agent;
        }

        config
    }

    /// Set API credentials (builder pattern)
    pub fn with_credentials(mut self, key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(key_id, secret));
        self
    }

    /// Set the auth service URL (builder pattern)
    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self
    }

    /// Set the User-Agent header (builder pattern)
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the provisioning poll interval (builder pattern)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-request HTTP timeout (builder pattern)
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}
