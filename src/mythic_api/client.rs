use crate::config::{ClientConfig, PI_BASE_URL, PROXY_BASE_URL, VPS_BASE_URL};
use crate::mythic_api::service::Service;
use crate::mythic_api::token::TokenManager;
use crate::mythic_api::types::ApiError;
use crate::mythic_api::url::resolve_url;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, LOCATION, USER_AGENT};
use reqwest::{Method, RequestBuilder, StatusCode};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// HTTP client for the Mythic Beasts APIs
///
/// Owns the shared connection pool and the bearer token. Every request sent
/// through [`Client::execute`] gets a valid token attached, signing in first
/// when the token is missing or stale. Redirects are never followed, so
/// `303 See Other` responses reach the caller intact.
///
/// The client is safe to share between tasks; wrap it in an `Arc` to hand out
/// per-family [`Service`] handles.
#[derive(Debug)]
pub struct Client {
    pub(crate) http: reqwest::Client,
    pub(crate) config: ClientConfig,
    pub(crate) tokens: TokenManager,
}

/// A fully read HTTP response
///
/// The body has already been drained from the connection, so the status,
/// headers and bytes can be inspected any number of times.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Body as text, with invalid UTF-8 replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Non-empty `Location` header, if present
    pub fn location(&self) -> Option<String> {
        self.headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

impl Client {
    /// Create a client from configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mythic_sdk::{Client, ClientConfig};
    ///
    /// let client = Client::new(ClientConfig::new().with_credentials("KEY_ID", "SECRET"))?;
    /// # Ok::<(), mythic_sdk::ApiError>(())
    /// ```
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_http_client(config, http))
    }

    /// Create a client around an existing `reqwest::Client`
    ///
    /// The provisioning poller relies on seeing 3xx responses, so the given
    /// client must be built with `redirect::Policy::none()`.
    pub fn with_http_client(mut config: ClientConfig, http: reqwest::Client) -> Self {
        let credentials = config.credentials.take();
        let tokens = TokenManager::new(credentials);

        tracing::debug!(
            "Creating Client with auth URL: {} (authenticated: {})",
            config.auth_url,
            tokens.has_credentials()
        );

        Self {
            http,
            config,
            tokens,
        }
    }

    /// Create a client without credentials
    pub fn unauthenticated() -> Result<Self, ApiError> {
        Self::new(ClientConfig::default())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Install a bearer token obtained outside this client
    pub async fn set_token(&self, token: impl Into<String>, expires_in: Duration) {
        self.tokens.set_token(token, expires_in).await;
    }

    /// Return a usable bearer token, signing in if required
    ///
    /// Concurrent callers that all need a fresh token share a single sign-in.
    /// An empty string means the client has no credentials and no token.
    pub async fn ensure_token(&self, cancel: &CancellationToken) -> Result<String, ApiError> {
        self.tokens.ensure_token(|| self.sign_in(cancel)).await
    }

    /// Start a request for `endpoint`, resolved against `base_url`
    ///
    /// Absolute endpoints are used as-is.
    pub fn request(
        &self,
        method: Method,
        base_url: &str,
        endpoint: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let url = resolve_url(base_url, endpoint)?;
        Ok(self.http.request(method, url))
    }

    /// Send a request with the client's bearer token and User-Agent
    ///
    /// A request that already carries an `Authorization` header is sent
    /// untouched. Otherwise the current token is attached (signing in first
    /// if it is stale) and its last-use time is updated.
    pub async fn execute(
        &self,
        mut request: reqwest::Request,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ApiError> {
        if !request.headers().contains_key(AUTHORIZATION) {
            let token = self.ensure_token(cancel).await?;
            if !token.is_empty() {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                    ApiError::Config("Bearer token contains invalid header characters".to_string())
                })?;
                value.set_sensitive(true);
                request.headers_mut().insert(AUTHORIZATION, value);
                self.tokens.mark_used().await;
            }
        }

        self.dispatch(request, cancel).await
    }

    /// Send a request as-is apart from the default User-Agent
    pub(crate) async fn dispatch(
        &self,
        mut request: reqwest::Request,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ApiError> {
        if !self.config.user_agent.is_empty() && !request.headers().contains_key(USER_AGENT) {
            if let Ok(value) = HeaderValue::from_str(&self.config.user_agent) {
                request.headers_mut().insert(USER_AGENT, value);
            }
        }

        tracing::debug!("Sending {} {}", request.method(), request.url());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = self.http.execute(request) => {
                let response = result.map_err(|e| {
                    tracing::error!("Request failed: {}", e);
                    ApiError::from(e)
                })?;
                tracing::debug!("Received response with status: {}", response.status());
                Ok(response)
            }
        }
    }

    /// Issue an authenticated GET for `endpoint`, resolved against `base_url`
    pub async fn get(
        &self,
        base_url: &str,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ApiError> {
        let request = self.request(Method::GET, base_url, endpoint)?.build()?;
        self.execute(request, cancel).await
    }

    /// Handle for the VPS API
    pub fn vps(self: &Arc<Self>) -> Service {
        Service::new(Arc::clone(self), VPS_BASE_URL)
    }

    /// Handle for the Raspberry Pi API
    pub fn pi(self: &Arc<Self>) -> Service {
        Service::new(Arc::clone(self), PI_BASE_URL)
    }

    /// Handle for the IPv6 proxy API
    pub fn proxy(self: &Arc<Self>) -> Service {
        Service::new(Arc::clone(self), PROXY_BASE_URL)
    }
}

/// Drain a response body into an [`ApiResponse`]
///
/// Consumes the response, so the connection is released exactly once.
pub async fn read_response(
    response: reqwest::Response,
    cancel: &CancellationToken,
) -> Result<ApiResponse, ApiError> {
    let status = response.status();
    let headers = response.headers().clone();

    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ApiError::Cancelled),
        bytes = response.bytes() => bytes.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            ApiError::from(e)
        })?,
    };

    Ok(ApiResponse {
        status,
        headers,
        body: body.to_vec(),
    })
}
