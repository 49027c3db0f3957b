use crate::mythic_api::client::{read_response, ApiResponse, Client};
use crate::mythic_api::json::expect_status;
use crate::mythic_api::poll::CompletionCheck;
use crate::mythic_api::types::ApiError;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest error body kept by [`Service::delete`]
const MAX_ERROR_BODY: usize = 512;

/// Truncate a response body for an error message
pub fn truncate_body(body: &[u8]) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return String::from_utf8_lossy(body).into_owned();
    }
    format!("{}...", String::from_utf8_lossy(&body[..MAX_ERROR_BODY]))
}

/// A [`Client`] scoped to one API family's base URL
///
/// Endpoints passed to a service are resolved against its base URL, so
/// resource code only deals in paths such as `/vps/servers/web1`.
///
/// # Example
///
/// ```no_run
/// use mythic_sdk::{status_is, Client, ClientConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), mythic_sdk::ApiError> {
/// let client = Arc::new(Client::new(ClientConfig::from_env())?);
/// let vps = client.vps();
///
/// let server: serde_json::Value = vps
///     .provision(
///         "/vps/servers/web1",
///         "web1",
///         &serde_json::json!({"product": "VPSX16", "disk_size": 10240}),
///         Duration::from_secs(300),
///         &status_is("status", "running", |id| format!("/vps/servers/{}", id)),
///         &CancellationToken::new(),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Service {
    client: Arc<Client>,
    base_url: String,
}

impl Service {
    pub fn new(client: Arc<Client>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Authenticated GET relative to the base URL
    pub async fn get(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ApiError> {
        self.client.get(&self.base_url, endpoint, cancel).await
    }

    pub async fn get_json(
        &self,
        endpoint: &str,
        allowed: &[StatusCode],
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        self.client
            .get_json(&self.base_url, endpoint, allowed, cancel)
            .await
    }

    pub async fn get_json_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        allowed: &[StatusCode],
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        self.client
            .get_json_as(&self.base_url, endpoint, allowed, cancel)
            .await
    }

    pub async fn do_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        allowed: &[StatusCode],
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        self.client
            .do_json(method, &self.base_url, endpoint, body, allowed, cancel)
            .await
    }

    pub async fn do_json_as<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        allowed: &[StatusCode],
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        self.client
            .do_json_as(method, &self.base_url, endpoint, body, allowed, cancel)
            .await
    }

    /// Delete the resource at `endpoint`
    ///
    /// A 404 counts as success: the resource is gone either way.
    pub async fn delete(&self, endpoint: &str, cancel: &CancellationToken) -> Result<(), ApiError> {
        let request = self
            .client
            .request(Method::DELETE, &self.base_url, endpoint)?
            .build()?;
        let response = self.client.execute(request, cancel).await?;
        let response = read_response(response, cancel).await?;

        match response.status {
            StatusCode::OK | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::debug!("Delete of {} returned 404, treating as deleted", endpoint);
                Ok(())
            }
            status => Err(ApiError::UnexpectedStatus {
                status: status.as_u16(),
                body: truncate_body(&response.body),
            }),
        }
    }

    /// Poll a provisioning location relative to the base URL
    pub async fn poll_provisioning<C: CompletionCheck + ?Sized>(
        &self,
        poll_location: &str,
        timeout: Duration,
        identifier: &str,
        check: &C,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        self.client
            .poll_provisioning(&self.base_url, poll_location, timeout, identifier, check, cancel)
            .await
    }

    /// Create a resource and wait until it is ready
    ///
    /// POSTs `request` as JSON to `endpoint`, expects `202 Accepted` with a
    /// `Location` to poll, polls it with `check`, then fetches and decodes the
    /// finished resource.
    ///
    /// Fails with [`ApiError::EmptyIdentifier`] for a blank identifier and
    /// [`ApiError::IdentifierConflict`] when the server answers 409.
    pub async fn provision<B, T, C>(
        &self,
        endpoint: &str,
        identifier: &str,
        request: &B,
        timeout: Duration,
        check: &C,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
        C: CompletionCheck + ?Sized,
    {
        if identifier.trim().is_empty() {
            return Err(ApiError::EmptyIdentifier);
        }

        tracing::info!("Provisioning {} at {}", identifier, endpoint);

        let response = self
            .do_json(Method::POST, endpoint, Some(request), &[], cancel)
            .await?;

        if response.status == StatusCode::CONFLICT {
            tracing::warn!("Identifier {} already in use", identifier);
            return Err(ApiError::IdentifierConflict {
                identifier: identifier.to_string(),
            });
        }
        expect_status(&response, &[StatusCode::ACCEPTED])?;

        let poll_location = response.location().ok_or(ApiError::MissingLocation)?;

        let location = self
            .poll_provisioning(&poll_location, timeout, identifier, check, cancel)
            .await?;

        self.get_json_as(&location, &[StatusCode::OK], cancel).await
    }
}
