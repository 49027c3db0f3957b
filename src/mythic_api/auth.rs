use crate::mythic_api::client::{read_response, Client};
use crate::mythic_api::types::{ApiError, AuthResponse};
use crate::mythic_api::url::resolve_url;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

/// Form body for the client-credentials grant
const GRANT_BODY: &str = "grant_type=client_credentials";

/// Encode a username/password pair for a `Basic` authorization header
pub fn basic_auth(username: &str, password: &str) -> String {
    STANDARD.encode(format!("{}:{}", username, password))
}

impl Client {
    /// Exchange the configured API key for a bearer token
    ///
    /// Posts the key id and secret as HTTP Basic credentials to
    /// `{auth_url}/login`. The returned token is not installed on the client;
    /// [`Client::ensure_token`] does that.
    ///
    /// Fails with [`ApiError::MissingCredentials`] without touching the
    /// network when no complete key is configured.
    pub async fn sign_in(&self, cancel: &CancellationToken) -> Result<AuthResponse, ApiError> {
        let credentials = self.tokens.credentials().ok_or(ApiError::MissingCredentials)?;

        let url = resolve_url(&self.config.auth_url, "/login")?;
        tracing::debug!("Signing in at: {}", url);

        let request = self
            .http
            .post(url)
            .header(
                AUTHORIZATION,
                format!("Basic {}", basic_auth(&credentials.key_id, &credentials.secret)),
            )
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(GRANT_BODY)
            .build()?;

        let response = self.dispatch(request, cancel).await?;
        let response = read_response(response, cancel).await?;

        if response.status != StatusCode::OK {
            let body = response.text().into_owned();
            tracing::error!(
                "Sign-in failed: HTTP {} - {}",
                response.status.as_u16(),
                body
            );
            return Err(ApiError::AuthFailed {
                status: response.status.as_u16(),
                body,
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            tracing::error!("Failed to parse sign-in response: {}", e);
            ApiError::Decode(e)
        })
    }
}
