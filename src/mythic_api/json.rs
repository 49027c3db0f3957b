use crate::mythic_api::client::{read_response, ApiResponse, Client};
use crate::mythic_api::types::ApiError;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Fail with [`ApiError::UnexpectedStatus`] unless the status is allowed
///
/// An empty `allowed` list accepts any status.
pub fn expect_status(response: &ApiResponse, allowed: &[StatusCode]) -> Result<(), ApiError> {
    if allowed.is_empty() || allowed.contains(&response.status) {
        return Ok(());
    }

    let body = response.text().into_owned();
    tracing::warn!(
        "Unexpected status: HTTP {} - {}",
        response.status.as_u16(),
        body
    );
    Err(ApiError::UnexpectedStatus {
        status: response.status.as_u16(),
        body,
    })
}

/// Decode a JSON response body
pub fn decode_json<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, ApiError> {
    serde_json::from_slice(&response.body).map_err(|e| {
        tracing::error!("Failed to parse response: {} - Body: {}", e, response.text());
        ApiError::Decode(e)
    })
}

impl Client {
    /// GET `endpoint` and read the whole response
    ///
    /// When `allowed` is non-empty the status must be one of its entries.
    pub async fn get_json(
        &self,
        base_url: &str,
        endpoint: &str,
        allowed: &[StatusCode],
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        let response = self.get(base_url, endpoint, cancel).await?;
        let response = read_response(response, cancel).await?;
        expect_status(&response, allowed)?;
        Ok(response)
    }

    /// GET `endpoint` and decode the JSON body as `T`
    pub async fn get_json_as<T: DeserializeOwned>(
        &self,
        base_url: &str,
        endpoint: &str,
        allowed: &[StatusCode],
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let response = self.get_json(base_url, endpoint, allowed, cancel).await?;
        decode_json(&response)
    }

    /// Send an optional JSON body and read the whole response
    ///
    /// The body is serialized before anything is sent, so an encoding failure
    /// never reaches the network. Pass `None::<&()>` for requests without a
    /// body.
    pub async fn do_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        base_url: &str,
        endpoint: &str,
        body: Option<&B>,
        allowed: &[StatusCode],
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| {
                tracing::error!("Failed to encode request body: {}", e);
                ApiError::Encode(e)
            })?;

        let mut builder = self.request(method, base_url, endpoint)?;
        if let Some(payload) = payload {
            builder = builder.header(CONTENT_TYPE, "application/json").body(payload);
        }

        let response = self.execute(builder.build()?, cancel).await?;
        let response = read_response(response, cancel).await?;
        expect_status(&response, allowed)?;
        Ok(response)
    }

    /// Send an optional JSON body and decode the JSON response as `T`
    pub async fn do_json_as<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        base_url: &str,
        endpoint: &str,
        body: Option<&B>,
        allowed: &[StatusCode],
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let response = self
            .do_json(method, base_url, endpoint, body, allowed, cancel)
            .await?;
        decode_json(&response)
    }
}
