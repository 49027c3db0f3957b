//! Provisioning poller
//!
//! Resource creation on the Mythic Beasts APIs is asynchronous: the create
//! call answers `202 Accepted` with a `Location` to poll. The status endpoint
//! signals completion in several ways:
//!
//! | Status | Location | Meaning |
//! |--------|----------|---------|
//! | 303    | present  | done, resource lives at Location |
//! | 303    | absent   | error |
//! | 500    | any      | provisioning failed, body explains why |
//! | 202    | present  | done |
//! | 202    | absent   | still working |
//! | 200    | present  | done |
//! | 200    | absent   | inspect the JSON body with a [`CompletionCheck`] |
//!
//! Anything else is an error. The poller folds all of these into one awaited
//! call bounded by a timeout and the caller's cancellation token.

use crate::mythic_api::client::{read_response, Client};
use crate::mythic_api::json::decode_json;
use crate::mythic_api::types::ApiError;
use crate::mythic_api::url::resolve_url;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Decides from a status payload whether provisioning has finished
///
/// Returns `Some(location)` of the finished resource once it is ready, or
/// `None` to keep polling. Implemented for any matching closure:
///
/// ```
/// use mythic_sdk::CompletionCheck;
/// use serde_json::{Map, Value};
///
/// let check = |status: &Map<String, Value>, id: &str| {
///     (status.get("status") == Some(&Value::from("running")))
///         .then(|| format!("/vps/servers/{}", id))
/// };
/// let payload = serde_json::json!({"status": "running"});
/// assert_eq!(
///     check.check(payload.as_object().unwrap(), "web1").as_deref(),
///     Some("/vps/servers/web1")
/// );
/// ```
pub trait CompletionCheck: Send + Sync {
    fn check(&self, status: &Map<String, Value>, identifier: &str) -> Option<String>;
}

impl<F> CompletionCheck for F
where
    F: Fn(&Map<String, Value>, &str) -> Option<String> + Send + Sync,
{
    fn check(&self, status: &Map<String, Value>, identifier: &str) -> Option<String> {
        self(status, identifier)
    }
}

/// Completion check that waits for a string field to reach a value
///
/// Returned by [`status_is`].
pub struct StatusIs<L> {
    field: String,
    expected: String,
    location: L,
}

impl<L> CompletionCheck for StatusIs<L>
where
    L: Fn(&str) -> String + Send + Sync,
{
    fn check(&self, status: &Map<String, Value>, identifier: &str) -> Option<String> {
        let current = status.get(&self.field).and_then(Value::as_str);
        tracing::debug!(
            "[{}] provisioning {}={:?}",
            identifier,
            self.field,
            current
        );
        (current == Some(self.expected.as_str())).then(|| (self.location)(identifier))
    }
}

/// Done once `status[field] == expected`, at `location(identifier)`
///
/// ```
/// use mythic_sdk::{status_is, CompletionCheck};
///
/// let check = status_is("status", "live", |id| format!("/pi/servers/{}", id));
/// let payload = serde_json::json!({"status": "live"});
/// assert_eq!(
///     check.check(payload.as_object().unwrap(), "pi1").as_deref(),
///     Some("/pi/servers/pi1")
/// );
/// ```
pub fn status_is<L>(field: impl Into<String>, expected: impl Into<String>, location: L) -> StatusIs<L>
where
    L: Fn(&str) -> String + Send + Sync,
{
    StatusIs {
        field: field.into(),
        expected: expected.into(),
        location,
    }
}

impl Client {
    /// Poll `poll_location` until provisioning finishes, fails or times out
    ///
    /// Returns the location of the finished resource, which may be relative
    /// to `base_url`. Waits `poll_interval` (from the client configuration)
    /// between attempts. Cancellation is checked before every attempt and
    /// interrupts both the request and the wait.
    pub async fn poll_provisioning<C: CompletionCheck + ?Sized>(
        &self,
        base_url: &str,
        poll_location: &str,
        timeout: Duration,
        identifier: &str,
        check: &C,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let deadline = Instant::now() + timeout;
        let url = resolve_url(base_url, poll_location)?;
        let interval = self.config.poll_interval;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }
            if Instant::now() > deadline {
                tracing::warn!("[{}] timed out after {} polls", identifier, attempt);
                return Err(ApiError::PollTimedOut);
            }

            attempt += 1;
            tracing::debug!("[{}] poll #{} of {}", identifier, attempt, url);

            let request = self.http.get(url.clone()).build()?;
            let response = self.execute(request, cancel).await?;
            let response = read_response(response, cancel).await?;
            match (response.status, response.location()) {
                (StatusCode::SEE_OTHER, None) => return Err(ApiError::PollMissingLocation),
                (StatusCode::INTERNAL_SERVER_ERROR, _) => {
                    let body = response.text().into_owned();
                    tracing::error!("[{}] provisioning failed: {}", identifier, body);
                    return Err(ApiError::PollFailed { body });
                }
                (StatusCode::SEE_OTHER | StatusCode::ACCEPTED | StatusCode::OK, Some(location)) => {
                    tracing::info!("[{}] provisioned at {}", identifier, location);
                    return Ok(location);
                }
                (StatusCode::ACCEPTED, None) => {}
                (StatusCode::OK, None) => {
                    let status: Map<String, Value> = decode_json(&response)?;
                    if let Some(location) = check.check(&status, identifier) {
                        tracing::info!("[{}] provisioned at {}", identifier, location);
                        return Ok(location);
                    }
                }
                (other, _) => {
                    tracing::error!("[{}] unexpected status while polling: {}", identifier, other);
                    return Err(ApiError::UnexpectedPollStatus(other.as_u16()));
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
