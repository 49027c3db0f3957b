use crate::mythic_api::types::{ApiError, AuthResponse, Credentials};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// How long before the sliding expiry a token is treated as stale
pub const REFRESH_MARGIN: Duration = Duration::from_secs(10);

/// Bearer token plus its expiry metadata, always read and written together
#[derive(Clone, Default)]
struct TokenState {
    token: String,
    /// Lifetime declared at sign-in; zero means expiry is not tracked
    expires_in: Duration,
    /// Last time the token was attached to a request
    last_used_at: Option<Instant>,
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("TokenState")
            .field("token", &token)
            .field("expires_in", &self.expires_in)
            .field("last_used_at", &self.last_used_at)
            .finish()
    }
}

impl TokenState {
    fn is_fresh(&self, has_credentials: bool) -> bool {
        if self.token.is_empty() {
            return false;
        }
        // Without credentials the token cannot be renewed, so it never expires
        !has_credentials || !token_expired(self.expires_in, self.last_used_at)
    }
}

/// Sliding TTL check
///
/// The auth service reports `expires_in` once at sign-in, but the session is
/// extended every time the token is used. A token is due for refresh only when
/// it has a positive lifetime, has been used at least once, and has been idle
/// for at least `expires_in - REFRESH_MARGIN` (floored at zero).
///
/// A token that was never used never expires under this rule. That mirrors the
/// server, which measures expiry from activity rather than issuance.
pub fn token_expired(expires_in: Duration, last_used_at: Option<Instant>) -> bool {
    let Some(last_used_at) = last_used_at else {
        return false;
    };
    if expires_in.is_zero() {
        return false;
    }
    let expiry = expires_in.saturating_sub(REFRESH_MARGIN);
    last_used_at.elapsed() >= expiry
}

/// Owner of the client's bearer token
///
/// One instance per client. All token state sits behind a single async
/// `RwLock`; the write lock is held across the sign-in call, so concurrent
/// callers that all find the token stale wait for one sign-in instead of
/// each starting their own.
#[derive(Debug)]
pub struct TokenManager {
    state: RwLock<TokenState>,
    credentials: Option<Credentials>,
}

impl TokenManager {
    /// Create a manager with no token
    ///
    /// Incomplete credentials are discarded and the manager runs
    /// unauthenticated.
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            state: RwLock::new(TokenState::default()),
            credentials: credentials.filter(Credentials::is_complete),
        }
    }

    /// Credentials used for sign-in, if any are configured
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Return a usable token, signing in first if needed
    ///
    /// Returns an empty string when no token is held and no credentials are
    /// configured; the caller then sends the request unauthenticated.
    pub async fn ensure_token<F, Fut>(&self, sign_in: F) -> Result<String, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AuthResponse, ApiError>>,
    {
        let has_credentials = self.has_credentials();

        {
            let state = self.state.read().await;
            if state.is_fresh(has_credentials) {
                return Ok(state.token.clone());
            }
            if !has_credentials {
                return Ok(String::new());
            }
        }

        let mut state = self.state.write().await;

        // Another caller may have refreshed while we waited for the lock
        if state.is_fresh(has_credentials) {
            tracing::debug!("Token refreshed by a concurrent caller, reusing it");
            return Ok(state.token.clone());
        }

        tracing::debug!("Token missing or stale, signing in");
        let response = sign_in().await?;

        state.token = response.access_token;
        state.expires_in = Duration::from_secs(response.expires_in.max(0) as u64);
        state.last_used_at = None;

        tracing::info!(
            "Signed in, token expires {}s after last use",
            state.expires_in.as_secs()
        );
        tracing::debug!("Token length: {}", state.token.len());

        Ok(state.token.clone())
    }

    /// Record that the token was attached to an outgoing request
    pub async fn mark_used(&self) {
        let mut state = self.state.write().await;
        state.last_used_at = Some(Instant::now());
    }

    /// Install a token obtained elsewhere
    ///
    /// The token counts as never used, so it will not be refreshed until it
    /// has been attached to at least one request.
    pub async fn set_token(&self, token: impl Into<String>, expires_in: Duration) {
        let mut state = self.state.write().await;
        state.token = token.into();
        state.expires_in = expires_in;
        state.last_used_at = None;
    }

    /// Current token, empty if none is held
    pub async fn token(&self) -> String {
        self.state.read().await.token.clone()
    }

    #[cfg(test)]
    async fn set_state(&self, token: &str, expires_in: Duration, last_used_at: Option<Instant>) {
        let mut state = self.state.write().await;
        state.token = token.to_string();
        state.expires_in = expires_in;
        state.last_used_at = last_used_at;
    }

    #[cfg(test)]
    async fn last_used_at(&self) -> Option<Instant> {
        self.state.read().await.last_used_at
    }
}
