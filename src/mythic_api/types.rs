use serde::{Deserialize, Serialize};
use std::fmt;

/// Mythic Beasts API error type
///
/// Every failure surfaced by the transport core. Nothing here is retried
/// automatically; each variant is returned to the immediate caller.
#[derive(Debug)]
pub enum ApiError {
    /// The base URL does not parse or lacks a scheme or host
    InvalidBaseUrl(String),
    /// The endpoint string could not be parsed as a URL
    InvalidEndpoint { endpoint: String, reason: String },
    /// Sign-in attempted without a key id and secret
    MissingCredentials,
    /// The auth service answered with a non-200 status
    AuthFailed { status: u16, body: String },
    /// The response status is outside the caller's accepted set
    UnexpectedStatus { status: u16, body: String },
    /// Provisioning did not finish before the caller's timeout
    PollTimedOut,
    /// The provisioning status endpoint returned 500
    PollFailed { body: String },
    /// A 303 poll response carried no Location header
    PollMissingLocation,
    /// A poll response status the protocol does not define
    UnexpectedPollStatus(u16),
    /// The caller's cancellation token fired
    Cancelled,
    /// Network or protocol failure from the HTTP layer
    Transport(reqwest::Error),
    /// Request body could not be serialized
    Encode(serde_json::Error),
    /// Response body could not be deserialized
    Decode(serde_json::Error),
    /// A resource identifier was blank
    EmptyIdentifier,
    /// The requested identifier is already in use (HTTP 409 on create)
    IdentifierConflict { identifier: String },
    /// A create call was accepted but named no location to poll
    MissingLocation,
    /// Client construction failed
    Config(String),
}

impl ApiError {
    /// True if the caller's cancellation token ended the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// True if provisioning ran past its deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::PollTimedOut)
    }

    /// HTTP status attached to the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthFailed { status, .. } | ApiError::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            ApiError::UnexpectedPollStatus(status) => Some(*status),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidBaseUrl(url) => write!(f, "invalid base url: {:?}", url),
            ApiError::InvalidEndpoint { endpoint, reason } => {
                write!(f, "invalid endpoint {:?}: {}", endpoint, reason)
            }
            ApiError::MissingCredentials => write!(f, "define keyid and secret"),
            ApiError::AuthFailed { status, body } => {
                write!(f, "auth failed: status {}: {}", status, body)
            }
            ApiError::UnexpectedStatus { status, body } => {
                write!(f, "unexpected status {}: {}", status, body)
            }
            ApiError::PollTimedOut => write!(f, "timed out while provisioning"),
            ApiError::PollFailed { body } => write!(f, "provisioning failed: {}", body),
            ApiError::PollMissingLocation => write!(f, "polling returned no location"),
            ApiError::UnexpectedPollStatus(status) => {
                write!(f, "unexpected status while polling: {}", status)
            }
            ApiError::Cancelled => write!(f, "operation cancelled"),
            ApiError::Transport(err) => write!(f, "{}", err),
            ApiError::Encode(err) => write!(f, "failed to encode request body: {}", err),
            ApiError::Decode(err) => write!(f, "failed to decode response body: {}", err),
            ApiError::EmptyIdentifier => write!(f, "identifier is required"),
            ApiError::IdentifierConflict { identifier } => {
                write!(f, "identifier {:?} already in use", identifier)
            }
            ApiError::MissingLocation => write!(f, "missing header location for polling"),
            ApiError::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Transport(err) => Some(err),
            ApiError::Encode(err) | ApiError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err)
    }
}

/// API key credentials used to obtain a bearer token
///
/// Both fields must be non-blank for the client to authenticate.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "keyid")]
    pub key_id: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }

    /// Both the key id and the secret are present
    pub fn is_complete(&self) -> bool {
        !self.key_id.trim().is_empty() && !self.secret.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Response from the auth service `/login` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    /// Token lifetime in seconds, measured from last use
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
}
