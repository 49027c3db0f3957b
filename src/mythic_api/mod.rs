//! Mythic Beasts API transport module
//!
//! Shared plumbing used by every resource family (VPS, Raspberry Pi, proxy):
//! URL resolution, the bearer-token lifecycle, authenticated request
//! execution, JSON helpers and the provisioning poller.
//!
//! ## Request Flow
//!
//! 1. A resource operation calls [`Client::execute`] (directly or through a JSON helper)
//! 2. The executor asks the [`TokenManager`] for a token
//! 3. If the token is missing or stale, the manager signs in once on behalf of all waiting callers
//! 4. The request goes out with `Authorization: Bearer <token>`; redirects are not followed
//! 5. A `202 Accepted` create response hands its `Location` to [`Client::poll_provisioning`]

pub mod auth;
pub mod client;
pub mod json;
pub mod poll;
pub mod service;
pub mod token;
pub mod types;
pub mod url;

pub use client::{ApiResponse, Client};
pub use poll::{status_is, CompletionCheck, StatusIs};
pub use service::Service;
pub use token::TokenManager;
pub use types::{ApiError, AuthResponse, Credentials};
pub use url::resolve_url;
