//! Request gates applied as axum middleware.

pub mod credential;
pub mod request_token;

pub use credential::{
    authenticate, require_credentials, AuthMethod, Authenticated, CookieOutcome, Identity,
};
pub use request_token::{require_request_token, EXEMPT_PATHS, REQUEST_TOKEN_HEADER};
