//! Error taxonomy shared by the gates and handlers.

use axum::{
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use super::session::{cookies, validator::InvalidReason};

/// Fatal configuration problems. Every request that needs keys answers 500.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} secret is not configured")]
    Missing { name: &'static str },
    #[error("{name} secret is too weak (needs at least {min} varied characters)")]
    Weak { name: &'static str, min: usize },
}

/// User store failures. Never downgraded into an authentication decision.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user store query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

/// Client-visible authentication failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthFailure {
    ServerRestart,
    InvalidTimestamp,
    Expired,
    FingerprintMismatch,
    InvalidSession,
    UserNotFound,
    PasswordChanged,
    MissingCredential,
    InvalidBearer,
    InvalidCredentials,
    InvalidRequestToken,
}

impl AuthFailure {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::ServerRestart => "SERVER_RESTART",
            Self::InvalidTimestamp => "INVALID_TIMESTAMP",
            Self::Expired => "EXPIRED",
            Self::FingerprintMismatch => "FINGERPRINT_MISMATCH",
            Self::InvalidSession => "INVALID_SESSION",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::PasswordChanged => "PASSWORD_CHANGED",
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::InvalidBearer => "INVALID_BEARER",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidRequestToken => "INVALID_REQUEST_TOKEN",
        }
    }

    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::InvalidBearer | Self::InvalidRequestToken => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::ServerRestart => "Session ended because the server restarted, please sign in again",
            Self::InvalidTimestamp | Self::InvalidSession => "Session is invalid, please sign in again",
            Self::Expired => "Session expired, please sign in again",
            Self::FingerprintMismatch => "Session was issued to a different browser, please sign in again",
            Self::UserNotFound => "Account no longer exists",
            Self::PasswordChanged => "Password was changed, please sign in again",
            Self::MissingCredential => "Authentication required",
            Self::InvalidBearer => "Invalid authentication token",
            Self::InvalidCredentials => "Invalid username or password",
            Self::InvalidRequestToken => "Invalid or expired request token",
        }
    }
}

impl From<InvalidReason> for AuthFailure {
    fn from(reason: InvalidReason) -> Self {
        match reason {
            InvalidReason::ServerRestart => Self::ServerRestart,
            InvalidReason::InvalidTimestamp => Self::InvalidTimestamp,
            InvalidReason::Expired => Self::Expired,
            InvalidReason::FingerprintMismatch => Self::FingerprintMismatch,
        }
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

/// Everything a gate or handler can fail with.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Rejected on the cookie path; the session cookie is cleared.
    #[error("session rejected: {}", .failure.code())]
    Session { failure: AuthFailure, secure: bool },
    #[error("authentication failed: {}", .0.code())]
    Auth(AuthFailure),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    #[must_use]
    pub fn failure(&self) -> Option<AuthFailure> {
        match self {
            Self::Session { failure, .. } | Self::Auth(failure) => Some(*failure),
            _ => None,
        }
    }
}

fn body(message: &str, code: &str) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: message.to_string(),
        code: code.to_string(),
    })
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        match self {
            Self::Config(err) => {
                error!("Configuration error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    body("Server authentication is misconfigured", "CONFIGURATION_ERROR"),
                )
                    .into_response()
            }
            Self::Store(err) => {
                error!("User store error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    body("Internal server error", "STORE_ERROR"),
                )
                    .into_response()
            }
            Self::Internal(err) => {
                error!("Internal error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    body("Internal server error", "INTERNAL_ERROR"),
                )
                    .into_response()
            }
            Self::Session { failure, secure } => {
                let mut headers = HeaderMap::new();
                if let Ok(cookie) = cookies::clear_cookie(cookies::SESSION_COOKIE_NAME, secure) {
                    headers.insert(SET_COOKIE, cookie);
                }
                (
                    failure.status(),
                    headers,
                    body(failure.message(), failure.code()),
                )
                    .into_response()
            }
            Self::Auth(failure) => {
                (failure.status(), body(failure.message(), failure.code())).into_response()
            }
        }
    }
}
