//! Token Gate: one-time request tokens on mutating calls.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::custodia::{
    error::{AuthFailure, GateError},
    one_time::TOKEN_LOG_PREFIX,
    state::AppState,
};

pub const REQUEST_TOKEN_HEADER: &str = "x-request-token";

/// Paths, relative to the API mount, that never need a request token.
pub const EXEMPT_PATHS: &[&str] = &[
    "/auth/token",
    "/auth/login",
    "/auth/verify-cookie",
    "/auth/security-question",
    "/auth/reset-password",
];

const API_PREFIX: &str = "/api";

#[derive(Debug, PartialEq, Eq)]
pub enum RequestTokenError {
    Missing,
    Invalid,
}

#[must_use]
pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

#[must_use]
pub fn is_exempt(path: &str) -> bool {
    let path = path.strip_prefix(API_PREFIX).unwrap_or(path);
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    EXEMPT_PATHS.contains(&path)
}

/// Consume the request token carried in `headers`.
///
/// # Errors
/// [`RequestTokenError::Missing`] without a header value,
/// [`RequestTokenError::Invalid`] when the store refuses it.
pub fn check_request_token(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(), RequestTokenError> {
    let Some(token) = extract_request_token(headers) else {
        return Err(RequestTokenError::Missing);
    };
    if state.auth.tokens().consume(&token) {
        Ok(())
    } else {
        Err(RequestTokenError::Invalid)
    }
}

/// Middleware enforcing [`REQUEST_TOKEN_HEADER`] on mutating, non-exempt requests.
pub async fn require_request_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !is_mutating(request.method()) || is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    match check_request_token(&state, request.headers()) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            let prefix = extract_request_token(request.headers())
                .map(|token| token.chars().take(TOKEN_LOG_PREFIX).collect::<String>())
                .unwrap_or_default();
            warn!(
                method = %request.method(),
                path = request.uri().path(),
                token_prefix = prefix.as_str(),
                reason = ?err,
                "Request token rejected"
            );
            GateError::Auth(AuthFailure::InvalidRequestToken).into_response()
        }
    }
}

fn extract_request_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
