//! Cookie and header helpers for the session envelope and bearer token.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use std::time::Duration;

pub const SESSION_COOKIE_NAME: &str = "auth_session";
pub const BEARER_COOKIE_NAME: &str = "token";

/// Build the `HttpOnly` session cookie carrying an envelope.
///
/// # Errors
/// Returns an error if the value contains characters not allowed in a header.
pub fn session_cookie(
    envelope: &str,
    max_age: Duration,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build(SESSION_COOKIE_NAME, envelope, max_age.as_secs(), secure)
}

/// Expire `name` immediately.
///
/// # Errors
/// Returns an error if `name` is not a valid header value.
pub fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    build(name, "", 0, secure)
}

fn build(
    name: &str,
    value: &str,
    max_age: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Read a cookie value by name. Empty values count as absent.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Extract a token from `Authorization: Bearer <token>`.
#[must_use]
pub fn bearer_from_authorization(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Bearer token from the `token` cookie first, then the `Authorization` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, BEARER_COOKIE_NAME).or_else(|| bearer_from_authorization(headers))
}
