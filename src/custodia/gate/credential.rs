//! Credential Gate: session cookie first, bearer token only as a fallback.

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::custodia::{
    bearer::password_digest,
    error::{AuthFailure, GateError},
    session::{cookies, now_millis, Fingerprint, SessionPayload},
    state::{AppState, Keys},
    users::UserRecord,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Cookie,
    Bearer,
}

/// Identity attached to the request once a gate lets it through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub method: AuthMethod,
}

/// Successful authentication, with a replacement cookie when the session was
/// renewed.
#[derive(Debug)]
pub struct Authenticated {
    pub identity: Identity,
    pub user: UserRecord,
    pub renewed: Option<HeaderValue>,
}

/// Result of the cookie path before any fallback decision.
#[derive(Debug)]
pub enum CookieOutcome {
    Absent,
    Undecryptable,
    Authenticated(Authenticated),
}

/// Authenticate a request from its headers.
///
/// # Errors
/// Returns [`GateError::Session`] for any rejection on the cookie path (the
/// response clears the cookie), [`GateError::Auth`] for bearer failures,
/// and 500-class errors for configuration or store problems.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Authenticated, GateError> {
    let keys = state.auth.keys()?;
    match authenticate_cookie(state, keys, headers).await? {
        CookieOutcome::Authenticated(authenticated) => Ok(authenticated),
        CookieOutcome::Absent | CookieOutcome::Undecryptable => {
            authenticate_bearer(state, keys, headers).await
        }
    }
}

/// Run the cookie path only.
///
/// # Errors
/// Same as [`authenticate`] minus the bearer failures.
pub async fn authenticate_cookie(
    state: &AppState,
    keys: &Keys,
    headers: &HeaderMap,
) -> Result<CookieOutcome, GateError> {
    let Some(envelope) = cookies::read_cookie(headers, cookies::SESSION_COOKIE_NAME) else {
        return Ok(CookieOutcome::Absent);
    };
    let opened = keys
        .codec()
        .decrypt_blocking(envelope)
        .await
        .map_err(|err| GateError::Internal(format!("session decrypt task failed: {err}")))?;
    let Some(payload) = opened else {
        debug!("Session cookie could not be opened, trying bearer fallback");
        return Ok(CookieOutcome::Undecryptable);
    };

    let secure = state.auth.config().cookie_secure();
    let reject = |failure: AuthFailure| {
        warn!(
            code = failure.code(),
            user_id = payload.user_id,
            "Session cookie rejected"
        );
        GateError::Session { failure, secure }
    };

    let fingerprint = Fingerprint::from_headers(headers);
    let validator = state.auth.validator();
    let now = now_millis();
    validator
        .validate_at(&payload, &fingerprint, now)
        .map_err(|reason| reject(reason.into()))?;

    let user = state
        .users
        .find_user_by_id_and_username(payload.user_id, &payload.username)
        .await?
        .ok_or_else(|| reject(AuthFailure::UserNotFound))?;

    if !hashes_match(&payload.password_hash, &user.password_hash) {
        return Err(reject(AuthFailure::PasswordChanged));
    }

    let remaining = validator.remaining_millis(&payload, now);
    let renewed = if remaining < threshold_millis(state) {
        renew(state, keys, &payload, now).await
    } else {
        None
    };

    Ok(CookieOutcome::Authenticated(Authenticated {
        identity: Identity {
            user_id: user.id,
            username: user.username.clone(),
            method: AuthMethod::Cookie,
        },
        user,
        renewed,
    }))
}

/// Run the bearer fallback. Absence is 401, an unverifiable token 403.
///
/// # Errors
/// Returns [`GateError::Auth`] on any failure, [`GateError::Store`] when the
/// user lookup fails.
pub async fn authenticate_bearer(
    state: &AppState,
    keys: &Keys,
    headers: &HeaderMap,
) -> Result<Authenticated, GateError> {
    let token = cookies::bearer_token(headers)
        .ok_or(GateError::Auth(AuthFailure::MissingCredential))?;
    let claims = keys.bearer().verify(&token).map_err(|err| {
        debug!("Bearer token rejected: {err}");
        GateError::Auth(AuthFailure::InvalidBearer)
    })?;

    let user = state
        .users
        .find_user_by_id_and_username(claims.user_id, &claims.username)
        .await?
        .ok_or(GateError::Auth(AuthFailure::UserNotFound))?;

    if !hashes_match(&claims.pwh, &password_digest(&user.password_hash)) {
        warn!(user_id = user.id, "Bearer token issued before password change");
        return Err(GateError::Auth(AuthFailure::PasswordChanged));
    }

    Ok(Authenticated {
        identity: Identity {
            user_id: user.id,
            username: user.username.clone(),
            method: AuthMethod::Bearer,
        },
        user,
        renewed: None,
    })
}

/// Middleware for routes that require an authenticated user.
pub async fn require_credentials(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(authenticated) => {
            request.extensions_mut().insert(authenticated.identity);
            let mut response = next.run(request).await;
            if let Some(cookie) = authenticated.renewed {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            response
        }
        Err(err) => err.into_response(),
    }
}

fn hashes_match(presented: &str, live: &str) -> bool {
    presented.as_bytes().ct_eq(live.as_bytes()).into()
}

fn threshold_millis(state: &AppState) -> i64 {
    i64::try_from(state.auth.config().renewal_threshold().as_millis()).unwrap_or(i64::MAX)
}

async fn renew(
    state: &AppState,
    keys: &Keys,
    payload: &SessionPayload,
    now: i64,
) -> Option<HeaderValue> {
    // issuedAt must strictly increase even when renewing within the same millisecond.
    let issued_at = now.max(payload.issued_at.saturating_add(1));
    let config = state.auth.config();
    let cookie = keys
        .codec()
        .encrypt_blocking(payload.renewed(issued_at))
        .await
        .map_err(|err| err.to_string())
        .and_then(|envelope| {
            cookies::session_cookie(&envelope, config.max_age(), config.cookie_secure())
                .map_err(|err| err.to_string())
        });
    match cookie {
        Ok(cookie) => {
            debug!(user_id = payload.user_id, "Session renewed");
            Some(cookie)
        }
        Err(err) => {
            warn!("Failed to renew session cookie: {err}");
            None
        }
    }
}
