//! Session endpoints: request tokens, login, cookie auto-login, logout.

use axum::{
    extract::{Extension, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::{info, warn};

use super::types::{
    LoginRequest, LoginResponse, MeResponse, MessageResponse, RequestTokenResponse, UserSummary,
};
use crate::custodia::{
    error::{AuthFailure, ErrorBody, GateError},
    gate::{credential::authenticate_cookie, CookieOutcome, Identity},
    password::verify_password_blocking,
    session::{cookies, now_millis, Fingerprint, SessionPayload},
    state::AppState,
    users::UserRecord,
};

#[utoipa::path(
    get,
    path = "/api/auth/token",
    responses(
        (status = 200, description = "Fresh single-use request token", body = RequestTokenResponse)
    ),
    tag = "auth"
)]
pub async fn issue_token(State(state): State<AppState>) -> Json<RequestTokenResponse> {
    Json(RequestTokenResponse {
        token: state.auth.tokens().issue(),
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session cookie set, bearer token returned", body = LoginResponse),
        (status = 401, description = "Invalid username or password", body = ErrorBody),
        (status = 500, description = "Server secrets misconfigured", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Response, GateError> {
    let keys = state.auth.keys()?;

    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return Err(GateError::Auth(AuthFailure::InvalidCredentials));
    }

    let Some(user) = state.users.find_user_by_username(username).await? else {
        warn!(username, "Login for unknown user");
        return Err(GateError::Auth(AuthFailure::InvalidCredentials));
    };

    let valid = verify_password_blocking(request.password, user.password_hash.clone())
        .await
        .map_err(|err| GateError::Internal(err.to_string()))?;
    if !valid {
        warn!(user_id = user.id, "Login with wrong password");
        return Err(GateError::Auth(AuthFailure::InvalidCredentials));
    }

    let payload = SessionPayload::new(
        &user,
        state.auth.incarnation(),
        &Fingerprint::from_headers(&headers),
        now_millis(),
    );
    let envelope = keys
        .codec()
        .encrypt_blocking(payload)
        .await
        .map_err(|err| GateError::Internal(err.to_string()))?;
    let config = state.auth.config();
    let cookie = cookies::session_cookie(&envelope, config.max_age(), config.cookie_secure())
        .map_err(|err| GateError::Internal(err.to_string()))?;

    let body = login_response(&state, &user)?;
    info!(user_id = user.id, "User logged in");

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    Ok((StatusCode::OK, response_headers, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-cookie",
    responses(
        (status = 200, description = "Session cookie is valid, fresh bearer token returned", body = LoginResponse),
        (status = 401, description = "No usable session cookie", body = ErrorBody)
    ),
    tag = "auth"
)]
/// Cookie auto-login. Runs the cookie path only; there is no bearer fallback here.
pub async fn verify_cookie(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, GateError> {
    let keys = state.auth.keys()?;
    let authenticated = match authenticate_cookie(&state, keys, &headers).await? {
        CookieOutcome::Authenticated(authenticated) => authenticated,
        CookieOutcome::Absent => return Err(GateError::Auth(AuthFailure::MissingCredential)),
        CookieOutcome::Undecryptable => {
            return Err(GateError::Session {
                failure: AuthFailure::InvalidSession,
                secure: state.auth.config().cookie_secure(),
            })
        }
    };

    let body = login_response(&state, &authenticated.user)?;
    let mut response_headers = HeaderMap::new();
    if let Some(cookie) = authenticated.renewed {
        response_headers.insert(SET_COOKIE, cookie);
    }
    Ok((StatusCode::OK, response_headers, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    params(
        ("x-request-token" = String, Header, description = "Single-use request token")
    ),
    responses(
        (status = 200, description = "Session cookies cleared", body = MessageResponse),
        (status = 403, description = "Missing or reused request token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let secure = state.auth.config().cookie_secure();
    let mut headers = HeaderMap::new();
    for name in [cookies::SESSION_COOKIE_NAME, cookies::BEARER_COOKIE_NAME] {
        if let Ok(cookie) = cookies::clear_cookie(name, secure) {
            headers.append(SET_COOKIE, cookie);
        }
    }
    (
        StatusCode::OK,
        headers,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Authenticated identity", body = MeResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Bearer token rejected", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn me(Extension(identity): Extension<Identity>) -> Json<MeResponse> {
    Json(MeResponse {
        user: UserSummary {
            id: identity.user_id,
            username: identity.username,
        },
        method: identity.method,
    })
}

fn login_response(state: &AppState, user: &UserRecord) -> Result<LoginResponse, GateError> {
    let token = state
        .auth
        .keys()?
        .bearer()
        .issue(user)
        .map_err(|err| GateError::Internal(err.to_string()))?;
    Ok(LoginResponse {
        token,
        user: UserSummary {
            id: user.id,
            username: user.username.clone(),
        },
    })
}
