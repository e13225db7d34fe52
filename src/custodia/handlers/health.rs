use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::{custodia::state::AppState, GIT_COMMIT_HASH};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
    auth: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "User store reachable and secrets configured", body = Health),
        (status = 503, description = "User store unreachable or secrets misconfigured", body = Health)
    ),
    tag = "health"
)]
// axum handler for health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.users.ping().await {
        Ok(()) => "ok",
        Err(err) => {
            error!("User store ping failed: {err}");
            "error"
        }
    };
    let auth = if state.auth.config_error().is_some() {
        "misconfigured"
    } else {
        "ok"
    };

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        auth: auth.to_string(),
    };

    let short_hash = health.commit.get(..7).unwrap_or_default();
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&format!("{}:{}:{short_hash}", health.name, health.version)) {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => error!("Failed to build X-App header: {err}"),
    }

    let status = if database == "ok" && auth == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    debug!(database, auth, "Health check");

    (status, headers, Json(health))
}
