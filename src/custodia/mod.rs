//! HTTP service: router assembly and server bootstrap.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::IpAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;

pub mod bearer;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod one_time;
pub mod password;
pub mod session;
pub mod state;
pub mod users;

pub use config::{AuthSettings, SessionConfig};
pub use gate::{AuthMethod, Identity};
pub use state::{AppState, AuthContext};
pub use users::{MemoryUserStore, PgUserStore, UserRecord, UserStore};

use gate::{require_credentials, require_request_token, REQUEST_TOKEN_HEADER};
use handlers::{auth, health, openapi::openapi_json};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application router.
///
/// Routes in `api` are nested under `/api` behind both gates: the Token Gate
/// for mutating methods and the Credential Gate for everything.
#[must_use]
pub fn app(state: AppState, api: Router<AppState>) -> Router {
    let public = Router::new()
        .route("/auth/token", get(auth::issue_token))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-cookie", post(auth::verify_cookie))
        .route("/auth/logout", post(auth::logout));

    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .merge(api)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_credentials,
        ));

    let api = public.merge(protected).layer(middleware::from_fn_with_state(
        state.clone(),
        require_request_token,
    ));

    Router::new()
        .route("/health", get(health::health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api", api)
        .with_state(state)
}

/// Listener and upstream settings for [`new`].
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub dsn: String,
    pub frontend_origin: String,
    pub auth: AuthSettings,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(config: ServerConfig, api: Router<AppState>) -> Result<()> {
    let origin = frontend_origin(&config.frontend_origin)?;

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&config.dsn)
        .await
        .context("Failed to connect to database")?;

    let auth = AuthContext::new(&config.auth);
    if let Some(err) = auth.config_error() {
        error!("Authentication is misconfigured, every gated request will fail: {err}");
    }
    info!(
        incarnation = auth.incarnation().prefix(),
        "Session incarnation generated"
    );

    let sweeper = one_time::spawn_sweeper(
        Arc::clone(auth.tokens()),
        auth.config().sweep_interval(),
    );

    let state = AppState::new(auth, Arc::new(PgUserStore::new(pool)));

    let cors = CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(REQUEST_TOKEN_HEADER),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true);

    let app = app(state, api).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(REQUEST_ID_HEADER),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID_HEADER,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors),
    );

    let listener = TcpListener::bind((config.bind, config.port)).await?;

    info!("Listening on {}:{}", config.bind, config.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Gracefully shutdown");

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(frontend_url).with_context(|| format!("Invalid frontend URL: {frontend_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend URL must include a valid host: {frontend_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
