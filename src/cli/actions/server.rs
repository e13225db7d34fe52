use crate::{
    cli::telemetry,
    custodia::{self, ServerConfig},
};
use anyhow::Result;
use axum::Router;
use tracing::debug;

/// Execute the server action.
///
/// The stand-alone server mounts no collaborator routes; embedders call
/// [`custodia::new`] with their own router instead.
///
/// # Errors
/// Returns an error if the database is unreachable or the listener fails.
pub async fn execute(config: ServerConfig) -> Result<()> {
    debug!(
        bind = %config.bind,
        port = config.port,
        frontend_origin = %config.frontend_origin,
        "Starting server"
    );

    let result = custodia::new(config, Router::new()).await;

    telemetry::shutdown_tracer();

    result
}
