//! Map parsed CLI arguments to the action the binary executes.

use crate::cli::{
    actions::Action,
    commands::{auth, ARG_BIND, ARG_DSN, ARG_FRONTEND_ORIGIN, ARG_PORT},
};
use crate::custodia::ServerConfig;
use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let bind = matches
        .get_one::<IpAddr>(ARG_BIND)
        .copied()
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|v| !v.trim().is_empty())
        .context("missing required argument: --dsn")?;
    let frontend_origin = matches
        .get_one::<String>(ARG_FRONTEND_ORIGIN)
        .cloned()
        .context("missing required argument: --frontend-origin")?;

    let auth = auth::Options::parse(matches)?.into_settings();

    Ok(Action::Server(ServerConfig {
        bind,
        port,
        dsn,
        frontend_origin,
        auth,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use std::time::Duration;

    #[test]
    fn builds_server_action() -> Result<()> {
        temp_env::with_vars(
            [
                ("CUSTODIA_DSN", Some("postgres://custodia@localhost:5432/custodia")),
                ("CUSTODIA_PORT", Some("9000")),
                ("CUSTODIA_BIND", Some("0.0.0.0")),
                ("CUSTODIA_FRONTEND_ORIGIN", None),
                ("CUSTODIA_BEARER_TTL_SECONDS", Some("3600")),
                ("CUSTODIA_COOKIE_SECURE", None),
                ("CUSTODIA_SESSION_SECRET", None),
            ],
            || -> Result<()> {
                let matches = commands::new().get_matches_from(vec!["custodia"]);
                let Action::Server(config) = handler(&matches)?;
                assert_eq!(config.port, 9000);
                assert_eq!(config.bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
                assert_eq!(config.frontend_origin, "http://localhost:5173");
                assert_eq!(config.auth.bearer_ttl, Duration::from_secs(3600));
                assert!(config.auth.session_secret.is_none());
                assert!(!config.auth.session.cookie_secure());
                Ok(())
            },
        )
    }

    #[test]
    fn blank_dsn_is_rejected() {
        temp_env::with_vars([("CUSTODIA_DSN", Some(" "))], || {
            let matches = commands::new().get_matches_from(vec!["custodia"]);
            let result = handler(&matches);
            assert!(result.is_err_and(|err| err.to_string().contains("--dsn")));
        });
    }
}
