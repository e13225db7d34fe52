use crate::custodia::{AuthSettings, SessionConfig};
use clap::{builder::FalseyValueParser, Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_BEARER_SECRET: &str = "bearer-secret";
pub const ARG_BEARER_TTL_SECONDS: &str = "bearer-ttl-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_KDF_ITERATIONS: &str = "kdf-iterations";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret the session cookie key is derived from (min 32 chars)")
                .env("CUSTODIA_SESSION_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_BEARER_SECRET)
                .long(ARG_BEARER_SECRET)
                .help("HS256 secret for fallback bearer tokens (min 32 chars)")
                .env("CUSTODIA_BEARER_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_BEARER_TTL_SECONDS)
                .long(ARG_BEARER_TTL_SECONDS)
                .help("Bearer token TTL in seconds")
                .env("CUSTODIA_BEARER_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark cookies Secure (serve behind TLS)")
                .env("CUSTODIA_COOKIE_SECURE")
                .action(ArgAction::SetTrue)
                .value_parser(FalseyValueParser::new()),
        )
        .arg(
            Arg::new(ARG_KDF_ITERATIONS)
                .long(ARG_KDF_ITERATIONS)
                .help("PBKDF2 iterations for the session cookie key")
                .env("CUSTODIA_KDF_ITERATIONS")
                .default_value("100000")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
}

pub struct Options {
    pub session_secret: Option<SecretString>,
    pub bearer_secret: Option<SecretString>,
    pub bearer_ttl_seconds: u64,
    pub cookie_secure: bool,
    pub kdf_iterations: u32,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// Secrets are left unvalidated here; the server reports weak or missing
    /// secrets itself so health checks can surface them.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let secret = |id: &str| {
            matches
                .get_one::<String>(id)
                .filter(|v| !v.trim().is_empty())
                .map(|v| SecretString::from(v.clone()))
        };

        Ok(Self {
            session_secret: secret(ARG_SESSION_SECRET),
            bearer_secret: secret(ARG_BEARER_SECRET),
            bearer_ttl_seconds: matches
                .get_one::<u64>(ARG_BEARER_TTL_SECONDS)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing argument: --{ARG_BEARER_TTL_SECONDS}"))?,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            kdf_iterations: matches
                .get_one::<u32>(ARG_KDF_ITERATIONS)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing argument: --{ARG_KDF_ITERATIONS}"))?,
        })
    }

    #[must_use]
    pub fn into_settings(self) -> AuthSettings {
        let session = SessionConfig::new()
            .with_cookie_secure(self.cookie_secure)
            .with_kdf_iterations(self.kdf_iterations);
        AuthSettings::new(self.session_secret, self.bearer_secret)
            .with_bearer_ttl(Duration::from_secs(self.bearer_ttl_seconds))
            .with_session(session)
    }
}
