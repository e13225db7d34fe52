//! Session timing constants and server secrets.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashSet;
use std::time::Duration;

use super::error::ConfigError;

const DEFAULT_SESSION_MAX_AGE_SECONDS: u64 = 5 * 60;
const DEFAULT_RENEWAL_THRESHOLD_SECONDS: u64 = 2 * 60;
const DEFAULT_ONE_TIME_TOKEN_LENGTH: usize = 128;
const DEFAULT_ONE_TIME_TOKEN_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_KDF_ITERATIONS: u32 = 100_000;
const DEFAULT_BEARER_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Minimum number of characters a server secret must carry.
pub const MIN_SECRET_LENGTH: usize = 32;
const MIN_DISTINCT_SECRET_CHARS: usize = 8;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    max_age: Duration,
    renewal_threshold: Duration,
    one_time_token_length: usize,
    one_time_token_ttl: Duration,
    sweep_interval: Duration,
    kdf_iterations: u32,
    cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(DEFAULT_SESSION_MAX_AGE_SECONDS),
            renewal_threshold: Duration::from_secs(DEFAULT_RENEWAL_THRESHOLD_SECONDS),
            one_time_token_length: DEFAULT_ONE_TIME_TOKEN_LENGTH,
            one_time_token_ttl: Duration::from_secs(DEFAULT_ONE_TIME_TOKEN_TTL_SECONDS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            cookie_secure: false,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    #[must_use]
    pub fn with_renewal_threshold(mut self, threshold: Duration) -> Self {
        self.renewal_threshold = threshold;
        self
    }

    /// Token length in hex characters; odd values are rounded down to whole bytes.
    #[must_use]
    pub fn with_one_time_token_length(mut self, length: usize) -> Self {
        self.one_time_token_length = length;
        self
    }

    #[must_use]
    pub fn with_one_time_token_ttl(mut self, ttl: Duration) -> Self {
        self.one_time_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations.max(1);
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    #[must_use]
    pub fn renewal_threshold(&self) -> Duration {
        self.renewal_threshold
    }

    #[must_use]
    pub fn one_time_token_length(&self) -> usize {
        self.one_time_token_length
    }

    #[must_use]
    pub fn one_time_token_ttl(&self) -> Duration {
        self.one_time_token_ttl
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    #[must_use]
    pub fn kdf_iterations(&self) -> u32 {
        self.kdf_iterations
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}

/// A validated server secret.
#[derive(Clone)]
pub struct Secret(SecretString);

impl Secret {
    /// Validate a configured secret.
    ///
    /// # Errors
    /// Returns [`ConfigError::Missing`] when absent or blank and
    /// [`ConfigError::Weak`] when shorter than [`MIN_SECRET_LENGTH`] or built
    /// from too few distinct characters.
    pub fn parse(name: &'static str, value: Option<SecretString>) -> Result<Self, ConfigError> {
        let Some(value) = value else {
            return Err(ConfigError::Missing { name });
        };

        let exposed = value.expose_secret();
        if exposed.trim().is_empty() {
            return Err(ConfigError::Missing { name });
        }

        let length = exposed.chars().count();
        let distinct = exposed.chars().collect::<HashSet<_>>().len();
        if length < MIN_SECRET_LENGTH || distinct < MIN_DISTINCT_SECRET_CHARS {
            return Err(ConfigError::Weak {
                name,
                min: MIN_SECRET_LENGTH,
            });
        }

        Ok(Self(value))
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// Everything the auth context needs at startup.
#[derive(Clone, Debug)]
pub struct AuthSettings {
    pub session_secret: Option<SecretString>,
    pub bearer_secret: Option<SecretString>,
    pub bearer_ttl: Duration,
    pub session: SessionConfig,
}

impl AuthSettings {
    #[must_use]
    pub fn new(session_secret: Option<SecretString>, bearer_secret: Option<SecretString>) -> Self {
        Self {
            session_secret,
            bearer_secret,
            bearer_ttl: Duration::from_secs(DEFAULT_BEARER_TTL_SECONDS),
            session: SessionConfig::default(),
        }
    }

    #[must_use]
    pub fn with_bearer_ttl(mut self, ttl: Duration) -> Self {
        self.bearer_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}
