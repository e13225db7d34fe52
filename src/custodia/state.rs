//! Shared context handed to every gate and handler.

use std::sync::Arc;

use super::{
    bearer::BearerSigner,
    config::{AuthSettings, Secret, SessionConfig},
    error::{ConfigError, GateError},
    one_time::OneTimeTokenStore,
    session::{IncarnationId, SessionCodec, SessionValidator},
    users::UserStore,
};

/// Key material derived from validated secrets.
pub struct Keys {
    codec: Arc<SessionCodec>,
    bearer: BearerSigner,
}

impl Keys {
    fn from_settings(settings: &AuthSettings) -> Result<Self, ConfigError> {
        let session = Secret::parse("session", settings.session_secret.clone())?;
        let bearer = Secret::parse("bearer", settings.bearer_secret.clone())?;
        Ok(Self {
            bearer: BearerSigner::new(&bearer, settings.bearer_ttl),
            codec: Arc::new(SessionCodec::new(session, settings.session.kdf_iterations())),
        })
    }

    #[must_use]
    pub fn codec(&self) -> &Arc<SessionCodec> {
        &self.codec
    }

    #[must_use]
    pub fn bearer(&self) -> &BearerSigner {
        &self.bearer
    }
}

/// Process-wide auth state: keys, incarnation and the one-time token store.
///
/// Secret validation failures are kept rather than raised so the server still
/// starts and answers every authenticated request with a configuration error.
pub struct AuthContext {
    keys: Result<Keys, ConfigError>,
    config: SessionConfig,
    incarnation: IncarnationId,
    tokens: Arc<OneTimeTokenStore>,
}

impl AuthContext {
    #[must_use]
    pub fn new(settings: &AuthSettings) -> Self {
        let config = settings.session.clone();
        Self {
            keys: Keys::from_settings(settings),
            tokens: Arc::new(OneTimeTokenStore::new(
                config.one_time_token_length(),
                config.one_time_token_ttl(),
            )),
            incarnation: IncarnationId::generate(),
            config,
        }
    }

    /// # Errors
    /// Returns [`GateError::Config`] when a secret is missing or weak.
    pub fn keys(&self) -> Result<&Keys, GateError> {
        self.keys.as_ref().map_err(|err| GateError::Config(err.clone()))
    }

    #[must_use]
    pub fn config_error(&self) -> Option<&ConfigError> {
        self.keys.as_ref().err()
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn incarnation(&self) -> &IncarnationId {
        &self.incarnation
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<OneTimeTokenStore> {
        &self.tokens
    }

    #[must_use]
    pub fn validator(&self) -> SessionValidator<'_> {
        SessionValidator::new(&self.incarnation, self.config.max_age())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthContext>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    #[must_use]
    pub fn new(auth: AuthContext, users: Arc<dyn UserStore>) -> Self {
        Self {
            auth: Arc::new(auth),
            users,
        }
    }
}
