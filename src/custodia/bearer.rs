//! Bearer token fallback.
//!
//! HS256 JWTs carrying the user identity and a short digest of the password
//! hash at issuance, so a password change revokes outstanding bearer tokens
//! the same way it revokes session cookies.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use super::{config::Secret, users::UserRecord};

const DIGEST_HEX_LEN: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerClaims {
    pub user_id: i64,
    pub username: String,
    /// Truncated SHA-256 of the password hash at issuance.
    pub pwh: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Error)]
pub enum BearerError {
    #[error("failed to sign bearer token: {0}")]
    Sign(jsonwebtoken::errors::Error),
    #[error("invalid bearer token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

/// Digest of a password hash as carried in the `pwh` claim.
#[must_use]
pub fn password_digest(password_hash: &str) -> String {
    let digest = Sha256::digest(password_hash.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(DIGEST_HEX_LEN);
    encoded
}

pub struct BearerSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl BearerSigner {
    #[must_use]
    pub fn new(secret: &Secret, ttl: Duration) -> Self {
        let bytes = secret.expose().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl,
        }
    }

    /// Issue a token for `user` valid for the configured TTL.
    ///
    /// # Errors
    /// Returns [`BearerError::Sign`] if encoding fails.
    pub fn issue(&self, user: &UserRecord) -> Result<String, BearerError> {
        self.issue_at(user, unix_seconds())
    }

    /// Issue a token as if `now` (unix seconds) were the current time.
    ///
    /// # Errors
    /// Returns [`BearerError::Sign`] if encoding fails.
    pub fn issue_at(&self, user: &UserRecord, now: u64) -> Result<String, BearerError> {
        let claims = BearerClaims {
            user_id: user.id,
            username: user.username.clone(),
            pwh: password_digest(&user.password_hash),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(BearerError::Sign)
    }

    /// Verify signature and expiry.
    ///
    /// # Errors
    /// Returns [`BearerError::Invalid`] for bad signatures, expired tokens and
    /// malformed input alike.
    pub fn verify(&self, token: &str) -> Result<BearerClaims, BearerError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        jsonwebtoken::decode::<BearerClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(BearerError::Invalid)
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
