//! Authenticated encryption of the session payload into the cookie envelope.
//!
//! Envelope layout before encoding: `salt(16) || iv(12) || tag(16) || ciphertext`,
//! encoded as unpadded base64url so it can travel in a cookie untouched. The
//! AES-256-GCM key is derived per envelope with PBKDF2-HMAC-SHA256 from the
//! server secret and the envelope salt.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::debug;
use zeroize::Zeroizing;

use super::{fingerprint::Fingerprint, incarnation::IncarnationId};
use crate::custodia::{config::Secret, users::UserRecord};

const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Fixed header preceding the ciphertext.
pub const HEADER_LEN: usize = SALT_LEN + IV_LEN + TAG_LEN;

/// Decrypted cookie contents. Never persisted anywhere but the envelope.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub username: String,
    pub user_id: i64,
    pub password_hash: String,
    pub incarnation_id: String,
    pub issued_at: i64,
    pub fingerprint: String,
}

impl SessionPayload {
    #[must_use]
    pub fn new(
        user: &UserRecord,
        incarnation: &IncarnationId,
        fingerprint: &Fingerprint,
        issued_at: i64,
    ) -> Self {
        Self {
            username: user.username.clone(),
            user_id: user.id,
            password_hash: user.password_hash.clone(),
            incarnation_id: incarnation.as_str().to_string(),
            issued_at,
            fingerprint: fingerprint.as_str().to_string(),
        }
    }

    /// Same identity, fingerprint and incarnation with a new timestamp.
    #[must_use]
    pub fn renewed(&self, issued_at: i64) -> Self {
        Self {
            issued_at,
            ..self.clone()
        }
    }

    fn has_required_fields(&self) -> bool {
        !self.username.is_empty()
            && !self.password_hash.is_empty()
            && !self.incarnation_id.is_empty()
            && !self.fingerprint.is_empty()
            && self.issued_at > 0
    }
}

impl std::fmt::Debug for SessionPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPayload")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("issued_at", &self.issued_at)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid envelope encoding")]
    Encoding,
    #[error("envelope shorter than {HEADER_LEN} byte header")]
    TooShort,
    #[error("envelope authentication failed")]
    Authentication,
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("payload is missing required fields")]
    MissingFields,
    #[error("codec task failed: {0}")]
    Task(#[from] JoinError),
}

pub struct SessionCodec {
    secret: Secret,
    iterations: u32,
}

impl SessionCodec {
    #[must_use]
    pub fn new(secret: Secret, iterations: u32) -> Self {
        Self {
            secret,
            iterations: iterations.max(1),
        }
    }

    /// Seal a payload into a fresh envelope; salt and IV are new on every call.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized or sealed.
    pub fn encrypt(&self, payload: &SessionPayload) -> Result<String, CodecError> {
        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut iv);

        let mut buffer = serde_json::to_vec(payload)?;
        let cipher = self.cipher(&salt);
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| CodecError::Authentication)?;

        let mut envelope = Vec::with_capacity(HEADER_LEN + buffer.len());
        envelope.extend_from_slice(&salt);
        envelope.extend_from_slice(&iv);
        envelope.extend_from_slice(&tag);
        envelope.extend_from_slice(&buffer);

        Ok(Base64UrlUnpadded::encode_string(&envelope))
    }

    /// Open an envelope. Every failure is reported as `None`, exactly like an
    /// absent cookie.
    #[must_use]
    pub fn decrypt(&self, envelope: &str) -> Option<SessionPayload> {
        match self.open(envelope) {
            Ok(payload) => Some(payload),
            Err(err) => {
                debug!("Rejected session envelope: {err}");
                None
            }
        }
    }

    /// [`SessionCodec::encrypt`] on the blocking pool; key derivation is too
    /// slow for a runtime worker.
    ///
    /// # Errors
    /// Returns [`CodecError::Task`] if the blocking task panics or is cancelled.
    pub async fn encrypt_blocking(
        self: &Arc<Self>,
        payload: SessionPayload,
    ) -> Result<String, CodecError> {
        let codec = Arc::clone(self);
        tokio::task::spawn_blocking(move || codec.encrypt(&payload)).await?
    }

    /// [`SessionCodec::decrypt`] on the blocking pool.
    ///
    /// # Errors
    /// Returns the [`JoinError`] if the blocking task panics or is cancelled.
    pub async fn decrypt_blocking(
        self: &Arc<Self>,
        envelope: String,
    ) -> Result<Option<SessionPayload>, JoinError> {
        let codec = Arc::clone(self);
        tokio::task::spawn_blocking(move || codec.decrypt(&envelope)).await
    }

    fn open(&self, envelope: &str) -> Result<SessionPayload, CodecError> {
        let bytes =
            Base64UrlUnpadded::decode_vec(envelope.trim()).map_err(|_| CodecError::Encoding)?;
        if bytes.len() <= HEADER_LEN {
            return Err(CodecError::TooShort);
        }

        let (salt, rest) = bytes.split_at(SALT_LEN);
        let (iv, rest) = rest.split_at(IV_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let mut buffer = ciphertext.to_vec();
        self.cipher(salt)
            .decrypt_in_place_detached(
                Nonce::from_slice(iv),
                b"",
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| CodecError::Authentication)?;

        let payload: SessionPayload = serde_json::from_slice(&buffer)?;
        if !payload.has_required_fields() {
            return Err(CodecError::MissingFields);
        }
        Ok(payload)
    }

    fn cipher(&self, salt: &[u8]) -> Aes256Gcm {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<sha2::Sha256>(
            self.secret.expose().as_bytes(),
            salt,
            self.iterations,
            &mut *key,
        );
        Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&*key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use secrecy::SecretString;

    const TEST_ITERATIONS: u32 = 10;

    fn codec_with(secret: &str) -> Result<SessionCodec> {
        let secret = Secret::parse("session", Some(SecretString::from(secret)))?;
        Ok(SessionCodec::new(secret, TEST_ITERATIONS))
    }

    fn codec() -> Result<SessionCodec> {
        codec_with("q8Vn2xLp7RtZ4mWc9KsYb3HdJf6GaE1u")
    }

    fn payload() -> SessionPayload {
        SessionPayload {
            username: "admin".to_string(),
            user_id: 1,
            password_hash: "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$hash".to_string(),
            incarnation_id: IncarnationId::generate().as_str().to_string(),
            issued_at: 1_700_000_000_000,
            fingerprint: "Chrome 120|Windows|en-US".to_string(),
        }
    }

    fn raw(envelope: &str) -> Vec<u8> {
        Base64UrlUnpadded::decode_vec(envelope).unwrap_or_default()
    }

    #[test]
    fn round_trip() -> Result<()> {
        let codec = codec()?;
        let payload = payload();
        let envelope = codec.encrypt(&payload)?;
        assert_eq!(codec.decrypt(&envelope), Some(payload));
        Ok(())
    }

    #[test]
    fn envelopes_never_repeat() -> Result<()> {
        let codec = codec()?;
        let payload = payload();
        let first = codec.encrypt(&payload)?;
        let second = codec.encrypt(&payload)?;
        assert_ne!(first, second);
        assert_ne!(raw(&first)[..SALT_LEN], raw(&second)[..SALT_LEN]);
        Ok(())
    }

    #[test]
    fn envelope_is_cookie_safe() -> Result<()> {
        let envelope = codec()?.encrypt(&payload())?;
        assert!(envelope
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        Ok(())
    }

    #[test]
    fn tampering_with_tag_or_ciphertext_fails_closed() -> Result<()> {
        let codec = codec()?;
        let envelope = codec.encrypt(&payload())?;
        let bytes = raw(&envelope);

        for index in [SALT_LEN + IV_LEN, HEADER_LEN - 1, HEADER_LEN, bytes.len() - 1] {
            let mut tampered = bytes.clone();
            tampered[index] ^= 0x01;
            let encoded = Base64UrlUnpadded::encode_string(&tampered);
            assert_eq!(codec.decrypt(&encoded), None, "byte {index} flipped");
        }
        Ok(())
    }

    #[test]
    fn tampering_with_salt_or_iv_fails_closed() -> Result<()> {
        let codec = codec()?;
        let bytes = raw(&codec.encrypt(&payload())?);
        for index in [0, SALT_LEN] {
            let mut tampered = bytes.clone();
            tampered[index] ^= 0x80;
            let encoded = Base64UrlUnpadded::encode_string(&tampered);
            assert_eq!(codec.decrypt(&encoded), None);
        }
        Ok(())
    }

    #[test]
    fn other_secret_cannot_open() -> Result<()> {
        let envelope = codec()?.encrypt(&payload())?;
        let other = codec_with("Zz9Yy8Xx7Ww6Vv5Uu4Tt3Ss2Rr1Qq0Pp")?;
        assert_eq!(other.decrypt(&envelope), None);
        Ok(())
    }

    #[test]
    fn malformed_envelopes_are_none() -> Result<()> {
        let codec = codec()?;
        assert_eq!(codec.decrypt(""), None);
        assert_eq!(codec.decrypt("not base64 at all!"), None);
        let header_only = Base64UrlUnpadded::encode_string(&[0u8; HEADER_LEN]);
        assert_eq!(codec.decrypt(&header_only), None);
        let garbage = Base64UrlUnpadded::encode_string(&[7u8; HEADER_LEN + 20]);
        assert_eq!(codec.decrypt(&garbage), None);
        Ok(())
    }

    #[test]
    fn missing_fields_are_rejected() -> Result<()> {
        let codec = codec()?;
        let mut incomplete = payload();
        incomplete.password_hash.clear();
        let envelope = codec.encrypt(&incomplete)?;
        assert_eq!(codec.decrypt(&envelope), None);
        Ok(())
    }

    #[tokio::test]
    async fn blocking_variants_round_trip() -> Result<()> {
        let codec = Arc::new(codec()?);
        let payload = payload();
        let envelope = codec.encrypt_blocking(payload.clone()).await?;
        assert_eq!(codec.decrypt_blocking(envelope).await?, Some(payload));
        assert_eq!(codec.decrypt_blocking("garbage".to_string()).await?, None);
        Ok(())
    }

    #[test]
    fn renewed_only_changes_timestamp() {
        let original = payload();
        let renewed = original.renewed(original.issued_at + 1_000);
        assert_eq!(renewed.issued_at, original.issued_at + 1_000);
        assert_eq!(renewed.username, original.username);
        assert_eq!(renewed.user_id, original.user_id);
        assert_eq!(renewed.fingerprint, original.fingerprint);
        assert_eq!(renewed.incarnation_id, original.incarnation_id);
    }

    #[test]
    fn debug_hides_password_hash() {
        let rendered = format!("{:?}", payload());
        assert!(!rendered.contains("argon2"));
        assert!(rendered.contains("admin"));
    }
}
