//! Argon2 password hashing for the login endpoint.

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

const SALT_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("password verification task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Hash `password` into a PHC string with the given Argon2 instance.
///
/// # Errors
/// Returns [`PasswordError::Hash`] if hashing fails.
pub fn hash_password_with(argon2: &Argon2<'_>, password: &str) -> Result<String, PasswordError> {
    let mut bytes = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let salt = SaltString::encode_b64(&bytes).map_err(PasswordError::Hash)?;
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}

/// Hash `password` with default Argon2id parameters.
///
/// # Errors
/// Returns [`PasswordError::Hash`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with(&Argon2::default(), password)
}

/// Check `password` against a stored PHC string. Unparseable hashes never match.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// [`verify_password`] on the blocking pool.
///
/// # Errors
/// Returns [`PasswordError::Task`] if the blocking task panics or is cancelled.
pub async fn verify_password_blocking(
    password: String,
    stored_hash: String,
) -> Result<bool, PasswordError> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use argon2::{Algorithm, Params, Version};

    /// Cheap parameters so tests do not spend seconds hashing.
    pub(crate) fn quick_hash(password: &str) -> String {
        let argon2 = Params::new(8, 1, 1, None)
            .map(|params| Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
            .unwrap_or_default();
        hash_password_with(&argon2, password).unwrap_or_default()
    }

    #[test]
    fn verifies_matching_password() {
        let hash = quick_hash("correct horse");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn unparseable_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("", ""));
    }

    #[tokio::test]
    async fn blocking_variant() -> Result<(), PasswordError> {
        let hash = quick_hash("pw");
        assert!(verify_password_blocking("pw".to_string(), hash.clone()).await?);
        assert!(!verify_password_blocking("nope".to_string(), hash).await?);
        Ok(())
    }
}
