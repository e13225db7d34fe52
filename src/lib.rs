//! # Custodia (stateless session gate for LAN administration consoles)
//!
//! `custodia` authenticates browser sessions for a single-tenant administrative
//! application without any server-side session storage.
//!
//! ## Sessions
//!
//! A login mints an `auth_session` cookie holding an AES-256-GCM envelope of the
//! session payload. The key is derived per envelope with PBKDF2 from a
//! process-wide secret and a fresh salt, so two envelopes never share
//! ciphertext. Each request re-validates the payload:
//!
//! - **Incarnation:** cookies minted by a previous process run are rejected.
//! - **Freshness:** sessions slide; idle sessions die five minutes after the
//!   last observed activity, active sessions are renewed under two minutes.
//! - **Fingerprint:** the browser family/major version, OS family and
//!   `Accept-Language` must match the values seen at login.
//! - **Credential:** the password hash embedded in the payload must still
//!   match the stored hash, so a password rotation revokes every session.
//!
//! Clients that cannot carry cookies fall back to an HS256 bearer token.
//!
//! ## One-time request tokens
//!
//! Every mutating `/api` call must present a single-use `x-request-token`
//! fetched from `GET /api/auth/token`. Tokens are consumed atomically and swept
//! once expired.

pub mod cli;
pub mod custodia;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }
}
