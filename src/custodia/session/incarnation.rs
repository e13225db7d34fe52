//! Per-process incarnation identifier.
//!
//! Generated once when the auth context is built and embedded in every
//! session payload. A restart produces a new value, which fences off every
//! cookie minted by the previous run regardless of its timestamp.

use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

const INCARNATION_BYTES: usize = 32;

#[derive(Clone, PartialEq, Eq)]
pub struct IncarnationId(String);

impl IncarnationId {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; INCARNATION_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against the value embedded in a payload.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// Short prefix that is safe to log.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.0[..8]
    }
}

impl std::fmt::Debug for IncarnationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IncarnationId({}..)", self.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_hex_and_unique() {
        let first = IncarnationId::generate();
        let second = IncarnationId::generate();
        assert_eq!(first.as_str().len(), INCARNATION_BYTES * 2);
        assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn matches_only_itself() {
        let id = IncarnationId::generate();
        let other = IncarnationId::generate();
        assert!(id.matches(id.as_str()));
        assert!(!id.matches(other.as_str()));
        assert!(!id.matches(""));
        assert!(!id.matches(&id.as_str()[..10]));
    }

    #[test]
    fn debug_only_shows_prefix() {
        let id = IncarnationId::generate();
        let rendered = format!("{id:?}");
        assert!(rendered.contains(id.prefix()));
        assert!(!rendered.contains(id.as_str()));
    }
}
