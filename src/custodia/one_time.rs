//! Single-use request tokens for mutating calls.
//!
//! A token is issued on request, consumed by exactly one mutating request and
//! forgotten. Consumption is a single `DashMap::remove`, so two concurrent
//! requests presenting the same token can never both succeed. Expired entries
//! are refused on consume and reclaimed by a periodic sweep.

use dashmap::DashMap;
use rand::{rngs::OsRng, RngCore};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Instant};
use tracing::debug;

/// Log-safe prefix length for token values.
pub const TOKEN_LOG_PREFIX: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenStats {
    pub total: usize,
    pub oldest_age: Option<Duration>,
}

pub struct OneTimeTokenStore {
    tokens: DashMap<String, Instant>,
    length: usize,
    ttl: Duration,
}

impl OneTimeTokenStore {
    /// `length` is in hex characters and is rounded down to whole bytes.
    #[must_use]
    pub fn new(length: usize, ttl: Duration) -> Self {
        Self {
            tokens: DashMap::new(),
            length: (length / 2).max(1) * 2,
            ttl,
        }
    }

    /// Mint and register a fresh token.
    #[must_use]
    pub fn issue(&self) -> String {
        let mut bytes = vec![0u8; self.length / 2];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        self.tokens.insert(token.clone(), Instant::now());
        token
    }

    /// Consume a token. `true` exactly once for a live token, `false` for
    /// unknown, malformed, expired or already consumed ones.
    #[must_use]
    pub fn consume(&self, token: &str) -> bool {
        if token.len() != self.length || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return false;
        }
        match self.tokens.remove(token) {
            Some((_, issued_at)) => issued_at.elapsed() <= self.ttl,
            None => false,
        }
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, issued_at| issued_at.elapsed() <= self.ttl);
        before.saturating_sub(self.tokens.len())
    }

    #[must_use]
    pub fn stats(&self) -> TokenStats {
        let oldest_age = self
            .tokens
            .iter()
            .map(|entry| entry.value().elapsed())
            .max();
        TokenStats {
            total: self.tokens.len(),
            oldest_age,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn token_length(&self) -> usize {
        self.length
    }
}

/// Run [`OneTimeTokenStore::sweep_expired`] every `interval` until aborted.
pub fn spawn_sweeper(store: Arc<OneTimeTokenStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        loop {
            ticker.tick().await;
            let removed = store.sweep_expired();
            let stats = store.stats();
            debug!(
                removed,
                remaining = stats.total,
                oldest_age_secs = stats.oldest_age.map_or(0, |age| age.as_secs()),
                "Swept one-time tokens"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    fn store() -> OneTimeTokenStore {
        OneTimeTokenStore::new(128, TTL)
    }

    #[tokio::test]
    async fn issued_tokens_are_long_hex_and_unique() {
        let store = store();
        let first = store.issue();
        let second = store.issue();
        assert_eq!(first.len(), 128);
        assert!(first.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn consume_succeeds_once() {
        let store = store();
        let token = store.issue();
        assert!(store.consume(&token));
        assert!(!store.consume(&token));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unknown_and_malformed_tokens_fail() {
        let store = store();
        let _ = store.issue();
        assert!(!store.consume(""));
        assert!(!store.consume("abc"));
        assert!(!store.consume(&"0".repeat(128)));
        assert!(!store.consume(&"z".repeat(128)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_is_refused_and_removed() {
        let store = store();
        let token = store.issue();
        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        assert!(!store.consume(&token));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn token_is_valid_up_to_expiry() {
        let store = store();
        let token = store.issue();
        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert!(store.consume(&token));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired() {
        let store = store();
        let _old = store.issue();
        tokio::time::advance(Duration::from_secs(200)).await;
        let fresh = store.issue();
        tokio::time::advance(Duration::from_secs(150)).await;

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.consume(&fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn stats_report_oldest_age() {
        let store = store();
        assert_eq!(
            store.stats(),
            TokenStats {
                total: 0,
                oldest_age: None
            }
        );
        let _ = store.issue();
        tokio::time::advance(Duration::from_secs(30)).await;
        let _ = store.issue();
        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.oldest_age, Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_reclaims_expired_entries() {
        let store = Arc::new(store());
        let _ = store.issue();
        let handle = spawn_sweeper(Arc::clone(&store), Duration::from_secs(60));

        tokio::time::sleep(TTL + Duration::from_secs(61)).await;
        assert!(store.is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn concurrent_consumers_see_a_single_winner() {
        let store = Arc::new(store());
        let token = store.issue();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let token = token.clone();
            handles.push(tokio::spawn(async move { store.consume(&token) }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap_or(false) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[test]
    fn odd_lengths_round_to_whole_bytes() {
        assert_eq!(OneTimeTokenStore::new(129, TTL).token_length(), 128);
        assert_eq!(OneTimeTokenStore::new(0, TTL).token_length(), 2);
    }
}
