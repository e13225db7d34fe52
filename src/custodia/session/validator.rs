//! Structural checks on a decrypted session payload.

use std::time::Duration;

use super::{fingerprint::Fingerprint, incarnation::IncarnationId, SessionPayload};

/// Why a decrypted payload was refused. Checked in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidReason {
    ServerRestart,
    InvalidTimestamp,
    Expired,
    FingerprintMismatch,
}

impl InvalidReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServerRestart => "SERVER_RESTART",
            Self::InvalidTimestamp => "INVALID_TIMESTAMP",
            Self::Expired => "EXPIRED",
            Self::FingerprintMismatch => "FINGERPRINT_MISMATCH",
        }
    }
}

pub struct SessionValidator<'a> {
    incarnation: &'a IncarnationId,
    max_age: Duration,
}

impl<'a> SessionValidator<'a> {
    #[must_use]
    pub fn new(incarnation: &'a IncarnationId, max_age: Duration) -> Self {
        Self {
            incarnation,
            max_age,
        }
    }

    /// Validate against an explicit `now` in unix milliseconds.
    ///
    /// # Errors
    /// Returns the first failing check.
    pub fn validate_at(
        &self,
        payload: &SessionPayload,
        fingerprint: &Fingerprint,
        now: i64,
    ) -> Result<(), InvalidReason> {
        if !self.incarnation.matches(&payload.incarnation_id) {
            return Err(InvalidReason::ServerRestart);
        }

        let age = now.saturating_sub(payload.issued_at);
        if age < 0 {
            return Err(InvalidReason::InvalidTimestamp);
        }
        if age > self.max_age_millis() {
            return Err(InvalidReason::Expired);
        }

        if payload.fingerprint != fingerprint.as_str() {
            return Err(InvalidReason::FingerprintMismatch);
        }

        Ok(())
    }

    /// Milliseconds of validity left at `now`; negative once expired.
    #[must_use]
    pub fn remaining_millis(&self, payload: &SessionPayload, now: i64) -> i64 {
        self.max_age_millis()
            .saturating_sub(now.saturating_sub(payload.issued_at))
    }

    fn max_age_millis(&self) -> i64 {
        i64::try_from(self.max_age.as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;
    const UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.6099.109 Safari/537.36";

    fn fingerprint() -> Fingerprint {
        Fingerprint::extract(UA, Some("en-US"))
    }

    fn payload(incarnation: &IncarnationId, issued_at: i64) -> SessionPayload {
        SessionPayload {
            username: "admin".to_string(),
            user_id: 1,
            password_hash: "hash".to_string(),
            incarnation_id: incarnation.as_str().to_string(),
            issued_at,
            fingerprint: fingerprint().as_str().to_string(),
        }
    }

    fn validator(incarnation: &IncarnationId) -> SessionValidator<'_> {
        SessionValidator::new(incarnation, Duration::from_secs(300))
    }

    #[test]
    fn fresh_payload_is_valid() {
        let incarnation = IncarnationId::generate();
        let result = validator(&incarnation).validate_at(&payload(&incarnation, NOW), &fingerprint(), NOW);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn freshness_boundary() {
        let incarnation = IncarnationId::generate();
        let validator = validator(&incarnation);

        let stale = payload(&incarnation, NOW - 301_000);
        assert_eq!(
            validator.validate_at(&stale, &fingerprint(), NOW),
            Err(InvalidReason::Expired)
        );

        let nearly = payload(&incarnation, NOW - 299_000);
        assert_eq!(validator.validate_at(&nearly, &fingerprint(), NOW), Ok(()));

        let exact = payload(&incarnation, NOW - 300_000);
        assert_eq!(validator.validate_at(&exact, &fingerprint(), NOW), Ok(()));
    }

    #[test]
    fn future_timestamp_is_invalid() {
        let incarnation = IncarnationId::generate();
        let future = payload(&incarnation, NOW + 1);
        assert_eq!(
            validator(&incarnation).validate_at(&future, &fingerprint(), NOW),
            Err(InvalidReason::InvalidTimestamp)
        );
    }

    #[test]
    fn foreign_incarnation_never_validates() {
        let current = IncarnationId::generate();
        let previous = IncarnationId::generate();
        let validator = validator(&current);

        // Otherwise identical payloads: only the incarnation differs.
        let ours = payload(&current, NOW);
        let theirs = payload(&previous, NOW);
        assert_eq!(validator.validate_at(&ours, &fingerprint(), NOW), Ok(()));
        assert_eq!(
            validator.validate_at(&theirs, &fingerprint(), NOW),
            Err(InvalidReason::ServerRestart)
        );
    }

    #[test]
    fn incarnation_is_checked_before_freshness() {
        let current = IncarnationId::generate();
        let previous = IncarnationId::generate();
        let stale = payload(&previous, NOW - 3_600_000);
        assert_eq!(
            validator(&current).validate_at(&stale, &fingerprint(), NOW),
            Err(InvalidReason::ServerRestart)
        );
    }

    #[test]
    fn fingerprint_major_version_change_is_rejected() {
        let incarnation = IncarnationId::generate();
        let upgraded = Fingerprint::extract(&UA.replace("Chrome/120", "Chrome/121"), Some("en-US"));
        assert_eq!(
            validator(&incarnation).validate_at(&payload(&incarnation, NOW), &upgraded, NOW),
            Err(InvalidReason::FingerprintMismatch)
        );
    }

    #[test]
    fn unchanged_fingerprint_across_requests() {
        let incarnation = IncarnationId::generate();
        let validator = validator(&incarnation);
        let session = payload(&incarnation, NOW);
        for offset in [0, 1_000, 60_000, 299_000] {
            let fresh = Fingerprint::extract(UA, Some("en-US"));
            assert_eq!(validator.validate_at(&session, &fresh, NOW + offset), Ok(()));
        }
    }

    #[test]
    fn remaining_validity() {
        let incarnation = IncarnationId::generate();
        let validator = validator(&incarnation);
        let session = payload(&incarnation, NOW - 200_000);
        assert_eq!(validator.remaining_millis(&session, NOW), 100_000);
    }

    #[test]
    fn reason_codes() {
        assert_eq!(InvalidReason::ServerRestart.as_str(), "SERVER_RESTART");
        assert_eq!(InvalidReason::InvalidTimestamp.as_str(), "INVALID_TIMESTAMP");
        assert_eq!(InvalidReason::Expired.as_str(), "EXPIRED");
        assert_eq!(InvalidReason::FingerprintMismatch.as_str(), "FINGERPRINT_MISMATCH");
    }
}
