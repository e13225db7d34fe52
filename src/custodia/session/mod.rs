//! Stateless session core: incarnation fencing, browser fingerprints, the
//! encrypted cookie envelope and payload validation.

pub mod codec;
pub mod cookies;
pub mod fingerprint;
pub mod incarnation;
pub mod validator;

pub use codec::{SessionCodec, SessionPayload};
pub use fingerprint::Fingerprint;
pub use incarnation::IncarnationId;
pub use validator::{InvalidReason, SessionValidator};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in unix milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
