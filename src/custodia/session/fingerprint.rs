//! Coarse browser fingerprint derived from request headers.
//!
//! Only the browser family with its major version, the OS family and the raw
//! `Accept-Language` value take part, so minor header noise (patch versions,
//! platform build numbers) does not break a session while a different
//! browser or device does.

use axum::http::{
    header::{ACCEPT_LANGUAGE, USER_AGENT},
    HeaderMap,
};
use once_cell::sync::Lazy;
use regex::Regex;

const UNKNOWN_BROWSER: &str = "Unknown";
const UNKNOWN_OS: &str = "Unknown";
const UNKNOWN_LANGUAGE: &str = "unknown";

// Order matters: Edge and Opera also advertise Chrome, Chrome also advertises Safari.
static BROWSERS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("Edge", r"Edg(?:e|A|iOS)?/(\d+)"),
        ("Opera", r"(?:OPR|Opera)/(\d+)"),
        ("Firefox", r"(?:Firefox|FxiOS)/(\d+)"),
        ("Chrome", r"(?:Chrome|CriOS)/(\d+)"),
        ("Safari", r"Version/(\d+)[^ ]*.*Safari/"),
    ]
    .into_iter()
    .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|regex| (name, regex)))
    .collect()
});

const OS_PROBES: &[(&[&str], &str)] = &[
    (&["Windows"], "Windows"),
    (&["Android"], "Android"),
    (&["iPhone", "iPad", "iPod"], "iOS"),
    (&["Mac OS X", "Macintosh"], "macOS"),
    (&["CrOS"], "ChromeOS"),
    (&["Linux"], "Linux"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive a fingerprint from a user agent and an optional `Accept-Language`.
    #[must_use]
    pub fn extract(user_agent: &str, accept_language: Option<&str>) -> Self {
        let language = accept_language
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(UNKNOWN_LANGUAGE);

        Self(format!(
            "{}|{}|{}",
            browser(user_agent),
            os_family(user_agent),
            language
        ))
    }

    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let accept_language = headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok());
        Self::extract(user_agent, accept_language)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn browser(user_agent: &str) -> String {
    BROWSERS
        .iter()
        .find_map(|(name, regex)| {
            regex
                .captures(user_agent)
                .and_then(|captures| captures.get(1))
                .map(|version| format!("{name} {}", version.as_str()))
        })
        .unwrap_or_else(|| UNKNOWN_BROWSER.to_string())
}

fn os_family(user_agent: &str) -> &'static str {
    OS_PROBES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| user_agent.contains(needle)))
        .map_or(UNKNOWN_OS, |(_, family)| *family)
}
