//! Client configuration.
//!
//! # Design
//! A `ClientConfig` is built once and then shared read-only (behind an
//! `Arc`) by every request a client issues. Two clients with different
//! tokens never observe each other's settings.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://api.wikitude.com";
pub const DEFAULT_API_VERSION: u32 = 2;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Certificate validation policy applied by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsPolicy {
    #[default]
    Verify,
    /// Skip certificate validation entirely. Only meant for hosts whose
    /// authority is missing from the local store.
    AcceptInvalidCerts,
}

/// Bound applied to the poll loop of a long-running operation.
///
/// Both limits are optional; with neither set the loop only ends when the
/// service reports completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct PollLimit {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default, rename = "max_duration_ms", deserialize_with = "millis_opt")]
    pub max_duration: Option<Duration>,
}

impl PollLimit {
    pub const UNBOUNDED: PollLimit = PollLimit {
        max_attempts: None,
        max_duration: None,
    };

    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            max_duration: None,
        }
    }

    pub fn duration(max_duration: Duration) -> Self {
        Self {
            max_attempts: None,
            max_duration: Some(max_duration),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none() && self.max_duration.is_none()
    }

    /// A bound of zero attempts could never let an operation complete.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.max_attempts == Some(0) {
            return Err(ApiError::InvalidConfig("max poll attempts must be positive".to_string()));
        }
        Ok(())
    }
}

fn millis_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_version() -> u32 {
    DEFAULT_API_VERSION
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Immutable settings owned by one client instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub token: String,
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub tls: TlsPolicy,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub poll_limit: PollLimit,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>, api_version: u32) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            api_version,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            tls: TlsPolicy::default(),
            request_timeout_ms: None,
            poll_limit: PollLimit::UNBOUNDED,
        }
    }

    /// Read the configuration from `TARGETS_*` environment variables.
    ///
    /// `TARGETS_API_TOKEN` is required; everything else falls back to the
    /// defaults used by `ClientConfig::new`.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let token = lookup("TARGETS_API_TOKEN")
            .ok_or_else(|| ApiError::InvalidConfig("TARGETS_API_TOKEN is not set".to_string()))?;
        let api_version = match lookup("TARGETS_API_VERSION") {
            Some(v) => parse_number("TARGETS_API_VERSION", &v)?,
            None => DEFAULT_API_VERSION,
        };

        let mut config = Self::new(token, api_version);
        if let Some(url) = lookup("TARGETS_API_URL") {
            config = config.with_base_url(&url);
        }
        if let Some(ms) = lookup("TARGETS_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_number("TARGETS_POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(flag) = lookup("TARGETS_ACCEPT_INVALID_CERTS") {
            if matches!(flag.trim(), "1" | "true" | "yes") {
                config.tls = TlsPolicy::AcceptInvalidCerts;
            }
        }
        if let Some(n) = lookup("TARGETS_MAX_POLL_ATTEMPTS") {
            config.poll_limit.max_attempts = Some(parse_number("TARGETS_MAX_POLL_ATTEMPTS", &n)?);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_tls(mut self, tls: TlsPolicy) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_poll_limit(mut self, limit: PollLimit) -> Self {
        self.poll_limit = limit;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.token.trim().is_empty() {
            return Err(ApiError::InvalidConfig("token must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ApiError::InvalidConfig("poll interval must be positive".to_string()));
        }
        if self.base_url.is_empty() {
            return Err(ApiError::InvalidConfig("base url must not be empty".to_string()));
        }
        self.poll_limit.validate()
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::InvalidConfig(format!("{key} is not a valid number: {value:?}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::new("token", 2);
        assert_eq!(config.poll_interval(), Duration::from_millis(10_000));
        assert_eq!(config.base_url, "https://api.wikitude.com");
        assert_eq!(config.tls, TlsPolicy::Verify);
        assert!(config.poll_limit.is_unbounded());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let config = ClientConfig::new("token", 2).with_base_url("http://localhost:3000/");
        assert_eq!(config.base_url, "http://localhost:3000");
    }

    #[test]
    fn from_env_reads_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TARGETS_API_TOKEN", "abc"),
            ("TARGETS_API_VERSION", "3"),
            ("TARGETS_API_URL", "http://127.0.0.1:9000/"),
            ("TARGETS_POLL_INTERVAL_MS", "250"),
            ("TARGETS_ACCEPT_INVALID_CERTS", "true"),
            ("TARGETS_MAX_POLL_ATTEMPTS", "12"),
        ]))
        .unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.api_version, 3);
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.tls, TlsPolicy::AcceptInvalidCerts);
        assert_eq!(config.poll_limit.max_attempts, Some(12));
    }

    #[test]
    fn from_env_requires_token() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ApiError::InvalidConfig(_)));
    }

    #[test]
    fn from_env_rejects_garbage_numbers() {
        let err = ClientConfig::from_lookup(lookup(&[
            ("TARGETS_API_TOKEN", "abc"),
            ("TARGETS_POLL_INTERVAL_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidConfig(_)));
    }

    #[test]
    fn zero_poll_interval_is_invalid() {
        let config = ClientConfig::new("token", 2).with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_poll_attempts_are_invalid() {
        let config = ClientConfig::new("token", 2).with_poll_limit(PollLimit::attempts(0));
        assert!(matches!(config.validate(), Err(ApiError::InvalidConfig(_))));
        let err = ClientConfig::from_lookup(lookup(&[
            ("TARGETS_API_TOKEN", "abc"),
            ("TARGETS_MAX_POLL_ATTEMPTS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidConfig(_)));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"token":"t","tls":"accept_invalid_certs","poll_limit":{"max_duration_ms":60000}}"#,
        )
        .unwrap();
        assert_eq!(config.api_version, 2);
        assert_eq!(config.poll_interval_ms, 10_000);
        assert_eq!(config.tls, TlsPolicy::AcceptInvalidCerts);
        assert_eq!(config.poll_limit.max_duration, Some(Duration::from_secs(60)));
        assert!(config.poll_limit.max_attempts.is_none());
    }
}
