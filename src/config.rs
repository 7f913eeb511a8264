use std::time::Duration;

use crate::chunk::MAX_BULK_BYTES;
use crate::env::{
    LOGGLY_API_KEY_ENV, LOGGLY_HOST_ENV, LOGGLY_INCLUDE_DIAGNOSTICS_ENV,
    LOGGLY_MAX_BULK_BYTES_ENV, LOGGLY_TAGS_ENV,
};

pub const DEFAULT_HOST: &str = "logs-01.loggly.com";

/// Configuration for [`LogglySink`](crate::loggly::LogglySink).
///
/// **Fields**
/// - `api_key`: customer token placed in the bulk URL.
/// - `tags`: tags attached to every upload, comma-joined in the URL.
/// - `host`: bulk endpoint host. A value that already carries an
///   `http://` or `https://` scheme is used verbatim as the base URL.
/// - `max_bulk_bytes`: soft ceiling for one request body.
/// - `include_diagnostics`: append a `LogglyDiagnostics` record to the last
///   chunk of every batch.
/// - `timeout`: per-request timeout handed to the HTTP client.
#[derive(Clone, Debug)]
pub struct LogglyConfig {
    pub api_key: String,
    pub tags: Vec<String>,
    pub host: String,
    pub max_bulk_bytes: usize,
    pub include_diagnostics: bool,
    pub timeout: Duration,
}

impl LogglyConfig {
    pub fn new(api_key: impl Into<String>, tags: &[&str]) -> Self {
        LogglyConfig {
            api_key: api_key.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            host: DEFAULT_HOST.to_string(),
            max_bulk_bytes: MAX_BULK_BYTES,
            include_diagnostics: false,
            timeout: Duration::from_secs(30),
        }
    }

    /// Full bulk endpoint, `https://<host>/bulk/<key>/tag/<tags>`.
    ///
    /// The key and each tag are percent-encoded; tags are joined by commas.
    pub fn bulk_url(&self) -> String {
        let base = if self.host.starts_with("http://") || self.host.starts_with("https://") {
            self.host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.host)
        };
        let tags: Vec<_> = self.tags.iter().map(|t| urlencoding::encode(t)).collect();
        format!(
            "{}/bulk/{}/tag/{}",
            base,
            urlencoding::encode(&self.api_key),
            tags.join(",")
        )
    }

    /// Build a config from the `LOGGLY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, using the same variable names
    /// as [`LogglyConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(LOGGLY_API_KEY_ENV)
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing(LOGGLY_API_KEY_ENV))?;

        let mut config = LogglyConfig::new(api_key, &[]);
        if let Some(tags) = lookup(LOGGLY_TAGS_ENV) {
            config.tags = split_tags(&tags);
        }
        if let Some(host) = lookup(LOGGLY_HOST_ENV).filter(|h| !h.is_empty()) {
            config.host = host;
        }
        if let Some(raw) = lookup(LOGGLY_INCLUDE_DIAGNOSTICS_ENV) {
            config.include_diagnostics = parse_bool(&raw).ok_or(ConfigError::Invalid {
                key: LOGGLY_INCLUDE_DIAGNOSTICS_ENV,
                value: raw,
            })?;
        }
        if let Some(raw) = lookup(LOGGLY_MAX_BULK_BYTES_ENV) {
            config.max_bulk_bytes = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: LOGGLY_MAX_BULK_BYTES_ENV,
                value: raw.clone(),
            })?;
        }
        Ok(config)
    }
}

/// Parse a DSN of the form `loggly://<key>@<host>/<tag1>,<tag2>`.
///
/// Examples:
/// - "loggly://abc123@logs-01.loggly.com/web,prod"
/// - "loggly://abc123/web" (default host)
pub fn parse_dsn(dsn: &str) -> Result<LogglyConfig, DsnError> {
    const SCHEME: &str = "loggly://";
    if !dsn.to_ascii_lowercase().starts_with(SCHEME) {
        return Err(DsnError::UnknownScheme);
    }
    let rest = &dsn[SCHEME.len()..];
    let (authority, tags) = rest.split_once('/').unwrap_or((rest, ""));
    let (key, host) = match authority.split_once('@') {
        Some((key, host)) => (key, Some(host)),
        None => (authority, None),
    };
    if key.is_empty() {
        return Err(DsnError::MissingApiKey);
    }

    let mut config = LogglyConfig::new(key, &[]);
    config.tags = split_tags(tags);
    if let Some(host) = host.filter(|h| !h.is_empty()) {
        config.host = host.to_string();
    }
    Ok(config)
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme")]
    UnknownScheme,

    #[error("DSN does not carry an API key")]
    MissingApiKey,
}

/// Error type returned when reading configuration from the environment.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
