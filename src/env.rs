//! Environment variable names used by this crate for convenient
//! configuration of the Loggly sink from microservices.
//!
//! These are purely helpers; [`LogglyConfig::from_env`] is the only
//! consumer and the sink itself never reads the environment.
//!
//! [`LogglyConfig::from_env`]: crate::config::LogglyConfig::from_env

/// Loggly customer token. Required.
pub const LOGGLY_API_KEY_ENV: &str = "LOGGLY_API_KEY";

/// Comma-separated tags attached to every bulk upload.
pub const LOGGLY_TAGS_ENV: &str = "LOGGLY_TAGS";

/// Bulk endpoint host, or a full `http(s)://` base URL.
pub const LOGGLY_HOST_ENV: &str = "LOGGLY_HOST";

/// `true`/`1` to append a diagnostics record to the last chunk of a batch.
pub const LOGGLY_INCLUDE_DIAGNOSTICS_ENV: &str = "LOGGLY_INCLUDE_DIAGNOSTICS";

/// Bulk ceiling in bytes.
pub const LOGGLY_MAX_BULK_BYTES_ENV: &str = "LOGGLY_MAX_BULK_BYTES";
