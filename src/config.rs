//! Client configuration parsed from environment variables.
//!
//! All knobs have defaults except the storage bucket credentials; avatar
//! upload is disabled when those are absent. Parsing goes through a lookup
//! function so tests can feed a map instead of mutating the process env.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_POLL_MAX_RETRIES: u32 = 3;
pub const DEFAULT_POLL_RETRY_BASE_MS: u64 = 500;
pub const DEFAULT_POLL_RETRY_MAX_MS: u64 = 8000;
/// Shortest wait the poller accepts between fetches.
pub const MIN_POLL_DELAY: Duration = Duration::from_millis(10);
pub const DEFAULT_AVATAR_BUCKET: &str = "avatars";

/// Errors produced while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    /// No session file path was given and no per-user config dir exists.
    #[error("cannot determine session file location; set DENTALSCOPE_SESSION_FILE")]
    NoSessionPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Timing for the diagnosis poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between a non-terminal response and the next fetch.
    pub interval: Duration,
    /// Consecutive failed fetches tolerated before the poll gives up.
    pub max_retries: u32,
    /// First retry delay; doubles per attempt.
    pub retry_base: Duration,
    /// Upper bound on a single retry delay.
    pub retry_max: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_retries: DEFAULT_POLL_MAX_RETRIES,
            retry_base: Duration::from_millis(DEFAULT_POLL_RETRY_BASE_MS),
            retry_max: Duration::from_millis(DEFAULT_POLL_RETRY_MAX_MS),
        }
    }
}

impl PollConfig {
    /// Raise every wait to at least [`MIN_POLL_DELAY`] and keep
    /// `retry_max >= retry_base`, so a poll always sleeps between fetches.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let retry_base = self.retry_base.max(MIN_POLL_DELAY);
        Self {
            interval: self.interval.max(MIN_POLL_DELAY),
            max_retries: self.max_retries,
            retry_base,
            retry_max: self.retry_max.max(retry_base),
        }
    }
}

/// Avatar bucket credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub url: String,
    pub key: String,
    pub bucket: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeouts: HttpTimeouts,
    pub poll: PollConfig,
    pub storage: Option<StorageConfig>,
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            timeouts: HttpTimeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            poll: PollConfig::default(),
            storage: None,
            session_file: None,
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `DENTALSCOPE_API_URL`: backend base URL, default `http://127.0.0.1:8000/api`
    /// - `DENTALSCOPE_REQUEST_TIMEOUT_SECS` / `DENTALSCOPE_CONNECT_TIMEOUT_SECS`
    /// - `DENTALSCOPE_POLL_INTERVAL_MS`: default 2000
    /// - `DENTALSCOPE_POLL_MAX_RETRIES`, `DENTALSCOPE_POLL_RETRY_BASE_MS`, `DENTALSCOPE_POLL_RETRY_MAX_MS`
    /// - `DENTALSCOPE_STORAGE_URL` + `DENTALSCOPE_STORAGE_KEY`: enables avatar upload
    /// - `DENTALSCOPE_AVATAR_BUCKET`: default `avatars`
    /// - `DENTALSCOPE_SESSION_FILE`: where the login token is persisted
    ///
    /// # Errors
    ///
    /// Returns an error if any set variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if any present value fails to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = parse_api_url(lookup("DENTALSCOPE_API_URL").as_deref())?;
        let timeouts = HttpTimeouts {
            request_secs: parse_or(&lookup, "DENTALSCOPE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_or(&lookup, "DENTALSCOPE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        let interval_ms = parse_or(&lookup, "DENTALSCOPE_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        if interval_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "DENTALSCOPE_POLL_INTERVAL_MS",
                reason: "must be greater than zero".to_owned(),
            });
        }
        let poll = PollConfig {
            interval: Duration::from_millis(interval_ms),
            max_retries: parse_or(&lookup, "DENTALSCOPE_POLL_MAX_RETRIES", DEFAULT_POLL_MAX_RETRIES)?,
            retry_base: Duration::from_millis(parse_or(
                &lookup,
                "DENTALSCOPE_POLL_RETRY_BASE_MS",
                DEFAULT_POLL_RETRY_BASE_MS,
            )?),
            retry_max: Duration::from_millis(parse_or(
                &lookup,
                "DENTALSCOPE_POLL_RETRY_MAX_MS",
                DEFAULT_POLL_RETRY_MAX_MS,
            )?),
        };

        let storage = match (non_empty(&lookup, "DENTALSCOPE_STORAGE_URL"), non_empty(&lookup, "DENTALSCOPE_STORAGE_KEY")) {
            (Some(url), Some(key)) => Some(StorageConfig {
                url: url.trim_end_matches('/').to_owned(),
                key,
                bucket: non_empty(&lookup, "DENTALSCOPE_AVATAR_BUCKET")
                    .unwrap_or_else(|| DEFAULT_AVATAR_BUCKET.to_owned()),
            }),
            _ => None,
        };

        let session_file = non_empty(&lookup, "DENTALSCOPE_SESSION_FILE").map(PathBuf::from);

        Ok(Self { api_url, timeouts, poll, storage, session_file })
    }

    /// Resolve where the session token lives: explicit path first, then the
    /// per-user config directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoSessionPath`] when neither is available.
    pub fn session_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.session_file {
            return Ok(path.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join("dentalscope").join("session.json"))
            .ok_or(ConfigError::NoSessionPath)
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::Invalid { var: key, reason: format!("{raw:?}: {e}") }),
    }
}

fn parse_api_url(raw: Option<&str>) -> Result<String, ConfigError> {
    let url = raw.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(DEFAULT_API_URL);
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            var: "DENTALSCOPE_API_URL",
            reason: format!("{url:?} must start with http:// or https://"),
        });
    }
    Ok(url.trim_end_matches('/').to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
