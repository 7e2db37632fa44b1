// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, their defaults, and the [`ClientConfig`]
//! assembled from them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `API_BASE_URL` | Base URL every endpoint path is resolved against | Required |
//! | `DATA_DIR` | Directory for the session file, keyset and row cache | `./data` |
//! | `REQUEST_TIMEOUT_MS` | Whole-request timeout | `30000` |
//! | `CONNECT_TIMEOUT_MS` | Connection establishment timeout | `15000` |
//! | `TOKEN_TTL_SECS` | Lifetime stamped on newly stored access tokens | `3600` |
//! | `RETRY_MAX_ATTEMPTS` | Attempts for idempotent reads | `3` |
//! | `RETRY_BASE_DELAY_MS` | Linear backoff unit between attempts | `1000` |
//! | `PAGE_SIZE` | Items per page for list screens | `20` |
//! | `PROBE_INTERVAL_SECS` | Reachability probe period | `10` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use crate::logging::LogFormat;
use crate::network::client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use crate::network::connectivity::DEFAULT_PROBE_INTERVAL;
use crate::network::RetryPolicy;
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::storage::paths::DATA_ROOT;
use crate::storage::DEFAULT_TOKEN_TTL;

/// Environment variable name for the API base URL.
pub const API_BASE_URL_ENV: &str = "API_BASE_URL";

/// Environment variable name for the local data directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const REQUEST_TIMEOUT_MS_ENV: &str = "REQUEST_TIMEOUT_MS";
pub const CONNECT_TIMEOUT_MS_ENV: &str = "CONNECT_TIMEOUT_MS";
pub const TOKEN_TTL_SECS_ENV: &str = "TOKEN_TTL_SECS";
pub const RETRY_MAX_ATTEMPTS_ENV: &str = "RETRY_MAX_ATTEMPTS";
pub const RETRY_BASE_DELAY_MS_ENV: &str = "RETRY_BASE_DELAY_MS";
pub const PAGE_SIZE_ENV: &str = "PAGE_SIZE";
pub const PROBE_INTERVAL_SECS_ENV: &str = "PROBE_INTERVAL_SECS";

/// Environment variable name for the log output format.
///
/// # Values
/// `json` for machine-readable lines, anything else for human-readable output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Everything the data layer needs to start.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub token_ttl: Duration,
    pub retry: RetryPolicy,
    pub page_size: u32,
    pub probe_interval: Duration,
    pub log_format: LogFormat,
}

impl ClientConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup(API_BASE_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(API_BASE_URL_ENV))?;
        if url::Url::parse(&api_base_url).is_err() {
            return Err(ConfigError::Invalid {
                name: API_BASE_URL_ENV,
                value: api_base_url,
            });
        }

        let data_dir = lookup(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DATA_ROOT));

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy::new(
            parse_or(&lookup, RETRY_MAX_ATTEMPTS_ENV, retry_defaults.max_attempts)?,
            millis_or(&lookup, RETRY_BASE_DELAY_MS_ENV, retry_defaults.base_delay)?,
        );

        let page_size = parse_or(&lookup, PAGE_SIZE_ENV, DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::Invalid {
                name: PAGE_SIZE_ENV,
                value: page_size.to_string(),
            });
        }

        Ok(Self {
            api_base_url,
            data_dir,
            request_timeout: millis_or(&lookup, REQUEST_TIMEOUT_MS_ENV, DEFAULT_REQUEST_TIMEOUT)?,
            connect_timeout: millis_or(&lookup, CONNECT_TIMEOUT_MS_ENV, DEFAULT_CONNECT_TIMEOUT)?,
            token_ttl: secs_or(&lookup, TOKEN_TTL_SECS_ENV, DEFAULT_TOKEN_TTL)?,
            retry,
            page_size,
            probe_interval: secs_or(&lookup, PROBE_INTERVAL_SECS_ENV, DEFAULT_PROBE_INTERVAL)?,
            log_format: lookup(LOG_FORMAT_ENV)
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn millis_or<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(_) => parse_or(lookup, name, 0u64).map(Duration::from_millis),
    }
}

fn secs_or<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(_) => parse_or(lookup, name, 0u64).map(Duration::from_secs),
    }
}
