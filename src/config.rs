use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::application::listener::{BurstPolicy, ListenerConfig};
use crate::application::notification_queue::RetryPolicy;
use crate::application::PlatformSettings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: String, value: String },
}

/// Process settings, read once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub db_pool_size: u32,
    pub host: String,
    pub port: u16,
    /// `None` captures mail in memory instead of relaying it.
    pub mail_relay_url: Option<String>,
    pub mail_relay_timeout: Duration,
    pub listener: ListenerConfig,
    pub feed_poll_interval: Duration,
    pub retry: RetryPolicy,
    /// `None` watches every supplier in the directory.
    pub watch_suppliers: Option<Vec<String>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_pool_size: 10,
            host: "0.0.0.0".to_string(),
            port: 8080,
            mail_relay_url: None,
            mail_relay_timeout: Duration::from_secs(10),
            listener: ListenerConfig::default(),
            feed_poll_interval: Duration::from_millis(500),
            retry: RetryPolicy::default(),
            watch_suppliers: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; unset and blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            database_url: get("DATABASE_URL"),
            db_pool_size: parse_or(get("DB_POOL_SIZE"), "DB_POOL_SIZE", defaults.db_pool_size)?,
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(get("PORT"), "PORT", defaults.port)?,
            mail_relay_url: get("MAIL_RELAY_URL"),
            mail_relay_timeout: Duration::from_secs(parse_or(
                get("MAIL_RELAY_TIMEOUT_SECS"),
                "MAIL_RELAY_TIMEOUT_SECS",
                defaults.mail_relay_timeout.as_secs(),
            )?),
            listener: ListenerConfig {
                cooldown: millis_or(get("NOTIFY_COOLDOWN_MS"), "NOTIFY_COOLDOWN_MS", defaults.listener.cooldown)?,
                burst_policy: parse_or(
                    get("NOTIFY_BURST_POLICY"),
                    "NOTIFY_BURST_POLICY",
                    BurstPolicy::default(),
                )?,
            },
            feed_poll_interval: millis_or(
                get("FEED_POLL_INTERVAL_MS"),
                "FEED_POLL_INTERVAL_MS",
                defaults.feed_poll_interval,
            )?,
            retry: RetryPolicy {
                max_attempts: parse_or(
                    get("NOTIFY_MAX_ATTEMPTS"),
                    "NOTIFY_MAX_ATTEMPTS",
                    defaults.retry.max_attempts,
                )?
                .max(1),
                initial_delay: millis_or(
                    get("NOTIFY_RETRY_DELAY_MS"),
                    "NOTIFY_RETRY_DELAY_MS",
                    defaults.retry.initial_delay,
                )?,
            },
            watch_suppliers: get("WATCH_SUPPLIERS").map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
        })
    }

    pub fn platform_settings(&self) -> PlatformSettings {
        PlatformSettings {
            listener: self.listener.clone(),
            retry: self.retry.clone(),
            ..PlatformSettings::default()
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, name: &str, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name: name.to_string(),
            value,
        }),
    }
}

fn millis_or(value: Option<String>, name: &str, default: Duration) -> Result<Duration, ConfigError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(value, name, default_ms).map(Duration::from_millis)
}
