use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;

use crate::store::{RedisSettings, DEFAULT_STORE_TIMEOUT};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: Option<String>,
    pub logger_chat_id: Option<i64>,
    pub log_level: LevelFilter,
    pub vk_token: Option<String>,
    pub vk_group_id: Option<u64>,
    pub redis: RedisSettings,
    pub session_namespace: Option<String>,
    pub store_timeout: Duration,
    pub quiz_file_encoding: String,
}

impl Config {
    /// Reads the process environment. Call `dotenv()` first to pick up a
    /// `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let log_level = match var("LOG_LEVEL") {
            Some(level) => parse_log_level(&level)?,
            None => LevelFilter::Info,
        };
        let ttl = parse_var::<u64>("SESSION_TTL_SECS", var("SESSION_TTL_SECS"))?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            telegram_token: var("TELEGRAM_BOT_TOKEN"),
            logger_chat_id: parse_var("LOGGER_CHAT_ID", var("LOGGER_CHAT_ID"))?,
            log_level,
            vk_token: var("VK_TOKEN"),
            vk_group_id: parse_var("VK_GROUP_ID", var("VK_GROUP_ID"))?,
            redis: RedisSettings {
                host: var("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_var("DB_PORT", var("DB_PORT"))?.unwrap_or(6379),
                password: var("DB_PASSWD"),
                ttl,
            },
            session_namespace: var("SESSION_NAMESPACE"),
            store_timeout: parse_var::<u64>("STORE_TIMEOUT_MS", var("STORE_TIMEOUT_MS"))?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_STORE_TIMEOUT),
            quiz_file_encoding: var("QUIZ_FILE_ENCODING").unwrap_or_else(|| "koi8-r".to_string()),
        })
    }

    pub fn require_telegram_token(&self) -> Result<&str, ConfigError> {
        self.telegram_token
            .as_deref()
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))
    }

    pub fn require_vk(&self) -> Result<(&str, u64), ConfigError> {
        let token = self
            .vk_token
            .as_deref()
            .ok_or(ConfigError::Missing("VK_TOKEN"))?;
        let group_id = self.vk_group_id.ok_or(ConfigError::Missing("VK_GROUP_ID"))?;
        Ok((token, group_id))
    }
}

fn parse_var<T>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|value| {
            value.parse().map_err(|err: T::Err| ConfigError::Invalid {
                var: name,
                reason: err.to_string(),
                value,
            })
        })
        .transpose()
}

/// Accepts the level names `debug`, `info`, `warning` and `error`.
fn parse_log_level(level: &str) -> Result<LevelFilter, ConfigError> {
    match level.to_lowercase().as_str() {
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warning" | "warn" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        _ => Err(ConfigError::Invalid {
            var: "LOG_LEVEL",
            value: level.to_string(),
            reason: "expected one of debug, info, warning, error".to_string(),
        }),
    }
}
