//! Configuration layer: typed settings with layered precedence (file → env).

use std::{num::NonZeroUsize, path::Path, str::FromStr};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{
    CacheConfiguration, CacheLength, CacheOptions, DEFAULT_LENGTH_MINUTES, StoreErrorPolicy,
};

const LOCAL_CONFIG_BASENAME: &str = "query_remember";
const ENV_PREFIX: &str = "QUERY_REMEMBER";
const DEFAULT_STORE: &str = "memory";
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub default_store: String,
    pub length: CacheLength,
    pub capacity: NonZeroUsize,
    pub tagging: bool,
    pub single_flight: bool,
    pub on_store_error: StoreErrorPolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_store: DEFAULT_STORE.to_string(),
            length: CacheLength::DEFAULT,
            capacity: NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            tagging: true,
            single_flight: true,
            on_store_error: StoreErrorPolicy::default(),
        }
    }
}

impl CacheSettings {
    pub fn options(&self) -> CacheOptions {
        CacheOptions {
            single_flight: self.single_flight,
            on_store_error: self.on_store_error,
        }
    }

    /// Configuration for a cache on the default store with the configured length.
    pub fn configuration(&self) -> CacheConfiguration {
        CacheConfiguration::new(None, self.length)
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment).
///
/// `query_remember.{toml,yaml,json}` in the working directory is read when
/// present; `config_file` must exist when given. Environment variables use
/// the `QUERY_REMEMBER__` prefix with `__` between sections, e.g.
/// `QUERY_REMEMBER__CACHE__LENGTH_MINUTES=5`.
pub fn load(config_file: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder =
        Config::builder().add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    cache: RawCacheSettings,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    default_store: Option<String>,
    length_minutes: Option<i64>,
    capacity: Option<u64>,
    tagging: Option<bool>,
    single_flight: Option<bool>,
    on_store_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { cache, logging } = raw;

        let cache = build_cache_settings(cache)?;
        let logging = build_logging_settings(logging)?;

        Ok(Self { cache, logging })
    }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let default_store = cache
        .default_store
        .unwrap_or_else(|| DEFAULT_STORE.to_string());
    if default_store.trim().is_empty() {
        return Err(LoadError::invalid(
            "cache.default_store",
            "store name must not be empty",
        ));
    }

    let length_minutes = cache
        .length_minutes
        .unwrap_or(DEFAULT_LENGTH_MINUTES as i64);
    let length = CacheLength::minutes(length_minutes)
        .map_err(|_| LoadError::invalid("cache.length_minutes", "must not be negative"))?;

    let capacity = non_zero_usize(
        cache.capacity.unwrap_or(DEFAULT_CAPACITY as u64),
        "cache.capacity",
    )?;

    let on_store_error = match cache.on_store_error {
        Some(policy) => StoreErrorPolicy::from_str(&policy)
            .map_err(|reason| LoadError::invalid("cache.on_store_error", reason))?,
        None => StoreErrorPolicy::default(),
    };

    Ok(CacheSettings {
        default_store,
        length,
        capacity,
        tagging: cache.tagging.unwrap_or(true),
        single_flight: cache.single_flight.unwrap_or(true),
        on_store_error,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value = usize::try_from(value)
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;
