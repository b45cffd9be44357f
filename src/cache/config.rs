//! Cache length and per-cache policy.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::QueryCacheError;

/// Length used when caching is enabled without an explicit duration.
pub const DEFAULT_LENGTH_MINUTES: u64 = 30;
/// "Forever": ten years, in minutes.
pub const FOREVER_MINUTES: u64 = 60 * 24 * 365 * 10;

/// How long a result stays cached, in whole minutes. Zero disables caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheLength(u64);

impl CacheLength {
    pub const DISABLED: Self = Self(0);
    pub const DEFAULT: Self = Self(DEFAULT_LENGTH_MINUTES);
    /// Ten years. This is a bounded stand-in for "never expires", not an
    /// unbounded sentinel; entries written with it do expire eventually.
    pub const FOREVER: Self = Self(FOREVER_MINUTES);

    /// Validate a caller-supplied length. Negative values are rejected.
    pub fn minutes(minutes: i64) -> Result<Self, QueryCacheError> {
        u64::try_from(minutes).map(Self).map_err(|_| {
            QueryCacheError::configuration(
                "length",
                format!("cache length must not be negative, got {minutes}"),
            )
        })
    }

    pub fn as_minutes(self) -> u64 {
        self.0
    }

    pub fn is_enabled(self) -> bool {
        self.0 != 0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.0.saturating_mul(60))
    }
}

impl Default for CacheLength {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for CacheLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

/// Store selection and length owned by a single [`QueryCache`](super::QueryCache).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfiguration {
    /// Named store; `None` resolves the registry default.
    pub store: Option<String>,
    pub length: CacheLength,
}

impl CacheConfiguration {
    pub fn new(store: Option<String>, length: CacheLength) -> Self {
        Self { store, length }
    }
}

/// What to do when the backing store fails during a read-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreErrorPolicy {
    /// Surface the failure to the caller.
    #[default]
    Propagate,
    /// Log the failure and run the query directly. Flushes still propagate.
    Bypass,
}

impl FromStr for StoreErrorPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "propagate" => Ok(Self::Propagate),
            "bypass" => Ok(Self::Bypass),
            other => Err(format!(
                "unknown store error policy `{other}` (expected `propagate` or `bypass`)"
            )),
        }
    }
}

/// Behavior switches shared by every cache built from the same settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Serialize recomputation of a missing key across concurrent callers.
    pub single_flight: bool,
    pub on_store_error: StoreErrorPolicy,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            single_flight: true,
            on_store_error: StoreErrorPolicy::Propagate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forever_is_ten_years_of_minutes() {
        assert_eq!(CacheLength::FOREVER.as_minutes(), 5_256_000);
    }

    #[test]
    fn zero_is_disabled() {
        assert!(!CacheLength::DISABLED.is_enabled());
        assert!(CacheLength::minutes(1).expect("valid").is_enabled());
        assert!(CacheLength::default().is_enabled());
    }

    #[test]
    fn negative_length_is_rejected() {
        let err = CacheLength::minutes(-1).expect_err("negative length");
        assert!(err.is_configuration());
    }

    #[test]
    fn duration_saturates_instead_of_overflowing() {
        let huge = CacheLength::minutes(i64::MAX).expect("valid");
        assert_eq!(huge.as_duration(), Duration::from_secs(u64::MAX));
        assert_eq!(
            CacheLength::DEFAULT.as_duration(),
            Duration::from_secs(30 * 60)
        );
    }

    #[test]
    fn store_error_policy_parses() {
        assert_eq!(
            "Bypass".parse::<StoreErrorPolicy>(),
            Ok(StoreErrorPolicy::Bypass)
        );
        assert_eq!(
            " propagate ".parse::<StoreErrorPolicy>(),
            Ok(StoreErrorPolicy::Propagate)
        );
        assert!("retry".parse::<StoreErrorPolicy>().is_err());
    }

    #[test]
    fn default_options_propagate_with_single_flight() {
        let options = CacheOptions::default();
        assert!(options.single_flight);
        assert_eq!(options.on_store_error, StoreErrorPolicy::Propagate);
    }
}
