//! Controller and server configuration.

use crate::error::{Error, Result};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on a single controller operation against the store.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default plausible model-year range for registered cars.
pub const DEFAULT_YEAR_RANGE: RangeInclusive<i32> = 1900..=2030;

/// Per-controller settings.
///
/// # Example
///
/// ```
/// use repair_kit::config::ControllerConfig;
/// use std::time::Duration;
///
/// let config = ControllerConfig::default()
///     .with_store_timeout(Duration::from_millis(250))
///     .with_year_range(1950, 2026);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Upper bound for one operation, transaction included.
    ///
    /// On expiry the transaction is rolled back and the caller gets
    /// `Error::StoreError`.
    pub store_timeout: Duration,

    min_year: i32,
    max_year: i32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            min_year: *DEFAULT_YEAR_RANGE.start(),
            max_year: *DEFAULT_YEAR_RANGE.end(),
        }
    }
}

impl ControllerConfig {
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_year_range(mut self, min_year: i32, max_year: i32) -> Self {
        self.min_year = min_year;
        self.max_year = max_year;
        self
    }

    pub fn year_range(&self) -> RangeInclusive<i32> {
        self.min_year..=self.max_year
    }

    /// Reject settings that would make every operation fail.
    pub fn validate(&self) -> Result<()> {
        if self.store_timeout.is_zero() {
            return Err(Error::ConfigError(
                "store timeout must be greater than zero".to_string(),
            ));
        }
        if self.min_year > self.max_year {
            return Err(Error::ConfigError(format!(
                "year range is empty: {}..={}",
                self.min_year, self.max_year
            )));
        }
        Ok(())
    }
}

/// Settings for the server binary, read from the environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Snapshot file for durable storage; `None` keeps everything in memory.
    pub snapshot_path: Option<PathBuf>,
    pub controller: ControllerConfig,
}

impl ServerConfig {
    /// Read `REPAIR_KIT_*` variables, falling back to defaults.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `REPAIR_KIT_BIND` | `127.0.0.1:8000` |
    /// | `REPAIR_KIT_SNAPSHOT` | unset (memory only) |
    /// | `REPAIR_KIT_STORE_TIMEOUT_MS` | `5000` |
    /// | `REPAIR_KIT_MIN_YEAR` | `1900` |
    /// | `REPAIR_KIT_MAX_YEAR` | `2030` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ControllerConfig::default();

        let timeout_ms = parse_var(&lookup, "REPAIR_KIT_STORE_TIMEOUT_MS")?
            .unwrap_or(defaults.store_timeout.as_millis() as u64);
        let min_year = parse_var(&lookup, "REPAIR_KIT_MIN_YEAR")?.unwrap_or(defaults.min_year);
        let max_year = parse_var(&lookup, "REPAIR_KIT_MAX_YEAR")?.unwrap_or(defaults.max_year);

        let controller = defaults
            .with_store_timeout(Duration::from_millis(timeout_ms))
            .with_year_range(min_year, max_year);
        controller.validate()?;

        Ok(ServerConfig {
            bind_address: lookup("REPAIR_KIT_BIND")
                .unwrap_or_else(|| "127.0.0.1:8000".to_string()),
            snapshot_path: lookup("REPAIR_KIT_SNAPSHOT")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            controller,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::ConfigError(format!("{} is not valid: {:?}", key, raw))),
    }
}
