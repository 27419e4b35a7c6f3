//! Converter configuration
//!
//! Plain values handed to the converter at construction. Human duration strings
//! ("15m", "1m", "infinity") are parsed here so the core only ever sees
//! `Duration` and `Retention` values.

use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default time an unused cache entry is kept (15 minutes)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(15 * 60);

/// Default time between two eviction passes (1 minute)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// File name of the engine jar inside the data directory
const ENGINE_JAR_NAME: &str = "rmlmapper.jar";

/// Errors raised while reading configuration values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The duration string could not be parsed
    #[error("Invalid duration: '{0}'. Expected a number with an optional unit (ms, s, m, h, d)")]
    InvalidDuration(String),
}

/// How long unused cache entries survive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Entries not used within this window are evicted
    Bounded(Duration),
    /// Entries never expire
    Unbounded,
}

impl Retention {
    /// Returns the retention window, or `None` when entries never expire
    pub fn window(&self) -> Option<Duration> {
        match self {
            Retention::Bounded(d) => Some(*d),
            Retention::Unbounded => None,
        }
    }
}

impl Default for Retention {
    fn default() -> Self {
        Retention::Bounded(DEFAULT_RETENTION)
    }
}

/// Cache settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Whether conversion results are cached at all
    pub enabled: bool,
    /// How long unused entries are kept
    pub retention: Retention,
    /// Interval between eviction passes
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            retention: Retention::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl CacheConfig {
    /// Enabled cache with default retention and sweep interval
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }
}

/// Settings for the RMLMapper process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Where the RMLMapper jar lives (and where it is downloaded to)
    pub jar_path: PathBuf,
    /// Java executable used to run the jar
    pub java_bin: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            jar_path: default_jar_path(),
            java_bin: PathBuf::from("java"),
        }
    }
}

/// Top-level configuration for a [`crate::converter::Converter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    /// Location of the RML mapping rules
    pub rules_path: PathBuf,
    pub engine: EngineConfig,
    pub cache: CacheConfig,
}

impl ConverterConfig {
    /// Configuration with default engine settings and caching disabled
    pub fn new(rules_path: impl Into<PathBuf>) -> Self {
        Self {
            rules_path: rules_path.into(),
            engine: EngineConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Returns the default location of the engine jar
///
/// Uses `~/.local/share/anyrdf/rmlmapper.jar` on Linux, or the equivalent XDG path
/// on other platforms. Falls back to `./rmlmapper.jar` when no home directory exists.
pub fn default_jar_path() -> PathBuf {
    ProjectDirs::from("", "", "anyrdf")
        .map(|dirs| dirs.data_dir().join(ENGINE_JAR_NAME))
        .unwrap_or_else(|| PathBuf::from(ENGINE_JAR_NAME))
}

/// Parses a human duration such as `500ms`, `30s`, `15m`, `2h` or `1d`
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let trimmed = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (amount, unit) = trimmed.split_at(split);
    let amount: u64 = amount.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "ms" => Duration::from_millis(amount),
        "" | "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.checked_mul(60).ok_or_else(invalid)?),
        "h" => Duration::from_secs(amount.checked_mul(3600).ok_or_else(invalid)?),
        "d" => Duration::from_secs(amount.checked_mul(86_400).ok_or_else(invalid)?),
        _ => return Err(invalid()),
    };

    Ok(duration)
}

/// Parses a retention value: a duration, or `infinity` / `unbounded`
pub fn parse_retention(s: &str) -> Result<Retention, ConfigError> {
    match s.trim().to_lowercase().as_str() {
        "infinity" | "unbounded" => Ok(Retention::Unbounded),
        _ => parse_duration(s).map(Retention::Bounded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_parse_duration_bare_number_is_seconds() {
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration(" 6 ").unwrap(), Duration::from_secs(6));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("10 minutes").is_err());
        assert!(parse_duration("-5s").is_err());
        assert_eq!(
            parse_duration("5w"),
            Err(ConfigError::InvalidDuration("5w".to_string()))
        );
    }

    #[test]
    fn test_parse_retention_infinity() {
        assert_eq!(parse_retention("infinity").unwrap(), Retention::Unbounded);
        assert_eq!(parse_retention("Unbounded").unwrap(), Retention::Unbounded);
        assert_eq!(
            parse_retention("6s").unwrap(),
            Retention::Bounded(Duration::from_secs(6))
        );
    }

    #[test]
    fn test_cache_config_defaults() {
        let config = CacheConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.retention, Retention::Bounded(Duration::from_secs(900)));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));

        let enabled = CacheConfig::enabled();
        assert!(enabled.enabled);
        assert_eq!(enabled.retention.window(), Some(DEFAULT_RETENTION));
    }

    #[test]
    fn test_default_jar_path_names_the_jar() {
        let path = default_jar_path();
        assert!(path.ends_with(ENGINE_JAR_NAME));
    }
}
