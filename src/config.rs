//! spotnear configuration.
//!
//! Loaded from `~/.spotnear/config.toml`. Every key is optional; a missing
//! file means all defaults.
//!
//! ```toml
//! search-radius = 1000
//! short-interval-secs = 300
//! long-interval-secs = 3600
//! lease-ceiling-secs = 600
//! exact-wakeups = true
//! place-click = "keep-cycling"   # or "suspend"
//!
//! [overpass]
//! endpoint = "https://overpass-api.de/api/interpreter"
//! connect-timeout-secs = 30
//! read-timeout-secs = 30
//! write-timeout-secs = 30
//!
//! [location]
//! latitude = 52.5163
//! longitude = 13.3777
//! # ip-endpoint = "http://ip-api.com/json"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::storage::DEFAULT_SEARCH_RADIUS;

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What a click on the "place found" notification does to the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaceClickMode {
    /// Dismiss and schedule the next automatic search.
    #[default]
    KeepCycling,

    /// Dismiss and stop searching until the search notification is clicked.
    Suspend,
}

/// spotnear configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Radius used until one is stored with `spotnear radius`.
    pub search_radius: u32,

    /// Retry delay while searching without a result.
    pub short_interval_secs: u64,

    /// Delay before searching again after a place was found.
    pub long_interval_secs: u64,

    /// Hard ceiling on how long a single cycle may hold the lease.
    pub lease_ceiling_secs: u64,

    /// Request exact wake-up timing. When off, wake-ups may land late
    /// within a small window.
    pub exact_wakeups: bool,

    pub place_click: PlaceClickMode,

    pub overpass: OverpassConfig,

    pub location: LocationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_radius: DEFAULT_SEARCH_RADIUS,
            short_interval_secs: 5 * 60,
            long_interval_secs: 60 * 60,
            lease_ceiling_secs: 10 * 60,
            exact_wakeups: true,
            place_click: PlaceClickMode::default(),
            overpass: OverpassConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

/// Overpass interpreter endpoint and timeouts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct OverpassConfig {
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://overpass-api.de/api/interpreter".to_string(),
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
        }
    }
}

/// Where location fixes come from.
///
/// A fixed point wins over IP geolocation when both are set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ip_endpoint: Option<String>,
}

impl Config {
    /// Load config from `path`, or from `~/.spotnear/config.toml` when `None`.
    ///
    /// A missing file yields the defaults; an unreadable or invalid one is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        let contents = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let config: Self =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?;
        config.validate()?;
        Ok(config)
    }

    /// The config file path: `~/.spotnear/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".spotnear").join("config.toml"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.search_radius == 0 {
            return Err(ConfigError::Invalid("search-radius must be positive".into()));
        }
        if self.short_interval_secs == 0 || self.long_interval_secs == 0 {
            return Err(ConfigError::Invalid("intervals must be positive".into()));
        }
        if self.lease_ceiling_secs == 0 {
            return Err(ConfigError::Invalid(
                "lease-ceiling-secs must be positive".into(),
            ));
        }
        if self.location.latitude.is_some() != self.location.longitude.is_some() {
            return Err(ConfigError::Invalid(
                "location needs both latitude and longitude".into(),
            ));
        }
        Ok(())
    }

    pub fn short_interval(&self) -> Duration {
        Duration::from_secs(self.short_interval_secs)
    }

    pub fn long_interval(&self) -> Duration {
        Duration::from_secs(self.long_interval_secs)
    }

    pub fn lease_ceiling(&self) -> Duration {
        Duration::from_secs(self.lease_ceiling_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.search_radius, 1000);
        assert_ne!(config.short_interval(), config.long_interval());
        assert_eq!(config.lease_ceiling(), Duration::from_secs(600));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let (_dir, path) = write_config(
            r#"
            short-interval-secs = 10
            place-click = "suspend"

            [overpass]
            endpoint = "http://localhost:12345/api/interpreter"
            "#,
        );
        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.short_interval(), Duration::from_secs(10));
        assert_eq!(config.long_interval(), Duration::from_secs(3600));
        assert_eq!(config.place_click, PlaceClickMode::Suspend);
        assert_eq!(
            config.overpass.endpoint,
            "http://localhost:12345/api/interpreter"
        );
        assert_eq!(config.overpass.read_timeout_secs, 30);
    }

    #[test]
    fn fixed_location_parses() {
        let (_dir, path) = write_config(
            r"
            [location]
            latitude = 52.5163
            longitude = 13.3777
            ",
        );
        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.location.latitude, Some(52.5163));
        assert_eq!(config.location.longitude, Some(13.3777));
    }

    #[test]
    fn zero_radius_is_invalid() {
        let (_dir, path) = write_config("search-radius = 0");
        let err = Config::load(Some(&path)).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn half_a_location_is_invalid() {
        let (_dir, path) = write_config("[location]\nlatitude = 1.0");
        let err = Config::load(Some(&path)).unwrap_err();

        assert!(err.to_string().contains("both latitude and longitude"));
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let (_dir, path) = write_config("search-radios = 5");
        let err = Config::load(Some(&path)).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
