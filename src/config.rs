//! Configuration management for the report service.
//!
//! Configuration is loaded with figment from serialized defaults, an optional
//! TOML file and `CHECKIN_` environment variables.  Nested keys use a double
//! underscore in the environment, e.g. `CHECKIN_SERVER__PORT=8080`.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::report::{ReportSettings, DEFAULT_MAX_PHOTOS};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "checkin.toml";

/// Prefix of the environment variables read by [`Config::load_from`].
pub const ENV_PREFIX: &str = "CHECKIN_";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub report: ReportConfig,
    pub fonts: FontsConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Probe successive ports when `port` is taken.
    pub find_free_port: bool,
}

/// Record store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

/// Rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory for temporary photo files. Defaults to a folder in the system temp dir.
    pub temp_dir: Option<PathBuf>,
    /// Per-photo fetch timeout in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Maximum number of photos placed in a report.
    pub max_photos: usize,
    /// Only fetch remote photos whose host contains this substring.
    pub remote_host_filter: Option<String>,
}

/// Font lookup settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontsConfig {
    pub directory: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3333,
            find_free_port: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("checkin.db"),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            fetch_timeout_ms: 5_000,
            max_photos: DEFAULT_MAX_PHOTOS,
            remote_host_filter: None,
        }
    }
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// Later sources override earlier ones: defaults, the TOML file (if it
    /// exists), then `CHECKIN_` environment variables.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.report.fetch_timeout_ms == 0 {
            return Err(ReportError::ConfigValidation {
                message: "report.fetch_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.report.max_photos == 0 {
            return Err(ReportError::ConfigValidation {
                message: "report.max_photos must be greater than 0".to_string(),
            });
        }

        if self.server.port == 0 && !self.server.find_free_port {
            return Err(ReportError::ConfigValidation {
                message: "server.port must be set when server.find_free_port is disabled"
                    .to_string(),
            });
        }

        if self.server.host.trim().is_empty() {
            return Err(ReportError::ConfigValidation {
                message: "server.host must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the per-photo fetch timeout as a Duration.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.report.fetch_timeout_ms)
    }

    /// Get the temporary asset directory, resolving the default if not set.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.report
            .temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("checkin_report"))
    }

    /// Settings handed to the report renderer.
    #[must_use]
    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            temp_dir: self.temp_dir(),
            max_photos: self.report.max_photos,
            host_filter: self
                .report
                .remote_host_filter
                .clone()
                .filter(|f| !f.trim().is_empty()),
            font_dir: self.fonts.directory.clone(),
        }
    }
}
