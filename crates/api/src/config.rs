//! Application configuration
//!
//! Layered from `classroom-monitor.toml` (or an explicit path) and
//! `CLASSROOM__SECTION__KEY` environment variables, env winning.

use std::path::PathBuf;

use camera_capture::CameraConfig;
use config::{Config, ConfigError, Environment, File};
use observation::AggregatorConfig;
use serde::{Deserialize, Serialize};
use session::{ModelsConfig, TableSuggestions};

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "classroom-monitor";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub models: ModelsConfig,
    pub session: SessionConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub suggestions: TableSuggestions,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Session loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sleep between ticks; 0 uses the camera frame interval
    pub tick_interval_ms: u64,
    pub aggregator: AggregatorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            aggregator: AggregatorConfig::default(),
        }
    }
}

/// Repository seed and snapshot locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON seed with students and behavior weights
    pub seed_path: Option<PathBuf>,
    /// JSON snapshot of records and histories, loaded at start and written at shutdown
    pub snapshot_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load the file (required only when `path` is given) and overlay env vars
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE)).required(path.is_some()))
            .add_source(
                Environment::with_prefix("CLASSROOM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Interval between ticks of the session loop
    pub fn tick_interval(&self) -> std::time::Duration {
        let ms = match self.session.tick_interval_ms {
            0 => self.camera.frame_interval_ms(),
            ms => ms,
        };
        std::time::Duration::from_millis(ms)
    }
}
