//! Configuration system for the Ariadne backend
//!
//! Provides:
//! - Config file discovery (CLI flag, env var, standard paths)
//! - TOML parsing with serde
//! - Environment variable overrides (`PORT`, `HOST`, `MAX_EVENTS`, `CORS_ORIGIN`)
//! - Validation

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AriadneConfig {
    /// Listener settings
    pub server: ServerSettings,

    /// Event store settings
    pub store: StoreSettings,

    /// Live stream settings
    pub stream: StreamSettings,

    /// CORS settings
    pub cors: CorsSettings,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address (loopback recommended)
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5175,
            log_level: "info".to_string(),
        }
    }
}

/// Event store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Ring buffer capacity
    pub max_events: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { max_events: 10_000 }
    }
}

/// Live stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Per-subscriber queue capacity
    pub queue_capacity: usize,

    /// Seconds between heartbeat comments on idle connections
    pub heartbeat_secs: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 5_000,
            heartbeat_secs: 15,
        }
    }
}

/// CORS settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    /// Allowed origin; its localhost/127.0.0.1 alias is accepted too
    pub origin: String,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5173".to_string(),
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    /// Path to config file (if specified via CLI)
    cli_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self { cli_path: None }
    }

    /// Set the config path from CLI argument
    pub fn with_cli_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_path = path;
        self
    }

    /// Load configuration with the following precedence:
    /// 1. CLI --config flag
    /// 2. ARIADNE_CONFIG environment variable
    /// 3. ~/.config/ariadne/config.toml
    /// 4. Default values
    ///
    /// Environment variable overrides apply on top of whichever source won.
    pub fn load(&self) -> ConfigResult<AriadneConfig> {
        let config_path = self.find_config_file();

        let mut config = if let Some(path) = config_path {
            info!("Loading configuration from: {}", path.display());
            self.load_from_file(&path)?
        } else {
            debug!("No config file found, using defaults");
            AriadneConfig::default()
        };

        self.apply_env_overrides(&mut config);
        self.validate(&config)?;

        Ok(config)
    }

    /// Find the config file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!("CLI config path does not exist: {}", path.display());
        }

        if let Ok(env_path) = std::env::var("ARIADNE_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            warn!("ARIADNE_CONFIG path does not exist: {}", env_path);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("ariadne").join("config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Load configuration from a TOML file
    fn load_from_file(&self, path: &Path) -> ConfigResult<AriadneConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: AriadneConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut AriadneConfig) {
        if let Ok(val) = std::env::var("HOST") {
            config.server.host = val;
        }
        if let Ok(val) = std::env::var("PORT") {
            if let Ok(port) = val.parse() {
                config.server.port = port;
            } else {
                warn!("Ignoring unparseable PORT value: {}", val);
            }
        }
        if let Ok(val) = std::env::var("MAX_EVENTS") {
            if let Ok(max) = val.parse() {
                config.store.max_events = max;
            } else {
                warn!("Ignoring unparseable MAX_EVENTS value: {}", val);
            }
        }
        if let Ok(val) = std::env::var("CORS_ORIGIN") {
            config.cors.origin = val;
        }
        if let Ok(val) = std::env::var("ARIADNE_LOG_LEVEL") {
            config.server.log_level = val;
        }
    }

    /// Validate configuration
    fn validate(&self, config: &AriadneConfig) -> ConfigResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.server.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                config.server.log_level, valid_levels
            )));
        }

        if config.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Listen port cannot be 0".to_string(),
            ));
        }

        if config.store.max_events == 0 {
            return Err(ConfigError::ValidationError(
                "max_events must be at least 1".to_string(),
            ));
        }

        if config.stream.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "queue_capacity must be at least 1".to_string(),
            ));
        }

        if config.stream.heartbeat_secs == 0 {
            return Err(ConfigError::ValidationError(
                "heartbeat_secs must be at least 1".to_string(),
            ));
        }

        let origin = &config.cors.origin;
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "CORS origin must be an http(s) origin, got: {}",
                origin
            )));
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper module for platform-specific directories
mod dirs {
    use std::path::PathBuf;

    /// Get the user's config directory
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        }

        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }

        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
