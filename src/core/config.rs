//! Configuration management for Course Hub
//!
//! Settings come from (lowest to highest precedence): built-in defaults, a
//! TOML file, `COURSE_HUB_*` environment variables, and command line flags
//! applied by the binary.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "course-hub.toml";

/// Prefix shared by all environment overrides
pub const ENV_PREFIX: &str = "COURSE_HUB_";

/// Available document store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-process document store
    Memory,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, multi-field lines
    Pretty,
    /// One JSON object per event
    Json,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Storage layout resolver configuration
    pub resolver: ResolverConfig,

    /// Dashboard aggregation configuration
    pub dashboard: DashboardConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: SocketAddr,

    /// Directory holding the static dashboard front-end
    pub static_dir: Option<PathBuf>,

    /// Allow any origin on API routes
    pub permissive_cors: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend type
    pub storage_type: StorageType,

    /// JSON seed file loaded into the store at start-up
    pub seed_file: Option<PathBuf>,
}

/// Storage layout resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Guess a course id from a module id when the caller supplies none.
    /// The guess is never validated; it only decides where to probe.
    pub derive_course_id: bool,

    /// Separator ending the module id prefix used for the guess
    pub module_id_separator: char,

    /// Suffix appended to the prefix to form the guessed course id
    pub course_id_suffix: String,
}

/// Dashboard aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Default number of courses in the top-N ranking
    pub top_courses: usize,

    /// Number of most recent enrollments listed
    pub recent_enrollments: usize,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Expose Prometheus metrics at `/metrics`
    pub enable_prometheus: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,

    /// Log format (pretty, json)
    pub format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            static_dir: Some(PathBuf::from("./static")),
            permissive_cors: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            seed_file: None,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            derive_course_id: true,
            module_id_separator: '_',
            course_id_suffix: "_course".to_string(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            top_courses: 5,
            recent_enrollments: 10,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable_prometheus: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a file (or the default file when present),
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = load_config_or_default(path);
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply `COURSE_HUB_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(addr) = var("HTTP_ADDR") {
            self.server.http_addr = addr
                .parse()
                .map_err(|e| Error::config(format!("Invalid HTTP address: {}", e)))?;
        }

        if let Some(dir) = var("STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(dir));
        }

        if let Some(seed) = var("SEED_FILE") {
            self.storage.seed_file = Some(PathBuf::from(seed));
        }

        if let Some(derive) = var("DERIVE_COURSE_ID") {
            self.resolver.derive_course_id = derive
                .parse()
                .map_err(|e| Error::config(format!("Invalid DERIVE_COURSE_ID flag: {}", e)))?;
        }

        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = var("LOG_FORMAT") {
            self.logging.format = match format.as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                other => return Err(Error::config(format!("Invalid log format: {}", other))),
            };
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(Error::config(format!("Invalid log level: {}", other))),
        }

        if self.dashboard.top_courses == 0 {
            return Err(Error::config("dashboard.top_courses must be at least 1"));
        }

        if self.resolver.derive_course_id && self.resolver.course_id_suffix.is_empty() {
            return Err(Error::config(
                "resolver.course_id_suffix must not be empty while derive_course_id is on",
            ));
        }

        Ok(())
    }
}

/// Load configuration from file or use defaults
///
/// An explicit path that cannot be read or parsed falls back to defaults
/// with a warning, matching how the server has always started.
pub fn load_config_or_default(path: Option<&Path>) -> Config {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    if !explicit && !path.exists() {
        info!("No config file specified, using defaults");
        return Config::default();
    }

    match Config::from_file(&path) {
        Ok(config) => {
            info!("Loaded configuration from: {}", path.display());
            config
        }
        Err(e) => {
            warn!("Failed to load config from {}: {}. Using defaults.", path.display(), e);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            http_addr = "127.0.0.1:9000"

            [resolver]
            derive_course_id = false
            "#,
        )
        .unwrap();

        assert_eq!(config.server.http_addr.port(), 9000);
        assert!(!config.resolver.derive_course_id);
        assert_eq!(config.resolver.course_id_suffix, "_course");
        assert_eq!(config.dashboard.top_courses, 5);
        assert_eq!(config.storage.storage_type, StorageType::Memory);
    }

    #[test]
    fn env_overrides_apply_on_top_of_file() {
        let vars: HashMap<String, String> = [
            ("COURSE_HUB_HTTP_ADDR", "127.0.0.1:7000"),
            ("COURSE_HUB_LOG_FORMAT", "json"),
            ("COURSE_HUB_SEED_FILE", "/tmp/seed.json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.server.http_addr.port(), 7000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.storage.seed_file, Some(PathBuf::from("/tmp/seed.json")));
    }

    #[test]
    fn bad_env_override_is_a_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(|key| (key == "COURSE_HUB_HTTP_ADDR").then(|| "nope".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn validation_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unreadable_explicit_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();

        let config = load_config_or_default(Some(file.path()));
        assert_eq!(config.server.http_addr.port(), 8080);
    }

    #[test]
    fn explicit_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dashboard]\ntop_courses = 3").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.dashboard.top_courses, 3);
    }
}
