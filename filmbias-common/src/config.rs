//! Configuration loading and resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `FILMBIAS_CONFIG` environment variable
//! 3. User config file (`<config dir>/filmbias/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! An explicitly requested file (1 or 2) must exist and parse. A missing user
//! config file is not an error: a warning is logged and defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "FILMBIAS_CONFIG";

/// Environment variable holding the Gemini API key
pub const GEMINI_API_KEY_ENV_VAR: &str = "FILMBIAS_GEMINI_API_KEY";

/// Default Gemini model (multimodal, handles both posters and text)
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";

/// Default Gemini REST endpoint
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Top-level TOML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Directory receiving reports and charts
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Taxonomy file replacing the built-in table
    #[serde(default)]
    pub taxonomy_path: Option<PathBuf>,

    /// Maximum number of films analyzed concurrently
    #[serde(default = "default_max_concurrent_films")]
    pub max_concurrent_films: usize,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Gemini provider configuration
    #[serde(default)]
    pub gemini: GeminiConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            taxonomy_path: None,
            max_concurrent_films: default_max_concurrent_films(),
            logging: LoggingConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key (the environment variable takes precedence)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum spacing between two requests
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_timeout_secs(),
            min_request_interval_ms: default_min_request_interval_ms(),
        }
    }
}

fn default_max_concurrent_films() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_min_request_interval_ms() -> u64 {
    1000
}

impl TomlConfig {
    /// Make relative paths relative to `base_dir` (the config file's directory)
    pub fn resolve_relative_paths(&mut self, base_dir: &Path) {
        for path in [&mut self.output_dir, &mut self.taxonomy_path].into_iter().flatten() {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
    }
}

/// Where the config file path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    UserConfigDir,
}

/// Resolve which config file to read, if any
///
/// Returns `None` when neither an explicit path nor a user config dir is available.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), ConfigSource::CommandLine));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), ConfigSource::Environment));
        }
    }

    default_config_path().map(|p| (p, ConfigSource::UserConfigDir))
}

/// `<config dir>/filmbias/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("filmbias").join("config.toml"))
}

/// Read and parse a TOML config file
///
/// Relative paths inside the file are resolved against the file's directory.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let mut config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    if let Some(parent) = path.parent() {
        config.resolve_relative_paths(parent);
    }

    if config.max_concurrent_films == 0 {
        return Err(Error::Config("max_concurrent_films must be at least 1".to_string()));
    }

    Ok(config)
}

/// Load configuration following the resolution priority
///
/// Explicit paths (CLI, environment) must exist; a missing user config
/// degrades to defaults with a warning.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some((path, ConfigSource::UserConfigDir)) => {
            if path.exists() {
                info!("Loading config from {}", path.display());
                load_toml_config(&path)
            } else {
                warn!(
                    "No config file at {}; using built-in defaults",
                    path.display()
                );
                Ok(TomlConfig::default())
            }
        }
        Some((path, source)) => {
            info!("Loading config from {} ({:?})", path.display(), source);
            load_toml_config(&path)
        }
        None => {
            warn!("Could not determine config directory; using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write configuration atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the Gemini API key
///
/// **Priority:** ENV → TOML. Returns `None` when no valid key is configured;
/// callers then run without the remote provider.
pub fn resolve_gemini_api_key(config: &TomlConfig) -> Option<String> {
    let env_key = std::env::var(GEMINI_API_KEY_ENV_VAR)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = config.gemini.api_key.as_ref().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "Gemini API key found in multiple sources: environment, TOML. Using environment (highest priority)."
        );
    }

    if let Some(key) = env_key {
        info!("Gemini API key loaded from environment variable");
        return Some(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("Gemini API key loaded from TOML config");
        return Some(key.trim().to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.max_concurrent_films, 4);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert!(config.gemini.api_key.is_none());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_concurrent_films, 4);
        assert_eq!(config.gemini.timeout_secs, 60);
        assert_eq!(config.gemini.min_request_interval_ms, 1000);
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   \t"));
    }

    #[test]
    fn test_relative_paths_resolved() {
        let mut config = TomlConfig {
            output_dir: Some(PathBuf::from("reports")),
            taxonomy_path: Some(PathBuf::from("/abs/taxonomy.toml")),
            ..TomlConfig::default()
        };
        config.resolve_relative_paths(Path::new("/etc/filmbias"));
        assert_eq!(config.output_dir, Some(PathBuf::from("/etc/filmbias/reports")));
        assert_eq!(config.taxonomy_path, Some(PathBuf::from("/abs/taxonomy.toml")));
    }
}
