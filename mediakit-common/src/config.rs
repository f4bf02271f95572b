//! Configuration loading and model-resource root resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the model-resource root
pub const MODEL_ROOT_ENV: &str = "MEDIAKIT_MODEL_ROOT";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "MEDIAKIT_CONFIG";

/// Compiled-in defaults used when no configuration source provides a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    /// Directory holding classifier weights, cascade definitions and palettes
    pub model_root: PathBuf,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        Self {
            model_root: default_model_root(),
        }
    }
}

/// Logging section of the TOML file
///
/// Logs always go to stderr; `RUST_LOG` overrides `level`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error or an EnvFilter directive)
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

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level TOML configuration shared by all mediakit binaries
///
/// Module-specific tables (e.g. `[ingest]`) are parsed by the owning crate
/// from the same file; unknown tables are ignored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Model-resource root (classifier weights, cascades, palettes)
    #[serde(default)]
    pub model_root: Option<PathBuf>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Default config file location: `<config_dir>/mediakit/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mediakit").join(format!("{}.toml", module_name)))
}

/// Read the raw TOML text of a config file
///
/// A missing file is not an error: returns `Ok(None)` and logs a warning so the
/// caller can continue with compiled defaults.
pub fn read_config_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    debug!(path = %path.display(), bytes = content.len(), "Config file loaded");
    Ok(Some(content))
}

/// Load the shared TOML configuration, falling back to defaults when missing
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    match read_config_file(path)? {
        Some(content) => TomlConfig::from_toml_str(&content),
        None => Ok(TomlConfig::default()),
    }
}

/// Model-resource root resolution
///
/// Priority order:
/// 1. Command-line argument (highest priority)
/// 2. `MEDIAKIT_MODEL_ROOT` environment variable
/// 3. `model_root` key of the TOML config file
/// 4. OS-dependent compiled default (fallback)
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl RootFolderResolver {
    /// Create resolver for a module (used to locate its default config file)
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            config_path: None,
        }
    }

    /// Set the command-line override
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    /// Use an explicit config file instead of the default location
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Config file this resolver reads (explicit path, env override, or default)
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        default_config_path(&self.module_name)
    }

    /// Resolve the model-resource root
    ///
    /// Never fails: unreadable or malformed config files are logged and skipped.
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(MODEL_ROOT_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(config_path) = self.config_path() {
            match load_toml_config(&config_path) {
                Ok(TomlConfig {
                    model_root: Some(root),
                    ..
                }) => return root,
                Ok(_) => {}
                Err(e) => warn!(path = %config_path.display(), error = %e, "Ignoring unreadable config file"),
            }
        }

        CompiledDefaults::for_current_platform().model_root
    }
}

/// OS-dependent default model-resource root
fn default_model_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mediakit").join("models"))
        .unwrap_or_else(|| PathBuf::from("./mediakit_data/models"))
}
