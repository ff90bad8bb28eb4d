//! Configuration for the skilltree store and import pipeline.
//!
//! Configuration can be loaded from:
//! - TOML files (default: ~/.config/skilltree/config.toml)
//! - Environment variables (SKILLTREE_* prefixed)
//!
//! # Example
//!
//! ```rust,no_run
//! use skilltree_core::config::SkilltreeConfig;
//!
//! // Load from default path or fall back to env vars
//! let config = SkilltreeConfig::load().expect("Failed to load config");
//!
//! // Or explicitly from a file
//! let config = SkilltreeConfig::from_file(std::path::Path::new("skilltree.toml"))
//!     .expect("Failed to load");
//! ```
//!
//! ```toml
//! actor = "${USER}"
//!
//! [store]
//! state_path = "/var/lib/skilltree/skilltree-state.json"
//! seed_default_levels = true
//! event_bus_capacity = 256
//!
//! [import]
//! row_delay_ms = 150
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::defaults;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for crate::Error {
    fn from(e: ConfigError) -> Self {
        crate::Error::Config(e.to_string())
    }
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON state file.
    #[serde(default = "StoreConfig::default_state_path")]
    pub state_path: PathBuf,
    /// Seed the four default global proficiency levels into an empty store.
    #[serde(default = "StoreConfig::default_seed")]
    pub seed_default_levels: bool,
    /// Broadcast buffer of the event bus.
    #[serde(default = "StoreConfig::default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: Self::default_state_path(),
            seed_default_levels: Self::default_seed(),
            event_bus_capacity: Self::default_event_bus_capacity(),
        }
    }
}

impl StoreConfig {
    /// Returns: ~/.local/share/skilltree/skilltree-state.json
    fn default_state_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from(".local/share"));
        path.push("skilltree");
        path.push(defaults::STATE_FILE_NAME);
        path
    }

    fn default_seed() -> bool {
        true
    }

    fn default_event_bus_capacity() -> usize {
        defaults::EVENT_BUS_CAPACITY
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.state_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "store.state_path cannot be empty".to_string(),
            ));
        }
        if self.event_bus_capacity == 0 {
            return Err(ConfigError::Validation(
                "store.event_bus_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bulk import settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Delay between rows, used to animate progress.
    #[serde(default)]
    pub row_delay_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            row_delay_ms: defaults::IMPORT_ROW_DELAY_MS,
        }
    }
}

/// Main skilltree configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkilltreeConfig {
    /// Name recorded as `inactivated_by` and merge performer.
    #[serde(default = "SkilltreeConfig::default_actor")]
    pub actor: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

impl Default for SkilltreeConfig {
    fn default() -> Self {
        Self {
            actor: Self::default_actor(),
            store: StoreConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

impl SkilltreeConfig {
    fn default_actor() -> String {
        defaults::DEFAULT_ACTOR.to_string()
    }

    /// Returns: ~/.config/skilltree/config.toml
    pub fn default_config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        path.push("skilltree");
        path.push("config.toml");
        path
    }

    /// Load configuration from the default path, falling back to
    /// environment variables when the file does not exist.
    pub fn load() -> ConfigResult<Self> {
        let path = Self::default_config_path();

        if path.exists() {
            info!("Loading skilltree config from: {}", path.display());
            Self::from_file(&path)
        } else {
            debug!(
                "Config file not found at {}, using environment variables",
                path.display()
            );
            let config = Self::from_env();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from a TOML file. `${VAR}` placeholders are
    /// replaced with environment values before parsing.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let content = Self::substitute_env_vars(&content);
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SKILLTREE_ACTOR` | `admin` | Actor recorded on inactivations |
    /// | `SKILLTREE_STATE_PATH` | data dir | JSON state file |
    /// | `SKILLTREE_SEED_LEVELS` | `true` | Seed default proficiency levels |
    /// | `SKILLTREE_EVENT_BUS_CAPACITY` | `256` | Event bus buffer |
    /// | `SKILLTREE_IMPORT_ROW_DELAY_MS` | `0` | Delay between import rows |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let actor = env::var("SKILLTREE_ACTOR").unwrap_or(defaults.actor);
        let state_path = env::var("SKILLTREE_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store.state_path);
        let seed_default_levels = env::var("SKILLTREE_SEED_LEVELS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(defaults.store.seed_default_levels);
        let event_bus_capacity = env::var("SKILLTREE_EVENT_BUS_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.store.event_bus_capacity)
            .max(1);
        let row_delay_ms = env::var("SKILLTREE_IMPORT_ROW_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.import.row_delay_ms);

        Self {
            actor,
            store: StoreConfig {
                state_path,
                seed_default_levels,
                event_bus_capacity,
            },
            import: ImportConfig { row_delay_ms },
        }
    }

    /// Override the state file path.
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.state_path = path.into();
        self
    }

    /// Override the actor.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.actor.trim().is_empty() {
            return Err(ConfigError::Validation("actor cannot be empty".to_string()));
        }
        self.store.validate()
    }

    fn substitute_env_vars(content: &str) -> String {
        let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_var_substitution_with_value() {
        let content = "actor = \"${SKILLTREE_TEST_SUBST_ACTOR}\"";
        env::set_var("SKILLTREE_TEST_SUBST_ACTOR", "carol");
        let result = SkilltreeConfig::substitute_env_vars(content);
        env::remove_var("SKILLTREE_TEST_SUBST_ACTOR");
        assert_eq!(result, "actor = \"carol\"");
    }

    #[test]
    fn test_env_var_substitution_missing() {
        let content = "actor = \"${NONEXISTENT_SKILLTREE_VAR_12345}\"";
        let result = SkilltreeConfig::substitute_env_vars(content);
        assert_eq!(result, content);
    }

    #[test]
    fn test_from_file_with_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
actor = "dana"

[store]
state_path = "/tmp/skilltree-test.json"
seed_default_levels = false

[import]
row_delay_ms = 25
"#
        )
        .unwrap();

        let config = SkilltreeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.actor, "dana");
        assert_eq!(
            config.store.state_path,
            PathBuf::from("/tmp/skilltree-test.json")
        );
        assert!(!config.store.seed_default_levels);
        assert_eq!(config.store.event_bus_capacity, defaults::EVENT_BUS_CAPACITY);
        assert_eq!(config.import.row_delay_ms, 25);
    }

    #[test]
    fn test_from_file_defaults_when_sections_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "actor = \"erin\"").unwrap();
        let config = SkilltreeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.import.row_delay_ms, 0);
    }

    #[test]
    fn test_from_file_rejects_empty_actor() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "actor = \"  \"").unwrap();
        let err = SkilltreeConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_zero_event_bus_capacity_invalid() {
        let mut config = SkilltreeConfig::default();
        config.store.event_bus_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = SkilltreeConfig::default().with_actor("frank");
        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.contains("frank"));
        let back: SkilltreeConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_error_converts_to_core_error() {
        let err: crate::Error = ConfigError::Validation("bad".to_string()).into();
        assert_eq!(err.to_string(), "Configuration error: Validation error: bad");
    }
}
