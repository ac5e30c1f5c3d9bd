//! Coach Configuration - deployment values as TOML
//!
//! Every section implements `Default`, so an empty file (or no file at all)
//! yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use super::validation::{self, ValidationWarning};

/// Env var naming the TOML file to load.
pub const CONFIG_ENV_VAR: &str = "DRIVE_COACH_CONFIG";

/// Env var overriding `[inference] model_path`.
pub const MODEL_PATH_ENV_VAR: &str = "LLM_MODEL_PATH";

/// Config file searched for in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "coach_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a coaching deployment.
///
/// Load with `CoachConfig::load()` which searches:
/// 1. `$DRIVE_COACH_CONFIG`
/// 2. `./coach_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoachConfig {
    /// Telemetry location
    #[serde(default)]
    pub data: DataConfig,

    /// Durable coaching log
    #[serde(default)]
    pub store: StoreConfig,

    /// Streaming scheduler pacing
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Inference backend selection and output post-processing
    #[serde(default)]
    pub inference: InferenceConfig,
}

impl CoachConfig {
    /// Load configuration using the standard search order, then apply env
    /// overrides.
    pub fn load() -> Self {
        let mut config = Self::search();
        config.apply_env_overrides();
        for w in config.validate() {
            warn!(field = %w.field, "{}", w);
        }
        config
    }

    fn search() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded coach config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./coach_config.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded coach config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys are reported as warnings and otherwise ignored.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// `LLM_MODEL_PATH` replaces the configured model path when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(MODEL_PATH_ENV_VAR) {
            if !path.trim().is_empty() {
                info!(path = %path, "Model path overridden by {}", MODEL_PATH_ENV_VAR);
                self.inference.model_path = Some(PathBuf::from(path));
            }
        }
    }

    /// Range checks. Never fatal; callers log the warnings.
    pub fn validate(&self) -> Vec<ValidationWarning> {
        validation::validate_ranges(self)
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding `<driver>/<trip>/` telemetry folders
    #[serde(default = "default_trips_root")]
    pub trips_root: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { trips_root: default_trips_root() }
    }
}

fn default_trips_root() -> PathBuf {
    PathBuf::from(defaults::DEFAULT_TRIPS_ROOT)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// sled database directory
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(defaults::DEFAULT_STORE_PATH)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Windows walked per streaming session
    #[serde(default = "default_max_windows")]
    pub max_windows: usize,

    /// Seconds between ticks in the streaming view
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_windows: default_max_windows(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

fn default_max_windows() -> usize {
    defaults::DEFAULT_MAX_WINDOWS
}

fn default_tick_interval_secs() -> u64 {
    defaults::DEFAULT_TICK_INTERVAL_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// GGUF model file; only read when built with the `llm` feature
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Use the canned-response generator instead of a model
    #[serde(default)]
    pub use_stub: bool,

    /// Ordered `[from, to]` literal replacements applied in coach mode
    #[serde(default = "default_coach_substitutions")]
    pub coach_substitutions: Vec<(String, String)>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            use_stub: false,
            coach_substitutions: default_coach_substitutions(),
        }
    }
}

/// Driver-facing wording says "segment"; coaches think in trips.
pub fn default_coach_substitutions() -> Vec<(String, String)> {
    vec![
        ("segment".to_string(), "trip".to_string()),
        ("Segment".to_string(), "Trip".to_string()),
    ]
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
