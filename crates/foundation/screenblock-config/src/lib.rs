//! ScreenBlock configuration
//!
//! Load order:
//! 1. Built-in defaults
//! 2. JSON file (`<config_dir>/screenblock/config.json` or an explicit path)
//! 3. `SCREENBLOCK_*` environment overrides
//!
//! Every field has a default, so a partial file is fine.

use screenblock_core::{PatternPolicy, DEFAULT_ITERATIONS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_ITERATIONS: &str = "SCREENBLOCK_ITERATIONS";
pub const ENV_MIN_PATTERN_LEN: &str = "SCREENBLOCK_MIN_PATTERN_LEN";
pub const ENV_UNLOCK_GRACE_MS: &str = "SCREENBLOCK_UNLOCK_GRACE_MS";
pub const ENV_PROMPT_TIMEOUT_MS: &str = "SCREENBLOCK_PROMPT_TIMEOUT_MS";
pub const ENV_DATA_DIR: &str = "SCREENBLOCK_DATA_DIR";

const CREDENTIAL_FILE: &str = "credential.json";
const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenBlockConfig {
    /// Credential derivation
    pub keys: KeyConfig,
    /// Which patterns may be registered
    pub pattern: PatternPolicy,
    /// Overlay session timings
    pub session: SessionPolicy,
    /// Where state lives on disk
    pub storage: StorageConfig,
}

/// Credential derivation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// PBKDF2 rounds for newly created credentials
    pub iterations: u32,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Overlay session policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// How long a bubble tap stays armed for the unlock tap that follows it
    pub unlock_grace_ms: u64,
    /// How long the pattern prompt waits for the user to start tracing
    pub prompt_timeout_ms: u64,
    /// Save the session snapshot after every committed transition, not only on stop
    pub checkpoint_transitions: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            unlock_grace_ms: 3_000,
            prompt_timeout_ms: 5_000,
            checkpoint_transitions: true,
        }
    }
}

impl SessionPolicy {
    pub fn unlock_grace(&self) -> Duration {
        Duration::from_millis(self.unlock_grace_ms)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_millis(self.prompt_timeout_ms)
    }
}

/// Storage locations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the credential and session files
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Configured data directory, or `<data_local_dir>/screenblock`
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("screenblock")
        })
    }

    pub fn credential_path(&self) -> PathBuf {
        self.data_dir().join(CREDENTIAL_FILE)
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir().join(SESSION_FILE)
    }
}

impl ScreenBlockConfig {
    /// Default config file location (`<config_dir>/screenblock/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("screenblock").join("config.json"))
    }

    /// Load from the default location (if present) plus environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit file plus environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file without applying overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply `SCREENBLOCK_*` variables from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(ENV_ITERATIONS) {
            self.keys.iterations = parse_value(ENV_ITERATIONS, &value)?;
        }
        if let Some(value) = lookup(ENV_MIN_PATTERN_LEN) {
            self.pattern.min_length = parse_value(ENV_MIN_PATTERN_LEN, &value)?;
        }
        if let Some(value) = lookup(ENV_UNLOCK_GRACE_MS) {
            self.session.unlock_grace_ms = parse_value(ENV_UNLOCK_GRACE_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_PROMPT_TIMEOUT_MS) {
            self.session.prompt_timeout_ms = parse_value(ENV_PROMPT_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_DATA_DIR) {
            if !value.is_empty() {
                self.storage.data_dir = Some(PathBuf::from(value));
            }
        }
        Ok(())
    }

    /// Reject settings that would make the lock unusable
    pub fn validate(&self) -> Result<()> {
        if self.keys.iterations == 0 {
            return Err(ConfigError::Invalid("keys.iterations must be at least 1".into()));
        }
        let cells = self.pattern.grid.cells();
        if cells == 0 {
            return Err(ConfigError::Invalid("pattern.grid must have at least one node".into()));
        }
        if cells > usize::from(u8::MAX) + 1 {
            return Err(ConfigError::Invalid(format!(
                "pattern.grid has {} nodes, at most 256 are addressable",
                cells
            )));
        }
        if self.pattern.min_length > cells {
            return Err(ConfigError::Invalid(format!(
                "pattern.min_length {} exceeds the {} nodes of a {} grid",
                self.pattern.min_length, cells, self.pattern.grid
            )));
        }
        if self.session.prompt_timeout_ms == 0 {
            return Err(ConfigError::Invalid("session.prompt_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
