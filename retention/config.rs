//! Service configuration: built-in defaults, then an optional TOML file, then
//! command-line overrides applied by the binary.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Probability above which a student is predicted to persist. Tuned per model.
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.5;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

/// Environment variable naming a configuration file when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "RETENTION_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub listen_addr: String,
    pub artifact_dir: PathBuf,
    pub decision_threshold: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            decision_threshold: DEFAULT_DECISION_THRESHOLD,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Decision threshold must lie within [0, 1], got {0}.")]
    InvalidThreshold(f64),
}

impl ServiceConfig {
    /// Loads a configuration file. Keys it omits keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise the file named by `RETENTION_CONFIG`, otherwise defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve_with_env(path, std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
    }

    /// [`ServiceConfig::resolve`] with the environment lookup already done.
    pub fn resolve_with_env(
        path: Option<&Path>,
        env_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Applies command-line overrides on top of whatever the file provided.
    pub fn with_overrides(
        mut self,
        artifact_dir: Option<PathBuf>,
        decision_threshold: Option<f64>,
    ) -> Result<Self, ConfigError> {
        if let Some(dir) = artifact_dir {
            self.artifact_dir = dir;
        }
        if let Some(threshold) = decision_threshold {
            self.decision_threshold = threshold;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(ConfigError::InvalidThreshold(self.decision_threshold));
        }
        Ok(())
    }
}
