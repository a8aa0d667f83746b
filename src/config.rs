use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use session_core::SessionLimits;

const ENV_STORE_DIR: &str = "PAGEPILOT_STORE_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("cannot parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Host configuration: defaults, overlaid by an optional YAML file,
/// overlaid by environment, with CLI flags winning last.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    /// Checkpoint directory; `None` keeps sessions in memory only.
    pub store_dir: Option<PathBuf>,
    pub limits: SessionLimits,
    /// Capacity of the audit event ring.
    pub audit_capacity: usize,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            store_dir: None,
            limits: SessionLimits::default(),
            audit_capacity: 256,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<PilotConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let data = fs::read_to_string(path).map_err(|err| ConfigError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
            serde_yaml::from_str(&data).map_err(|err| ConfigError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?
        }
        None => PilotConfig::default(),
    };

    if let Ok(dir) = env::var(ENV_STORE_DIR) {
        if !dir.trim().is_empty() {
            config.store_dir = Some(PathBuf::from(dir));
        }
    }

    Ok(config)
}
