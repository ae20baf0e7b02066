use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::detection::DetectionConfig;
use crate::orchestration::OrchestratorConfig;
use crate::supply::SupplyConfig;
use crate::verification::VerificationConfig;
use crate::Result;

/// All tunables, one section per component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub detection: DetectionConfig,
    pub verification: VerificationConfig,
    pub supply: SupplyConfig,
}

impl Config {
    pub fn verdict_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or(crate::Error::NoHomeDir)?
            .join(".verdict"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::verdict_dir()?.join("verdict.toml"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::verdict_dir()?.join("verdict.log"))
    }

    /// Load `~/.verdict/verdict.toml`, or defaults if it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading config");
        if !path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        debug!(
            task_timeout_secs = config.orchestrator.task_timeout_secs,
            consensus_threshold = config.verification.consensus_threshold,
            jitter = config.verification.jitter,
            "Config loaded"
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::verdict_dir()?;
        if !dir.exists() {
            debug!(dir = %dir.display(), "Creating verdict directory");
            fs::create_dir_all(&dir)?;
        }
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }
}
