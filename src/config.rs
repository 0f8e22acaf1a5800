use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};

/// conversion settings, optionally loaded from a TOML file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// content pool directory, shared across conversions
    pub pool: PathBuf,
    /// directory holding per-image work areas; defaults to the tarball's directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    /// filename of the metadata document inside each converted layer
    pub metadata_name: String,
    /// suffix appended to every tag version of the converted image
    pub tag_suffix: String,
    /// abort when the source archive fails to extract
    pub strict_extract: bool,
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// builder-style pool override
    pub fn with_pool(mut self, pool: impl Into<PathBuf>) -> Self {
        self.pool = pool.into();
        self
    }

    /// builder-style work directory override
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool: PathBuf::from("pool"),
            work_dir: None,
            metadata_name: "metadata.json".to_string(),
            tag_suffix: "-lazy".to_string(),
            strict_extract: true,
        }
    }
}
