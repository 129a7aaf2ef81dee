use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::ports::PublishRequest;
use crate::constants;
use crate::error::{EtlError, Result};
use crate::pipeline::pipeline_config::PipelineConfig;
use crate::storage::StorageLayout;

/// Execution environment selected by `RUN_MODE`. Only the default volume root differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Local,
    Databricks,
}

impl RunMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(RunMode::Local),
            "databricks" => Ok(RunMode::Databricks),
            other => Err(EtlError::config(format!(
                "unknown run mode '{}' (expected 'local' or 'databricks')",
                other
            ))),
        }
    }

    pub fn default_volume_root(&self) -> &'static str {
        match self {
            RunMode::Local => constants::LOCAL_VOLUME_ROOT,
            RunMode::Databricks => constants::DATABRICKS_VOLUME_ROOT,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Local => write!(f, "local"),
            RunMode::Databricks => write!(f, "databricks"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    #[serde(default)]
    pub run_mode: RunMode,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub publish: Option<PublishConfig>,
    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Working volume root; defaults per run mode when unset.
    #[serde(default)]
    pub volume_root: Option<PathBuf>,
    /// Durable workspace tree holding `input/`, `output/` and `other/`.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    pub bucket: String,
    pub key: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub artifact: PathBuf,
    #[serde(default)]
    pub expected_owner: Option<String>,
}

impl PublishConfig {
    pub fn request(&self) -> PublishRequest {
        PublishRequest {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            region: self.region.clone(),
            expected_owner: self.expected_owner.clone(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(constants::DEFAULT_WORKSPACE_ROOT)
}

fn default_region() -> String {
    constants::DEFAULT_REGION.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            volume_root: None,
            workspace_root: default_workspace_root(),
        }
    }
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::default(),
            storage: StorageConfig::default(),
            publish: None,
            pipeline: None,
            log_dir: default_log_dir(),
        }
    }
}

impl EtlConfig {
    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EtlConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `RUN_MODE`, root overrides and `AWS_ACCOUNT_ID` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(constants::RUN_MODE_ENV) {
            self.run_mode = RunMode::parse(&mode)?;
        }
        if let Some(root) = lookup(constants::VOLUME_ROOT_ENV) {
            self.storage.volume_root = Some(PathBuf::from(root));
        }
        if let Some(root) = lookup(constants::WORKSPACE_ROOT_ENV) {
            self.storage.workspace_root = PathBuf::from(root);
        }
        if let Some(publish) = self.publish.as_mut() {
            if publish.expected_owner.is_none() {
                publish.expected_owner = lookup(constants::ACCOUNT_ID_ENV)
                    .filter(|account| !account.trim().is_empty());
            }
        }
        Ok(())
    }

    pub fn volume_root(&self) -> PathBuf {
        self.storage
            .volume_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.run_mode.default_volume_root()))
    }

    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(self.volume_root(), self.storage.workspace_root.clone())
    }

    /// Explicit pipeline from the config, or the default flow.
    pub fn pipeline(&self) -> PipelineConfig {
        match &self.pipeline {
            Some(pipeline) => pipeline.clone(),
            None => PipelineConfig::default_etl(&self.layout(), self.publish.as_ref()),
        }
    }
}
