use crate::core::company::Company;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::{fs, path::PathBuf};
use tracing::debug;

/// Rate API endpoint.
pub const API_URL_KEY: &str = "api.url";
/// Shared secret sent as the `hash` parameter.
pub const API_TOKEN_KEY: &str = "api.token";
/// Stable identifier of this installation, sent as `uuid`.
pub const DATABASE_UUID_KEY: &str = "database.uuid";

/// Read-only key/value lookup for process-wide parameters.
pub trait ConfigProvider: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;
}

impl ConfigProvider for HashMap<String, String> {
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// The user on whose behalf rates are requested.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub name: String,
    /// Tax registration number (RNC), sent empty when missing
    #[serde(default)]
    pub vat: Option<String>,
}

/// What to do with a quote whose prefix has no currency mapping.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedCurrencyPolicy {
    /// Log and skip the quote, keep processing the batch
    #[default]
    Skip,
    /// Stop the whole update batch with an error
    Abort,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub on_unmapped_currency: UnmappedCurrencyPolicy,
    pub data_path: Option<String>,
}

impl ConfigProvider for AppConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        self.parameters.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("do", "ratefeed", "ratefeed")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("do", "ratefeed", "ratefeed")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!(
            companies = config.companies.len(),
            "Successfully loaded config"
        );
        Ok(config)
    }
}
