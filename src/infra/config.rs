use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::prompts::DEFAULT_CONFIG_CONTENT;

pub const ENV_TIMEZONE: &str = "SYLLABUS_TIMEZONE";
pub const ENV_COLOR_ID: &str = "SYLLABUS_COLOR_ID";

pub const DEFAULT_MODELS: [&str; 5] = [
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.5-pro",
    "gemini-3-flash-preview",
    "gemini-3-pro-preview",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Tried in order for every credential.
    pub models: Vec<String>,
    /// dotenv files checked in order; the first one that exists wins.
    pub credential_files: Vec<PathBuf>,
    pub secret: SecretConfig,
    pub timezone: String,
    pub color_id: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    pub name: String,
    pub region: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            credential_files: default_credential_files(),
            secret: SecretConfig::default(),
            timezone: "UTC".to_string(),
            color_id: "1".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            name: "GEMINI_API_KEYS".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

fn default_credential_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Some(dir) = ConfigManager::default_dir() {
        files.push(dir.join("api.env"));
    }
    files.push(PathBuf::from("/etc/secrets/api.env"));
    files
}

pub struct ConfigManager {
    config_path: PathBuf,
    config: UserConfig,
}

impl ConfigManager {
    const CONFIG_FILE: &'static str = "config.yml";

    /// `<config dir>/syllabus-events`, e.g. `~/.config/syllabus-events` on Linux.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("syllabus-events"))
    }

    pub fn new(config_dir: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_dir.as_ref().join(Self::CONFIG_FILE);
        let config = Self::load_config(&config_path)?;

        Ok(Self { config_path, config })
    }

    fn load_config(config_path: &Path) -> Result<UserConfig> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let config: UserConfig = serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(UserConfig::default())
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// The loaded configuration with environment overrides applied.
    pub fn get(&self) -> UserConfig {
        Self::with_overrides(self.config.clone(), |key| std::env::var(key).ok())
    }

    /// Apply `SYLLABUS_TIMEZONE` and `SYLLABUS_COLOR_ID` from `lookup`.
    /// Blank values are ignored.
    pub(crate) fn with_overrides(mut config: UserConfig, lookup: impl Fn(&str) -> Option<String>) -> UserConfig {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(timezone) = non_blank(ENV_TIMEZONE) {
            config.timezone = timezone;
        }
        if let Some(color_id) = non_blank(ENV_COLOR_ID) {
            config.color_id = color_id;
        }

        config
    }

    /// Write the default config file. Returns false if one already exists.
    pub fn create_default(config_dir: impl AsRef<Path>) -> Result<bool> {
        let config_dir = config_dir.as_ref();
        let config_path = config_dir.join(Self::CONFIG_FILE);

        if config_path.exists() {
            return Ok(false);
        }

        std::fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create {}", config_dir.display()))?;
        std::fs::write(&config_path, DEFAULT_CONFIG_CONTENT)?;

        Ok(true)
    }
}
