use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::api::client::ClientConfig;
use crate::api::SourceKind;
use crate::error::{PolsigError, Result};
use crate::portal::PortalCredentials;

const CONFIG_DIR_NAME: &str = ".polsig";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Overrides the configuration directory (used by tests and CI)
pub const CONFIG_DIR_ENV: &str = "POLSIG_CONFIG_DIR";
pub const PORTAL_USER_ENV: &str = "POLSIG_PORTAL_USER";
pub const PORTAL_PASS_ENV: &str = "POLSIG_PORTAL_PASS";
pub const ESTAT_APP_ID_ENV: &str = "ESTAT_APP_ID";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub portal: PortalSettings,
    #[serde(default)]
    pub estat: EstatSettings,
    #[serde(default)]
    pub sources: SourceToggles,
    #[serde(default)]
    pub news: NewsSettings,
    #[serde(default)]
    pub diet: DietSettings,
    #[serde(default)]
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PortalSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Article fetched directly instead of searching
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EstatSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

/// Per-source enable flags for aggregation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceToggles {
    #[serde(default = "enabled")]
    pub news: bool,
    #[serde(default = "enabled")]
    pub diet: bool,
    #[serde(default = "enabled")]
    pub portal: bool,
    #[serde(default = "enabled")]
    pub law: bool,
    #[serde(default = "enabled")]
    pub stats: bool,
}

fn enabled() -> bool {
    true
}

impl Default for SourceToggles {
    fn default() -> Self {
        Self {
            news: true,
            diet: true,
            portal: true,
            law: true,
            stats: true,
        }
    }
}

impl SourceToggles {
    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::News => self.news,
            SourceKind::Diet => self.diet,
            SourceKind::Portal => self.portal,
            SourceKind::Law => self.law,
            SourceKind::Stats => self.stats,
        }
    }

    fn flag_mut(&mut self, kind: SourceKind) -> &mut bool {
        match kind {
            SourceKind::News => &mut self.news,
            SourceKind::Diet => &mut self.diet,
            SourceKind::Portal => &mut self.portal,
            SourceKind::Law => &mut self.law,
            SourceKind::Stats => &mut self.stats,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsSettings {
    pub days: u32,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self { days: 7 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DietSettings {
    /// Background research window ending at the query's `until` date
    pub lookback_days: i64,
}

impl Default for DietSettings {
    fn default() -> Self {
        Self { lookback_days: 365 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpSettings {
    pub timeout: u64,
    pub retries: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: 30,
            retries: 3,
        }
    }
}

impl Config {
    /// Get the configuration directory
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }

        let home_dir = dirs::home_dir()
            .ok_or_else(|| PolsigError::Config("Could not determine home directory".to_string()))?;

        Ok(home_dir.join(CONFIG_DIR_NAME))
    }

    /// Get the configuration file full path
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_path()?.join(CONFIG_FILE_NAME))
    }

    /// Initialize configuration directory and file
    pub fn initialize() -> Result<()> {
        let config_dir = Self::config_path()?;

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                PolsigError::Config(format!("Failed to create config directory: {}", e))
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&config_dir, fs::Permissions::from_mode(0o700)).map_err(|e| {
                    PolsigError::Config(format!("Failed to set directory permissions: {}", e))
                })?;
            }
        }

        let config_file = Self::config_file_path()?;
        if !config_file.exists() {
            Self::default().write_file()?;
        }

        Ok(())
    }

    /// Load configuration from file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env();
        Ok(config)
    }

    /// File contents only; used when the result is written back
    pub fn load_file() -> Result<Self> {
        Self::initialize()?;

        let config_file = Self::config_file_path()?;
        let contents = fs::read_to_string(&config_file)
            .map_err(|e| PolsigError::Config(format!("Failed to read config file: {}", e)))?;

        serde_yaml::from_str(&contents)
            .map_err(|e| PolsigError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        Self::initialize()?;
        self.write_file()
    }

    fn write_file(&self) -> Result<()> {
        let config_file = Self::config_file_path()?;
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| PolsigError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_file, yaml)
            .map_err(|e| PolsigError::Config(format!("Failed to write config file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&config_file, fs::Permissions::from_mode(0o600)).map_err(|e| {
                PolsigError::Config(format!("Failed to set file permissions: {}", e))
            })?;
        }

        Ok(())
    }

    /// Environment variables win over the file
    pub fn apply_env(&mut self) {
        if let Some(user) = non_empty_env(PORTAL_USER_ENV) {
            self.portal.user = Some(user);
        }
        if let Some(pass) = non_empty_env(PORTAL_PASS_ENV) {
            self.portal.password = Some(pass);
        }
        if let Some(app_id) = non_empty_env(ESTAT_APP_ID_ENV) {
            self.estat.app_id = Some(app_id);
        }
    }

    /// Portal credentials when both halves are present
    pub fn portal_credentials(&self) -> Option<PortalCredentials> {
        match (&self.portal.user, &self.portal.password) {
            (Some(user), Some(password)) => PortalCredentials::new(user, password),
            _ => None,
        }
    }

    pub fn estat_app_id(&self) -> Option<String> {
        self.estat.app_id.clone().filter(|id| !id.trim().is_empty())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: self.http.timeout,
            max_retries: self.http.retries,
            ..ClientConfig::default()
        }
    }

    /// Update a value in memory by dotted key path
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "portal.user" => self.portal.user = Some(value.to_string()),
            "portal.password" => self.portal.password = Some(value.to_string()),
            "portal.article_url" => self.portal.article_url = Some(value.to_string()),
            "estat.app_id" => self.estat.app_id = Some(value.to_string()),
            "news.days" => self.news.days = parse_value(key, value)?,
            "diet.lookback_days" => self.diet.lookback_days = parse_value(key, value)?,
            "http.timeout" => self.http.timeout = parse_value(key, value)?,
            "http.retries" => self.http.retries = parse_value(key, value)?,
            _ => {
                let kind = key
                    .strip_prefix("sources.")
                    .and_then(SourceKind::from_str)
                    .ok_or_else(|| {
                        PolsigError::Config(format!("Unknown configuration key: {}", key))
                    })?;
                *self.sources.flag_mut(kind) = parse_value(key, value)?;
            }
        }
        Ok(())
    }

    /// Set a configuration value by key path and persist it
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(key, value)?;
        self.save()
    }

    /// Get a configuration value by key path
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "portal.user" => self.portal.user.clone(),
            "portal.password" => self.portal.password.as_ref().map(|_| "********".to_string()),
            "portal.article_url" => self.portal.article_url.clone(),
            "estat.app_id" => self.estat.app_id.clone(),
            "news.days" => Some(self.news.days.to_string()),
            "diet.lookback_days" => Some(self.diet.lookback_days.to_string()),
            "http.timeout" => Some(self.http.timeout.to_string()),
            "http.retries" => Some(self.http.retries.to_string()),
            _ => key
                .strip_prefix("sources.")
                .and_then(SourceKind::from_str)
                .map(|kind| self.sources.is_enabled(kind).to_string()),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PolsigError::Config(format!("Invalid value for {}: {}", key, value)))
}
