//! Configuration
//!
//! Read from `config.toml` (every section optional), then overridden by
//! environment variables, which `main` may have loaded from a `.env` file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono_tz::Tz;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::api::resilience::RetryConfig;
use crate::migration::importer::{DEFAULT_CUSTOMERS_SHEET, DEFAULT_ORDERS_SHEET};

pub const API_TOKEN_ENV: &str = "MIGRATION_API_TOKEN";
pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const SERVICE_ACCOUNT_ENV: &str = "GOOGLE_SERVICE_ACCOUNT_FILE";
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_ACCESS_TOKEN";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Bearer token required by `POST /api/migrate`
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Google Sheets API; the sheet id is the spreadsheet id
    #[default]
    Google,
    /// Local workbook; the sheet id is its path
    Xlsx,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub orders_sheet: String,
    pub customers_sheet: String,
    pub service_account_file: Option<PathBuf>,
    /// Pre-issued OAuth token, used when no service account file is set
    pub access_token: Option<String>,
    /// Directory relative xlsx paths are resolved against
    pub xlsx_root: Option<PathBuf>,
    /// IANA zone for naive timestamps in the sheet
    pub timezone: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            orders_sheet: DEFAULT_ORDERS_SHEET.to_string(),
            customers_sheet: DEFAULT_CUSTOMERS_SHEET.to_string(),
            service_account_file: None,
            access_token: None,
            xlsx_root: None,
            timezone: "Asia/Taipei".to_string(),
        }
    }
}

impl SourceConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Supabase,
    Sqlite,
    /// Throwaway in-process tables, for previews
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Supabase project URL
    pub url: Option<String>,
    /// Supabase service-role key
    pub service_key: Option<String>,
    /// SQLite connection string
    pub database_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            url: None,
            service_key: None,
            database_url: "sqlite://sheets-migrate.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            backoff_multiplier: defaults.backoff_multiplier,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier: settings.backoff_multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Lifetime of the cached last result; 0 keeps it until replaced
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

impl Config {
    /// `~/.config/sheets-migrate/config.toml` (platform equivalent)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sheets-migrate").join("config.toml"))
    }

    /// Load from `path`, or from the default location if it exists, then
    /// apply environment overrides. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Environment values win over file values; empty values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(API_TOKEN_ENV) {
            self.server.api_token = Some(token);
        }
        if let Some(url) = get(SUPABASE_URL_ENV) {
            self.store.url = Some(url);
        }
        if let Some(key) = get(SUPABASE_KEY_ENV) {
            self.store.service_key = Some(key);
        }
        if let Some(file) = get(SERVICE_ACCOUNT_ENV) {
            self.source.service_account_file = Some(PathBuf::from(file));
        }
        if let Some(token) = get(ACCESS_TOKEN_ENV) {
            self.source.access_token = Some(token);
        }
        if let Some(url) = get(DATABASE_URL_ENV) {
            self.store.database_url = url;
        }
    }

    fn validate(&self) -> Result<()> {
        self.source.timezone()?;
        if self.retry.backoff_multiplier < 1.0 {
            bail!(
                "retry.backoff_multiplier must be at least 1.0, got {}",
                self.retry.backoff_multiplier
            );
        }
        Ok(())
    }
}
