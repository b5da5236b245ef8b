use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

pub const GOOGLE_TOKEN_ENV: &str = "TRACKSWEEP_GOOGLE_TOKEN";
pub const PORTAL_USERNAME_ENV: &str = "TRACKSWEEP_PORTAL_USERNAME";
pub const PORTAL_PASSWORD_ENV: &str = "TRACKSWEEP_PORTAL_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Only unread mail from this address is considered
    #[serde(default)]
    pub sender: String,

    #[serde(default = "default_link_phrase")]
    pub link_phrase: String,

    #[serde(default = "default_download_dir")]
    pub download_dir: String,

    /// Bearer token shared by the Gmail and Sheets clients
    pub google_access_token: Option<String>,

    #[serde(default = "default_gmail_api_url")]
    pub gmail_api_url: String,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub portal: PortalCredentials,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Sheets,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_backend")]
    pub backend: LedgerBackend,

    #[serde(default)]
    pub spreadsheet_id: String,

    #[serde(default = "default_main_tab")]
    pub main_tab: String,

    #[serde(default = "default_log_tab")]
    pub log_tab: String,

    #[serde(default = "default_sheets_api_url")]
    pub sheets_api_url: String,

    #[serde(default = "default_ledger_path")]
    pub sqlite_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalCredentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Pause after loading the release page while scanning
    #[serde(default = "default_scan_settle_secs")]
    pub scan_settle_secs: u64,

    /// Pause after loading the release page before downloading
    #[serde(default = "default_download_settle_secs")]
    pub download_settle_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_option_label")]
    pub option_label: String,

    #[serde(default = "default_option_timeout_secs")]
    pub option_timeout_secs: u64,

    #[serde(default = "default_post_click_secs")]
    pub post_click_secs: u64,

    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_partial_suffixes")]
    pub partial_suffixes: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tracksweep")
}

fn default_link_phrase() -> String {
    "Get Now".to_string()
}

fn default_download_dir() -> String {
    default_data_dir()
        .join("downloads")
        .to_string_lossy()
        .to_string()
}

fn default_gmail_api_url() -> String {
    "https://gmail.googleapis.com".to_string()
}

fn default_catalog_path() -> String {
    default_data_dir()
        .join("catalog.db")
        .to_string_lossy()
        .to_string()
}

fn default_ledger_backend() -> LedgerBackend {
    LedgerBackend::Sheets
}

fn default_main_tab() -> String {
    "Tracks".to_string()
}

fn default_log_tab() -> String {
    "AppSignature".to_string()
}

fn default_sheets_api_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_ledger_path() -> String {
    default_data_dir()
        .join("ledger.db")
        .to_string_lossy()
        .to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_true() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_scan_settle_secs() -> u64 {
    5
}

fn default_download_settle_secs() -> u64 {
    8
}

fn default_option_label() -> String {
    "Download WAV".to_string()
}

fn default_option_timeout_secs() -> u64 {
    10
}

fn default_post_click_secs() -> u64 {
    3
}

fn default_completion_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_partial_suffixes() -> Vec<String> {
    vec![".crdownload".to_string(), ".tmp".to_string()]
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: default_ledger_backend(),
            spreadsheet_id: String::new(),
            main_tab: default_main_tab(),
            log_tab: default_log_tab(),
            sheets_api_url: default_sheets_api_url(),
            sqlite_path: default_ledger_path(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: default_user_agent(),
            scan_settle_secs: default_scan_settle_secs(),
            download_settle_secs: default_download_settle_secs(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            option_label: default_option_label(),
            option_timeout_secs: default_option_timeout_secs(),
            post_click_secs: default_post_click_secs(),
            completion_timeout_secs: default_completion_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            partial_suffixes: default_partial_suffixes(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sender: String::new(),
            link_phrase: default_link_phrase(),
            download_dir: default_download_dir(),
            google_access_token: None,
            gmail_api_url: default_gmail_api_url(),
            catalog: CatalogConfig::default(),
            ledger: LedgerConfig::default(),
            portal: PortalCredentials::default(),
            browser: BrowserConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl BrowserConfig {
    pub fn scan_settle(&self) -> Duration {
        Duration::from_secs(self.scan_settle_secs)
    }

    pub fn download_settle(&self) -> Duration {
        Duration::from_secs(self.download_settle_secs)
    }
}

impl Config {
    /// Load from an explicit path, or from the default location (created on first run)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let config_path = Self::config_path();
                if config_path.exists() {
                    Self::read(&config_path)?
                } else {
                    let config = Config::default();
                    config.save(&config_path)?;
                    tracing::info!("Wrote default configuration to {:?}", config_path);
                    config
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tracksweep")
            .join("config.toml")
    }

    /// Secrets from the environment win over the file
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(GOOGLE_TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.google_access_token = Some(token);
        }
        if let Some(username) = lookup(PORTAL_USERNAME_ENV).filter(|v| !v.is_empty()) {
            self.portal.username = username;
        }
        if let Some(password) = lookup(PORTAL_PASSWORD_ENV).filter(|v| !v.is_empty()) {
            self.portal.password = password;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sender.trim().is_empty() {
            return Err(AppError::Config("`sender` must be set".to_string()));
        }
        if self.google_token().is_none() {
            return Err(AppError::Config(format!(
                "`google_access_token` must be set (or export {})",
                GOOGLE_TOKEN_ENV
            )));
        }
        if self.ledger.backend == LedgerBackend::Sheets && self.ledger.spreadsheet_id.is_empty() {
            return Err(AppError::Config(
                "`ledger.spreadsheet_id` is required for the sheets backend".to_string(),
            ));
        }
        for (key, value) in [
            ("gmail_api_url", &self.gmail_api_url),
            ("ledger.sheets_api_url", &self.ledger.sheets_api_url),
            ("browser.webdriver_url", &self.browser.webdriver_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("`{}` is not a valid URL: {}", key, e)))?;
        }
        if self.download.partial_suffixes.is_empty() {
            return Err(AppError::Config(
                "`download.partial_suffixes` must not be empty".to_string(),
            ));
        }
        if self.download.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "`download.poll_interval_ms` must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn google_token(&self) -> Option<&str> {
        self.google_access_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }

    pub fn download_root(&self) -> PathBuf {
        PathBuf::from(&self.download_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_parses_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            sender = "releases@label.example"
            google_access_token = "token"

            [ledger]
            spreadsheet_id = "sheet-1"

            [download]
            completion_timeout_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.link_phrase, "Get Now");
        assert_eq!(config.ledger.backend, LedgerBackend::Sheets);
        assert_eq!(config.ledger.main_tab, "Tracks");
        assert_eq!(config.download.completion_timeout_secs, 60);
        assert_eq!(config.download.option_label, "Download WAV");
        assert_eq!(
            config.download.partial_suffixes,
            vec![".crdownload".to_string(), ".tmp".to_string()]
        );
        assert!(config.browser.headless);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn environment_overrides_secrets() {
        let mut config = Config::default();
        config.portal.password = "from-file".to_string();

        config.apply_env_overrides(|key| match key {
            GOOGLE_TOKEN_ENV => Some("env-token".to_string()),
            PORTAL_PASSWORD_ENV => Some("env-secret".to_string()),
            PORTAL_USERNAME_ENV => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.google_token(), Some("env-token"));
        assert_eq!(config.portal.password, "env-secret");
        assert_eq!(config.portal.username, "");
    }

    #[test]
    fn validate_rejects_missing_pieces() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.sender = "releases@label.example".to_string();
        config.google_access_token = Some("token".to_string());
        assert!(config.validate().is_err(), "sheets backend needs an id");

        config.ledger.backend = LedgerBackend::Sqlite;
        assert!(config.validate().is_ok());

        config.browser.webdriver_url = "localhost 9515".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.sender = "releases@label.example".to_string();
        config.google_access_token = Some("token".to_string());
        config.ledger.backend = LedgerBackend::Sqlite;
        assert!(config.validate().is_ok());

        config.download.poll_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn save_then_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.sender = "releases@label.example".to_string();
        config.ledger.backend = LedgerBackend::Sqlite;
        config.save(&path).unwrap();

        let loaded = Config::read(&path).unwrap();
        assert_eq!(loaded.sender, "releases@label.example");
        assert_eq!(loaded.ledger.backend, LedgerBackend::Sqlite);
    }
}
