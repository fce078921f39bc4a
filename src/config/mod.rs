//! Configuration module for the wiki backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

/// Where the editing session persists its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageMode {
    /// Local key-value blob in the SQLite database
    Local,
    /// The shared hub hosted by this process
    Hub,
    /// A shared hub hosted elsewhere, reached over HTTP
    Remote { base_url: String },
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Local => "local",
            StorageMode::Hub => "hub",
            StorageMode::Remote { .. } => "remote",
        }
    }
}

/// Settings for the external extraction service.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// API key; extraction is disabled without one
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared admin passphrase; admin login is disabled when unset
    pub admin_passphrase: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub storage: StorageMode,
    /// Key protecting writes to the hosted hub, also sent to a remote hub
    pub hub_api_key: Option<String>,
    pub debounce: Duration,
    pub poll_interval: Duration,
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let admin_passphrase = env::var("WIKI_ADMIN_PASSPHRASE").ok();

        let db_path = env::var("WIKI_DB_PATH")
            .unwrap_or_else(|_| "./data/wiki.sqlite".to_string())
            .into();

        let bind_addr = env::var("WIKI_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid WIKI_BIND_ADDR format: {}", e)))?;

        let log_level = env::var("WIKI_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let storage = match env::var("WIKI_STORAGE")
            .unwrap_or_else(|_| "local".to_string())
            .as_str()
        {
            "local" => StorageMode::Local,
            "hub" => StorageMode::Hub,
            "remote" => {
                let base_url = env::var("WIKI_REMOTE_URL").map_err(|_| {
                    AppError::Validation(
                        "WIKI_REMOTE_URL is required when WIKI_STORAGE=remote".to_string(),
                    )
                })?;
                StorageMode::Remote {
                    base_url: base_url.trim_end_matches('/').to_string(),
                }
            }
            other => {
                return Err(AppError::Validation(format!(
                    "Unknown WIKI_STORAGE {:?} (expected local, hub or remote)",
                    other
                )))
            }
        };

        let hub_api_key = env::var("WIKI_HUB_API_KEY").ok();
        let debounce = millis_from_env("WIKI_DEBOUNCE_MS", 500)?;
        let poll_interval = millis_from_env("WIKI_POLL_INTERVAL_MS", 1000)?;

        let extraction = ExtractionConfig {
            api_key: env::var("GEMINI_API_KEY").ok(),
            model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-3-flash-preview".to_string()),
            base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
        };

        Ok(Self {
            admin_passphrase,
            db_path,
            bind_addr,
            log_level,
            storage,
            hub_api_key,
            debounce,
            poll_interval,
            extraction,
        })
    }
}

fn millis_from_env(key: &str, default: u64) -> Result<Duration, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| AppError::Validation(format!("{} must be a number of milliseconds", key))),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}
