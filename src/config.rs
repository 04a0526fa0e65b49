use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "aicc-digest";
/// Upper bound on the refresh period: one week.
const MAX_AUTO_REFRESH_MINUTES: u64 = 7 * 24 * 60;

pub const DEFAULT_ENDPOINT: &str = "https://aicharactercards.com/wp-json/aicc/v1/daily-summary/";
pub const DEFAULT_LATEST_URL: &str = "https://aicharactercards.com/recent-cards";
pub const DEFAULT_TRENDING_URL: &str = "https://aicharactercards.com/recent-cards#trending";
pub const DEFAULT_MODULE_KEY: &str = "aiCharacterCards";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub latest_url: String,
    pub trending_url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 10,
            user_agent: format!("aicc-digest/{}", env!("CARGO_PKG_VERSION")),
            latest_url: DEFAULT_LATEST_URL.to_string(),
            trending_url: DEFAULT_TRENDING_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where the module-keyed settings map lives. Defaults to the platform
    /// data directory.
    pub settings_path: Option<PathBuf>,
    pub module_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_path: None,
            module_key: DEFAULT_MODULE_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// 0 disables periodic refresh; the summary is then fetched once at startup.
    pub auto_refresh_minutes: u64,
    pub button_reset_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            auto_refresh_minutes: 0,
            button_reset_ms: 1500,
        }
    }
}

impl UiConfig {
    /// Interval between periodic refreshes, or `None` when disabled. Values
    /// above one week are clamped to one week.
    pub fn auto_refresh_period(&self) -> Option<Duration> {
        if self.auto_refresh_minutes == 0 {
            return None;
        }
        let minutes = self.auto_refresh_minutes.min(MAX_AUTO_REFRESH_MINUTES);
        Some(Duration::from_secs(minutes * 60))
    }
}

impl Config {
    /// Load from `path`, or from the default location. A missing file yields
    /// the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.storage
            .settings_path
            .clone()
            .unwrap_or_else(|| data_dir().join("settings.json"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.logging
            .file
            .clone()
            .unwrap_or_else(|| data_dir().join("aicc-digest.log"))
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}
