use crate::error::Result;
use crate::types::SeedSource;
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

// Include the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../assets/config.toml");

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "IPTV_UPDATER_CONFIG";

/// 运行参数. 所有字段都有默认值, 用户配置只需写要覆盖的部分.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sources: Vec<SeedSource>,
    pub output_path: PathBuf,
    pub failed_log_path: PathBuf,
    pub speed_threshold: f64,
    pub request_timeout_secs: u64,
    pub stream_connect_timeout_secs: u64,
    pub stream_read_timeout_secs: u64,
    pub speed_test_cap_secs: f64,
    pub endpoint_workers: usize,
    pub speed_workers: usize,
    pub user_agent: String,
    pub retry_attempts: u32,
    pub retry_backoff_secs: f64,
    pub retry_statuses: Vec<u16>,
    pub probe_path: String,
    pub probe_query: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            output_path: PathBuf::from("zby.txt"),
            failed_log_path: PathBuf::from("failed_urls.log"),
            speed_threshold: 0.1,
            request_timeout_secs: 15,
            stream_connect_timeout_secs: 10,
            stream_read_timeout_secs: 15,
            speed_test_cap_secs: 8.0,
            endpoint_workers: 5,
            speed_workers: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            retry_attempts: 5,
            retry_backoff_secs: 0.5,
            retry_statuses: vec![429, 500, 502, 503, 504],
            probe_path: "/iptv/live/1000.json".to_string(),
            probe_query: "key=txiptv".to_string(),
        }
    }
}

impl Settings {
    /// Load settings
    /// Strategy:
    /// 1. $IPTV_UPDATER_CONFIG, if set (errors are fatal: the user asked for this file)
    /// 2. User config (~/.config/iptv-updater/config.toml), skipped with a warning if malformed
    /// 3. Built-in assets/config.toml
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let settings = Self::from_file(Path::new(&path))?;
            info!(path = %path, "Loaded config from {}", CONFIG_ENV);
            return Ok(settings);
        }

        if let Some(proj_dirs) = ProjectDirs::from("", "", "iptv-updater") {
            let config_path = proj_dirs.config_dir().join("config.toml");
            if config_path.exists() {
                match Self::from_file(&config_path) {
                    Ok(settings) => {
                        info!(path = ?config_path, "Loaded local config");
                        return Ok(settings);
                    }
                    Err(e) => warn!(path = ?config_path, error = %e, "Ignoring malformed local config"),
                }
            }
        }

        Self::builtin()
    }

    pub fn builtin() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_connect_timeout_secs)
    }

    pub fn stream_read_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_read_timeout_secs)
    }

    pub fn speed_test_cap(&self) -> Duration {
        Duration::from_secs_f64(self.speed_test_cap_secs.max(0.0))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.retry_backoff_secs.max(0.0))
    }
}
