use serde::{Deserialize, Serialize};
use std::{fs, io, path::PathBuf};

/// Overrides the configured API base URL when set.
pub const API_URL_ENV: &str = "MPTUI_API_URL";

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub download_dir: PathBuf,
    pub alert_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            alert_timeout_secs: 5,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> PathBuf {
        dirs::config_dir() // Use the OS agnostic config dir on all systems
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mptui")
            .join("config.toml")
    }

    // The TUI owns the terminal, so diagnostics go to a file next to the config
    pub fn log_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mptui")
            .join("mptui.log")
    }

    pub fn load() -> Option<Self> {
        let path = Self::config_path();
        fs::read_to_string(&path)
            .ok()
            .and_then(|s| toml::from_str(&s).ok())
    }

    /// Load the config file, writing one with defaults on first run. The
    /// environment override wins over whatever the file says.
    pub fn load_or_create() -> io::Result<Self> {
        let config = match Self::load() {
            Some(cfg) => cfg,
            None => {
                let cfg = Self::default();
                cfg.save()?;
                cfg
            }
        };
        Ok(config.with_env_override())
    }

    fn with_env_override(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.is_empty() {
                self.api_url = url.trim_end_matches('/').to_string();
            }
        }
        self
    }

    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(
            path,
            toml::to_string_pretty(self).map_err(io::Error::other)?,
        )
    }
}
