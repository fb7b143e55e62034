use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = ".docchat";
const CONFIG_FILE_NAME: &str = "config.toml";
const TOKEN_FILE_NAME: &str = "credentials.json";

pub const API_BASE_ENV: &str = "DOCCHAT_API_BASE";
pub const WS_URL_ENV: &str = "DOCCHAT_WS_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub socket: SocketConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_base")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SocketConfig {
    #[serde(default = "default_ws_url")]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            url: default_ws_url(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&content).context("failed to parse config toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads `explicit` if given, else the per-user config file if it exists,
    /// else defaults. Environment overrides are applied last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::load(&path)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_overrides(
            std::env::var(API_BASE_ENV).ok(),
            std::env::var(WS_URL_ENV).ok(),
        );
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_overrides(&mut self, api_base: Option<String>, ws_url: Option<String>) {
        if let Some(base) = api_base.filter(|s| !s.trim().is_empty()) {
            self.api.base_url = base;
        }
        if let Some(url) = ws_url.filter(|s| !s.trim().is_empty()) {
            self.socket.url = url;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            bail!("api.base_url must not be empty");
        }
        if self.socket.url.trim().is_empty() {
            bail!("socket.url must not be empty");
        }
        Ok(())
    }
}

pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    app_dir().join(CONFIG_FILE_NAME)
}

fn default_api_base() -> String {
    "http://localhost:8000".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8000/ws/chat".to_string()
}

fn default_token_path() -> PathBuf {
    app_dir().join(TOKEN_FILE_NAME)
}
