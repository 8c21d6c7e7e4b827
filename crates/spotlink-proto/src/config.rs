use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

/// Spotify application settings.  Both endpoint bases are configurable so
/// tests can point them at mock servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    /// OAuth client id of the registered Spotify application.  Empty means
    /// not configured: resolution degrades to the search-page fallback.
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_accounts_url")]
    pub accounts_url: String,
    /// Loopback port for the interactive authorization redirect.  Must match
    /// the redirect URI registered with the Spotify application.
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            status_file: default_status_file(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_http_port(),
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            api_url: default_api_url(),
            accounts_url: default_accounts_url(),
            redirect_port: default_redirect_port(),
        }
    }
}

fn default_status_file() -> PathBuf {
    platform::data_dir().join("status.json")
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8990
}

fn default_api_url() -> String {
    "https://api.spotify.com".to_string()
}

fn default_accounts_url() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_redirect_port() -> u16 {
    8898
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Path of the stored credential record (one per installation).
    pub fn credential_file(&self) -> PathBuf {
        platform::data_dir().join("credential.json")
    }
}
