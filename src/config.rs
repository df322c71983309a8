use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

pub const DEFAULT_HORIZON_URL: &str = "http://4.194.35.14:31401";
pub const PI_NETWORK_PASSPHRASE: &str = "Pi Network";
pub const DEFAULT_EXPLORER_TX_URL: &str = "https://blockexplorer.minepi.com/mainnet/transactions";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub bind_address: String,
    pub horizon_url: String,
    pub network_passphrase: String,
    /// Transaction links in notifications are `{explorer_tx_url}/{hash}`
    pub explorer_tx_url: String,
    pub settings_path: PathBuf,
    pub phrases_path: PathBuf,
    pub public_dir: PathBuf,
    pub cors_origins: Vec<String>,
    /// Pause between two accounts
    pub sweep_pace_ms: u64,
    pub http_timeout_secs: u64,
    /// Requests per minute allowed on the control API
    pub api_rate_limit: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            horizon_url: std::env::var("HORIZON_URL")
                .unwrap_or_else(|_| DEFAULT_HORIZON_URL.to_string()),
            network_passphrase: std::env::var("NETWORK_PASSPHRASE")
                .unwrap_or_else(|_| PI_NETWORK_PASSPHRASE.to_string()),
            explorer_tx_url: std::env::var("EXPLORER_TX_URL")
                .unwrap_or_else(|_| DEFAULT_EXPLORER_TX_URL.to_string()),
            settings_path: std::env::var("SETTINGS_PATH")
                .unwrap_or_else(|_| ".env".to_string())
                .into(),
            phrases_path: std::env::var("PHRASES_PATH")
                .unwrap_or_else(|_| "phrases.txt".to_string())
                .into(),
            public_dir: std::env::var("PUBLIC_DIR")
                .unwrap_or_else(|_| "public".to_string())
                .into(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            sweep_pace_ms: parse_env("SWEEP_PACE_MS", 200)?,
            http_timeout_secs: parse_env("HTTP_TIMEOUT_SECS", 30)?,
            api_rate_limit: parse_env("API_RATE_LIMIT", 120)?,
        })
    }

    pub fn sweep_pace(&self) -> Duration {
        Duration::from_millis(self.sweep_pace_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, config::ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| config::ConfigError::Message(format!("{} must be a number, got {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}
