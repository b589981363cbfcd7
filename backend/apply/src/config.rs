//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Directory holding contracts and packet files
    pub media_root: PathBuf,
    /// Notifier channels events are fanned out to, in order
    pub notify_channels: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./apply.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3002".to_string())
                .parse()
                .map_err(|_| AppError::Config("Invalid API_PORT".to_string()))?,
            media_root: env_var("MEDIA_ROOT")
                .unwrap_or_else(|_| "./media".to_string())
                .into(),
            notify_channels: parse_channels(
                &env_var("NOTIFY_CHANNELS").unwrap_or_else(|_| "activity,log".to_string()),
            )?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| AppError::Config(format!("Missing env var: {key}")))
}

/// Comma separated channel names. An empty list silences notifications.
pub fn parse_channels(raw: &str) -> Result<Vec<String>> {
    let mut channels = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !crate::notify::CHANNELS.contains(&name) {
            return Err(AppError::Config(format!(
                "Unknown notify channel in NOTIFY_CHANNELS: {name}"
            )));
        }
        if !channels.iter().any(|c| c == name) {
            channels.push(name.to_string());
        }
    }
    Ok(channels)
}
