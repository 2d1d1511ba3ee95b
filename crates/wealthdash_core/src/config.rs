use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub accounts: AccountSettings,
    pub broker: BrokerSettings,
    pub auth: AuthSettings,
    pub export: ExportSettings,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AccountSettings {
    /// Accounts file; defaults to `config.json` in the config directory
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BrokerSettings {
    pub base_url: String,
    pub login_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthSettings {
    pub prefer_cached_session: bool,
    /// Upper bound for the token exchange and the profile check, each
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExportSettings {
    /// Workbook directory; defaults to `exports` in the data directory
    pub output_dir: Option<PathBuf>,
    /// Daily local time of the scheduled export, `HH:MM`
    pub run_at: String,
    pub enabled: bool,
}

impl BrokerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AuthSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ExportSettings {
    pub fn schedule_time(&self) -> Result<NaiveTime, Error> {
        parse_time_of_day(&self.run_at)
    }
}

/// Parse `HH:MM` (24h) into a time of day
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, Error> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
        Error::Configuration(format!("invalid time of day '{}': {}", value, e))
    })
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accounts: AccountSettings::default(),
            broker: BrokerSettings::default(),
            auth: AuthSettings::default(),
            export: ExportSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.kite.trade".to_string(),
            login_url: "https://kite.zerodha.com/connect/login".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            prefer_cached_session: true,
            timeout_secs: 30,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: None,
            run_at: "17:30".to_string(),
            enabled: false,
        }
    }
}
