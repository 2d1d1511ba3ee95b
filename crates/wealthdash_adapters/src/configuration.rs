use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use wealthdash_core::config::Settings;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "wealthdash", "wealthdash")
}

/// Platform config directory, home of `config.toml` and the accounts file
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("config"))
}

/// Platform data directory
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Accounts file from settings, else `config.json` in the config directory
pub fn accounts_path(settings: &Settings) -> PathBuf {
    settings
        .accounts
        .path
        .clone()
        .unwrap_or_else(|| config_dir().join("config.json"))
}

/// Export workbook directory from settings, else `exports` in the data directory
pub fn export_dir(settings: &Settings) -> PathBuf {
    settings
        .export
        .output_dir
        .clone()
        .unwrap_or_else(|| data_dir().join("exports"))
}

pub fn get_configuration_with_paths(
    current_dir_path: Option<PathBuf>,
    system_config_dir_path: Option<PathBuf>,
) -> Result<Settings, config::ConfigError> {
    let config_directory = current_dir_path.unwrap_or_else(|| {
        std::env::current_dir()
            .map(|p| p.join("config"))
            .unwrap_or_else(|_| PathBuf::from("config"))
    });

    let system_config_dir = system_config_dir_path.unwrap_or_else(config_dir);

    let settings = Config::builder()
        // Broker endpoints
        .set_default("broker.base_url", "https://api.kite.trade")?
        .set_default("broker.login_url", "https://kite.zerodha.com/connect/login")?
        .set_default("broker.timeout_secs", 30)?
        // Authentication
        .set_default("auth.prefer_cached_session", true)?
        .set_default("auth.timeout_secs", 30)?
        // Daily export
        .set_default("export.run_at", "17:30")?
        .set_default("export.enabled", false)?
        .set_default("log_level", "info")?
        .add_source(File::from(system_config_dir.join("config.toml")).required(false))
        .add_source(File::from(config_directory.join("config.toml")).required(false))
        .add_source(Environment::with_prefix("WEALTHDASH").separator("__"))
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    get_configuration_with_paths(None, None)
}
