// Configuration management

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::AppConfig;

const APP_DIR: &str = "docstream";
const CONFIG_FILE: &str = "config.toml";
const CREDENTIALS_FILE: &str = "credentials.toml";

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join(APP_DIR);

    fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

    Ok(config_dir)
}

pub fn get_credentials_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CREDENTIALS_FILE))
}

pub fn get_log_dir() -> Result<PathBuf> {
    let log_dir = get_config_dir()?.join("logs");
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
    Ok(log_dir)
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&get_config_dir()?)
}

/// Load `config.toml` from `dir`, writing the defaults on first use.
pub fn load_config_from(dir: &Path) -> Result<AppConfig> {
    let config_path = dir.join(CONFIG_FILE);

    if !config_path.exists() {
        let default_config = AppConfig::default();
        save_config_to(dir, &default_config)?;
        return Ok(default_config);
    }

    let contents = fs::read_to_string(&config_path).context("Failed to read config file")?;

    let config: AppConfig = toml::from_str(&contents).context("Failed to parse config file")?;

    Ok(config)
}

pub fn save_config_to(dir: &Path, config: &AppConfig) -> Result<()> {
    let config_path = dir.join(CONFIG_FILE);

    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(&config_path, contents).context("Failed to write config file")?;

    Ok(())
}
