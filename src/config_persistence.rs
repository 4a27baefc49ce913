//! Loading, sanitizing and first-run creation of `config.toml`.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::{Config, LookupConfig, PlayerConfig};

const CONFIG_DIR_NAME: &str = "tubelist";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default location of the config file.
pub fn default_config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// Clamps values that would make the runtime misbehave.
pub fn sanitize_config(config: Config) -> Config {
    let player = PlayerConfig {
        container_id: if config.player.container_id.trim().is_empty() {
            PlayerConfig::default().container_id
        } else {
            config.player.container_id.trim().to_string()
        },
        fade_window_ms: config.player.fade_window_ms.clamp(500, 30_000),
        fade_poll_interval_ms: config.player.fade_poll_interval_ms.clamp(20, 1_000),
        autoplay_on_startup: config.player.autoplay_on_startup,
    };
    let lookup = LookupConfig {
        connect_timeout_ms: config.lookup.connect_timeout_ms.clamp(100, 60_000),
        read_timeout_ms: config.lookup.read_timeout_ms.clamp(100, 60_000),
        ..config.lookup
    };

    Config {
        player,
        lookup,
        ..config
    }
}

/// Reads the config file, creating it with defaults if missing.
///
/// An unreadable or unparsable file falls back to defaults without being
/// overwritten.
pub fn load_or_create_config(config_file: &Path) -> Config {
    if !config_file.exists() {
        let default_config = sanitize_config(Config::default());
        info!(
            "Config file not found. Creating default config. path={}",
            config_file.display()
        );
        if let Err(err) = write_config(config_file, &default_config) {
            warn!(
                "Failed to write default config to {}: {}",
                config_file.display(),
                err
            );
        }
        return default_config;
    }

    let content = match std::fs::read_to_string(config_file) {
        Ok(content) => content,
        Err(err) => {
            warn!(
                "Failed to read config {}: {}. Using defaults",
                config_file.display(),
                err
            );
            return sanitize_config(Config::default());
        }
    };

    match toml::from_str::<Config>(&content) {
        Ok(config) => sanitize_config(config),
        Err(err) => {
            warn!(
                "Failed to parse config {}: {}. Using defaults",
                config_file.display(),
                err
            );
            sanitize_config(Config::default())
        }
    }
}

fn write_config(config_file: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = config_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_file, toml::to_string(config)?)?;
    Ok(())
}
