//! Persistent application configuration model and defaults.

use std::path::PathBuf;

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Library store location.
    pub store: StoreConfig,
    #[serde(default)]
    /// Title lookup service settings.
    pub lookup: LookupConfig,
    #[serde(default)]
    /// Embedded player behavior.
    pub player: PlayerConfig,
    #[serde(default)]
    /// Host media-control surface publishing.
    pub media_controls: MediaControlsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct StoreConfig {
    /// Empty means the platform data directory.
    #[serde(default)]
    pub database_path: String,
}

impl StoreConfig {
    pub fn resolved_database_path(&self) -> PathBuf {
        let configured = self.database_path.trim();
        if !configured.is_empty() {
            return PathBuf::from(configured);
        }
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("tubelist")
            .join("library.db")
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LookupConfig {
    #[serde(default = "default_lookup_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_watch_url_base")]
    pub watch_url_base: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlayerConfig {
    /// Element id handed to the player engine on construction.
    #[serde(default = "default_container_id")]
    pub container_id: String,
    #[serde(default = "default_fade_window_ms")]
    pub fade_window_ms: u64,
    #[serde(default = "default_fade_poll_interval_ms")]
    pub fade_poll_interval_ms: u64,
    /// Start playing the restored list at startup instead of only cueing it.
    #[serde(default)]
    pub autoplay_on_startup: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct MediaControlsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_media_artist")]
    pub artist: String,
    #[serde(default = "default_media_album")]
    pub album: String,
    /// `{id}` is replaced by the track id.
    #[serde(default = "default_artwork_url_template")]
    pub artwork_url_template: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}

fn default_lookup_endpoint() -> String {
    "https://www.youtube.com/oembed".to_string()
}

fn default_watch_url_base() -> String {
    "https://www.youtube.com/watch?v=".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_read_timeout_ms() -> u64 {
    7_000
}

fn default_container_id() -> String {
    "player".to_string()
}

fn default_fade_window_ms() -> u64 {
    5_000
}

fn default_fade_poll_interval_ms() -> u64 {
    100
}

fn default_media_artist() -> String {
    "YouTube Playlist".to_string()
}

fn default_media_album() -> String {
    "My Playlist".to_string()
}

fn default_artwork_url_template() -> String {
    "https://img.youtube.com/vi/{id}/mqdefault.jpg".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: default_lookup_endpoint(),
            watch_url_base: default_watch_url_base(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            container_id: default_container_id(),
            fade_window_ms: default_fade_window_ms(),
            fade_poll_interval_ms: default_fade_poll_interval_ms(),
            autoplay_on_startup: false,
        }
    }
}

impl Default for MediaControlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            artist: default_media_artist(),
            album: default_media_album(),
            artwork_url_template: default_artwork_url_template(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level
            .trim()
            .parse::<log::LevelFilter>()
            .unwrap_or(log::LevelFilter::Info)
    }
}
