//! Client-side media session manager for playlists of hosted videos.
//!
//! The [`playlist_session::PlaylistSession`] owns the library and the loaded
//! track, [`player_controller::PlayerController`] drives the embedded player
//! lifecycle and near-end fade, and [`media_controls_manager`] mirrors the
//! current track onto the host's media controls. [`app_runtime::AppRuntime`]
//! wires them to a single ordered message bus.

pub mod app_runtime;
pub mod config;
pub mod config_persistence;
pub mod db_manager;
pub mod error;
pub mod fade_timer;
pub mod library;
pub mod media_controls_manager;
pub mod player_controller;
pub mod player_engine;
pub mod playlist;
pub mod playlist_session;
pub mod protocol;
pub mod title_resolver;
pub mod track_id;

#[cfg(test)]
mod test_support;
