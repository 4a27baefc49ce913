//! Runtime bus protocol.
//!
//! Every input that can reach the playlist session travels as a [`Message`]
//! and is handled strictly in arrival order by the runtime loop.

use std::path::PathBuf;

use crate::{media_controls_manager::MediaAction, player_engine::PlayerEvent, track_id::TrackId};

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Event from the current player instance.
    Player { instance: u64, event: PlayerEvent },
    /// Transport action invoked from the host media-control surface.
    MediaControl(MediaAction),
    /// Completed title lookup, applied by identifier.
    TitleResolved { id: TrackId, title: String },
    /// Periodic fade sample from the timer of the given generation.
    FadeTick { generation: u64 },
    /// View-layer command.
    Command(SessionCommand),
}

/// Commands issued by the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    AddTrack(String),
    DeleteTrack { index: usize, confirmed: bool },
    PlayTrack(usize),
    SwitchList(String),
    CreateList(String),
    DeleteList(String),
    Shuffle,
    ExportLibrary(PathBuf),
    ImportLibrary(PathBuf),
    Show,
    Quit,
}
