//! OS media controls bridge (MPRIS/SMTC/Now Playing).
//!
//! Publishes the loaded track and playback state to the host media-control
//! surface and relays transport actions from it onto the runtime bus. When
//! the host exposes no such surface, [`NullMediaControls`] turns every publish
//! into a no-op.

use log::{info, warn};
use souvlaki::{MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, PlatformConfig};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    config::MediaControlsConfig, player_controller::PlayerState, playlist::Track,
    protocol::Message, track_id::TrackId,
};

const MEDIA_CONTROLS_DISPLAY_NAME: &str = "Tubelist";
const MEDIA_CONTROLS_DBUS_NAME: &str = "tubelist";

/// Transport action requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaAction {
    Play,
    Pause,
    Toggle,
    Previous,
    Next,
}

/// Playback state as published to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishedPlayback {
    Stopped,
    Paused,
    Playing,
}

impl PublishedPlayback {
    /// A track that is loading without a pending autoplay is only cued, so
    /// it is reported as paused.
    pub fn for_player(state: PlayerState, autoplay_pending: bool) -> Self {
        match state {
            PlayerState::Loading if !autoplay_pending => Self::Paused,
            state => Self::from(state),
        }
    }
}

impl From<PlayerState> for PublishedPlayback {
    fn from(state: PlayerState) -> Self {
        match state {
            PlayerState::Uninitialized => Self::Stopped,
            PlayerState::Paused => Self::Paused,
            PlayerState::Loading | PlayerState::Playing | PlayerState::Ended => Self::Playing,
        }
    }
}

/// Metadata published for the loaded track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork_url: String,
}

/// Host capability for system-level media controls.
pub trait MediaControlSurface {
    fn set_metadata(&mut self, metadata: Option<&TrackMetadata>) -> Result<(), String>;
    fn set_playback(&mut self, playback: PublishedPlayback) -> Result<(), String>;
}

/// Surface used when the host has no media-control capability.
pub struct NullMediaControls;

impl MediaControlSurface for NullMediaControls {
    fn set_metadata(&mut self, _metadata: Option<&TrackMetadata>) -> Result<(), String> {
        Ok(())
    }

    fn set_playback(&mut self, _playback: PublishedPlayback) -> Result<(), String> {
        Ok(())
    }
}

/// Surface backed by the platform integration in `souvlaki`.
pub struct SouvlakiMediaControls {
    controls: MediaControls,
}

impl SouvlakiMediaControls {
    /// Attaches to the platform media controls. Returns `None` when the host
    /// does not provide them.
    #[cfg(not(target_os = "windows"))]
    pub fn new(bus_sender: UnboundedSender<Message>) -> Option<Self> {
        let mut controls = match MediaControls::new(PlatformConfig {
            display_name: MEDIA_CONTROLS_DISPLAY_NAME,
            dbus_name: MEDIA_CONTROLS_DBUS_NAME,
            hwnd: None,
        }) {
            Ok(controls) => controls,
            Err(err) => {
                warn!(
                    "MediaControlsManager: failed to create media controls backend: {:?}",
                    err
                );
                return None;
            }
        };

        if let Err(err) = controls.attach(move |event| {
            if let Some(action) = map_control_event(event) {
                let _ = bus_sender.send(Message::MediaControl(action));
            }
        }) {
            warn!(
                "MediaControlsManager: failed to attach media controls handler: {:?}",
                err
            );
            return None;
        }

        Some(Self { controls })
    }

    #[cfg(target_os = "windows")]
    pub fn new(_bus_sender: UnboundedSender<Message>) -> Option<Self> {
        // Souvlaki requires an HWND on Windows, which a console host does not own.
        warn!("MediaControlsManager: Windows media controls are disabled without a window handle");
        None
    }
}

impl MediaControlSurface for SouvlakiMediaControls {
    fn set_metadata(&mut self, metadata: Option<&TrackMetadata>) -> Result<(), String> {
        let result = match metadata {
            Some(metadata) => self.controls.set_metadata(MediaMetadata {
                title: Some(metadata.title.as_str()),
                artist: Some(metadata.artist.as_str()),
                album: Some(metadata.album.as_str()),
                cover_url: Some(metadata.artwork_url.as_str()),
                duration: None,
            }),
            None => self.controls.set_metadata(MediaMetadata::default()),
        };
        result.map_err(|err| format!("{err:?}"))
    }

    fn set_playback(&mut self, playback: PublishedPlayback) -> Result<(), String> {
        let playback = match playback {
            PublishedPlayback::Stopped => MediaPlayback::Stopped,
            PublishedPlayback::Paused => MediaPlayback::Paused { progress: None },
            PublishedPlayback::Playing => MediaPlayback::Playing { progress: None },
        };
        self.controls
            .set_playback(playback)
            .map_err(|err| format!("{err:?}"))
    }
}

/// Maps a host control event to a transport action. Seeking, volume and
/// window events are not handled.
pub fn map_control_event(event: MediaControlEvent) -> Option<MediaAction> {
    match event {
        MediaControlEvent::Play => Some(MediaAction::Play),
        MediaControlEvent::Pause | MediaControlEvent::Stop => Some(MediaAction::Pause),
        MediaControlEvent::Toggle => Some(MediaAction::Toggle),
        MediaControlEvent::Next => Some(MediaAction::Next),
        MediaControlEvent::Previous => Some(MediaAction::Previous),
        MediaControlEvent::Seek(_)
        | MediaControlEvent::SeekBy(_, _)
        | MediaControlEvent::SetPosition(_)
        | MediaControlEvent::SetVolume(_)
        | MediaControlEvent::OpenUri(_)
        | MediaControlEvent::Raise
        | MediaControlEvent::Quit => None,
    }
}

/// Publishes session state to a [`MediaControlSurface`], skipping updates
/// that would not change what the host already shows.
pub struct MediaControlsManager {
    surface: Box<dyn MediaControlSurface>,
    config: MediaControlsConfig,
    last_published_playback: Option<PublishedPlayback>,
    last_published_metadata: Option<TrackMetadata>,
}

impl MediaControlsManager {
    pub fn new(surface: Box<dyn MediaControlSurface>, config: MediaControlsConfig) -> Self {
        Self {
            surface,
            config,
            last_published_playback: None,
            last_published_metadata: None,
        }
    }

    /// Manager that never reaches the host.
    pub fn disabled() -> Self {
        Self::new(Box::new(NullMediaControls), MediaControlsConfig::default())
    }

    pub fn artwork_url(&self, id: &TrackId) -> String {
        self.config
            .artwork_url_template
            .replace("{id}", id.as_str())
    }

    pub fn metadata_for(&self, track: &Track) -> TrackMetadata {
        TrackMetadata {
            title: track.title.clone(),
            artist: self.config.artist.clone(),
            album: self.config.album.clone(),
            artwork_url: self.artwork_url(&track.id),
        }
    }

    /// Publishes a freshly loaded track. Playback is reported active only
    /// when the track was loaded to autoplay.
    pub fn publish_track(&mut self, track: &Track, autoplay: bool) {
        let metadata = self.metadata_for(track);
        self.publish_metadata_if_needed(Some(metadata));
        let playback = if autoplay {
            PublishedPlayback::Playing
        } else {
            PublishedPlayback::Paused
        };
        self.publish_playback_if_needed(playback);
    }

    /// Re-publishes metadata if the title of the loaded track changed.
    pub fn refresh_track(&mut self, track: &Track) {
        if self.last_published_metadata.is_none() {
            return;
        }
        let metadata = self.metadata_for(track);
        self.publish_metadata_if_needed(Some(metadata));
    }

    pub fn publish_state(&mut self, state: PlayerState, autoplay_pending: bool) {
        self.publish_playback_if_needed(PublishedPlayback::for_player(state, autoplay_pending));
    }

    /// Clears metadata and reports playback stopped.
    pub fn clear(&mut self) {
        self.publish_metadata_if_needed(None);
        self.publish_playback_if_needed(PublishedPlayback::Stopped);
    }

    fn publish_metadata_if_needed(&mut self, metadata: Option<TrackMetadata>) {
        if self.last_published_metadata == metadata {
            return;
        }
        if let Err(err) = self.surface.set_metadata(metadata.as_ref()) {
            warn!("MediaControlsManager: failed to publish metadata: {}", err);
            return;
        }
        if let Some(metadata) = metadata.as_ref() {
            info!("MediaControlsManager: now playing '{}'", metadata.title);
        }
        self.last_published_metadata = metadata;
    }

    fn publish_playback_if_needed(&mut self, playback: PublishedPlayback) {
        if self.last_published_playback == Some(playback) {
            return;
        }
        if let Err(err) = self.surface.set_playback(playback) {
            warn!(
                "MediaControlsManager: failed to publish playback state {:?}: {}",
                playback, err
            );
            return;
        }
        self.last_published_playback = Some(playback);
    }
}
