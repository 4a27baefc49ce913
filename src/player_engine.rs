//! Contract consumed from the embedded player engine.
//!
//! The engine owns its own asynchronous lifecycle. Commands issued through a
//! [`PlayerHandle`] are fire-and-forget; their outcome is observed only through
//! [`PlayerEvent`]s posted back onto the runtime bus.

use std::time::Instant;

use log::{debug, info};
use tokio::sync::mpsc::UnboundedSender;

use crate::{protocol::Message, track_id::TrackId};

/// Engine-reported playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Playing,
    Paused,
    Ended,
    /// Buffering, cued, unstarted and any other engine-specific state.
    Other,
}

/// Events emitted by the engine for the current player instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Ready,
    StateChanged(EngineState),
}

/// A live player instance.
pub trait PlayerHandle {
    /// Replaces the loaded track; the engine starts playing it when ready.
    fn load_track(&mut self, id: &TrackId);
    fn play(&mut self);
    fn pause(&mut self);
    fn destroy(&mut self);
    /// Total duration in seconds, 0 when not yet known.
    fn duration_secs(&self) -> f64;
    fn elapsed_secs(&self) -> f64;
}

/// Factory for player instances plus the visual surface they render into.
pub trait PlayerEngine {
    /// Creates a player instance. Every event it emits must carry `instance`
    /// so events from a destroyed instance can be told apart.
    fn create(
        &mut self,
        container_id: &str,
        id: &TrackId,
        autoplay: bool,
        instance: u64,
    ) -> Box<dyn PlayerHandle>;
    /// Sets the opacity of the element hosting the player, `0.0..=1.0`.
    fn set_opacity(&mut self, container_id: &str, opacity: f64);
}

/// Engine used when no real player surface is attached.
///
/// Logs every command and reports the state transitions a real engine would
/// emit. Duration is never known, so tracks do not end on their own.
pub struct HeadlessPlayerEngine {
    bus_sender: UnboundedSender<Message>,
}

impl HeadlessPlayerEngine {
    pub fn new(bus_sender: UnboundedSender<Message>) -> Self {
        Self { bus_sender }
    }
}

impl PlayerEngine for HeadlessPlayerEngine {
    fn create(
        &mut self,
        container_id: &str,
        id: &TrackId,
        autoplay: bool,
        instance: u64,
    ) -> Box<dyn PlayerHandle> {
        info!(
            "HeadlessPlayerEngine: create container={} track={} autoplay={} instance={}",
            container_id, id, autoplay, instance
        );
        let handle = HeadlessPlayerHandle {
            bus_sender: self.bus_sender.clone(),
            instance,
            track_id: id.clone(),
            started_at: None,
            elapsed_before_pause: 0.0,
            destroyed: false,
        };
        handle.emit(PlayerEvent::Ready);
        if !autoplay {
            handle.emit(PlayerEvent::StateChanged(EngineState::Other));
        }
        Box::new(handle)
    }

    fn set_opacity(&mut self, container_id: &str, opacity: f64) {
        debug!(
            "HeadlessPlayerEngine: container={} opacity={:.2}",
            container_id, opacity
        );
    }
}

struct HeadlessPlayerHandle {
    bus_sender: UnboundedSender<Message>,
    instance: u64,
    track_id: TrackId,
    started_at: Option<Instant>,
    elapsed_before_pause: f64,
    destroyed: bool,
}

impl HeadlessPlayerHandle {
    fn emit(&self, event: PlayerEvent) {
        if self.destroyed {
            return;
        }
        let _ = self.bus_sender.send(Message::Player {
            instance: self.instance,
            event,
        });
    }
}

impl PlayerHandle for HeadlessPlayerHandle {
    fn load_track(&mut self, id: &TrackId) {
        info!("HeadlessPlayerEngine: load track={}", id);
        self.track_id = id.clone();
        self.elapsed_before_pause = 0.0;
        self.started_at = Some(Instant::now());
        self.emit(PlayerEvent::StateChanged(EngineState::Playing));
    }

    fn play(&mut self) {
        if self.started_at.is_some() {
            return;
        }
        info!("HeadlessPlayerEngine: play track={}", self.track_id);
        self.started_at = Some(Instant::now());
        self.emit(PlayerEvent::StateChanged(EngineState::Playing));
    }

    fn pause(&mut self) {
        let Some(started_at) = self.started_at.take() else {
            return;
        };
        info!("HeadlessPlayerEngine: pause track={}", self.track_id);
        self.elapsed_before_pause += started_at.elapsed().as_secs_f64();
        self.emit(PlayerEvent::StateChanged(EngineState::Paused));
    }

    fn destroy(&mut self) {
        info!("HeadlessPlayerEngine: destroy track={}", self.track_id);
        self.destroyed = true;
        self.started_at = None;
    }

    fn duration_secs(&self) -> f64 {
        0.0
    }

    fn elapsed_secs(&self) -> f64 {
        self.elapsed_before_pause
            + self
                .started_at
                .map(|started_at| started_at.elapsed().as_secs_f64())
                .unwrap_or(0.0)
    }
}
