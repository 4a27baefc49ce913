//! Lifecycle controller for the single embedded player instance.
//!
//! States: `Uninitialized -> Loading -> Playing -> (Paused | Ended)`. `Paused`
//! and `Playing` alternate on explicit play/pause. `Ended` is reported to the
//! caller, which decides the next track. The fade timer only runs while
//! `Playing` and is cancelled before any other transition is processed.

use std::time::Duration;

use log::{debug, trace};

use crate::{
    config::PlayerConfig,
    fade_timer::{fade_opacity, FadeScheduler, FadeTask},
    player_engine::{EngineState, PlayerEngine, PlayerEvent, PlayerHandle},
    track_id::TrackId,
};

const FULL_OPACITY: f64 = 1.0;

/// Lifecycle state of the embedded player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Uninitialized,
    Loading,
    Playing,
    Paused,
    Ended,
}

/// Owns the player handle, its lifecycle state and the fade timer.
pub struct PlayerController {
    engine: Box<dyn PlayerEngine>,
    fade_scheduler: Box<dyn FadeScheduler>,
    handle: Option<Box<dyn PlayerHandle>>,
    state: PlayerState,
    autoplay_pending: bool,
    fade_task: Option<FadeTask>,
    fade_generation: u64,
    instance: u64,
    container_id: String,
    fade_window: Duration,
    fade_poll_interval: Duration,
}

impl PlayerController {
    pub fn new(
        engine: Box<dyn PlayerEngine>,
        fade_scheduler: Box<dyn FadeScheduler>,
        config: &PlayerConfig,
    ) -> Self {
        Self {
            engine,
            fade_scheduler,
            handle: None,
            state: PlayerState::Uninitialized,
            autoplay_pending: false,
            fade_task: None,
            fade_generation: 0,
            instance: 0,
            container_id: config.container_id.clone(),
            fade_window: Duration::from_millis(config.fade_window_ms),
            fade_poll_interval: Duration::from_millis(config.fade_poll_interval_ms),
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Tag of the most recently created player instance.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// True while the loaded track is expected to start on its own.
    pub fn autoplay_pending(&self) -> bool {
        self.autoplay_pending
    }

    pub fn has_player(&self) -> bool {
        self.handle.is_some()
    }

    /// True when a newly added track may take over the player.
    pub fn is_idle(&self) -> bool {
        match self.state {
            PlayerState::Uninitialized | PlayerState::Paused | PlayerState::Ended => true,
            PlayerState::Loading => !self.autoplay_pending,
            PlayerState::Playing => false,
        }
    }

    /// Loads a track, creating the player instance if needed.
    ///
    /// With `autoplay` the engine is expected to start playback once loaded;
    /// without it the track is only cued and a fresh instance is created.
    pub fn load(&mut self, id: &TrackId, autoplay: bool) {
        self.stop_fade();
        self.autoplay_pending = autoplay;
        self.state = PlayerState::Loading;

        if autoplay {
            if let Some(handle) = self.handle.as_mut() {
                debug!("PlayerController: loading {} into existing player", id);
                handle.load_track(id);
                return;
            }
        }

        self.destroy_handle();
        self.instance += 1;
        debug!(
            "PlayerController: creating player {} for {} (autoplay={})",
            self.instance, id, autoplay
        );
        self.handle = Some(
            self.engine
                .create(&self.container_id, id, autoplay, self.instance),
        );
    }

    /// Destroys the player instance and returns to `Uninitialized`.
    pub fn teardown(&mut self) {
        self.stop_fade();
        self.destroy_handle();
        self.autoplay_pending = false;
        self.state = PlayerState::Uninitialized;
    }

    /// Requests playback. Returns false if there is no player to resume.
    pub fn play(&mut self) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        self.autoplay_pending = true;
        handle.play();
        true
    }

    pub fn pause(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.pause();
        }
    }

    /// Applies one engine event emitted by player `instance` and returns the
    /// resulting state. Events from any other instance are ignored.
    pub fn handle_event(&mut self, instance: u64, event: PlayerEvent) -> PlayerState {
        if self.handle.is_none() {
            trace!("PlayerController: ignoring {:?} without a player", event);
            return self.state;
        }
        if instance != self.instance {
            trace!(
                "PlayerController: ignoring {:?} from destroyed player {}",
                event,
                instance
            );
            return self.state;
        }

        match event {
            PlayerEvent::Ready => {
                if self.autoplay_pending {
                    if let Some(handle) = self.handle.as_mut() {
                        handle.play();
                    }
                }
            }
            PlayerEvent::StateChanged(engine_state) => {
                self.stop_fade();
                match engine_state {
                    EngineState::Playing => {
                        self.state = PlayerState::Playing;
                        self.start_fade();
                    }
                    EngineState::Paused => {
                        self.autoplay_pending = false;
                        self.state = PlayerState::Paused;
                    }
                    EngineState::Ended => {
                        self.autoplay_pending = false;
                        self.state = PlayerState::Ended;
                    }
                    EngineState::Other => {
                        if self.state != PlayerState::Uninitialized {
                            self.state = PlayerState::Loading;
                        }
                    }
                }
            }
        }
        self.state
    }

    /// Samples the player position for the live fade timer.
    pub fn handle_fade_tick(&mut self, generation: u64) {
        let is_live_tick = self
            .fade_task
            .as_ref()
            .is_some_and(|task| task.generation() == generation && !task.is_cancelled());
        if !is_live_tick || self.state != PlayerState::Playing {
            trace!("PlayerController: dropping stale fade tick {}", generation);
            return;
        }
        let Some(handle) = self.handle.as_ref() else {
            return;
        };

        let opacity = fade_opacity(
            handle.duration_secs(),
            handle.elapsed_secs(),
            self.fade_window.as_secs_f64(),
        );
        self.engine.set_opacity(&self.container_id, opacity);
    }

    fn start_fade(&mut self) {
        self.fade_generation += 1;
        self.fade_task = Some(
            self.fade_scheduler
                .start(self.fade_generation, self.fade_poll_interval),
        );
    }

    fn stop_fade(&mut self) {
        if let Some(task) = self.fade_task.take() {
            task.cancel();
            self.engine.set_opacity(&self.container_id, FULL_OPACITY);
        }
    }

    fn destroy_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.destroy();
        }
    }
}
