//! Recording fakes shared by the unit tests.

use std::{
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    db_manager::{LibraryStore, StoredLibrary},
    error::StoreError,
    fade_timer::{FadeScheduler, FadeTask},
    library::Library,
    media_controls_manager::{MediaControlSurface, PublishedPlayback, TrackMetadata},
    player_engine::{PlayerEngine, PlayerHandle},
    title_resolver::{fallback_title, TitleResolver},
    track_id::TrackId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Create { track: String, autoplay: bool },
    Load(String),
    Play,
    Pause,
    Destroy,
}

#[derive(Default)]
struct EngineLog {
    calls: Vec<EngineCall>,
    opacities: Vec<f64>,
    duration_secs: f64,
    elapsed_secs: f64,
    last_instance: u64,
}

/// Player engine that records every command.
#[derive(Clone, Default)]
pub struct RecordingEngine {
    log: Rc<RefCell<EngineLog>>,
}

impl RecordingEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.log.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.log.borrow_mut().calls.clear();
    }

    pub fn last_opacity(&self) -> Option<f64> {
        self.log.borrow().opacities.last().copied()
    }

    pub fn opacity_calls(&self) -> usize {
        self.log.borrow().opacities.len()
    }

    pub fn set_position(&self, duration_secs: f64, elapsed_secs: f64) {
        let mut log = self.log.borrow_mut();
        log.duration_secs = duration_secs;
        log.elapsed_secs = elapsed_secs;
    }

    /// Instance tag handed to the most recent create command.
    pub fn last_instance(&self) -> u64 {
        self.log.borrow().last_instance
    }

    /// Track id of the most recent create or load command.
    pub fn loaded_track(&self) -> Option<String> {
        self.log
            .borrow()
            .calls
            .iter()
            .rev()
            .find_map(|call| match call {
                EngineCall::Create { track, .. } | EngineCall::Load(track) => Some(track.clone()),
                _ => None,
            })
    }
}

impl PlayerEngine for RecordingEngine {
    fn create(
        &mut self,
        _container_id: &str,
        id: &TrackId,
        autoplay: bool,
        instance: u64,
    ) -> Box<dyn PlayerHandle> {
        self.log.borrow_mut().last_instance = instance;
        self.log.borrow_mut().calls.push(EngineCall::Create {
            track: id.as_str().to_string(),
            autoplay,
        });
        Box::new(RecordingHandle {
            log: Rc::clone(&self.log),
        })
    }

    fn set_opacity(&mut self, _container_id: &str, opacity: f64) {
        self.log.borrow_mut().opacities.push(opacity);
    }
}

struct RecordingHandle {
    log: Rc<RefCell<EngineLog>>,
}

impl PlayerHandle for RecordingHandle {
    fn load_track(&mut self, id: &TrackId) {
        self.log
            .borrow_mut()
            .calls
            .push(EngineCall::Load(id.as_str().to_string()));
    }

    fn play(&mut self) {
        self.log.borrow_mut().calls.push(EngineCall::Play);
    }

    fn pause(&mut self) {
        self.log.borrow_mut().calls.push(EngineCall::Pause);
    }

    fn destroy(&mut self) {
        self.log.borrow_mut().calls.push(EngineCall::Destroy);
    }

    fn duration_secs(&self) -> f64 {
        self.log.borrow().duration_secs
    }

    fn elapsed_secs(&self) -> f64 {
        self.log.borrow().elapsed_secs
    }
}

/// Fade scheduler whose timers only tick when the test says so.
#[derive(Clone, Default)]
pub struct ManualFadeScheduler {
    started: Rc<RefCell<Vec<(u64, Arc<std::sync::atomic::AtomicBool>)>>>,
}

impl ManualFadeScheduler {
    /// Generations of timers that have not been cancelled.
    pub fn live_generations(&self) -> Vec<u64> {
        self.started
            .borrow()
            .iter()
            .filter(|(_, cancelled)| !cancelled.load(std::sync::atomic::Ordering::SeqCst))
            .map(|(generation, _)| *generation)
            .collect()
    }
}

impl FadeScheduler for ManualFadeScheduler {
    fn start(&mut self, generation: u64, _interval: Duration) -> FadeTask {
        let task = FadeTask::new(generation);
        self.started
            .borrow_mut()
            .push((generation, task.cancel_flag()));
        task
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Metadata(Option<TrackMetadata>),
    Playback(PublishedPlayback),
}

/// Media-control surface that records every publish.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    calls: Rc<RefCell<Vec<SurfaceCall>>>,
}

impl RecordingSurface {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.borrow().clone()
    }

    pub fn last_title(&self) -> Option<String> {
        self.calls.borrow().iter().rev().find_map(|call| match call {
            SurfaceCall::Metadata(metadata) => Some(
                metadata
                    .as_ref()
                    .map(|metadata| metadata.title.clone())
                    .unwrap_or_default(),
            ),
            SurfaceCall::Playback(_) => None,
        })
    }
}

impl MediaControlSurface for RecordingSurface {
    fn set_metadata(&mut self, metadata: Option<&TrackMetadata>) -> Result<(), String> {
        self.calls
            .borrow_mut()
            .push(SurfaceCall::Metadata(metadata.cloned()));
        Ok(())
    }

    fn set_playback(&mut self, playback: PublishedPlayback) -> Result<(), String> {
        self.calls.borrow_mut().push(SurfaceCall::Playback(playback));
        Ok(())
    }
}

/// Store whose writes always fail; loads return the seeded snapshot.
pub struct FailingStore {
    pub seeded: StoredLibrary,
    pub save_attempts: Rc<RefCell<usize>>,
}

impl LibraryStore for FailingStore {
    fn load(&self) -> StoredLibrary {
        self.seeded.clone()
    }

    fn save(&self, _library: &Library, _active_name: &str) -> Result<(), StoreError> {
        *self.save_attempts.borrow_mut() += 1;
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }
}

/// Title resolver answering from a fixed table, falling back otherwise.
#[derive(Default)]
pub struct TableTitleResolver {
    titles: Mutex<HashMap<String, String>>,
}

impl TableTitleResolver {
    pub fn with_title(self, id: &str, title: &str) -> Self {
        if let Ok(mut titles) = self.titles.lock() {
            titles.insert(id.to_string(), title.to_string());
        }
        self
    }
}

impl TitleResolver for TableTitleResolver {
    fn resolve(&self, id: &TrackId) -> String {
        self.titles
            .lock()
            .ok()
            .and_then(|titles| titles.get(id.as_str()).cloned())
            .unwrap_or_else(|| fallback_title(id))
    }
}
