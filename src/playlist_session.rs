//! Authoritative in-memory playlist state.
//!
//! The session owns the library, the active list name and the loaded-track
//! cursor, and drives the player controller and media-control bridge from
//! them. Every mutation is written to the store before the operation returns,
//! so the store never lags the session by more than one failed write.

use std::collections::HashSet;

use log::{debug, error, info};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    db_manager::{LibraryStore, StoredLibrary},
    error::SessionError,
    library::{Library, DEFAULT_PLAYLIST_NAME},
    media_controls_manager::{MediaAction, MediaControlsManager},
    player_controller::{PlayerController, PlayerState},
    player_engine::PlayerEvent,
    playlist::{
        cursor_after_delete, next_index, previous_index, shuffle_in_place, CursorAfterDelete,
        Track,
    },
    title_resolver::{fallback_title, needs_resolution},
    track_id::{extract_track_id, TrackId},
};

/// Read-only view of the session for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub active_name: String,
    pub list_names: Vec<String>,
    pub tracks: Vec<Track>,
    pub current_index: Option<usize>,
    pub player_state: PlayerState,
}

pub struct PlaylistSession {
    library: Library,
    active_name: String,
    current_index: Option<usize>,
    controller: PlayerController,
    media_controls: MediaControlsManager,
    store: Box<dyn LibraryStore>,
    rng: StdRng,
}

impl PlaylistSession {
    /// Rebuilds the session from the store, re-establishing the library
    /// invariants and writing them back if anything had to be repaired.
    pub fn restore(
        store: Box<dyn LibraryStore>,
        controller: PlayerController,
        media_controls: MediaControlsManager,
    ) -> Self {
        let StoredLibrary {
            mut library,
            active_name: stored_active,
            migrated_from_legacy,
        } = store.load();

        let was_empty = library.is_empty();
        let active_name = library.normalize_active(stored_active.as_deref());
        let active_repaired = stored_active.as_deref() != Some(active_name.as_str());

        info!(
            "PlaylistSession: restored {} list(s), active '{}'",
            library.len(),
            active_name
        );

        let session = Self {
            library,
            active_name,
            current_index: None,
            controller,
            media_controls,
            store,
            rng: StdRng::from_os_rng(),
        };
        if migrated_from_legacy || was_empty || active_repaired {
            session.persist();
        }
        session
    }

    /// Replaces the random source used by [`Self::shuffle`].
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Loads the first track of the restored active list.
    pub fn start(&mut self, autoplay: bool) {
        if !self.active_tracks().is_empty() {
            self.load_index(0, autoplay);
        }
    }

    pub fn active_name(&self) -> &str {
        &self.active_name
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn player_state(&self) -> PlayerState {
        self.controller.state()
    }

    /// Tag carried by events from the live player instance.
    pub fn player_instance(&self) -> u64 {
        self.controller.instance()
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn active_tracks(&self) -> &[Track] {
        self.library.tracks(&self.active_name).unwrap_or(&[])
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active_name: self.active_name.clone(),
            list_names: self.library.names().map(str::to_string).collect(),
            tracks: self.active_tracks().to_vec(),
            current_index: self.current_index,
            player_state: self.controller.state(),
        }
    }

    /// Identifiers whose stored title is missing or synthetic, in library
    /// order and without duplicates.
    pub fn pending_title_ids(&self) -> Vec<TrackId> {
        let mut seen = HashSet::new();
        self.library
            .playlists()
            .iter()
            .flat_map(|list| list.tracks.iter())
            .filter(|track| needs_resolution(&track.title))
            .filter(|track| seen.insert(track.id.clone()))
            .map(|track| track.id.clone())
            .collect()
    }

    /// Appends a track parsed from `url` to the active list.
    ///
    /// The track starts with a synthetic title; the caller resolves the real
    /// one and applies it through [`Self::apply_resolved_title`]. The new track
    /// is loaded if nothing is loaded or the player is idle.
    pub fn add_track(&mut self, url: &str) -> Result<TrackId, SessionError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SessionError::EmptyUrl);
        }
        let id = extract_track_id(url).ok_or_else(|| SessionError::InvalidUrl(url.to_string()))?;

        let track = Track::new(id.clone(), fallback_title(&id));
        let new_index = {
            let tracks = self.active_tracks_mut();
            tracks.push(track);
            tracks.len() - 1
        };
        self.persist();
        info!(
            "PlaylistSession: added {} to '{}' at {}",
            id, self.active_name, new_index
        );

        if self.current_index.is_none() || !self.controller.has_player() || self.controller.is_idle()
        {
            self.load_index(new_index, true);
        }
        Ok(id)
    }

    /// Patches the title of every track with `id` that still carries a blank
    /// or synthetic title. Resolved titles are never overwritten. Returns
    /// false if no such track exists anymore.
    pub fn apply_resolved_title(&mut self, id: &TrackId, title: &str) -> bool {
        let mut matched = false;
        let mut patched = false;
        for track in self.library.all_tracks_mut().filter(|track| &track.id == id) {
            matched = true;
            if needs_resolution(&track.title) && track.title != title {
                track.title = title.to_string();
                patched = true;
            }
        }
        if !matched {
            debug!("PlaylistSession: no track left to title for {}", id);
            return false;
        }
        if patched {
            self.persist();
        }

        if let Some(current) = self.current_track() {
            if &current.id == id {
                self.media_controls.refresh_track(&current);
            }
        }
        true
    }

    /// Removes the track at `index` once the user confirmed it.
    ///
    /// Returns `Ok(false)` without touching anything when not confirmed.
    pub fn delete_track(&mut self, index: usize, confirmed: bool) -> Result<bool, SessionError> {
        if !confirmed {
            return Ok(false);
        }
        let len = self.active_tracks().len();
        if index >= len {
            return Err(SessionError::TrackIndexOutOfRange { index, len });
        }

        let removed = self.active_tracks_mut().remove(index);
        self.persist();
        info!(
            "PlaylistSession: deleted {} from '{}' at {}",
            removed.id, self.active_name, index
        );

        match cursor_after_delete(self.current_index, index, len - 1) {
            CursorAfterDelete::Clear => self.teardown_player(),
            CursorAfterDelete::Advance(next) => self.load_index(next, true),
            CursorAfterDelete::Keep(cursor) => self.current_index = cursor,
        }
        Ok(true)
    }

    /// Loads and plays the track at `index` of the active list.
    pub fn play_track(&mut self, index: usize) -> Result<(), SessionError> {
        let len = self.active_tracks().len();
        if index >= len {
            return Err(SessionError::TrackIndexOutOfRange { index, len });
        }
        self.load_index(index, true);
        Ok(())
    }

    /// Makes `name` the active list and starts its first track.
    pub fn switch_list(&mut self, name: &str) -> Result<(), SessionError> {
        if name == self.active_name {
            return Ok(());
        }
        if !self.library.contains(name) {
            return Err(SessionError::UnknownList(name.to_string()));
        }
        self.activate(name);
        Ok(())
    }

    /// Creates an empty list and makes it active.
    pub fn create_list(&mut self, name: &str) -> Result<(), SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyListName);
        }
        if !self.library.insert_empty(name) {
            return Err(SessionError::DuplicateListName(name.to_string()));
        }
        self.active_name = name.to_string();
        self.persist();
        self.teardown_player();
        info!("PlaylistSession: created and activated '{}'", name);
        Ok(())
    }

    /// Deletes a list. The sole remaining list cannot be deleted.
    pub fn delete_list(&mut self, name: &str) -> Result<(), SessionError> {
        if !self.library.contains(name) {
            return Err(SessionError::UnknownList(name.to_string()));
        }
        if self.library.len() <= 1 {
            return Err(SessionError::LastRemainingList(name.to_string()));
        }

        self.library.remove(name);
        info!("PlaylistSession: deleted list '{}'", name);
        if name != self.active_name {
            self.persist();
            return Ok(());
        }

        let next = self
            .library
            .first_name()
            .unwrap_or(DEFAULT_PLAYLIST_NAME)
            .to_string();
        self.activate(&next);
        Ok(())
    }

    /// Shuffles the active list in place and plays a random track from it.
    pub fn shuffle(&mut self) -> Result<(), SessionError> {
        let len = self.active_tracks().len();
        if len < 2 {
            return Err(SessionError::NotEnoughTracksToShuffle);
        }

        let mut tracks = std::mem::take(self.active_tracks_mut());
        shuffle_in_place(&mut tracks, &mut self.rng);
        *self.active_tracks_mut() = tracks;
        self.persist();

        let index = self.rng.random_range(0..len);
        info!(
            "PlaylistSession: shuffled '{}', starting at {}",
            self.active_name, index
        );
        self.load_index(index, true);
        Ok(())
    }

    /// Serializes the whole library as a portable document.
    pub fn export_library(&self) -> String {
        self.library.to_document()
    }

    /// Replaces the whole library from a portable document.
    ///
    /// On any validation failure the current library is kept unchanged. The
    /// default list is injected when absent and the first list becomes
    /// active; its first track is cued without playing.
    pub fn import_library(&mut self, document: &str) -> Result<(), SessionError> {
        let mut library = Library::from_document(document)?;
        if !library.contains(DEFAULT_PLAYLIST_NAME) {
            library.insert_empty(DEFAULT_PLAYLIST_NAME);
        }
        let active_name = library.normalize_active(None);

        self.library = library;
        self.active_name = active_name;
        self.persist();
        info!(
            "PlaylistSession: imported {} list(s), active '{}'",
            self.library.len(),
            self.active_name
        );

        self.teardown_player();
        if !self.active_tracks().is_empty() {
            self.load_index(0, false);
        }
        Ok(())
    }

    /// Applies one event emitted by player `instance`, in emission order.
    /// Events from a destroyed instance leave the session untouched.
    pub fn handle_player_event(&mut self, instance: u64, event: PlayerEvent) {
        if instance != self.controller.instance() {
            debug!(
                "PlaylistSession: dropping {:?} from replaced player {}",
                event, instance
            );
            return;
        }
        let state = self.controller.handle_event(instance, event);
        if state == PlayerState::Ended && matches!(event, PlayerEvent::StateChanged(_)) {
            match next_index(self.current_index, self.active_tracks().len()) {
                Some(next) => self.load_index(next, true),
                None => self.teardown_player(),
            }
            return;
        }
        if self.current_index.is_some() {
            self.media_controls
                .publish_state(state, self.controller.autoplay_pending());
        }
    }

    /// Applies a transport action from the host media controls.
    pub fn handle_media_action(&mut self, action: MediaAction) {
        let len = self.active_tracks().len();
        match action {
            MediaAction::Play => self.resume_or_start(),
            MediaAction::Pause => self.controller.pause(),
            MediaAction::Toggle => {
                if self.controller.state() == PlayerState::Playing {
                    self.controller.pause();
                } else {
                    self.resume_or_start();
                }
            }
            MediaAction::Next => {
                if let Some(next) = next_index(self.current_index, len) {
                    self.load_index(next, true);
                }
            }
            MediaAction::Previous => {
                if let Some(previous) = previous_index(self.current_index, len) {
                    self.load_index(previous, true);
                }
            }
        }
    }

    pub fn handle_fade_tick(&mut self, generation: u64) {
        self.controller.handle_fade_tick(generation);
    }

    fn resume_or_start(&mut self) {
        if self.current_index.is_some() && self.controller.play() {
            return;
        }
        if self.active_tracks().is_empty() {
            debug!("PlaylistSession: nothing to play in '{}'", self.active_name);
            return;
        }
        self.load_index(0, true);
    }

    fn activate(&mut self, name: &str) {
        self.active_name = name.to_string();
        self.persist();
        self.teardown_player();
        info!("PlaylistSession: switched to '{}'", name);
        if !self.active_tracks().is_empty() {
            self.load_index(0, true);
        }
    }

    fn current_track(&self) -> Option<Track> {
        self.current_index
            .and_then(|index| self.active_tracks().get(index))
            .cloned()
    }

    fn load_index(&mut self, index: usize, autoplay: bool) {
        let Some(track) = self.active_tracks().get(index).cloned() else {
            return;
        };
        self.current_index = Some(index);
        self.controller.load(&track.id, autoplay);
        self.media_controls.publish_track(&track, autoplay);
    }

    fn teardown_player(&mut self) {
        self.controller.teardown();
        self.current_index = None;
        self.media_controls.clear();
    }

    fn active_tracks_mut(&mut self) -> &mut Vec<Track> {
        self.library.tracks_entry(&self.active_name)
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.library, &self.active_name) {
            error!("PlaylistSession: failed to persist library: {}", err);
        }
    }
}
