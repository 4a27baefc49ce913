//! Top-level orchestration: the single consumer of the runtime bus.
//!
//! All session mutations happen on the thread calling [`AppRuntime::run`].
//! Title lookups run on worker threads and come back as
//! [`Message::TitleResolved`], so a slow lookup never blocks the loop.

use std::{path::Path, sync::Arc, thread};

use log::{debug, info, warn};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::{
    playlist_session::{PlaylistSession, SessionSnapshot},
    protocol::{Message, SessionCommand},
    title_resolver::TitleResolver,
    track_id::TrackId,
};

/// Presentation surface fed by the runtime.
pub trait ViewSink {
    fn render(&mut self, snapshot: &SessionSnapshot);
    /// Shows a one-off user-facing notice (validation errors, import results).
    fn notify(&mut self, message: &str);
}

pub struct AppRuntime {
    session: PlaylistSession,
    bus_sender: UnboundedSender<Message>,
    bus_receiver: UnboundedReceiver<Message>,
    title_resolver: Arc<dyn TitleResolver>,
    view: Box<dyn ViewSink>,
}

impl AppRuntime {
    pub fn new(
        session: PlaylistSession,
        bus_sender: UnboundedSender<Message>,
        bus_receiver: UnboundedReceiver<Message>,
        title_resolver: Arc<dyn TitleResolver>,
        view: Box<dyn ViewSink>,
    ) -> Self {
        Self {
            session,
            bus_sender,
            bus_receiver,
            title_resolver,
            view,
        }
    }

    pub fn session(&self) -> &PlaylistSession {
        &self.session
    }

    /// Cues the restored list and repairs any stored placeholder titles.
    pub fn start(&mut self, autoplay: bool) {
        self.session.start(autoplay);
        let pending = self.session.pending_title_ids();
        if !pending.is_empty() {
            info!("AppRuntime: resolving {} stored title(s)", pending.len());
            self.spawn_title_lookup(pending);
        }
        self.view.render(&self.session.snapshot());
    }

    /// Processes bus messages in arrival order until `Quit` or until every
    /// sender is gone.
    pub fn run(mut self) {
        while let Some(message) = self.bus_receiver.blocking_recv() {
            if !self.handle_message(message) {
                break;
            }
        }
        info!("AppRuntime: exiting");
    }

    /// Applies one message. Returns false when the runtime should stop.
    pub fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::Player { instance, event } => {
                self.session.handle_player_event(instance, event);
                self.view.render(&self.session.snapshot());
            }
            Message::MediaControl(action) => {
                debug!("AppRuntime: media control action {:?}", action);
                self.session.handle_media_action(action);
                self.view.render(&self.session.snapshot());
            }
            Message::TitleResolved { id, title } => {
                if self.session.apply_resolved_title(&id, &title) {
                    self.view.render(&self.session.snapshot());
                }
            }
            Message::FadeTick { generation } => self.session.handle_fade_tick(generation),
            Message::Command(SessionCommand::Quit) => return false,
            Message::Command(command) => self.handle_command(command),
        }
        true
    }

    fn handle_command(&mut self, command: SessionCommand) {
        let result = match command {
            SessionCommand::AddTrack(url) => self.session.add_track(&url).map(|id| {
                self.spawn_title_lookup(vec![id]);
            }),
            SessionCommand::DeleteTrack { index, confirmed } => {
                self.session.delete_track(index, confirmed).map(|_| ())
            }
            SessionCommand::PlayTrack(index) => self.session.play_track(index),
            SessionCommand::SwitchList(name) => self.session.switch_list(&name),
            SessionCommand::CreateList(name) => self.session.create_list(&name),
            SessionCommand::DeleteList(name) => self.session.delete_list(&name),
            SessionCommand::Shuffle => self.session.shuffle(),
            SessionCommand::ExportLibrary(path) => {
                self.export_to(&path);
                return;
            }
            SessionCommand::ImportLibrary(path) => {
                self.import_from(&path);
                return;
            }
            SessionCommand::Show | SessionCommand::Quit => Ok(()),
        };

        if let Err(err) = result {
            warn!("AppRuntime: command rejected: {}", err);
            self.view.notify(&err.to_string());
        }
        self.view.render(&self.session.snapshot());
    }

    fn export_to(&mut self, path: &Path) {
        let document = self.session.export_library();
        match std::fs::write(path, document) {
            Ok(()) => {
                info!("AppRuntime: exported library to {}", path.display());
                self.view
                    .notify(&format!("Exported playlists to {}", path.display()));
            }
            Err(err) => {
                warn!(
                    "AppRuntime: failed to export library to {}: {}",
                    path.display(),
                    err
                );
                self.view.notify(&format!("Export failed: {}", err));
            }
        }
    }

    fn import_from(&mut self, path: &Path) {
        let document = match std::fs::read_to_string(path) {
            Ok(document) => document,
            Err(err) => {
                warn!("AppRuntime: failed to read {}: {}", path.display(), err);
                self.view.notify(&format!("Import failed: {}", err));
                return;
            }
        };
        match self.session.import_library(&document) {
            Ok(()) => {
                self.view.notify("Playlists imported");
                let pending = self.session.pending_title_ids();
                if !pending.is_empty() {
                    self.spawn_title_lookup(pending);
                }
            }
            Err(err) => {
                warn!("AppRuntime: rejected import from {}: {}", path.display(), err);
                self.view.notify(&err.to_string());
            }
        }
        self.view.render(&self.session.snapshot());
    }

    /// Resolves titles one at a time on a background thread.
    fn spawn_title_lookup(&self, ids: Vec<TrackId>) {
        let resolver = Arc::clone(&self.title_resolver);
        let bus_sender = self.bus_sender.clone();
        let spawned = thread::Builder::new()
            .name("title-lookup".to_string())
            .spawn(move || {
                for id in ids {
                    let title = resolver.resolve(&id);
                    if bus_sender
                        .send(Message::TitleResolved { id, title })
                        .is_err()
                    {
                        debug!("AppRuntime: bus closed, dropping remaining title lookups");
                        break;
                    }
                }
            });
        if let Err(err) = spawned {
            warn!("AppRuntime: failed to spawn title lookup thread: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppRuntime, ViewSink};
    use crate::{
        config::{MediaControlsConfig, PlayerConfig},
        db_manager::{DbManager, LibraryStore},
        library::{Library, DEFAULT_PLAYLIST_NAME},
        media_controls_manager::MediaControlsManager,
        player_controller::PlayerController,
        playlist::Track,
        playlist_session::{PlaylistSession, SessionSnapshot},
        protocol::{Message, SessionCommand},
        test_support::{ManualFadeScheduler, RecordingEngine, RecordingSurface, TableTitleResolver},
        track_id::TrackId,
    };
    use std::{cell::RefCell, rc::Rc, sync::Arc};
    use tokio::sync::mpsc;

    #[derive(Clone, Default)]
    struct RecordingView {
        renders: Rc<RefCell<Vec<SessionSnapshot>>>,
        notices: Rc<RefCell<Vec<String>>>,
    }

    impl RecordingView {
        fn last_render(&self) -> Option<SessionSnapshot> {
            self.renders.borrow().last().cloned()
        }

        fn notices(&self) -> Vec<String> {
            self.notices.borrow().clone()
        }
    }

    impl ViewSink for RecordingView {
        fn render(&mut self, snapshot: &SessionSnapshot) {
            self.renders.borrow_mut().push(snapshot.clone());
        }

        fn notify(&mut self, message: &str) {
            self.notices.borrow_mut().push(message.to_string());
        }
    }

    fn runtime_with(store: Rc<DbManager>, resolver: TableTitleResolver) -> (AppRuntime, RecordingView) {
        let (bus_sender, bus_receiver) = mpsc::unbounded_channel();
        let controller = PlayerController::new(
            Box::new(RecordingEngine::default()),
            Box::new(ManualFadeScheduler::default()),
            &PlayerConfig::default(),
        );
        let media_controls = MediaControlsManager::new(
            Box::new(RecordingSurface::default()),
            MediaControlsConfig::default(),
        );
        let session = PlaylistSession::restore(Box::new(store), controller, media_controls);
        let view = RecordingView::default();
        let runtime = AppRuntime::new(
            session,
            bus_sender,
            bus_receiver,
            Arc::new(resolver),
            Box::new(view.clone()),
        );
        (runtime, view)
    }

    fn in_memory_store() -> Rc<DbManager> {
        Rc::new(DbManager::new_in_memory().expect("failed to create in-memory db"))
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tubelist-runtime-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_added_track_title_arrives_through_bus() {
        let resolver = TableTitleResolver::default().with_title("dQw4w9WgXcQ", "Never Gonna");
        let (mut runtime, view) = runtime_with(in_memory_store(), resolver);

        assert!(runtime.handle_message(Message::Command(SessionCommand::AddTrack(
            "https://youtu.be/dQw4w9WgXcQ".to_string()
        ))));
        let rendered = view.last_render().expect("rendered after add");
        assert_eq!(rendered.tracks[0].title, "Untitled (dQw4w...)");

        let resolved = runtime
            .bus_receiver
            .blocking_recv()
            .expect("title lookup should report back");
        assert_eq!(
            resolved,
            Message::TitleResolved {
                id: TrackId::from("dQw4w9WgXcQ"),
                title: "Never Gonna".to_string()
            }
        );
        runtime.handle_message(resolved);
        assert_eq!(runtime.session().active_tracks()[0].title, "Never Gonna");
    }

    #[test]
    fn test_invalid_add_notifies_user() {
        let (mut runtime, view) = runtime_with(in_memory_store(), TableTitleResolver::default());
        runtime.handle_message(Message::Command(SessionCommand::AddTrack(
            "not a link".to_string(),
        )));
        assert_eq!(view.notices(), vec!["not a valid video link: not a link"]);
        assert!(runtime.session().active_tracks().is_empty());
    }

    #[test]
    fn test_start_repairs_placeholder_titles() {
        let store = in_memory_store();
        let mut library = Library::with_default_list();
        library
            .tracks_mut(DEFAULT_PLAYLIST_NAME)
            .expect("default list")
            .extend([
                Track::new(TrackId::from("aaaaaaaaaaa"), "Untitled (aaaaa...)"),
                Track::new(TrackId::from("bbbbbbbbbbb"), "Known"),
            ]);
        store.save(&library, DEFAULT_PLAYLIST_NAME).expect("seed");

        let resolver = TableTitleResolver::default().with_title("aaaaaaaaaaa", "Repaired");
        let (mut runtime, _) = runtime_with(Rc::clone(&store), resolver);
        runtime.start(false);

        let resolved = runtime
            .bus_receiver
            .blocking_recv()
            .expect("bulk lookup should report back");
        runtime.handle_message(resolved);

        let stored = store.load();
        let titles: Vec<_> = stored
            .library
            .tracks(DEFAULT_PLAYLIST_NAME)
            .expect("default list")
            .iter()
            .map(|track| track.title.clone())
            .collect();
        assert_eq!(titles, vec!["Repaired", "Known"]);
    }

    #[test]
    fn test_export_then_import_through_files() {
        let (mut runtime, view) = runtime_with(in_memory_store(), TableTitleResolver::default());
        runtime.handle_message(Message::Command(SessionCommand::CreateList(
            "Focus".to_string(),
        )));
        let path = temp_path("export.json");
        runtime.handle_message(Message::Command(SessionCommand::ExportLibrary(path.clone())));
        let exported = std::fs::read_to_string(&path).expect("export written");
        assert_eq!(exported, format!(r#"{{"{}":[],"Focus":[]}}"#, DEFAULT_PLAYLIST_NAME));

        runtime.handle_message(Message::Command(SessionCommand::ImportLibrary(path.clone())));
        assert_eq!(runtime.session().active_name(), DEFAULT_PLAYLIST_NAME);
        assert_eq!(view.notices().last().map(String::as_str), Some("Playlists imported"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_import_of_missing_file_keeps_library() {
        let (mut runtime, view) = runtime_with(in_memory_store(), TableTitleResolver::default());
        let before = runtime.session().snapshot();
        runtime.handle_message(Message::Command(SessionCommand::ImportLibrary(temp_path(
            "does-not-exist.json",
        ))));
        assert_eq!(runtime.session().snapshot(), before);
        assert!(view.notices()[0].starts_with("Import failed"));
    }

    #[test]
    fn test_quit_stops_the_loop() {
        let (mut runtime, _) = runtime_with(in_memory_store(), TableTitleResolver::default());
        assert!(runtime.handle_message(Message::Command(SessionCommand::Show)));
        assert!(!runtime.handle_message(Message::Command(SessionCommand::Quit)));
    }
}
