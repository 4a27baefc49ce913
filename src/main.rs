use std::{
    io::{BufRead, Write},
    path::PathBuf,
    sync::Arc,
    thread,
};

use log::{error, info, warn};
use tokio::sync::mpsc::{self, UnboundedSender};

use tubelist::{
    app_runtime::{AppRuntime, ViewSink},
    config_persistence::{default_config_file, load_or_create_config},
    db_manager::{DbManager, LibraryStore},
    fade_timer::ThreadFadeScheduler,
    media_controls_manager::{
        MediaAction, MediaControlSurface, MediaControlsManager, NullMediaControls,
        SouvlakiMediaControls,
    },
    player_controller::{PlayerController, PlayerState},
    player_engine::HeadlessPlayerEngine,
    playlist_session::{PlaylistSession, SessionSnapshot},
    protocol::{Message, SessionCommand},
    title_resolver::OEmbedTitleResolver,
};

const HELP_TEXT: &str = "\
commands:
  add <url>            append a video to the active playlist
  del <n>              delete track n (asks for confirmation)
  play <n>             play track n
  list                 show the active playlist
  switch <name>        make <name> the active playlist
  create <name>        create and activate a playlist
  rmlist <name>        delete a playlist
  shuffle              shuffle the active playlist
  export <file>        write all playlists to a JSON file
  import <file>        replace all playlists from a JSON file
  pause | resume | toggle | next | prev
  quit";

/// Renders session snapshots to stdout.
struct ConsoleView;

impl ViewSink for ConsoleView {
    fn render(&mut self, snapshot: &SessionSnapshot) {
        let mut out = std::io::stdout().lock();
        let lists = snapshot
            .list_names
            .iter()
            .map(|name| {
                if name == &snapshot.active_name {
                    format!("[{name}]")
                } else {
                    name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "playlists: {lists}  ({})", state_label(snapshot.player_state));
        if snapshot.tracks.is_empty() {
            let _ = writeln!(out, "  (empty)");
        }
        for (index, track) in snapshot.tracks.iter().enumerate() {
            let marker = if snapshot.current_index == Some(index) {
                '>'
            } else {
                ' '
            };
            let _ = writeln!(out, "{marker} {:>3}. {}", index + 1, track.title);
        }
        let _ = out.flush();
    }

    fn notify(&mut self, message: &str) {
        println!("! {message}");
    }
}

fn state_label(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Uninitialized => "stopped",
        PlayerState::Loading => "loading",
        PlayerState::Playing => "playing",
        PlayerState::Paused => "paused",
        PlayerState::Ended => "ended",
    }
}

/// What a console line asks for.
#[derive(Debug, PartialEq)]
enum ConsoleInput {
    Send(Message),
    ConfirmDelete(usize),
    Help,
    Invalid(String),
}

fn parse_track_number(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok()?.checked_sub(1)
}

fn parse_console_line(line: &str) -> Option<ConsoleInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let command = |command: SessionCommand| Some(ConsoleInput::Send(Message::Command(command)));
    let action = |action: MediaAction| Some(ConsoleInput::Send(Message::MediaControl(action)));
    let needs_argument = || Some(ConsoleInput::Invalid(format!("'{verb}' needs an argument")));

    match verb {
        "add" => command(SessionCommand::AddTrack(rest.to_string())),
        "del" | "play" => match parse_track_number(rest) {
            Some(index) if verb == "del" => Some(ConsoleInput::ConfirmDelete(index)),
            Some(index) => command(SessionCommand::PlayTrack(index)),
            None => Some(ConsoleInput::Invalid(format!(
                "'{verb}' needs a track number starting at 1"
            ))),
        },
        "switch" | "create" | "rmlist" | "export" | "import" if rest.is_empty() => needs_argument(),
        "switch" => command(SessionCommand::SwitchList(rest.to_string())),
        "create" => command(SessionCommand::CreateList(rest.to_string())),
        "rmlist" => command(SessionCommand::DeleteList(rest.to_string())),
        "export" => command(SessionCommand::ExportLibrary(PathBuf::from(rest))),
        "import" => command(SessionCommand::ImportLibrary(PathBuf::from(rest))),
        "shuffle" => command(SessionCommand::Shuffle),
        "list" => command(SessionCommand::Show),
        "quit" | "exit" => command(SessionCommand::Quit),
        "pause" => action(MediaAction::Pause),
        "resume" => action(MediaAction::Play),
        "toggle" => action(MediaAction::Toggle),
        "next" => action(MediaAction::Next),
        "prev" => action(MediaAction::Previous),
        "help" | "?" => Some(ConsoleInput::Help),
        other => Some(ConsoleInput::Invalid(format!("unknown command '{other}'"))),
    }
}

fn spawn_console_reader(bus_sender: UnboundedSender<Message>) {
    let spawned = thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            let mut lines = stdin.lock().lines();
            while let Some(Ok(line)) = lines.next() {
                let message = match parse_console_line(&line) {
                    None => continue,
                    Some(ConsoleInput::Help) => {
                        println!("{HELP_TEXT}");
                        continue;
                    }
                    Some(ConsoleInput::Invalid(reason)) => {
                        println!("! {reason}");
                        continue;
                    }
                    Some(ConsoleInput::ConfirmDelete(index)) => {
                        print!("Delete track {}? [y/N] ", index + 1);
                        let _ = std::io::stdout().flush();
                        let confirmed = matches!(
                            lines.next(),
                            Some(Ok(answer)) if answer.trim().eq_ignore_ascii_case("y")
                        );
                        Message::Command(SessionCommand::DeleteTrack { index, confirmed })
                    }
                    Some(ConsoleInput::Send(message)) => message,
                };
                if bus_sender.send(message).is_err() {
                    return;
                }
            }
            let _ = bus_sender.send(Message::Command(SessionCommand::Quit));
        });
    if let Err(err) = spawned {
        error!("Failed to spawn console input thread: {}", err);
    }
}

fn main() {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Trace);
    clog.init();
    log::set_max_level(log::LevelFilter::Info);

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config = load_or_create_config(&default_config_file());
    log::set_max_level(config.logging.level_filter());

    let (bus_sender, bus_receiver) = mpsc::unbounded_channel();

    let database_path = config.store.resolved_database_path();
    let store: Box<dyn LibraryStore> = match DbManager::new(&database_path) {
        Ok(db) => {
            info!("Using library database at {}", database_path.display());
            Box::new(db)
        }
        Err(err) => {
            warn!(
                "Failed to open library database {}: {}. Changes will not survive a restart",
                database_path.display(),
                err
            );
            match DbManager::new_in_memory() {
                Ok(db) => Box::new(db),
                Err(err) => {
                    error!("Failed to create in-memory library store: {}", err);
                    return;
                }
            }
        }
    };

    let controller = PlayerController::new(
        Box::new(HeadlessPlayerEngine::new(bus_sender.clone())),
        Box::new(ThreadFadeScheduler::new(bus_sender.clone())),
        &config.player,
    );

    let surface: Box<dyn MediaControlSurface> = if config.media_controls.enabled {
        match SouvlakiMediaControls::new(bus_sender.clone()) {
            Some(controls) => Box::new(controls),
            None => Box::new(NullMediaControls),
        }
    } else {
        info!("Media controls disabled by config");
        Box::new(NullMediaControls)
    };
    let media_controls = MediaControlsManager::new(surface, config.media_controls.clone());

    let session = PlaylistSession::restore(store, controller, media_controls);
    let mut runtime = AppRuntime::new(
        session,
        bus_sender.clone(),
        bus_receiver,
        Arc::new(OEmbedTitleResolver::new(&config.lookup)),
        Box::new(ConsoleView),
    );

    println!("{HELP_TEXT}");
    runtime.start(config.player.autoplay_on_startup);
    spawn_console_reader(bus_sender);
    runtime.run();
}
