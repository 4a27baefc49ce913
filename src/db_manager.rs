//! Durable library store backed by a SQLite key/value table.
//!
//! The key space holds exactly two logical entries: the serialized library
//! mapping and the active playlist name. Loading never fails; unreadable or
//! corrupt entries degrade to an empty library.

use std::{path::Path, rc::Rc};

use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};

use crate::{
    error::StoreError,
    library::{Library, DEFAULT_PLAYLIST_NAME},
    playlist::Track,
};

/// Key of the serialized `{ name: Track[] }` mapping.
pub const LIBRARY_KEY: &str = "youtubePlaylists";
/// Key of the active playlist name.
pub const ACTIVE_LIST_KEY: &str = "activePlaylist";
/// Key of the pre-multi-list single playlist (`[{ title, videoId }]`).
pub const LEGACY_PLAYLIST_KEY: &str = "youtubePlaylist";

/// Snapshot returned by [`LibraryStore::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredLibrary {
    pub library: Library,
    pub active_name: Option<String>,
    /// True when the snapshot was rebuilt from the legacy single-list entry and
    /// should be written back under the current keys.
    pub migrated_from_legacy: bool,
}

/// Persistence contract used by the playlist session.
pub trait LibraryStore {
    fn load(&self) -> StoredLibrary;
    fn save(&self, library: &Library, active_name: &str) -> Result<(), StoreError>;
}

impl<T: LibraryStore + ?Sized> LibraryStore for Rc<T> {
    fn load(&self) -> StoredLibrary {
        (**self).load()
    }

    fn save(&self, library: &Library, active_name: &str) -> Result<(), StoreError> {
        (**self).save(library, active_name)
    }
}

pub struct DbManager {
    conn: Connection,
}

impl DbManager {
    pub fn new(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        Ok(db_manager)
    }

    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        Ok(db_manager)
    }

    fn initialize_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS store_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn get_entry(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT value FROM store_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    /// Writes a raw entry. Exposed for migration and corruption tests.
    pub fn set_entry(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO store_entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn read_entry(&self, key: &str) -> Option<String> {
        match self.get_entry(key) {
            Ok(value) => value,
            Err(err) => {
                warn!("DbManager: failed to read store entry '{}': {}", key, err);
                None
            }
        }
    }

    fn load_legacy_playlist(&self) -> Option<Library> {
        let raw = self.read_entry(LEGACY_PLAYLIST_KEY)?;
        let tracks: Vec<Track> = match serde_json::from_str(&raw) {
            Ok(tracks) => tracks,
            Err(err) => {
                warn!("DbManager: ignoring unreadable legacy playlist: {}", err);
                return None;
            }
        };
        let mut library = Library::with_default_list();
        if let Some(default_tracks) = library.tracks_mut(DEFAULT_PLAYLIST_NAME) {
            *default_tracks = tracks;
        }
        info!(
            "DbManager: migrating legacy single playlist into '{}'",
            DEFAULT_PLAYLIST_NAME
        );
        Some(library)
    }
}

impl LibraryStore for DbManager {
    fn load(&self) -> StoredLibrary {
        let active_name = self.read_entry(ACTIVE_LIST_KEY);

        let Some(raw_library) = self.read_entry(LIBRARY_KEY) else {
            return match self.load_legacy_playlist() {
                Some(library) => StoredLibrary {
                    library,
                    active_name: None,
                    migrated_from_legacy: true,
                },
                None => StoredLibrary {
                    active_name,
                    ..StoredLibrary::default()
                },
            };
        };

        match Library::from_document(&raw_library) {
            Ok(library) => StoredLibrary {
                library,
                active_name,
                migrated_from_legacy: false,
            },
            Err(err) => {
                warn!("DbManager: stored library is corrupt, starting empty: {}", err);
                StoredLibrary {
                    active_name,
                    ..StoredLibrary::default()
                }
            }
        }
    }

    fn save(&self, library: &Library, active_name: &str) -> Result<(), StoreError> {
        let document = serde_json::to_string(library)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO store_entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![LIBRARY_KEY, document],
        )?;
        tx.execute(
            "INSERT INTO store_entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![ACTIVE_LIST_KEY, active_name],
        )?;
        tx.execute(
            "DELETE FROM store_entries WHERE key = ?1",
            params![LEGACY_PLAYLIST_KEY],
        )?;
        tx.commit()?;
        Ok(())
    }
}
