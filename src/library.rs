//! Named playlist collection and its portable JSON document form.
//!
//! The document form is a single JSON object mapping playlist names to track
//! arrays, `{ "<name>": [{ "title": ..., "id": ... }] }`. It is used both by the
//! durable store and by export/import. Key order is preserved and defines the
//! "first remaining list" used when the active list goes away.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::{error::ImportError, playlist::Track};

/// Name of the list created whenever the library would otherwise be empty.
pub const DEFAULT_PLAYLIST_NAME: &str = "기본";

/// A named, ordered track sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<Track>,
}

/// Ordered mapping of unique playlist names to playlists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Library {
    lists: Vec<Playlist>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding only the empty default list.
    pub fn with_default_list() -> Self {
        let mut library = Self::new();
        library.ensure_default_list();
        library
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.lists.iter().map(|list| list.name.as_str())
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.lists
    }

    pub fn first_name(&self) -> Option<&str> {
        self.lists.first().map(|list| list.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn tracks(&self, name: &str) -> Option<&[Track]> {
        self.position(name)
            .map(|index| self.lists[index].tracks.as_slice())
    }

    pub fn tracks_mut(&mut self, name: &str) -> Option<&mut Vec<Track>> {
        let index = self.position(name)?;
        Some(&mut self.lists[index].tracks)
    }

    /// Tracks of `name`, appending an empty list under that name if missing.
    pub fn tracks_entry(&mut self, name: &str) -> &mut Vec<Track> {
        let index = match self.position(name) {
            Some(index) => index,
            None => {
                self.insert_empty(name);
                self.lists.len() - 1
            }
        };
        &mut self.lists[index].tracks
    }

    /// Every track of every list, in library order.
    pub fn all_tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.lists.iter_mut().flat_map(|list| list.tracks.iter_mut())
    }

    /// Appends an empty list. Returns false if the name is already taken.
    pub fn insert_empty(&mut self, name: &str) -> bool {
        self.insert(name, Vec::new())
    }

    fn insert(&mut self, name: &str, tracks: Vec<Track>) -> bool {
        if self.contains(name) {
            return false;
        }
        self.lists.push(Playlist {
            name: name.to_string(),
            tracks,
        });
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<Playlist> {
        let index = self.position(name)?;
        Some(self.lists.remove(index))
    }

    /// Re-creates the default list if the library is empty. Returns true if a
    /// list was added.
    pub fn ensure_default_list(&mut self) -> bool {
        if !self.lists.is_empty() {
            return false;
        }
        self.insert_empty(DEFAULT_PLAYLIST_NAME)
    }

    /// Applies the library invariants and returns the active name to use:
    /// the requested one if it exists, otherwise the first list.
    pub fn normalize_active(&mut self, requested: Option<&str>) -> String {
        self.ensure_default_list();
        match requested {
            Some(name) if self.contains(name) => name.to_string(),
            _ => self
                .first_name()
                .unwrap_or(DEFAULT_PLAYLIST_NAME)
                .to_string(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.lists.iter().position(|list| list.name == name)
    }

    /// Serializes the library to its portable JSON document.
    pub fn to_document(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parses a portable JSON document.
    ///
    /// The document must be a non-null object whose values are track arrays.
    /// Nothing is returned unless the whole document is valid.
    pub fn from_document(document: &str) -> Result<Self, ImportError> {
        let value: Value = serde_json::from_str(document).map_err(ImportError::Malformed)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ImportError> {
        let Value::Object(entries) = value else {
            return Err(ImportError::NotAMapping);
        };

        let mut library = Self::new();
        for (name, tracks) in entries {
            if name.trim().is_empty() {
                return Err(ImportError::InvalidListName);
            }
            let tracks: Vec<Track> =
                serde_json::from_value(tracks).map_err(|source| ImportError::InvalidTracks {
                    name: name.clone(),
                    source,
                })?;
            library.insert(&name, tracks);
        }
        Ok(library)
    }
}

impl Serialize for Library {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.lists.len()))?;
        for list in &self.lists {
            map.serialize_entry(&list.name, &list.tracks)?;
        }
        map.end()
    }
}
