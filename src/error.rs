//! Error types surfaced by the playlist session and its persistence layer.
//!
//! User-input failures abort the requested operation without mutating any
//! state. Store and import failures are reported separately so callers can
//! decide whether to notify the user or only log.

use thiserror::Error;

/// User-facing failures of a session operation. No state is mutated when one
/// of these is returned.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("please enter a URL")]
    EmptyUrl,
    #[error("not a valid video link: {0}")]
    InvalidUrl(String),
    #[error("playlist name must not be empty")]
    EmptyListName,
    #[error("a playlist named '{0}' already exists")]
    DuplicateListName(String),
    #[error("no playlist named '{0}'")]
    UnknownList(String),
    #[error("cannot delete '{0}': it is the only remaining playlist")]
    LastRemainingList(String),
    #[error("track index {index} is out of range for a list of {len}")]
    TrackIndexOutOfRange { index: usize, len: usize },
    #[error("shuffle needs at least two tracks")]
    NotEnoughTracksToShuffle,
    #[error("import failed: {0}")]
    Import(#[from] ImportError),
}

/// Rejection reasons for an import document. The existing library is left
/// untouched whenever one of these is returned.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("document is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("document must be a mapping of playlist names to track lists")]
    NotAMapping,
    #[error("playlist '{name}' has an invalid track list: {source}")]
    InvalidTracks {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("playlist names must not be empty")]
    InvalidListName,
}

/// Failures of the durable library store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
