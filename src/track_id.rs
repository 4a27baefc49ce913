//! Canonical video identifier parsing for user-supplied links.

use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;

/// Length of a canonical video identifier.
pub const TRACK_ID_LEN: usize = 11;

// Host prefix, then one of: a `v=` query parameter, any path ending in `/`,
// or the short-link form. The id must not be followed by another id character.
const TRACK_LINK_PATTERN: &str = r"(?:youtube(?:-nocookie)?\.com/(?:.*[?&]v=|(?:[^?#\s]*/)?)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)";

static TRACK_LINK_REGEX: OnceLock<Regex> = OnceLock::new();

fn track_link_regex() -> &'static Regex {
    TRACK_LINK_REGEX.get_or_init(|| {
        Regex::new(TRACK_LINK_PATTERN).unwrap_or_else(|err| panic!("invalid link pattern: {err}"))
    })
}

/// Opaque platform identifier of a track.
///
/// Identifiers produced by [`extract_track_id`] are always in the 11-character
/// canonical form. Identifiers restored from storage are taken as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Wraps an identifier if it has the canonical shape.
    pub fn from_canonical(raw: &str) -> Option<Self> {
        let is_canonical = raw.len() == TRACK_ID_LEN
            && raw
                .bytes()
                .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_');
        is_canonical.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` characters, used for synthetic titles.
    pub fn prefix(&self, len: usize) -> &str {
        match self.0.char_indices().nth(len) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Extracts the canonical identifier from a video link.
///
/// Accepts `watch?v=`, `embed/`, `v/`, short `youtu.be/` links and any path
/// whose last segment is the id, with or without a trailing query string.
/// Returns `None` when the input is not a recognizable link.
pub fn extract_track_id(url: &str) -> Option<TrackId> {
    let captures = track_link_regex().captures(url.trim())?;
    captures
        .get(1)
        .and_then(|id| TrackId::from_canonical(id.as_str()))
}
