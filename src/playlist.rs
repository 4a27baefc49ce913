use rand::Rng;

use crate::track_id::TrackId;

/// A single externally hosted video in a playlist.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Track {
    #[serde(default)]
    pub title: String,
    // Legacy single-list documents stored the id as `videoId`.
    #[serde(alias = "videoId")]
    pub id: TrackId,
}

impl Track {
    pub fn new(id: TrackId, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            id,
        }
    }
}

/// Where the loaded-track cursor ends up after a row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorAfterDelete {
    /// Nothing to reload; the cursor keeps pointing at the same logical track.
    Keep(Option<usize>),
    /// The loaded track was removed; playback moves to this index.
    Advance(usize),
    /// The list is empty now.
    Clear,
}

/// Next index with wrap-around, or `None` for an empty list.
pub fn next_index(current: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match current {
        Some(index) => (index + 1) % len,
        None => 0,
    })
}

/// Previous index with wrap-around, or `None` for an empty list.
pub fn previous_index(current: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match current {
        Some(index) => (index % len + len - 1) % len,
        None => 0,
    })
}

/// Computes the cursor once the row at `deleted` has been removed and the list
/// has `new_len` entries left.
pub fn cursor_after_delete(
    current: Option<usize>,
    deleted: usize,
    new_len: usize,
) -> CursorAfterDelete {
    if new_len == 0 {
        return CursorAfterDelete::Clear;
    }
    match current {
        Some(index) if deleted < index => CursorAfterDelete::Keep(Some(index - 1)),
        Some(index) if deleted == index => CursorAfterDelete::Advance(deleted % new_len),
        other => CursorAfterDelete::Keep(other),
    }
}

/// Unbiased in-place Fisher-Yates shuffle.
pub fn shuffle_in_place<T, R>(items: &mut [T], rng: &mut R)
where
    R: Rng + ?Sized,
{
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}
