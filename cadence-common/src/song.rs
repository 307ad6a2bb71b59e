//! Song and tag models
//!
//! A [`Song`] identifies one track by URI. Local songs use a path (absolute,
//! or relative to the music directory); remote songs use a URI with a
//! scheme. Songs are passed around as [`SongRef`] so the controller and the
//! decoder can hold the same song without copying it.

use crate::uri;
use std::sync::Arc;
use std::time::Duration;

/// Shared handle to a song
pub type SongRef = Arc<Song>;

/// Kind of a single tag item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Artist,
    Album,
    AlbumArtist,
    Title,
    Track,
    Name,
    Genre,
    Date,
    Composer,
    Comment,
}

/// One tag item (kind plus value)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagItem {
    pub kind: TagKind,
    pub value: String,
}

/// Parsed metadata of a song or stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    /// Total play time, if known
    pub duration: Option<Duration>,

    items: Vec<TagItem>,
}

impl Tag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item; empty values are ignored
    pub fn add(&mut self, kind: TagKind, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return;
        }
        self.items.push(TagItem {
            kind,
            value: trimmed.to_string(),
        });
    }

    /// Builder-style variant of [`Tag::add`]
    pub fn with(mut self, kind: TagKind, value: impl Into<String>) -> Self {
        self.add(kind, value);
        self
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    /// First value of the given kind
    pub fn get(&self, kind: TagKind) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.kind == kind)
            .map(|item| item.value.as_str())
    }

    pub fn items(&self) -> &[TagItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.duration.is_none()
    }

    /// Merge `other` on top of `self`: kinds present in `other` replace the
    /// ones in `self`, everything else is kept.
    pub fn merge(&self, other: &Tag) -> Tag {
        let mut items: Vec<TagItem> = self
            .items
            .iter()
            .filter(|item| other.get(item.kind).is_none())
            .cloned()
            .collect();
        items.extend(other.items.iter().cloned());

        Tag {
            duration: other.duration.or(self.duration),
            items,
        }
    }
}

/// A track known to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    uri: String,
    tag: Option<Tag>,
}

impl Song {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Wrap into a shared handle
    pub fn into_ref(self) -> SongRef {
        Arc::new(self)
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// True for songs stored on the local filesystem
    ///
    /// `file://` URIs count as local.
    pub fn is_file(&self) -> bool {
        !uri::has_scheme(&self.uri) || uri::file_uri_path(&self.uri).is_some()
    }

    /// Same song: the same handle, or two handles naming the same URI
    pub fn same(a: &SongRef, b: &SongRef) -> bool {
        Arc::ptr_eq(a, b) || a.uri == b.uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_song_locality() {
        assert!(Song::new("Artist/track.flac").is_file());
        assert!(Song::new("/abs/track.flac").is_file());
        assert!(Song::new("file:///abs/track.flac").is_file());
        assert!(!Song::new("http://x/stream.mp3").is_file());
    }

    #[test]
    fn test_song_identity() {
        let a = Song::new("a.flac").into_ref();
        let a2 = Song::new("a.flac").into_ref();
        let b = Song::new("b.flac").into_ref();

        assert!(Song::same(&a, &a));
        assert!(Song::same(&a, &a2));
        assert!(!Song::same(&a, &b));
    }

    #[test]
    fn test_tag_ignores_empty_values() {
        let tag = Tag::new()
            .with(TagKind::Title, "  ")
            .with(TagKind::Artist, " Someone ");

        assert_eq!(tag.items().len(), 1);
        assert_eq!(tag.get(TagKind::Artist), Some("Someone"));
        assert_eq!(tag.get(TagKind::Title), None);
    }

    #[test]
    fn test_tag_merge_prefers_newer_items() {
        let base = Tag::new()
            .with_duration(Some(Duration::from_secs(180)))
            .with(TagKind::Artist, "Old")
        .with(TagKind::Album, "Album");
        let stream = Tag::new().with(TagKind::Artist, "New");

        let merged = base.merge(&stream);
        assert_eq!(merged.get(TagKind::Artist), Some("New"));
        assert_eq!(merged.get(TagKind::Album), Some("Album"));
        assert_eq!(merged.duration, Some(Duration::from_secs(180)));
    }
}
