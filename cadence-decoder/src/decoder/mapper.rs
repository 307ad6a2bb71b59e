//! Song to playable URI mapping

use cadence_common::{uri, Error, Result, Song};
use std::path::{Path, PathBuf};

/// Maps a song to the URI an input stream can be opened from
pub trait UriMapper: Send + Sync {
    fn map(&self, song: &Song) -> Result<String>;
}

/// Resolves local songs below the configured music directory
///
/// Remote URIs pass through unchanged, `file://` URIs and absolute paths
/// map to the path they name.
#[derive(Debug, Clone, Default)]
pub struct MusicDirectoryMapper {
    music_directory: Option<PathBuf>,
}

impl MusicDirectoryMapper {
    pub fn new(music_directory: Option<PathBuf>) -> Self {
        Self { music_directory }
    }
}

impl UriMapper for MusicDirectoryMapper {
    fn map(&self, song: &Song) -> Result<String> {
        let song_uri = song.uri();
        if song_uri.is_empty() {
            return Err(Error::UriMapping("empty song URI".to_string()));
        }

        if !song.is_file() {
            return Ok(song_uri.to_string());
        }

        let path = Path::new(uri::file_uri_path(song_uri).unwrap_or(song_uri));
        if path.is_absolute() {
            return Ok(path.to_string_lossy().into_owned());
        }

        let music_directory = self.music_directory.as_ref().ok_or_else(|| {
            Error::UriMapping(format!("{} is relative and no music directory is set", song_uri))
        })?;
        Ok(music_directory.join(path).to_string_lossy().into_owned())
    }
}
