//! URI helpers
//!
//! Songs are addressed either by a URI with a scheme (`http://host/a.mp3`)
//! or by a local path (absolute, or relative to the music directory).

/// Returns true if the URI carries a scheme (`scheme://...`)
pub fn has_scheme(uri: &str) -> bool {
    scheme(uri).is_some()
}

/// Extract the scheme of a URI, without the `://` separator
///
/// Only schemes made of ASCII alphanumerics, `+`, `-` and `.` are accepted,
/// so Windows drive letters and stray colons in file names are not mistaken
/// for schemes.
pub fn scheme(uri: &str) -> Option<&str> {
    let end = uri.find("://")?;
    let scheme = &uri[..end];
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Extract the filename suffix of a URI (without the dot)
///
/// The query string and fragment of remote URIs are ignored. A dot that
/// belongs to a directory component does not count:
/// `http://x/dir.d/stream` has no suffix.
pub fn suffix(uri: &str) -> Option<&str> {
    let path = if has_scheme(uri) {
        let cut = uri.find(['?', '#']).unwrap_or(uri.len());
        &uri[..cut]
    } else {
        uri
    };

    let dot = path.rfind('.')?;
    let suffix = &path[dot + 1..];
    if suffix.is_empty() || suffix.contains(['/', '\\']) {
        return None;
    }
    Some(suffix)
}

/// Strip a `file://` prefix, returning the local path it names
pub fn file_uri_path(uri: &str) -> Option<&str> {
    uri.strip_prefix("file://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_detection() {
        assert_eq!(scheme("http://x/stream.mp3"), Some("http"));
        assert_eq!(scheme("file:///music/a.flac"), Some("file"));
        assert_eq!(scheme("Artist/Album/01.flac"), None);
        assert_eq!(scheme("C:\\music\\a.flac"), None);
        assert_eq!(scheme("://nothing"), None);
        assert!(!has_scheme("/abs/path.ogg"));
    }

    #[test]
    fn test_suffix_of_local_paths() {
        assert_eq!(suffix("Artist/Album/track.flac"), Some("flac"));
        assert_eq!(suffix("/abs/archive.tar.gz"), Some("gz"));
        assert_eq!(suffix("dir.d/noext"), None);
        assert_eq!(suffix("trailing."), None);
        assert_eq!(suffix("plain"), None);
    }

    #[test]
    fn test_suffix_of_remote_uris() {
        assert_eq!(suffix("http://x/stream.mp3"), Some("mp3"));
        assert_eq!(suffix("http://x/stream.ogg?token=a.b/c"), Some("ogg"));
        assert_eq!(suffix("http://x/stream"), None);
        assert_eq!(suffix("http://radio.example.com/live"), None);
    }

    #[test]
    fn test_file_uri_path() {
        assert_eq!(file_uri_path("file:///music/a.flac"), Some("/music/a.flac"));
        assert_eq!(file_uri_path("/music/a.flac"), None);
    }
}
