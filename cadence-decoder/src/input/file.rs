//! Local file input

use super::{InputOpener, InputStream};
use crate::error::{Error, Result};
use cadence_common::uri;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Input stream over a local file
///
/// Ready immediately, always seekable, never reports a MIME type.
pub struct FileInputStream {
    uri: String,
    file: Option<File>,
    size: u64,
    offset: u64,
    eof: bool,
}

impl FileInputStream {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Input(format!("Failed to open {}: {}", path.display(), e)))?;
        let size = file.metadata()?.len();

        debug!("Opened {} ({} bytes)", path.display(), size);

        Ok(Self {
            uri: path.to_string_lossy().into_owned(),
            file: Some(file),
            size,
            offset: 0,
            eof: false,
        })
    }
}

impl InputStream for FileInputStream {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn buffer(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::Input(format!("{} is closed", self.uri)))?;
        self.offset = file.seek(SeekFrom::Start(offset))?;
        self.eof = false;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(file) = self.file.as_mut() else {
            self.eof = true;
            return Ok(0);
        };
        let n = file.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        self.offset += n as u64;
        Ok(n)
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!("Closed {}", self.uri);
        }
        self.eof = true;
    }
}

/// Opens absolute local paths and `file://` URIs
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalInputOpener;

impl InputOpener for LocalInputOpener {
    fn open(&self, uri: &str) -> Result<Box<dyn InputStream>> {
        let path = match uri::file_uri_path(uri) {
            Some(path) => path,
            None if uri::has_scheme(uri) => {
                return Err(Error::Unsupported(format!(
                    "no input plugin for scheme of {}",
                    uri
                )))
            }
            None => uri,
        };

        Ok(Box::new(FileInputStream::open(Path::new(path))?))
    }
}
