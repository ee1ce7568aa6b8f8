//! Concrete presentation sinks
//!
//! - [`LogSink`]: headless, logs presentation progress
//! - [`FramebufferSink`]: writes raw frame bytes to a framebuffer device

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use face_core::{Frame, PresentError, PresentationSink};
use thiserror::Error;

/// How often [`LogSink`] reports at debug level
const LOG_EVERY: u64 = 100;

/// Errors opening a sink
#[derive(Debug, Error)]
pub enum SinkError {
    /// The device could not be opened for writing
    #[error("Failed to open framebuffer {path}: {source}")]
    Open {
        /// Device path
        path: PathBuf,
        /// Underlying IO error
        source: io::Error,
    },
}

/// Headless sink that only traces frames
#[derive(Debug, Default)]
pub struct LogSink {
    presented: u64,
}

impl LogSink {
    /// Create a sink with no frames counted
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresentationSink for LogSink {
    fn present(&mut self, frame: &Frame) -> Result<(), PresentError> {
        self.presented += 1;
        tracing::trace!(bytes = frame.len(), "Frame");
        if self.presented % LOG_EVERY == 0 {
            tracing::debug!(presented = self.presented, "Frames presented");
        }
        Ok(())
    }
}

/// Writes each frame at offset 0 of a framebuffer device
///
/// Frames must already be in the device's pixel format.
#[derive(Debug)]
pub struct FramebufferSink {
    path: PathBuf,
    file: File,
}

impl FramebufferSink {
    /// Open `path` for writing
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] if the device cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|source| SinkError::Open {
                path: path.clone(),
                source,
            })?;

        tracing::info!(path = %path.display(), "Opened framebuffer");
        Ok(Self { path, file })
    }

    /// Device path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PresentationSink for FramebufferSink {
    fn present(&mut self, frame: &Frame) -> Result<(), PresentError> {
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.write_all(frame.as_bytes()))
            .map_err(present_error)
    }
}

fn present_error(error: io::Error) -> PresentError {
    match error.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected => {
            PresentError::Closed
        }
        _ => PresentError::Failed(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_framebuffer_overwrites_from_start() {
        let device = NamedTempFile::new().unwrap();
        let mut sink = FramebufferSink::open(device.path()).unwrap();

        sink.present(&Frame::new(b"AAAA".to_vec())).unwrap();
        sink.present(&Frame::new(b"BBBB".to_vec())).unwrap();

        let written = std::fs::read(device.path()).unwrap();
        assert_eq!(written, b"BBBB");
    }

    #[test]
    fn test_missing_device_fails_to_open() {
        let result = FramebufferSink::open("/nonexistent/fb9");
        assert!(matches!(result, Err(SinkError::Open { .. })));
    }

    #[test]
    fn test_io_errors_map_to_present_errors() {
        assert_eq!(
            present_error(io::Error::from(io::ErrorKind::BrokenPipe)),
            PresentError::Closed
        );
        assert!(matches!(
            present_error(io::Error::new(io::ErrorKind::Other, "bus timeout")),
            PresentError::Failed(_)
        ));
    }

    #[test]
    fn test_log_sink_accepts_everything() {
        let mut sink = LogSink::new();
        for _ in 0..LOG_EVERY {
            sink.present(&Frame::new(vec![0; 4])).unwrap();
        }
        assert_eq!(sink.presented, LOG_EVERY);
    }
}
