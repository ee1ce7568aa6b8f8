//! Presentation Sink contract
//!
//! The core never knows what ultimately lights up the pixels: a panel fed
//! over a serial bus, a simulator window, or nothing at all. It only calls
//! [`PresentationSink::present`] once per scheduler tick.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::frames::Frame;

/// Errors a sink may report
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PresentError {
    /// The frame could not be shown; playback continues
    #[error("Failed to present frame: {0}")]
    Failed(String),

    /// The surface is gone (window closed, device unplugged)
    #[error("Presentation surface closed")]
    Closed,
}

/// Whatever renders a finished frame
pub trait PresentationSink: Send {
    /// Show `frame`
    ///
    /// Must not block for longer than a tick. A [`PresentError::Failed`] is
    /// logged by the player and otherwise ignored; [`PresentError::Closed`]
    /// stops the scheduler.
    fn present(&mut self, frame: &Frame) -> Result<(), PresentError>;
}

impl<S: PresentationSink + ?Sized> PresentationSink for Box<S> {
    fn present(&mut self, frame: &Frame) -> Result<(), PresentError> {
        (**self).present(frame)
    }
}

/// Discards every frame
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn present(&mut self, _frame: &Frame) -> Result<(), PresentError> {
        Ok(())
    }
}

/// Records presented frames for later inspection
///
/// Clones share the same log, so a test can keep one handle while the
/// runtime owns the other.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<Frame>>>,
    fail_next: Arc<Mutex<Option<PresentError>>>,
}

impl RecordingSink {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything presented so far
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }

    /// Number of frames presented
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Whether nothing has been presented
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Last presented frame
    #[must_use]
    pub fn last(&self) -> Option<Frame> {
        self.frames.lock().last().cloned()
    }

    /// Forget recorded frames
    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    /// Make the next `present` call fail with `error` instead of recording
    pub fn fail_next(&self, error: PresentError) {
        *self.fail_next.lock() = Some(error);
    }
}

impl PresentationSink for RecordingSink {
    fn present(&mut self, frame: &Frame) -> Result<(), PresentError> {
        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }
        self.frames.lock().push(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_shares_log_between_clones() {
        let recorder = RecordingSink::new();
        let mut owned = recorder.clone();

        owned.present(&Frame::new(vec![1])).unwrap();
        owned.present(&Frame::new(vec![2])).unwrap();

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.last().unwrap().as_bytes(), &[2]);
    }

    #[test]
    fn test_recording_sink_injected_failure_is_one_shot() {
        let mut recorder = RecordingSink::new();
        recorder.fail_next(PresentError::Failed("bus error".into()));

        let frame = Frame::new(vec![7]);
        assert!(recorder.present(&frame).is_err());
        assert!(recorder.present(&frame).is_ok());
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let recorder = RecordingSink::new();
        let mut boxed: Box<dyn PresentationSink> = Box::new(recorder.clone());
        boxed.present(&Frame::new(vec![3])).unwrap();
        assert_eq!(recorder.len(), 1);
        assert!(NullSink.present(&Frame::new(vec![])).is_ok());
    }
}
