//! Frame Store
//!
//! Holds every pre-rendered animation sequence, keyed by catalog name.
//! Loaded once at startup from a [`FrameSource`] and read-only afterwards,
//! so it can be shared between the scheduler and input tasks behind an
//! `Arc` without locking.
//!
//! Frames are opaque to the core: no decoding, resizing or color conversion
//! happens here. Whatever bytes the asset pipeline produced are handed to the
//! presentation sink untouched.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory name of the optional boot intro sequence
pub const INTRO_DIR: &str = "boot";

/// Frame extension of pre-converted panel buffers
pub const RAW_EXTENSION: &str = "rgb565";

/// Encoded image formats whose file size says nothing about pixel size
const ENCODED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

/// A single pre-rendered frame
///
/// Cloning is cheap: the pixel buffer is reference counted.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Arc<[u8]>,
}

impl Frame {
    /// Wrap an already-rendered pixel buffer
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// Raw frame bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Size of the buffer in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame").field("bytes", &self.data.len()).finish()
    }
}

/// Animation catalog
///
/// The closed set of sequences the face knows how to show. Names match the
/// asset directory names produced by the offline frame generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationName {
    /// Resting face, eyes centered
    IdleCenter,
    /// Look-left shot
    IdleLeft,
    /// Look-right shot
    IdleRight,
    /// Laughing at a joke
    Laugh,
    /// Focus mode switched on
    FocusOn,
    /// Focus mode switched off
    FocusOff,
    /// Put the phone down
    Phone,
    /// Too close to the screen
    Proximity,
    /// Going to sleep
    Sleep,
    /// Heart eyes
    Love,
    /// Sad face
    Hate,
    /// Zipped mouth
    Silence,
    /// Blushing after a head pat
    Blush,
    /// Eye roll after a head tap
    Angry,
}

impl AnimationName {
    /// Every catalog entry, in asset order
    pub const ALL: [Self; 14] = [
        Self::IdleCenter,
        Self::IdleLeft,
        Self::IdleRight,
        Self::Laugh,
        Self::FocusOn,
        Self::FocusOff,
        Self::Phone,
        Self::Proximity,
        Self::Sleep,
        Self::Love,
        Self::Hate,
        Self::Silence,
        Self::Blush,
        Self::Angry,
    ];

    /// Asset directory name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdleCenter => "idle_center",
            Self::IdleLeft => "idle_left",
            Self::IdleRight => "idle_right",
            Self::Laugh => "laugh",
            Self::FocusOn => "focus_on",
            Self::FocusOff => "focus_off",
            Self::Phone => "phone",
            Self::Proximity => "proximity",
            Self::Sleep => "sleep",
            Self::Love => "love",
            Self::Hate => "hate",
            Self::Silence => "silence",
            Self::Blush => "blush",
            Self::Angry => "angry",
        }
    }

    /// Parse an asset directory name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == name)
    }

    /// Whether this is one of the resting sequences
    #[must_use]
    pub fn is_idle(self) -> bool {
        matches!(self, Self::IdleCenter | Self::IdleLeft | Self::IdleRight)
    }
}

impl fmt::Display for AnimationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable ordered list of frames
///
/// A zero-length sequence is the "missing animation" state, not an error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnimationSequence {
    frames: Vec<Frame>,
}

impl AnimationSequence {
    /// Create a sequence from frames in playback order
    #[must_use]
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Number of frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the sequence has no frames
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Iterate frames in order
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}

/// Errors raised while reading frames from an asset source
#[derive(Debug, Error)]
pub enum FrameSourceError {
    /// The sequence directory exists but could not be listed
    #[error("Failed to list frames in {path}: {source}")]
    ListError {
        /// Directory that was listed
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },
}

/// Somewhere named, ordered frame collections come from
pub trait FrameSource {
    /// Load the frames of one sequence, in playback order
    ///
    /// A sequence that does not exist yields an empty list, not an error.
    fn load(&self, name: &str) -> Result<Vec<Frame>, FrameSourceError>;
}

/// Reads `<root>/<name>/*.<extension>` sorted by file name
///
/// For raw buffer formats every frame of a sequence must have the byte
/// length of the first one. Encoded images are kept regardless of length.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
    extension: String,
}

impl DirectorySource {
    /// Create a source rooted at `root`, picking files with `extension`
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// Asset root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether frames are raw buffers and must all be the same length
    #[must_use]
    pub fn is_raw(&self) -> bool {
        !ENCODED_EXTENSIONS
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

impl FrameSource for DirectorySource {
    fn load(&self, name: &str) -> Result<Vec<Frame>, FrameSourceError> {
        let dir = self.root.join(name);
        if !dir.is_dir() {
            tracing::debug!(path = %dir.display(), "Sequence directory missing");
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| FrameSourceError::ListError {
            path: dir.clone(),
            source: e,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.matches_extension(path))
            .collect();
        paths.sort();

        let raw = self.is_raw();
        let mut frames: Vec<Frame> = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable frame");
                    continue;
                }
            };

            if let Some(first) = frames.first().filter(|_| raw) {
                if first.len() != bytes.len() {
                    tracing::warn!(
                        path = %path.display(),
                        expected = first.len(),
                        actual = bytes.len(),
                        "Skipping frame with mismatched size"
                    );
                    continue;
                }
            }

            frames.push(Frame::new(bytes));
        }

        Ok(frames)
    }
}

/// All loaded sequences
#[derive(Debug, Default)]
pub struct FrameStore {
    sequences: HashMap<AnimationName, Arc<AnimationSequence>>,
    intro: Arc<AnimationSequence>,
    empty: Arc<AnimationSequence>,
}

impl FrameStore {
    /// Load every catalog sequence plus the boot intro
    ///
    /// # Errors
    ///
    /// Fails only when the source itself fails hard. Missing sequences load
    /// as empty.
    pub fn load(source: &dyn FrameSource) -> Result<Self, FrameSourceError> {
        let mut builder = Self::builder();

        for name in AnimationName::ALL {
            let frames = source.load(name.as_str())?;
            tracing::info!(animation = %name, frames = frames.len(), "Loaded sequence");
            builder = builder.sequence(name, frames);
        }

        let intro = source.load(INTRO_DIR)?;
        tracing::info!(frames = intro.len(), "Loaded boot intro");

        Ok(builder.intro(intro).build())
    }

    /// Start an in-memory store
    #[must_use]
    pub fn builder() -> FrameStoreBuilder {
        FrameStoreBuilder::default()
    }

    /// Sequence for `name`; empty when it was never loaded
    #[must_use]
    pub fn lookup(&self, name: AnimationName) -> Arc<AnimationSequence> {
        self.sequences
            .get(&name)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    /// Whether `name` has at least one frame
    #[must_use]
    pub fn is_available(&self, name: AnimationName) -> bool {
        self.sequences.get(&name).is_some_and(|seq| !seq.is_empty())
    }

    /// The boot intro sequence (may be empty)
    #[must_use]
    pub fn intro(&self) -> Arc<AnimationSequence> {
        Arc::clone(&self.intro)
    }

    /// Catalog names without any frames
    #[must_use]
    pub fn missing(&self) -> Vec<AnimationName> {
        AnimationName::ALL
            .into_iter()
            .filter(|name| !self.is_available(*name))
            .collect()
    }
}

/// Builder for [`FrameStore`]
#[derive(Debug, Default)]
pub struct FrameStoreBuilder {
    sequences: HashMap<AnimationName, Arc<AnimationSequence>>,
    intro: Vec<Frame>,
}

impl FrameStoreBuilder {
    /// Add (or replace) a catalog sequence
    #[must_use]
    pub fn sequence(mut self, name: AnimationName, frames: Vec<Frame>) -> Self {
        self.sequences
            .insert(name, Arc::new(AnimationSequence::new(frames)));
        self
    }

    /// Set the boot intro frames
    #[must_use]
    pub fn intro(mut self, frames: Vec<Frame>) -> Self {
        self.intro = frames;
        self
    }

    /// Freeze into a read-only store
    #[must_use]
    pub fn build(self) -> FrameStore {
        FrameStore {
            sequences: self.sequences,
            intro: Arc::new(AnimationSequence::new(self.intro)),
            empty: Arc::new(AnimationSequence::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_frame(dir: &Path, file: &str, bytes: &[u8]) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(file), bytes).unwrap();
    }

    #[test]
    fn test_catalog_names_round_trip() {
        for name in AnimationName::ALL {
            assert_eq!(AnimationName::parse(name.as_str()), Some(name));
        }
        assert_eq!(AnimationName::parse("eyes"), None);
        assert!(AnimationName::IdleLeft.is_idle());
        assert!(!AnimationName::Blush.is_idle());
    }

    #[test]
    fn test_directory_source_sorts_by_file_name() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("laugh");
        write_frame(&dir, "frame_002.png", b"c");
        write_frame(&dir, "frame_000.png", b"a");
        write_frame(&dir, "frame_001.png", b"b");
        write_frame(&dir, "notes.txt", b"x");

        let source = DirectorySource::new(tmp.path(), "png");
        let frames = source.load("laugh").unwrap();

        let bytes: Vec<&[u8]> = frames.iter().map(Frame::as_bytes).collect();
        assert_eq!(bytes, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let source = DirectorySource::new(tmp.path(), "png");
        assert!(source.load("love").unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_raw_frame_sizes_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("sleep");
        write_frame(&dir, "0.rgb565", b"aaaa");
        write_frame(&dir, "1.rgb565", b"bb");
        write_frame(&dir, "2.rgb565", b"cccc");

        let source = DirectorySource::new(tmp.path(), RAW_EXTENSION);
        assert!(source.is_raw());
        let frames = source.load("sleep").unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].as_bytes(), b"cccc");
    }

    #[test]
    fn test_encoded_frames_of_any_length_are_kept() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("laugh");
        write_frame(&dir, "frame_000.png", &[0x89; 248]);
        write_frame(&dir, "frame_001.png", &[0x89; 60_936]);
        write_frame(&dir, "frame_002.PNG", &[0x89; 2_966]);

        let source = DirectorySource::new(tmp.path(), "PNG");
        assert!(!source.is_raw());
        let lengths: Vec<usize> = source.load("laugh").unwrap().iter().map(Frame::len).collect();
        assert_eq!(lengths, vec![248, 60_936, 2_966]);
    }

    #[test]
    fn test_store_load_and_lookup() {
        let tmp = TempDir::new().unwrap();
        write_frame(&tmp.path().join("idle_center"), "0.png", b"i0");
        write_frame(&tmp.path().join("idle_center"), "1.png", b"i1");
        write_frame(&tmp.path().join("boot"), "0.png", b"b0");

        let store = FrameStore::load(&DirectorySource::new(tmp.path(), "png")).unwrap();

        assert_eq!(store.lookup(AnimationName::IdleCenter).len(), 2);
        assert!(store.lookup(AnimationName::Angry).is_empty());
        assert!(store.is_available(AnimationName::IdleCenter));
        assert!(!store.is_available(AnimationName::Love));
        assert_eq!(store.intro().len(), 1);
        assert_eq!(store.missing().len(), 13);
    }

    #[test]
    fn test_builder_lookup_of_unknown_is_empty() {
        let store = FrameStore::builder()
            .sequence(AnimationName::Love, vec![Frame::new(vec![1, 2, 3])])
            .build();

        assert_eq!(store.lookup(AnimationName::Love).len(), 1);
        assert!(store.lookup(AnimationName::Hate).is_empty());
        assert!(store.intro().is_empty());
    }
}
