//! Face Core - Headless Expression Playback for the Companion Face
//!
//! This crate decides what the companion robot's face shows and when. It
//! knows nothing about panels, windows or buses: finished frames go to a
//! [`PresentationSink`] and stimuli arrive as [`StimulusEvent`]s or free
//! text.
//!
//! # Architecture
//!
//! ```text
//!  utterance / touch
//!         │
//!  ┌──────▼──────┐    ┌─────────────────────┐    ┌────────────────┐
//!  │  Stimulus   │───►│ Expression Machine  │───►│ Animation      │
//!  │  Mapper     │    │ Boot / Idle / Event │    │ Player         │
//!  └─────────────┘    └──────────┬──────────┘    └───────┬────────┘
//!                                │ lookup                │ present
//!                         ┌──────▼──────┐        ┌───────▼────────┐
//!                         │ Frame Store │        │ Presentation   │
//!                         │ (read-only) │        │ Sink           │
//!                         └─────────────┘        └────────────────┘
//! ```
//!
//! [`FaceRuntime`] ticks the machine at a fixed rate and feeds it stimuli
//! from an mpsc mailbox, both from one task.
//!
//! # Module Overview
//!
//! - [`frames`]: Frame Store, frame sources and the animation catalog
//! - [`player`]: Single-session frame playback with hold and loop policies
//! - [`expression`]: Boot/Idle/Event state machine and idle drift
//! - [`stimulus`]: Keyword classification and touch mapping
//! - [`volume`]: Speaker volume parameter adjusted by cheek taps
//! - [`sink`]: Presentation Sink contract and test sinks
//! - [`config`]: TOML configuration with env and CLI overrides
//! - [`runtime`]: Scheduler loop and stimulus mailbox

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod expression;
pub mod frames;
pub mod player;
pub mod runtime;
pub mod sink;
pub mod stimulus;
pub mod volume;

pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, FaceConfig,
};
pub use expression::{DeviceState, ExpressionMachine, FaceSnapshot, IdleVariant, Mode};
pub use frames::{
    AnimationName, AnimationSequence, DirectorySource, Frame, FrameSource, FrameSourceError,
    FrameStore,
};
pub use player::{AnimationPlayer, Clip, OnFinish, PlaybackRequest, PlayerStats, TickOutcome};
pub use runtime::{FaceCommand, FaceRuntime, RunOutcome};
pub use sink::{NullSink, PresentError, PresentationSink, RecordingSink};
pub use stimulus::{classify_utterance, reaction, Reaction, StimulusEvent, Touch};
pub use volume::{Volume, VolumeChange};
