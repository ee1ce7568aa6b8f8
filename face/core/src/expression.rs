//! Expression State Machine
//!
//! Owns [`DeviceState`] and the [`AnimationPlayer`], and decides what plays
//! next:
//!
//! ```text
//! Boot ──intro done / stimulus──► Idle(Center) ◄──hold elapsed── Event
//!                                   │    ▲                        ▲
//!                        dwell time │    │ look hold              │ stimulus
//!                                   ▼    │                        │
//!                               Idle(Left|Right) ─────────────────┘
//! ```
//!
//! The machine never returns to Boot. All timing comes in through `now`, so
//! the whole machine can be driven deterministically from tests.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::{BehaviorConfig, FaceConfig, TimingConfig};
use crate::frames::{AnimationName, FrameStore};
use crate::player::{AnimationPlayer, Clip, OnFinish, PlaybackRequest, TickOutcome};
use crate::sink::PresentationSink;
use crate::stimulus::{self, Reaction, StimulusEvent};

/// Coarse device mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Playing the intro
    Boot,
    /// Resting, or glancing around
    Idle,
    /// Showing an expression
    Event,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boot => f.write_str("boot"),
            Self::Idle => f.write_str("idle"),
            Self::Event => f.write_str("event"),
        }
    }
}

/// Where the idle face is looking
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleVariant {
    /// Straight ahead, looping
    #[default]
    Center,
    /// One-shot glance left
    Left,
    /// One-shot glance right
    Right,
}

impl IdleVariant {
    /// Animation backing this variant
    #[must_use]
    pub fn animation(self) -> AnimationName {
        match self {
            Self::Center => AnimationName::IdleCenter,
            Self::Left => AnimationName::IdleLeft,
            Self::Right => AnimationName::IdleRight,
        }
    }
}

impl fmt::Display for IdleVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Center => f.write_str("center"),
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// Process-wide display state, mutated only by [`ExpressionMachine`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceState {
    /// Current mode
    pub mode: Mode,
    /// Current idle variant (Center outside of look shots)
    pub idle_variant: IdleVariant,
    /// When the dwell timer was last reset
    pub last_idle_drift_at: Instant,
    /// Direction of the previous look shot
    pub last_look: Option<IdleVariant>,
}

/// Observable summary of what the face is doing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FaceSnapshot {
    /// Current mode
    pub mode: Mode,
    /// Current idle variant
    pub idle_variant: IdleVariant,
    /// Clip on screen, if any
    pub clip: Option<Clip>,
    /// Frame index within the clip
    pub frame_index: Option<usize>,
}

/// Translates stimuli into playback and handles animation completion
#[derive(Debug)]
pub struct ExpressionMachine {
    store: Arc<FrameStore>,
    timing: TimingConfig,
    behavior: BehaviorConfig,
    state: DeviceState,
    player: AnimationPlayer,
    last_idle_check: Instant,
}

impl ExpressionMachine {
    /// Enter Boot and start the intro
    #[must_use]
    pub fn new(store: Arc<FrameStore>, config: &FaceConfig, now: Instant) -> Self {
        let mut machine = Self {
            store,
            timing: config.timing,
            behavior: config.behavior,
            state: DeviceState {
                mode: Mode::Boot,
                idle_variant: IdleVariant::Center,
                last_idle_drift_at: now,
                last_look: None,
            },
            player: AnimationPlayer::new(),
            last_idle_check: now,
        };

        let intro = machine.store.intro();
        tracing::info!(
            frames = intro.len(),
            repeats = machine.behavior.boot_repeats,
            "Booting"
        );
        let request = PlaybackRequest::once(
            Clip::Intro,
            intro,
            machine.timing.boot_frame,
            OnFinish::FallbackToIdle {
                variant: IdleVariant::Center,
                hold: Duration::ZERO,
            },
        )
        .with_passes(machine.behavior.boot_repeats);
        machine.player.start(request, now);

        machine
    }

    /// Apply a stimulus
    ///
    /// The returned [`Reaction`] tells the caller whether anything outside
    /// the display (the volume) needs adjusting.
    pub fn submit(&mut self, event: StimulusEvent, now: Instant) -> Reaction {
        let reaction = stimulus::reaction(event);
        tracing::debug!(event = %event, mode = %self.state.mode, ?reaction, "Stimulus");

        match reaction {
            Reaction::Animate(name) => self.enter_event(name, now),
            Reaction::Rest => self.enter_idle(IdleVariant::Center, now),
            Reaction::AdjustVolume(_) => {}
        }

        reaction
    }

    /// One scheduler tick: idle drift check, then playback
    pub fn tick(&mut self, now: Instant, sink: &mut dyn PresentationSink) -> TickOutcome {
        self.check_idle_drift(now);

        match self.player.tick(now, sink) {
            TickOutcome::Finished { variant } => {
                self.on_finished(variant, now);
                // Show the idle frame in the same tick instead of a gap
                match self.player.tick(now, sink) {
                    TickOutcome::Finished { .. } => TickOutcome::Blank,
                    outcome => outcome,
                }
            }
            outcome => outcome,
        }
    }

    /// Current display state
    #[must_use]
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// The player, for stats
    #[must_use]
    pub fn player(&self) -> &AnimationPlayer {
        &self.player
    }

    /// Summary for observers
    #[must_use]
    pub fn snapshot(&self) -> FaceSnapshot {
        let position = self.player.position();
        FaceSnapshot {
            mode: self.state.mode,
            idle_variant: self.state.idle_variant,
            clip: position.map(|(clip, _)| clip),
            frame_index: position.map(|(_, index)| index),
        }
    }

    fn enter_event(&mut self, name: AnimationName, now: Instant) {
        let sequence = self.store.lookup(name);
        if sequence.is_empty() {
            tracing::warn!(animation = %name, "Animation not available, staying idle");
            self.enter_idle(IdleVariant::Center, now);
            return;
        }

        match self.state.mode {
            Mode::Event => tracing::debug!(animation = %name, "Superseding expression"),
            Mode::Boot => tracing::info!(animation = %name, "Stimulus ended boot intro"),
            Mode::Idle => {}
        }
        tracing::info!(animation = %name, frames = sequence.len(), "Playing expression");

        self.state.mode = Mode::Event;
        self.state.idle_variant = IdleVariant::Center;
        self.player.start(
            PlaybackRequest::once(
                Clip::Animation(name),
                sequence,
                self.timing.event_frame,
                OnFinish::FallbackToIdle {
                    variant: IdleVariant::Center,
                    hold: self.behavior.event_hold,
                },
            ),
            now,
        );
    }

    fn enter_idle(&mut self, requested: IdleVariant, now: Instant) {
        let mut variant = requested;
        let mut sequence = self.store.lookup(variant.animation());
        if sequence.is_empty() && variant != IdleVariant::Center {
            tracing::debug!(variant = %variant, "Look shot not available, using center");
            variant = IdleVariant::Center;
            sequence = self.store.lookup(AnimationName::IdleCenter);
        }

        let resting = self.state.mode == Mode::Idle
            && self.state.idle_variant == IdleVariant::Center
            && self.player.position().is_some();
        if resting && variant == IdleVariant::Center {
            return;
        }

        if self.state.mode != Mode::Idle {
            self.state.last_idle_drift_at = now;
            self.last_idle_check = now;
            tracing::debug!(from = %self.state.mode, "Entering idle");
        }
        self.state.mode = Mode::Idle;
        self.state.idle_variant = variant;

        if sequence.is_empty() {
            tracing::warn!("idle_center has no frames, display is blank");
            self.player.stop();
            return;
        }

        let clip = Clip::Animation(variant.animation());
        let request = match variant {
            IdleVariant::Center => {
                PlaybackRequest::looping(clip, sequence, self.timing.idle_loop_frame)
            }
            IdleVariant::Left | IdleVariant::Right => PlaybackRequest::once(
                clip,
                sequence,
                self.timing.idle_look_frame,
                OnFinish::FallbackToIdle {
                    variant: IdleVariant::Center,
                    hold: self.behavior.look_hold,
                },
            ),
        };
        self.player.start(request, now);
    }

    fn on_finished(&mut self, variant: IdleVariant, now: Instant) {
        match self.state.mode {
            Mode::Boot => tracing::info!("Boot intro complete"),
            Mode::Event => tracing::debug!("Expression finished"),
            Mode::Idle => {}
        }
        self.enter_idle(variant, now);
    }

    fn check_idle_drift(&mut self, now: Instant) {
        if self.state.mode != Mode::Idle || self.state.idle_variant != IdleVariant::Center {
            return;
        }
        if now.saturating_duration_since(self.last_idle_check) < self.timing.idle_check {
            return;
        }
        self.last_idle_check = now;

        if now.saturating_duration_since(self.state.last_idle_drift_at) < self.behavior.idle_drift {
            return;
        }

        let look = match self.state.last_look {
            Some(IdleVariant::Left) => IdleVariant::Right,
            _ => IdleVariant::Left,
        };
        tracing::debug!(look = %look, "Idle drift");
        self.state.last_look = Some(look);
        self.state.last_idle_drift_at = now;
        self.enter_idle(look, now);
    }
}
