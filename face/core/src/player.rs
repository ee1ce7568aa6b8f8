//! Animation Player
//!
//! Owns the single active playback session and advances it by at most one
//! frame per scheduler tick.
//!
//! # Timing
//!
//! A frame advances only once it has been presented at least once and a full
//! frame interval has elapsed since the session started or last advanced.
//! Ticking faster than the interval re-presents the current frame; ticking
//! slower never skips frames.
//!
//! # End of sequence
//!
//! What happens when the last frame's interval runs out is data attached to
//! the session ([`OnFinish`]), not scattered timer callbacks:
//!
//! ```text
//! Loop / Restart          -> wrap to frame 0
//! FallbackToIdle(v, hold) -> hold on the last frame, then report Finished(v)
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::expression::IdleVariant;
use crate::frames::{AnimationName, AnimationSequence, Frame};
use crate::sink::{PresentError, PresentationSink};

/// Identifies what a session is playing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clip {
    /// The boot intro
    Intro,
    /// A catalog animation
    Animation(AnimationName),
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intro => f.write_str("intro"),
            Self::Animation(name) => write!(f, "{name}"),
        }
    }
}

/// Completion policy of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnFinish {
    /// Wrap around forever
    Loop,
    /// Hold the final frame for `hold`, then hand control back to idle
    FallbackToIdle {
        /// Idle variant to re-enter
        variant: IdleVariant,
        /// Time spent on the final frame before falling back
        hold: Duration,
    },
    /// Wrap to the first frame unconditionally
    Restart,
}

/// A request to replace the active session
#[derive(Clone, Debug)]
pub struct PlaybackRequest {
    /// What is being played
    pub clip: Clip,
    /// Frames, shared with the store
    pub sequence: Arc<AnimationSequence>,
    /// Wrap at the end regardless of `on_finish`
    pub looping: bool,
    /// Time each frame stays up
    pub frame_interval: Duration,
    /// Completion policy
    pub on_finish: OnFinish,
    /// Complete passes before `on_finish` applies (at least 1)
    pub passes: u32,
}

impl PlaybackRequest {
    /// A looping request
    #[must_use]
    pub fn looping(clip: Clip, sequence: Arc<AnimationSequence>, frame_interval: Duration) -> Self {
        Self {
            clip,
            sequence,
            looping: true,
            frame_interval,
            on_finish: OnFinish::Loop,
            passes: 1,
        }
    }

    /// A one-shot request with an explicit completion policy
    #[must_use]
    pub fn once(
        clip: Clip,
        sequence: Arc<AnimationSequence>,
        frame_interval: Duration,
        on_finish: OnFinish,
    ) -> Self {
        Self {
            clip,
            sequence,
            looping: false,
            frame_interval,
            on_finish,
            passes: 1,
        }
    }

    /// Play the sequence `passes` times before the policy applies
    #[must_use]
    pub fn with_passes(mut self, passes: u32) -> Self {
        self.passes = passes.max(1);
        self
    }
}

/// The active playback
#[derive(Debug)]
struct PlaybackSession {
    clip: Clip,
    sequence: Arc<AnimationSequence>,
    frame_index: usize,
    frame_interval: Duration,
    looping: bool,
    on_finish: OnFinish,
    passes_left: u32,
    last_advance: Instant,
    shown: bool,
    hold_until: Option<Instant>,
}

impl PlaybackSession {
    fn new(request: PlaybackRequest, now: Instant) -> Self {
        Self {
            clip: request.clip,
            sequence: request.sequence,
            frame_index: 0,
            frame_interval: request.frame_interval,
            looping: request.looping,
            on_finish: request.on_finish,
            passes_left: request.passes.max(1),
            last_advance: now,
            shown: false,
            hold_until: None,
        }
    }

    fn rewind(&mut self, now: Instant) {
        self.frame_index = 0;
        self.last_advance = now;
        self.shown = false;
    }

    fn current_frame(&self) -> Option<&Frame> {
        self.sequence.get(self.frame_index)
    }
}

/// Result of a single player tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Frame `index` was presented
    Presented {
        /// Index within the sequence
        index: usize,
    },
    /// The final frame was re-presented during a hold
    Holding {
        /// Index of the final frame
        index: usize,
    },
    /// The session retired; idle should be re-entered with `variant`
    Finished {
        /// Variant to re-enter
        variant: IdleVariant,
    },
    /// Nothing to show
    Blank,
    /// The sink reported that it is gone
    SinkClosed,
}

/// Presentation counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerStats {
    /// Frames handed to the sink successfully
    pub frames_presented: u64,
    /// Frames the sink failed to show
    pub present_failures: u64,
    /// Sessions started
    pub sessions_started: u64,
}

/// Presents frames and tracks failure streaks so a flaky sink does not
/// flood the log
#[derive(Debug, Default)]
struct Presenter {
    stats: PlayerStats,
    failing: bool,
}

impl Presenter {
    fn present(
        &mut self,
        sink: &mut dyn PresentationSink,
        frame: &Frame,
        clip: Clip,
        index: usize,
    ) -> Result<(), PresentError> {
        match sink.present(frame) {
            Ok(()) => {
                if self.failing {
                    tracing::info!(clip = %clip, "Presentation recovered");
                    self.failing = false;
                }
                self.stats.frames_presented += 1;
                Ok(())
            }
            Err(PresentError::Closed) => Err(PresentError::Closed),
            Err(e) => {
                self.stats.present_failures += 1;
                if self.failing {
                    tracing::debug!(clip = %clip, index, error = %e, "Presentation still failing");
                } else {
                    tracing::warn!(clip = %clip, index, error = %e, "Presentation failed");
                    self.failing = true;
                }
                // Playback keeps going regardless
                Ok(())
            }
        }
    }
}

/// Plays one session at a time
#[derive(Debug, Default)]
pub struct AnimationPlayer {
    session: Option<PlaybackSession>,
    pending_fallback: Option<IdleVariant>,
    presenter: Presenter,
}

impl AnimationPlayer {
    /// Create an idle player with no session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active session
    ///
    /// The old session is dropped before anything else is presented, so its
    /// remaining frames never reach the sink. An empty sequence retires the
    /// session instead; the next tick reports `Finished(Center)`.
    pub fn start(&mut self, request: PlaybackRequest, now: Instant) {
        self.presenter.stats.sessions_started += 1;

        if request.sequence.is_empty() {
            tracing::warn!(clip = %request.clip, "No frames to play, falling back to idle");
            self.session = None;
            self.pending_fallback = Some(IdleVariant::Center);
            return;
        }

        tracing::debug!(
            clip = %request.clip,
            frames = request.sequence.len(),
            interval = ?request.frame_interval,
            looping = request.looping,
            passes = request.passes,
            "Starting playback"
        );

        self.pending_fallback = None;
        self.session = Some(PlaybackSession::new(request, now));
    }

    /// Drop the active session and show nothing
    pub fn stop(&mut self) {
        self.session = None;
        self.pending_fallback = None;
    }

    /// Advance at most one frame and present the current one
    pub fn tick(&mut self, now: Instant, sink: &mut dyn PresentationSink) -> TickOutcome {
        if let Some(variant) = self.pending_fallback.take() {
            return TickOutcome::Finished { variant };
        }

        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Blank;
        };

        if let Some(until) = session.hold_until {
            if now >= until {
                return self.retire();
            }
            return Self::show(&mut self.presenter, session, sink, true);
        }

        let due = session.shown && now.duration_since(session.last_advance) >= session.frame_interval;
        if due {
            if session.frame_index + 1 < session.sequence.len() {
                session.frame_index += 1;
                session.last_advance = now;
                session.shown = false;
            } else if session.passes_left > 1 {
                session.passes_left -= 1;
                session.rewind(now);
            } else if session.looping {
                session.rewind(now);
            } else {
                match session.on_finish {
                    OnFinish::Loop | OnFinish::Restart => session.rewind(now),
                    OnFinish::FallbackToIdle { hold, .. } => {
                        if hold.is_zero() {
                            return self.retire();
                        }
                        session.hold_until = Some(now + hold);
                        return Self::show(&mut self.presenter, session, sink, true);
                    }
                }
            }
        }

        Self::show(&mut self.presenter, session, sink, false)
    }

    fn show(
        presenter: &mut Presenter,
        session: &mut PlaybackSession,
        sink: &mut dyn PresentationSink,
        holding: bool,
    ) -> TickOutcome {
        let index = session.frame_index;
        let Some(frame) = session.current_frame() else {
            return TickOutcome::Blank;
        };

        if presenter.present(sink, frame, session.clip, index).is_err() {
            return TickOutcome::SinkClosed;
        }
        session.shown = true;

        if holding {
            TickOutcome::Holding { index }
        } else {
            TickOutcome::Presented { index }
        }
    }

    fn retire(&mut self) -> TickOutcome {
        let variant = match self.session.take().map(|s| s.on_finish) {
            Some(OnFinish::FallbackToIdle { variant, .. }) => variant,
            _ => IdleVariant::Center,
        };
        TickOutcome::Finished { variant }
    }

    /// What is playing and at which frame
    #[must_use]
    pub fn position(&self) -> Option<(Clip, usize)> {
        self.session.as_ref().map(|s| (s.clip, s.frame_index))
    }

    /// Whether the final frame is being held
    #[must_use]
    pub fn is_holding(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.hold_until.is_some())
    }

    /// Presentation counters
    #[must_use]
    pub fn stats(&self) -> PlayerStats {
        self.presenter.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;

    const INTERVAL: Duration = Duration::from_millis(100);

    fn sequence(tag: &str, n: usize) -> Arc<AnimationSequence> {
        let frames = (0..n)
            .map(|i| Frame::new(format!("{tag}-{i}").into_bytes()))
            .collect();
        Arc::new(AnimationSequence::new(frames))
    }

    fn labels(sink: &RecordingSink) -> Vec<String> {
        sink.frames()
            .iter()
            .map(|f| String::from_utf8_lossy(f.as_bytes()).into_owned())
            .collect()
    }

    fn clip() -> Clip {
        Clip::Animation(AnimationName::Laugh)
    }

    #[test]
    fn test_fast_ticks_re_present_current_frame() {
        let t0 = Instant::now();
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        player.start(PlaybackRequest::looping(clip(), sequence("a", 3), INTERVAL), t0);

        assert_eq!(player.tick(t0, &mut sink), TickOutcome::Presented { index: 0 });
        assert_eq!(
            player.tick(t0 + Duration::from_millis(40), &mut sink),
            TickOutcome::Presented { index: 0 }
        );
        assert_eq!(
            player.tick(t0 + Duration::from_millis(100), &mut sink),
            TickOutcome::Presented { index: 1 }
        );

        let frames = sink.frames();
        assert_eq!(frames[0], frames[1]);
        assert_ne!(frames[1], frames[2]);
    }

    #[test]
    fn test_slow_ticks_never_skip_frames() {
        let t0 = Instant::now();
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        player.start(PlaybackRequest::looping(clip(), sequence("a", 3), INTERVAL), t0);

        // Each tick is five intervals apart; still one frame per tick
        for i in 0..4u32 {
            player.tick(t0 + INTERVAL * 5 * i, &mut sink);
        }

        assert_eq!(labels(&sink), vec!["a-0", "a-1", "a-2", "a-0"]);
    }

    #[test]
    fn test_first_tick_after_late_start_shows_frame_zero() {
        let t0 = Instant::now();
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        player.start(PlaybackRequest::looping(clip(), sequence("a", 2), INTERVAL), t0);

        player.tick(t0 + INTERVAL * 3, &mut sink);
        assert_eq!(labels(&sink), vec!["a-0"]);
    }

    #[test]
    fn test_restart_wraps_without_looping_flag() {
        let t0 = Instant::now();
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        player.start(
            PlaybackRequest::once(clip(), sequence("r", 2), INTERVAL, OnFinish::Restart),
            t0,
        );

        for i in 0..5u32 {
            player.tick(t0 + INTERVAL * i, &mut sink);
        }
        assert_eq!(labels(&sink), vec!["r-0", "r-1", "r-0", "r-1", "r-0"]);
    }

    #[test]
    fn test_fallback_holds_then_finishes() {
        let t0 = Instant::now();
        let hold = Duration::from_millis(250);
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        player.start(
            PlaybackRequest::once(
                clip(),
                sequence("f", 2),
                INTERVAL,
                OnFinish::FallbackToIdle {
                    variant: IdleVariant::Center,
                    hold,
                },
            ),
            t0,
        );

        assert_eq!(player.tick(t0, &mut sink), TickOutcome::Presented { index: 0 });
        assert_eq!(player.tick(t0 + INTERVAL, &mut sink), TickOutcome::Presented { index: 1 });

        // Final frame's interval runs out: the hold starts here
        let hold_start = t0 + INTERVAL * 2;
        assert_eq!(player.tick(hold_start, &mut sink), TickOutcome::Holding { index: 1 });
        assert!(player.is_holding());
        assert_eq!(
            player.tick(hold_start + Duration::from_millis(200), &mut sink),
            TickOutcome::Holding { index: 1 }
        );
        assert_eq!(
            player.tick(hold_start + hold, &mut sink),
            TickOutcome::Finished {
                variant: IdleVariant::Center
            }
        );
        assert_eq!(player.position(), None);
        assert_eq!(labels(&sink), vec!["f-0", "f-1", "f-1", "f-1"]);
    }

    #[test]
    fn test_zero_hold_finishes_when_last_interval_expires() {
        let t0 = Instant::now();
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        player.start(
            PlaybackRequest::once(
                clip(),
                sequence("z", 1),
                INTERVAL,
                OnFinish::FallbackToIdle {
                    variant: IdleVariant::Left,
                    hold: Duration::ZERO,
                },
            ),
            t0,
        );

        player.tick(t0, &mut sink);
        assert_eq!(
            player.tick(t0 + INTERVAL, &mut sink),
            TickOutcome::Finished {
                variant: IdleVariant::Left
            }
        );
    }

    #[test]
    fn test_passes_repeat_before_policy() {
        let t0 = Instant::now();
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        player.start(
            PlaybackRequest::once(
                Clip::Intro,
                sequence("b", 2),
                INTERVAL,
                OnFinish::FallbackToIdle {
                    variant: IdleVariant::Center,
                    hold: Duration::ZERO,
                },
            )
            .with_passes(2),
            t0,
        );

        let mut outcomes = Vec::new();
        for i in 0..5u32 {
            outcomes.push(player.tick(t0 + INTERVAL * i, &mut sink));
        }

        assert_eq!(labels(&sink), vec!["b-0", "b-1", "b-0", "b-1"]);
        assert_eq!(
            outcomes[4],
            TickOutcome::Finished {
                variant: IdleVariant::Center
            }
        );
    }

    #[test]
    fn test_empty_sequence_retires_without_presenting() {
        let t0 = Instant::now();
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        player.start(PlaybackRequest::looping(clip(), sequence("a", 2), INTERVAL), t0);
        player.tick(t0, &mut sink);

        player.start(
            PlaybackRequest::once(clip(), sequence("x", 0), INTERVAL, OnFinish::Restart),
            t0,
        );
        assert_eq!(
            player.tick(t0 + INTERVAL, &mut sink),
            TickOutcome::Finished {
                variant: IdleVariant::Center
            }
        );
        assert_eq!(sink.len(), 1, "stale frame must not be re-presented");
        assert_eq!(player.tick(t0 + INTERVAL * 2, &mut sink), TickOutcome::Blank);
    }

    #[test]
    fn test_replacing_session_drops_remaining_frames() {
        let t0 = Instant::now();
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        player.start(PlaybackRequest::looping(clip(), sequence("old", 3), INTERVAL), t0);
        player.tick(t0, &mut sink);

        player.start(PlaybackRequest::looping(clip(), sequence("new", 3), INTERVAL), t0);
        player.tick(t0 + INTERVAL, &mut sink);
        player.tick(t0 + INTERVAL * 2, &mut sink);

        assert_eq!(labels(&sink), vec!["old-0", "new-0", "new-1"]);
    }

    #[test]
    fn test_failed_presentation_still_advances() {
        let t0 = Instant::now();
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        player.start(PlaybackRequest::looping(clip(), sequence("p", 3), INTERVAL), t0);

        sink.fail_next(PresentError::Failed("spi timeout".into()));
        assert_eq!(player.tick(t0, &mut sink), TickOutcome::Presented { index: 0 });
        assert_eq!(player.tick(t0 + INTERVAL, &mut sink), TickOutcome::Presented { index: 1 });

        let stats = player.stats();
        assert_eq!(stats.present_failures, 1);
        assert_eq!(stats.frames_presented, 1);
        assert_eq!(labels(&sink), vec!["p-1"]);
    }

    #[test]
    fn test_closed_sink_is_surfaced() {
        let t0 = Instant::now();
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        player.start(PlaybackRequest::looping(clip(), sequence("c", 2), INTERVAL), t0);

        sink.fail_next(PresentError::Closed);
        assert_eq!(player.tick(t0, &mut sink), TickOutcome::SinkClosed);
    }

    #[test]
    fn test_no_session_is_blank() {
        let mut player = AnimationPlayer::new();
        let mut sink = RecordingSink::new();
        assert_eq!(player.tick(Instant::now(), &mut sink), TickOutcome::Blank);
        assert!(sink.is_empty());
    }
}
