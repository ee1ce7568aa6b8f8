//! Face Runtime
//!
//! Drives the [`ExpressionMachine`] from two sources at once: a fixed-rate
//! scheduler tick and a stimulus mailbox. Both are multiplexed through one
//! `tokio::select!` loop on a single task, so a stimulus is always applied
//! between two ticks and never in the middle of one.
//!
//! # Observing
//!
//! ```ignore
//! let runtime = FaceRuntime::new(machine, sink, &config);
//! let mut face = runtime.subscribe();
//! let (tx, rx) = mpsc::channel(32);
//! tokio::spawn(runtime.run(rx));
//!
//! tx.send(FaceCommand::Utterance("tell me a joke".into())).await?;
//! face.changed().await?;
//! println!("{:?}", *face.borrow());
//! ```

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::config::FaceConfig;
use crate::expression::{ExpressionMachine, FaceSnapshot};
use crate::player::TickOutcome;
use crate::sink::PresentationSink;
use crate::stimulus::{classify_utterance, Reaction, StimulusEvent};
use crate::volume::Volume;

/// Messages accepted by the runtime mailbox
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaceCommand {
    /// An already-classified stimulus
    Stimulus(StimulusEvent),
    /// Free text to classify
    Utterance(String),
    /// Stop the loop
    Shutdown,
}

/// Why [`FaceRuntime::run`] returned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// A [`FaceCommand::Shutdown`] was received
    Shutdown,
    /// Every command sender was dropped
    InputClosed,
    /// The presentation sink went away
    SinkClosed,
}

/// Owns the machine, the sink and the volume, and runs the scheduler
pub struct FaceRuntime<S> {
    machine: ExpressionMachine,
    sink: S,
    volume: Volume,
    tick: Duration,
    snapshot_tx: watch::Sender<FaceSnapshot>,
    volume_tx: watch::Sender<u8>,
}

impl<S: PresentationSink> FaceRuntime<S> {
    /// Wrap a machine and the sink it presents to
    #[must_use]
    pub fn new(machine: ExpressionMachine, sink: S, config: &FaceConfig) -> Self {
        let volume = Volume::new(config.volume.initial, config.volume.step);
        let (snapshot_tx, _) = watch::channel(machine.snapshot());
        let (volume_tx, _) = watch::channel(volume.level());

        Self {
            machine,
            sink,
            volume,
            tick: config.timing.tick,
            snapshot_tx,
            volume_tx,
        }
    }

    /// Watch what the face is showing
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FaceSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Watch the volume level
    #[must_use]
    pub fn subscribe_volume(&self) -> watch::Receiver<u8> {
        self.volume_tx.subscribe()
    }

    /// Current volume level
    #[must_use]
    pub fn volume(&self) -> u8 {
        self.volume.level()
    }

    /// The machine being driven
    #[must_use]
    pub fn machine(&self) -> &ExpressionMachine {
        &self.machine
    }

    /// Apply one mailbox message
    pub fn handle_command(
        &mut self,
        command: FaceCommand,
        now: Instant,
    ) -> ControlFlow<RunOutcome> {
        match command {
            FaceCommand::Stimulus(event) => self.apply(event, now),
            FaceCommand::Utterance(text) => {
                let event = classify_utterance(&text);
                tracing::debug!(utterance = %text, event = %event, "Classified utterance");
                self.apply(event, now);
            }
            FaceCommand::Shutdown => {
                tracing::info!("Shutdown requested");
                return ControlFlow::Break(RunOutcome::Shutdown);
            }
        }
        ControlFlow::Continue(())
    }

    /// Run one scheduler tick
    ///
    /// Returns `Some` when the loop must stop.
    pub fn tick_once(&mut self, now: Instant) -> Option<RunOutcome> {
        let outcome = self.machine.tick(now, &mut self.sink);
        self.publish_snapshot();

        if outcome == TickOutcome::SinkClosed {
            tracing::warn!("Presentation sink closed, stopping");
            return Some(RunOutcome::SinkClosed);
        }
        None
    }

    /// Run until shutdown, input close, or sink close
    pub async fn run(mut self, mut commands: mpsc::Receiver<FaceCommand>) -> RunOutcome {
        // interval() panics on a zero period
        let mut ticker = tokio::time::interval(self.tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(tick = ?self.tick, "Face runtime started");

        let outcome = loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::info!("Stimulus input closed");
                        break RunOutcome::InputClosed;
                    };
                    let now = tokio::time::Instant::now().into_std();
                    if let ControlFlow::Break(outcome) = self.handle_command(command, now) {
                        break outcome;
                    }
                }

                instant = ticker.tick() => {
                    if let Some(outcome) = self.tick_once(instant.into_std()) {
                        break outcome;
                    }
                }
            }
        };

        let stats = self.machine.player().stats();
        tracing::info!(
            ?outcome,
            frames_presented = stats.frames_presented,
            present_failures = stats.present_failures,
            sessions = stats.sessions_started,
            "Face runtime stopped"
        );
        outcome
    }

    fn apply(&mut self, event: StimulusEvent, now: Instant) {
        if let Reaction::AdjustVolume(change) = self.machine.submit(event, now) {
            let level = self.volume.apply(change);
            tracing::info!(level, ?change, "Volume changed");
            self.volume_tx.send_if_modified(|current| {
                let changed = *current != level;
                *current = level;
                changed
            });
        }
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        let snapshot = self.machine.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            let changed = *current != snapshot;
            *current = snapshot;
            changed
        });
    }
}

impl<S> std::fmt::Debug for FaceRuntime<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceRuntime")
            .field("machine", &self.machine)
            .field("volume", &self.volume)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}
