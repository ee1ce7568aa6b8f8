//! Speaker volume parameter
//!
//! Cheek taps nudge the volume instead of changing the face. The level is
//! kept here so surfaces can show or apply it; it never drives a display
//! transition.

use serde::{Deserialize, Serialize};

/// Direction of a volume nudge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeChange {
    /// One step quieter
    Down,
    /// One step louder
    Up,
}

/// Volume level in percent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Volume {
    level: u8,
    step: u8,
}

impl Volume {
    /// Loudest setting
    pub const MAX: u8 = 100;

    /// Create a volume at `initial` percent moving by `step` per nudge
    #[must_use]
    pub fn new(initial: u8, step: u8) -> Self {
        Self {
            level: initial.min(Self::MAX),
            step,
        }
    }

    /// Current level
    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Apply a nudge, saturating at 0 and [`Self::MAX`]
    pub fn apply(&mut self, change: VolumeChange) -> u8 {
        self.level = match change {
            VolumeChange::Down => self.level.saturating_sub(self.step),
            VolumeChange::Up => self.level.saturating_add(self.step).min(Self::MAX),
        };
        self.level
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(50, 10)
    }
}
