//! TOML Configuration File Support
//!
//! Loads playback timing and behavior from
//! `~/.config/companion-face/face.toml`.
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables (`FACE_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [timing]
//! tick_ms = 10
//! boot_ms = 16
//! idle_loop_ms = 170
//! idle_look_ms = 120
//! event_ms = 90
//! idle_check_ms = 500
//!
//! [behavior]
//! idle_drift_s = 6
//! event_hold_ms = 5000
//! look_hold_ms = 700
//! boot_repeats = 2
//!
//! [assets]
//! dir = "assets"
//! # Raw RGB565 buffers, ready for the panel. Encoded images such as "png"
//! # load too but are passed to the sink undecoded.
//! extension = "rgb565"
//!
//! [volume]
//! initial = 50
//! step = 10
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frames::RAW_EXTENSION;

/// Scheduler tick period
pub const DEFAULT_TICK_MS: u64 = 10;
/// Boot intro frame interval
pub const DEFAULT_BOOT_MS: u64 = 16;
/// Resting loop frame interval
pub const DEFAULT_IDLE_LOOP_MS: u64 = 170;
/// Look-left/right shot frame interval
pub const DEFAULT_IDLE_LOOK_MS: u64 = 120;
/// Expression frame interval
pub const DEFAULT_EVENT_MS: u64 = 90;
/// How often the idle drift timer is checked
pub const DEFAULT_IDLE_CHECK_MS: u64 = 500;
/// Idle dwell before a look shot on the physical panel
pub const PANEL_IDLE_DRIFT_SECS: u64 = 6;
/// Idle dwell before a look shot on the desktop simulator
pub const SIMULATOR_IDLE_DRIFT_SECS: u64 = 60;
/// How long a finished expression lingers
pub const DEFAULT_EVENT_HOLD_MS: u64 = 5000;
/// How long a look shot lingers
pub const DEFAULT_LOOK_HOLD_MS: u64 = 700;
/// Boot intro passes
pub const DEFAULT_BOOT_REPEATS: u32 = 2;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[timing]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingToml {
    /// Scheduler tick period in milliseconds
    pub tick_ms: Option<u64>,
    /// Boot intro frame interval in milliseconds
    pub boot_ms: Option<u64>,
    /// Resting loop frame interval in milliseconds
    pub idle_loop_ms: Option<u64>,
    /// Look shot frame interval in milliseconds
    pub idle_look_ms: Option<u64>,
    /// Expression frame interval in milliseconds
    pub event_ms: Option<u64>,
    /// Idle drift check period in milliseconds
    pub idle_check_ms: Option<u64>,
}

/// `[behavior]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorToml {
    /// Idle dwell before a look shot, in seconds
    pub idle_drift_s: Option<u64>,
    /// Post-expression hold in milliseconds
    pub event_hold_ms: Option<u64>,
    /// Post-look hold in milliseconds
    pub look_hold_ms: Option<u64>,
    /// Boot intro passes
    pub boot_repeats: Option<u32>,
}

/// `[assets]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsToml {
    /// Root directory holding one subdirectory per animation
    pub dir: Option<String>,
    /// Frame file extension
    pub extension: Option<String>,
}

/// `[volume]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeToml {
    /// Starting level in percent
    pub initial: Option<u8>,
    /// Change per cheek tap in percent
    pub step: Option<u8>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceToml {
    /// Frame intervals
    pub timing: TimingToml,
    /// Holds, dwell and boot behavior
    pub behavior: BehaviorToml,
    /// Asset location
    pub assets: AssetsToml,
    /// Volume parameter
    pub volume: VolumeToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Frame intervals per playback context
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    /// Scheduler tick period
    pub tick: Duration,
    /// Boot intro frame interval
    pub boot_frame: Duration,
    /// Resting loop frame interval
    pub idle_loop_frame: Duration,
    /// Look shot frame interval
    pub idle_look_frame: Duration,
    /// Expression frame interval
    pub event_frame: Duration,
    /// Idle drift check period
    pub idle_check: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            boot_frame: Duration::from_millis(DEFAULT_BOOT_MS),
            idle_loop_frame: Duration::from_millis(DEFAULT_IDLE_LOOP_MS),
            idle_look_frame: Duration::from_millis(DEFAULT_IDLE_LOOK_MS),
            event_frame: Duration::from_millis(DEFAULT_EVENT_MS),
            idle_check: Duration::from_millis(DEFAULT_IDLE_CHECK_MS),
        }
    }
}

/// Holds, dwell and boot behavior
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BehaviorConfig {
    /// Idle dwell before a look shot
    pub idle_drift: Duration,
    /// How long a finished expression lingers on its last frame
    pub event_hold: Duration,
    /// How long a look shot lingers on its last frame
    pub look_hold: Duration,
    /// Boot intro passes
    pub boot_repeats: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            idle_drift: Duration::from_secs(PANEL_IDLE_DRIFT_SECS),
            event_hold: Duration::from_millis(DEFAULT_EVENT_HOLD_MS),
            look_hold: Duration::from_millis(DEFAULT_LOOK_HOLD_MS),
            boot_repeats: DEFAULT_BOOT_REPEATS,
        }
    }
}

/// Where frames are loaded from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetsConfig {
    /// Root directory
    pub dir: PathBuf,
    /// Frame file extension
    pub extension: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("assets"),
            extension: RAW_EXTENSION.to_string(),
        }
    }
}

/// Volume parameter bounds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VolumeConfig {
    /// Starting level in percent
    pub initial: u8,
    /// Change per cheek tap
    pub step: u8,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            initial: 50,
            step: 10,
        }
    }
}

/// Centralized configuration for the face
#[derive(Clone, Debug)]
pub struct FaceConfig {
    /// Frame intervals
    pub timing: TimingConfig,
    /// Holds, dwell and boot behavior
    pub behavior: BehaviorConfig,
    /// Asset location
    pub assets: AssetsConfig,
    /// Volume parameter
    pub volume: VolumeConfig,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            behavior: BehaviorConfig::default(),
            assets: AssetsConfig::default(),
            volume: VolumeConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl FaceConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("timing.tick_ms", self.timing.tick),
            ("timing.boot_ms", self.timing.boot_frame),
            ("timing.idle_loop_ms", self.timing.idle_loop_frame),
            ("timing.idle_look_ms", self.timing.idle_look_frame),
            ("timing.event_ms", self.timing.event_frame),
            ("timing.idle_check_ms", self.timing.idle_check),
            ("behavior.idle_drift_s", self.behavior.idle_drift),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::ValidationError(format!("{name} must be greater than 0")));
        }

        if self.behavior.boot_repeats == 0 {
            return Err(ConfigError::ValidationError(
                "behavior.boot_repeats must be at least 1".to_string(),
            ));
        }
        if self.volume.step == 0 || self.volume.step > 100 {
            return Err(ConfigError::ValidationError(format!(
                "volume.step must be within 1..=100, got {}",
                self.volume.step
            )));
        }
        if self.volume.initial > 100 {
            return Err(ConfigError::ValidationError(format!(
                "volume.initial must be within 0..=100, got {}",
                self.volume.initial
            )));
        }

        let shortest_frame = [
            self.timing.boot_frame,
            self.timing.idle_loop_frame,
            self.timing.idle_look_frame,
            self.timing.event_frame,
        ]
        .into_iter()
        .min()
        .unwrap_or(self.timing.tick);
        if self.timing.tick > shortest_frame {
            tracing::warn!(
                tick = ?self.timing.tick,
                shortest_frame = ?shortest_frame,
                "Tick is longer than the shortest frame interval; playback will run slow"
            );
        }

        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/companion-face/face.toml` or
/// `~/.config/companion-face/face.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("companion-face").join("face.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if a
/// value is out of range. A missing config file is not an error.
pub fn load_config() -> Result<FaceConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting configuration fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<FaceConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration reading environment values through `env`
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<FaceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = FaceConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: FaceToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn millis(value: Option<u64>, target: &mut Duration) {
    if let Some(ms) = value {
        *target = Duration::from_millis(ms);
    }
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut FaceConfig, toml: &FaceToml) {
    millis(toml.timing.tick_ms, &mut config.timing.tick);
    millis(toml.timing.boot_ms, &mut config.timing.boot_frame);
    millis(toml.timing.idle_loop_ms, &mut config.timing.idle_loop_frame);
    millis(toml.timing.idle_look_ms, &mut config.timing.idle_look_frame);
    millis(toml.timing.event_ms, &mut config.timing.event_frame);
    millis(toml.timing.idle_check_ms, &mut config.timing.idle_check);

    if let Some(secs) = toml.behavior.idle_drift_s {
        config.behavior.idle_drift = Duration::from_secs(secs);
    }
    millis(toml.behavior.event_hold_ms, &mut config.behavior.event_hold);
    millis(toml.behavior.look_hold_ms, &mut config.behavior.look_hold);
    if let Some(repeats) = toml.behavior.boot_repeats {
        config.behavior.boot_repeats = repeats;
    }

    if let Some(ref dir) = toml.assets.dir {
        config.assets.dir = PathBuf::from(dir);
    }
    if let Some(ref extension) = toml.assets.extension {
        config.assets.extension = extension.clone();
    }

    if let Some(initial) = toml.volume.initial {
        config.volume.initial = initial;
    }
    if let Some(step) = toml.volume.step {
        config.volume.step = step;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut FaceConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let number = |key: &str| env(key).and_then(|v| v.trim().parse::<u64>().ok());

    if let Some(ms) = number("FACE_TICK_MS") {
        config.timing.tick = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = number("FACE_EVENT_MS") {
        config.timing.event_frame = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = number("FACE_IDLE_DRIFT_S") {
        config.behavior.idle_drift = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = number("FACE_EVENT_HOLD_MS") {
        config.behavior.event_hold = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(repeats) = number("FACE_BOOT_REPEATS").and_then(|n| u32::try_from(n).ok()) {
        config.behavior.boot_repeats = repeats;
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = env("FACE_ASSETS_DIR") {
        config.assets.dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`]; call [`FaceConfig::validate`] again
/// afterwards.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Asset directory override
    pub assets_dir: Option<PathBuf>,

    /// Idle dwell override (seconds)
    pub idle_drift_secs: Option<u64>,

    /// Tick period override (milliseconds)
    pub tick_ms: Option<u64>,

    /// Expression hold override (milliseconds)
    pub event_hold_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set asset directory override
    #[must_use]
    pub fn with_assets_dir(mut self, dir: PathBuf) -> Self {
        self.assets_dir = Some(dir);
        self
    }

    /// Set idle dwell override
    #[must_use]
    pub fn with_idle_drift_secs(mut self, secs: u64) -> Self {
        self.idle_drift_secs = Some(secs);
        self
    }

    /// Set tick period override
    #[must_use]
    pub fn with_tick_ms(mut self, ms: u64) -> Self {
        self.tick_ms = Some(ms);
        self
    }

    /// Set expression hold override
    #[must_use]
    pub fn with_event_hold_ms(mut self, ms: u64) -> Self {
        self.event_hold_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut FaceConfig) {
        if self.assets_dir.is_some()
            || self.idle_drift_secs.is_some()
            || self.tick_ms.is_some()
            || self.event_hold_ms.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref dir) = self.assets_dir {
            config.assets.dir = dir.clone();
        }
        if let Some(secs) = self.idle_drift_secs {
            config.behavior.idle_drift = Duration::from_secs(secs);
        }
        millis(self.tick_ms, &mut config.timing.tick);
        millis(self.event_hold_ms, &mut config.behavior.event_hold);
    }
}

// =============================================================================
// Tests
// =============================================================================
