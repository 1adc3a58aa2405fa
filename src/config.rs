//! Configuration management for the hand sonification pipeline

use crate::constants::{
    landmarks, DEFAULT_BARYCENTER_ALPHA, DEFAULT_CAMERA_INDEX, DEFAULT_FPS, DEFAULT_FRAME_HEIGHT,
    DEFAULT_FRAME_TIMEOUT_MS, DEFAULT_FRAME_WIDTH, DEFAULT_FREQ, DEFAULT_MAX_FREQ,
    DEFAULT_MIN_FREQ, DEFAULT_OSC_HOST, DEFAULT_OSC_PORT, DEFAULT_OUTPUT_RATE_HZ,
    DEFAULT_PINCH_THRESHOLD, DEFAULT_PULSE_COOLDOWN_MS, DEFAULT_PULSE_THRESHOLD, DEFAULT_VOLUME,
    NUM_HAND_LANDMARKS, SMOOTHING_ALPHA_MAX, SMOOTHING_ALPHA_MIN,
};
use crate::hand::Handedness;
use crate::strategy::StrategyParams;
use crate::tracker::HandLossPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Component selection
    pub scenario: ScenarioConfig,

    /// Barycenter tracking
    pub tracker: TrackerConfig,

    /// Hand gesture strategies
    pub gesture: GestureConfig,

    /// Motion pulse mappers (`pulse`, `binary_pulse`)
    pub pulse: PulseConfig,

    /// Video input
    pub capture: CaptureConfig,

    /// Landmark detector process
    pub detector: DetectorConfig,

    /// Audio output
    pub output: OutputConfig,

    /// Driver loop
    pub pipeline: PipelineConfig,
}

/// Registry keys naming the components to assemble
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Capture device (test_pattern, webcam, video_file)
    pub video_input: String,

    /// Feature extractor (hand_landmarker, frame_diff)
    pub feature_extractor: String,

    /// Feature mapper (hand_gesture, pinch, pulse, binary_pulse, barycenter)
    pub feature_mapper: String,

    /// Audio transport (osc, log)
    pub audio_output: String,
}

/// Barycenter tracking parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Filter type (exponential, none, or exponential:<alpha>)
    pub filter: String,

    /// Exponential smoothing factor in (0, 1]
    pub alpha: f64,

    /// What happens to a smoothed value when its hand disappears
    pub hand_loss: HandLossPolicy,

    /// Physical hand driving the primary (pitch) role
    pub primary_hand: Handedness,
}

/// Gesture strategy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Strategy of the primary hand
    pub primary_strategy: String,

    /// Strategy of the secondary hand
    pub secondary_strategy: String,

    /// Thumb/finger distance below which the hand is pinched
    pub pinch_threshold: f64,

    /// Landmark index of the thumb tip
    pub thumb_landmark: usize,

    /// Landmark index of the pinching finger tip
    pub finger_landmark: usize,

    /// Frequency at the left edge of the frame
    pub min_freq: f64,

    /// Frequency at the right edge of the frame
    pub max_freq: f64,

    /// Frequency reported before the first pinch
    pub default_freq: f64,

    /// Volume while the secondary hand is absent
    pub default_volume: f64,
}

/// Pulse mapper parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Signal level that must be exceeded
    pub threshold: f64,

    /// Minimum time between two pulses
    pub cooldown_ms: u64,
}

/// Video input parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera index
    pub camera_index: i32,

    /// Video file, used by the `video_file` input
    pub video_file: Option<PathBuf>,

    /// Requested frame width
    pub width: u32,

    /// Requested frame height
    pub height: u32,

    /// Requested frame rate
    pub fps: f64,

    /// Flip frames horizontally
    pub mirror: bool,
}

/// Landmark detector process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Program to launch
    pub command: String,

    /// Program arguments
    pub args: Vec<String>,

    /// Maximum number of hands passed on per frame
    pub max_hands: usize,
}

/// Audio output parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Sound engine host
    pub host: String,

    /// Sound engine OSC port
    pub port: u16,
}

/// Driver loop parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest wait for a new frame before re-checking the stop flag
    pub frame_timeout_ms: u64,

    /// Retransmission rate of the latest audio parameters
    pub output_rate_hz: f64,

    /// Stop after this many processed frames
    pub max_cycles: Option<u64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            video_input: "test_pattern".to_string(),
            feature_extractor: "hand_landmarker".to_string(),
            feature_mapper: "hand_gesture".to_string(),
            audio_output: "osc".to_string(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            filter: "exponential".to_string(),
            alpha: DEFAULT_BARYCENTER_ALPHA,
            hand_loss: HandLossPolicy::Freeze,
            primary_hand: Handedness::Right,
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            primary_strategy: "pitch_gate".to_string(),
            secondary_strategy: "volume".to_string(),
            pinch_threshold: DEFAULT_PINCH_THRESHOLD,
            thumb_landmark: landmarks::THUMB_TIP,
            finger_landmark: landmarks::INDEX_FINGER_TIP,
            min_freq: DEFAULT_MIN_FREQ,
            max_freq: DEFAULT_MAX_FREQ,
            default_freq: DEFAULT_FREQ,
            default_volume: DEFAULT_VOLUME,
        }
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PULSE_THRESHOLD,
            cooldown_ms: DEFAULT_PULSE_COOLDOWN_MS,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: DEFAULT_CAMERA_INDEX,
            video_file: None,
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            fps: DEFAULT_FPS,
            mirror: true,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: vec!["scripts/hand_landmarker.py".to_string()],
            max_hands: 2,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OSC_HOST.to_string(),
            port: DEFAULT_OSC_PORT,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_timeout_ms: DEFAULT_FRAME_TIMEOUT_MS,
            output_rate_hz: DEFAULT_OUTPUT_RATE_HZ,
            max_cycles: None,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub const fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}

impl TrackerConfig {
    /// Filter spec for [`create_filter`](crate::filters::create_filter), with the configured alpha
    #[must_use]
    pub fn filter_spec(&self) -> String {
        match self.filter.to_lowercase().as_str() {
            "exponential" | "ema" => format!("exponential:{}", self.alpha),
            _ => self.filter.clone(),
        }
    }
}

impl GestureConfig {
    #[must_use]
    pub const fn strategy_params(&self) -> StrategyParams {
        StrategyParams {
            pinch_threshold: self.pinch_threshold,
            min_freq: self.min_freq,
            max_freq: self.max_freq,
            default_volume: self.default_volume,
            thumb_index: self.thumb_landmark,
            finger_index: self.finger_landmark,
        }
    }
}

fn check(ok: bool, message: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::ConfigError(message.to_string()))
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Serialize configuration to YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))
    }

    /// Validate configuration
    ///
    /// Registry keys are checked when the scenario is assembled.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint
    pub fn validate(&self) -> Result<()> {
        // Tracker
        check(
            self.tracker.alpha > SMOOTHING_ALPHA_MIN && self.tracker.alpha <= SMOOTHING_ALPHA_MAX,
            "Tracker alpha must be in (0.0, 1.0]",
        )?;

        // Gesture
        let g = &self.gesture;
        check(
            g.pinch_threshold.is_finite() && g.pinch_threshold > 0.0,
            "Pinch threshold must be positive",
        )?;
        check(
            g.thumb_landmark < NUM_HAND_LANDMARKS && g.finger_landmark < NUM_HAND_LANDMARKS,
            "Gesture landmarks must be hand landmark indices (0-20)",
        )?;
        check(
            g.thumb_landmark != g.finger_landmark,
            "Thumb and finger landmarks must differ",
        )?;
        check(
            g.min_freq.is_finite() && g.max_freq.is_finite() && g.min_freq > 0.0 && g.min_freq < g.max_freq,
            "Frequency range must satisfy 0 < min_freq < max_freq",
        )?;
        check(
            g.default_freq.is_finite() && g.default_freq > 0.0,
            "Default frequency must be positive",
        )?;
        check(
            (0.0..=1.0).contains(&g.default_volume),
            "Default volume must be between 0.0 and 1.0",
        )?;

        // Pulse
        check(self.pulse.threshold.is_finite(), "Pulse threshold must be finite")?;

        // Capture
        check(
            self.capture.width > 0 && self.capture.height > 0,
            "Frame size must be greater than 0",
        )?;
        check(
            self.capture.fps.is_finite() && self.capture.fps > 0.0,
            "Capture fps must be greater than 0",
        )?;

        // Detector
        check(self.detector.max_hands > 0, "Detector max_hands must be greater than 0")?;

        // Output
        check(!self.output.host.is_empty(), "Output host must not be empty")?;

        // Pipeline
        check(
            self.pipeline.frame_timeout_ms > 0,
            "Frame timeout must be greater than 0",
        )?;
        check(
            self.pipeline.output_rate_hz.is_finite() && self.pipeline.output_rate_hz > 0.0,
            "Output rate must be greater than 0",
        )?;

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Hand Sonification Configuration

# Components to assemble
scenario:
  video_input: "test_pattern"        # test_pattern, webcam, video_file
  feature_extractor: "hand_landmarker" # hand_landmarker, frame_diff
  feature_mapper: "hand_gesture"     # hand_gesture, pinch, pulse, binary_pulse, barycenter
  audio_output: "osc"                # osc, log

# Barycenter smoothing
tracker:
  filter: "exponential"
  alpha: 0.3
  hand_loss: "freeze"                # freeze, reset
  primary_hand: "Right"

# Two-handed instrument
gesture:
  primary_strategy: "pitch_gate"
  secondary_strategy: "volume"
  pinch_threshold: 0.05
  thumb_landmark: 4
  finger_landmark: 8
  min_freq: 261.63
  max_freq: 523.25
  default_freq: 440.0
  default_volume: 0.3

# Motion pulses
pulse:
  threshold: 3.0
  cooldown_ms: 500

# Video input
capture:
  camera_index: 0
  width: 640
  height: 480
  fps: 30.0
  mirror: true

# Landmark detector process
detector:
  command: "python3"
  args: ["scripts/hand_landmarker.py"]
  max_hands: 2

# Sound engine
output:
  host: "127.0.0.1"
  port: 11111

# Driver loop and output cadence
pipeline:
  frame_timeout_ms: 200
  output_rate_hz: 100.0
"#;
