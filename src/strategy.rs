//! Per-hand gesture strategies.
//!
//! A strategy reads one hand's observation and smoothed barycenter for the
//! current cycle and writes (or withholds) its parameters into a shared
//! [`AudioParameters`] set. Parameters a strategy does not touch keep the
//! value from earlier cycles.

use crate::constants::{landmarks, params};
use crate::filters::Point3;
use crate::hand::HandObservation;
use crate::params::AudioParameters;
use crate::{Error, Result};
use log::debug;

/// Trait for per-hand control policies
pub trait GestureStrategy: Send {
    /// Apply this cycle's hand (or its absence) to the parameter set
    ///
    /// # Errors
    ///
    /// Returns an error if the observation lacks a landmark the strategy needs
    fn apply(
        &self,
        hand: Option<&HandObservation>,
        barycenter: Option<Point3>,
        audio_params: &mut AudioParameters,
    ) -> Result<()>;

    /// Get strategy name
    fn name(&self) -> &str;
}

/// Primary hand: pinch gates the sound, horizontal position sets the pitch
#[derive(Debug, Clone)]
pub struct PitchGateStrategy {
    pinch_threshold: f64,
    min_freq: f64,
    max_freq: f64,
    thumb_index: usize,
    finger_index: usize,
}

impl PitchGateStrategy {
    #[must_use]
    pub const fn new(pinch_threshold: f64, min_freq: f64, max_freq: f64) -> Self {
        Self {
            pinch_threshold,
            min_freq,
            max_freq,
            thumb_index: landmarks::THUMB_TIP,
            finger_index: landmarks::INDEX_FINGER_TIP,
        }
    }

    /// Use other landmarks for the pinch distance
    #[must_use]
    pub const fn with_landmarks(mut self, thumb_index: usize, finger_index: usize) -> Self {
        self.thumb_index = thumb_index;
        self.finger_index = finger_index;
        self
    }

    /// Linear map of a normalized horizontal position onto the pitch range
    #[must_use]
    pub fn frequency_at(&self, x: f64) -> f64 {
        self.min_freq + x * (self.max_freq - self.min_freq)
    }
}

impl GestureStrategy for PitchGateStrategy {
    fn apply(
        &self,
        hand: Option<&HandObservation>,
        barycenter: Option<Point3>,
        audio_params: &mut AudioParameters,
    ) -> Result<()> {
        let (Some(hand), Some([x, _, _])) = (hand, barycenter) else {
            audio_params.set(params::SOUND_ENABLED, false);
            return Ok(());
        };

        let distance = hand.planar_distance(self.finger_index, self.thumb_index)?;
        // Pinched only strictly below the threshold
        if distance >= self.pinch_threshold {
            audio_params.set(params::SOUND_ENABLED, false);
            return Ok(());
        }

        let freq = self.frequency_at(x);
        debug!("Pinch at x={x:.3} (distance {distance:.4}) -> {freq:.2} Hz");
        audio_params.set(params::TARGET_FREQ, freq);
        audio_params.set(params::SOUND_ENABLED, true);
        Ok(())
    }

    fn name(&self) -> &str {
        "pitch_gate"
    }
}

/// Secondary hand: height sets the volume, absence falls back to a default
#[derive(Debug, Clone)]
pub struct VolumeStrategy {
    default_volume: f64,
}

impl VolumeStrategy {
    #[must_use]
    pub const fn new(default_volume: f64) -> Self {
        Self { default_volume }
    }
}

impl GestureStrategy for VolumeStrategy {
    fn apply(
        &self,
        hand: Option<&HandObservation>,
        barycenter: Option<Point3>,
        audio_params: &mut AudioParameters,
    ) -> Result<()> {
        let volume = match (hand, barycenter) {
            // Image y grows downwards, a raised hand is louder
            (Some(_), Some([_, y, _])) => 1.0 - y,
            _ => self.default_volume,
        };
        audio_params.set(params::TARGET_VOLUME, volume);
        Ok(())
    }

    fn name(&self) -> &str {
        "volume"
    }
}

/// Strategy that never writes anything, for roles without a control
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreStrategy;

impl GestureStrategy for IgnoreStrategy {
    fn apply(&self, _: Option<&HandObservation>, _: Option<Point3>, _: &mut AudioParameters) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Strategy settings needed by [`create_strategy`]
#[derive(Debug, Clone, Copy)]
pub struct StrategyParams {
    pub pinch_threshold: f64,
    pub min_freq: f64,
    pub max_freq: f64,
    pub default_volume: f64,
    pub thumb_index: usize,
    pub finger_index: usize,
}

/// Create a strategy by name
///
/// # Errors
///
/// Returns an error for unknown strategy names
pub fn create_strategy(name: &str, p: &StrategyParams) -> Result<Box<dyn GestureStrategy>> {
    match name.to_lowercase().as_str() {
        "pitch_gate" | "pitch" => Ok(Box::new(
            PitchGateStrategy::new(p.pinch_threshold, p.min_freq, p.max_freq)
                .with_landmarks(p.thumb_index, p.finger_index),
        )),
        "volume" => Ok(Box::new(VolumeStrategy::new(p.default_volume))),
        "none" => Ok(Box::new(IgnoreStrategy)),
        _ => Err(Error::UnknownComponent {
            kind: "gesture strategy",
            name: name.to_string(),
            available: "pitch_gate, volume, none".to_string(),
        }),
    }
}
