//! Feature mappers: turn extracted features into audio parameters.

use crate::constants::{
    landmarks, params, DEFAULT_BARYCENTER_PARAM, PINCH_MAPPER_FREQ, PINCH_MAPPER_THRESHOLD, PINCH_MAPPER_VOLUME,
};
use crate::features::{FeatureKind, Features};
use crate::hand::{HandObservation, HandRole, Handedness, HandsByRole, RoleMapping};
use crate::params::AudioParameters;
use crate::strategy::GestureStrategy;
use crate::tracker::HandTracker;
use crate::{Error, Result};
use log::debug;
use std::sync::Arc;
use std::time::Instant;

/// Trait for all feature mappers
pub trait FeatureMapper: Send {
    /// Map one cycle's features to the full parameter snapshot to transmit
    ///
    /// # Errors
    ///
    /// Returns an error if the features are malformed or of the wrong kind
    fn map(&mut self, features: Features) -> Result<AudioParameters>;

    /// Kind of features this mapper consumes
    fn input_kind(&self) -> FeatureKind;

    /// Get mapper name
    fn name(&self) -> &str;
}

fn wrong_kind(mapper: &str, expected: FeatureKind, got: &Features) -> Error {
    Error::InvalidInput(format!(
        "{mapper} expects {expected:?} features, got {:?}",
        got.kind()
    ))
}

/// Two-handed instrument: tracker plus one strategy per hand role.
///
/// The parameter set persists across cycles so that a strategy only
/// overwrites what it controls.
pub struct HandGestureMapper {
    tracker: HandTracker,
    mapping: RoleMapping,
    primary: Box<dyn GestureStrategy>,
    secondary: Box<dyn GestureStrategy>,
    audio_params: AudioParameters,
}

impl HandGestureMapper {
    #[must_use]
    pub fn new(
        tracker: HandTracker,
        mapping: RoleMapping,
        primary: Box<dyn GestureStrategy>,
        secondary: Box<dyn GestureStrategy>,
        initial: AudioParameters,
    ) -> Self {
        Self {
            tracker,
            mapping,
            primary,
            secondary,
            audio_params: initial,
        }
    }

    /// Parameters as of the last successful cycle
    #[must_use]
    pub const fn current(&self) -> &AudioParameters {
        &self.audio_params
    }

    #[must_use]
    pub const fn tracker(&self) -> &HandTracker {
        &self.tracker
    }
}

impl FeatureMapper for HandGestureMapper {
    fn map(&mut self, features: Features) -> Result<AudioParameters> {
        let Features::Hands(observations) = features else {
            return Err(wrong_kind(self.name(), FeatureKind::Hands, &features));
        };
        let hands = HandsByRole::assign(observations, self.mapping);
        let tracked = self.tracker.update(&hands)?;

        // Strategies write into a scratch copy so a failing one leaves no partial update
        let mut next = self.audio_params.clone();
        for role in HandRole::ALL {
            let strategy = match role {
                HandRole::Primary => &self.primary,
                HandRole::Secondary => &self.secondary,
            };
            strategy.apply(hands.get(role), tracked.get(role), &mut next)?;
        }
        self.audio_params = next;
        Ok(self.audio_params.clone())
    }

    fn input_kind(&self) -> FeatureKind {
        FeatureKind::Hands
    }

    fn name(&self) -> &str {
        "hand_gesture"
    }
}

/// Monotonic millisecond clock
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock based on [`Instant`], counting from construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// One-shot pulse when a scalar crosses a threshold, debounced by a cooldown
pub struct PulseMapper {
    threshold: f64,
    cooldown_ms: u64,
    last_pulse_ms: Option<u64>,
    clock: Arc<dyn Clock>,
}

impl PulseMapper {
    #[must_use]
    pub fn new(threshold: f64, cooldown_ms: u64) -> Self {
        Self::with_clock(threshold, cooldown_ms, Arc::new(MonotonicClock::default()))
    }

    #[must_use]
    pub fn with_clock(threshold: f64, cooldown_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            threshold,
            cooldown_ms,
            last_pulse_ms: None,
            clock,
        }
    }

    /// Evaluate `value` at the mapper's own clock reading
    pub fn apply(&mut self, value: Option<f64>) -> AudioParameters {
        let now = self.clock.now_ms();
        self.apply_at(value, now)
    }

    /// Evaluate `value` at `now_ms`
    pub fn apply_at(&mut self, value: Option<f64>, now_ms: u64) -> AudioParameters {
        let fired = self.fires(value, now_ms);
        if fired {
            debug!("Pulse at {now_ms} ms (value {value:?})");
            self.last_pulse_ms = Some(now_ms);
        }
        let mut out = AudioParameters::new();
        out.set(params::PULSE, i32::from(fired));
        out
    }

    fn fires(&self, value: Option<f64>, now_ms: u64) -> bool {
        // Zero and NaN count as "no signal", like an absent value
        let Some(value) = value.filter(|v| *v != 0.0 && !v.is_nan()) else {
            return false;
        };
        if value <= self.threshold {
            return false;
        }
        self.last_pulse_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.cooldown_ms)
    }

    /// Timestamp of the last emitted pulse
    #[must_use]
    pub const fn last_pulse_ms(&self) -> Option<u64> {
        self.last_pulse_ms
    }
}

impl FeatureMapper for PulseMapper {
    fn map(&mut self, features: Features) -> Result<AudioParameters> {
        match features {
            Features::Scalar(value) => Ok(self.apply(value)),
            other => Err(wrong_kind("pulse", FeatureKind::Scalar, &other)),
        }
    }

    fn input_kind(&self) -> FeatureKind {
        FeatureKind::Scalar
    }

    fn name(&self) -> &str {
        "pulse"
    }
}

/// Stateless pulse: fires on every value above the threshold, no cooldown
#[derive(Debug, Clone, Copy)]
pub struct BinaryPulseMapper {
    threshold: f64,
}

impl BinaryPulseMapper {
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn apply(&self, value: Option<f64>) -> AudioParameters {
        let fired = value.is_some_and(|v| v > self.threshold);
        let mut out = AudioParameters::new();
        out.set(params::PULSE, i32::from(fired));
        out
    }
}

impl FeatureMapper for BinaryPulseMapper {
    fn map(&mut self, features: Features) -> Result<AudioParameters> {
        match features {
            Features::Scalar(value) => Ok(self.apply(value)),
            other => Err(wrong_kind("binary_pulse", FeatureKind::Scalar, &other)),
        }
    }

    fn input_kind(&self) -> FeatureKind {
        FeatureKind::Scalar
    }

    fn name(&self) -> &str {
        "binary_pulse"
    }
}

/// One-handed instrument without smoothing or gate.
///
/// While the thumb and index tips of the chosen hand are closer than the
/// threshold, the index tip sets `frequency` from its x (1000 Hz at the left
/// edge falling to about 91 Hz at the right) and `volume` from its y.
/// Otherwise the fixed defaults are sent.
#[derive(Debug, Clone, Copy)]
pub struct PinchMapper {
    hand: Handedness,
    threshold: f64,
}

impl Default for PinchMapper {
    fn default() -> Self {
        Self::new(Handedness::Right, PINCH_MAPPER_THRESHOLD)
    }
}

impl PinchMapper {
    #[must_use]
    pub const fn new(hand: Handedness, threshold: f64) -> Self {
        Self { hand, threshold }
    }

    /// Frequency for a normalized index tip x
    #[must_use]
    pub fn frequency_at(x: f64) -> f64 {
        100_000.0 / (x * x * 1000.0 + 100.0)
    }

    /// Index tip of `hand` when it is pinched
    fn pinched_tip(&self, hand: &HandObservation) -> Result<Option<[f64; 2]>> {
        if hand.handedness != self.hand {
            return Ok(None);
        }
        let distance = hand.planar_distance(landmarks::THUMB_TIP, landmarks::INDEX_FINGER_TIP)?;
        if distance >= self.threshold {
            return Ok(None);
        }
        let tip = hand.landmark(landmarks::INDEX_FINGER_TIP)?;
        Ok(Some([tip.x, tip.y]))
    }
}

impl FeatureMapper for PinchMapper {
    fn map(&mut self, features: Features) -> Result<AudioParameters> {
        let Features::Hands(hands) = features else {
            return Err(wrong_kind(self.name(), FeatureKind::Hands, &features));
        };

        let mut out = AudioParameters::new();
        out.set(params::FREQUENCY, PINCH_MAPPER_FREQ);
        out.set(params::VOLUME, PINCH_MAPPER_VOLUME);
        // With several matching hands the last pinched one wins
        for hand in &hands {
            if let Some([x, y]) = self.pinched_tip(hand)? {
                out.set(params::FREQUENCY, Self::frequency_at(x));
                out.set(params::VOLUME, y);
            }
        }
        Ok(out)
    }

    fn input_kind(&self) -> FeatureKind {
        FeatureKind::Hands
    }

    fn name(&self) -> &str {
        "pinch"
    }
}

/// First detected hand's raw barycenter as `tempo` (y) and `resonance` (x)
#[derive(Debug, Clone)]
pub struct BarycenterMapper {
    audio_params: AudioParameters,
}

impl Default for BarycenterMapper {
    fn default() -> Self {
        let mut audio_params = AudioParameters::new();
        audio_params.set(params::TEMPO, DEFAULT_BARYCENTER_PARAM);
        audio_params.set(params::RESONANCE, DEFAULT_BARYCENTER_PARAM);
        Self { audio_params }
    }
}

impl FeatureMapper for BarycenterMapper {
    fn map(&mut self, features: Features) -> Result<AudioParameters> {
        let Features::Hands(hands) = features else {
            return Err(wrong_kind(self.name(), FeatureKind::Hands, &features));
        };
        if let Some(hand) = hands.first() {
            let [x, y, _] = hand.barycenter()?;
            self.audio_params.set(params::TEMPO, y);
            self.audio_params.set(params::RESONANCE, x);
        }
        Ok(self.audio_params.clone())
    }

    fn input_kind(&self) -> FeatureKind {
        FeatureKind::Hands
    }

    fn name(&self) -> &str {
        "barycenter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Landmark;
    use crate::strategy::{PitchGateStrategy, VolumeStrategy};
    use crate::tracker::HandLossPolicy;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct ManualClock(AtomicU64);

    impl Clock for ManualClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn hand(label: Handedness, x: f64, y: f64) -> HandObservation {
        HandObservation::new(label, vec![Landmark::new(x, y, 0.0); 21])
    }

    fn gesture_mapper(alpha: f64) -> HandGestureMapper {
        let mut initial = AudioParameters::new();
        initial.set(params::SOUND_ENABLED, false);
        initial.set(params::TARGET_FREQ, 440.0);
        initial.set(params::TARGET_VOLUME, 0.3);
        HandGestureMapper::new(
            HandTracker::new(alpha, HandLossPolicy::Freeze).unwrap(),
            RoleMapping::default(),
            Box::new(PitchGateStrategy::new(0.05, 261.63, 523.25)),
            Box::new(VolumeStrategy::new(0.3)),
            initial,
        )
    }

    #[test]
    fn test_pulse_cooldown_sequence() {
        let mut mapper = PulseMapper::new(3.0, 500);
        assert_eq!(mapper.apply_at(Some(5.0), 0).get_f64(params::PULSE), Some(1.0));
        assert_eq!(mapper.apply_at(Some(5.0), 200).get_f64(params::PULSE), Some(0.0));
        assert_eq!(mapper.apply_at(Some(5.0), 600).get_f64(params::PULSE), Some(1.0));
        assert_eq!(mapper.last_pulse_ms(), Some(600));
    }

    #[test]
    fn test_pulse_ignores_absent_and_low_values() {
        let mut mapper = PulseMapper::new(3.0, 0);
        assert_eq!(mapper.apply_at(None, 10).get_f64(params::PULSE), Some(0.0));
        assert_eq!(mapper.apply_at(Some(3.0), 20).get_f64(params::PULSE), Some(0.0));
        assert_eq!(mapper.apply_at(Some(f64::NAN), 30).get_f64(params::PULSE), Some(0.0));
        assert_eq!(mapper.last_pulse_ms(), None);
    }

    #[test]
    fn test_pulse_zero_cooldown_fires_every_time() {
        let mut mapper = PulseMapper::new(1.0, 0);
        for t in [5, 5, 6] {
            assert_eq!(mapper.apply_at(Some(2.0), t).get_f64(params::PULSE), Some(1.0));
        }
    }

    #[test]
    fn test_pulse_uses_own_clock() {
        let clock = Arc::new(ManualClock(AtomicU64::new(1_000)));
        let mut mapper = PulseMapper::with_clock(3.0, 500, clock.clone());
        assert_eq!(mapper.apply(Some(4.0)).get_f64(params::PULSE), Some(1.0));
        clock.0.store(1_499, Ordering::SeqCst);
        assert_eq!(mapper.apply(Some(4.0)).get_f64(params::PULSE), Some(0.0));
        clock.0.store(1_500, Ordering::SeqCst);
        assert_eq!(mapper.apply(Some(4.0)).get_f64(params::PULSE), Some(1.0));
    }

    #[test]
    fn test_pulse_rejects_hand_features() {
        let mut mapper = PulseMapper::new(3.0, 500);
        assert!(mapper.map(Features::Hands(Vec::new())).is_err());
    }

    #[test]
    fn test_gesture_mapper_two_hands() {
        let mut mapper = gesture_mapper(1.0);
        let out = mapper
            .map(Features::Hands(vec![
                hand(Handedness::Right, 0.5, 0.5),
                hand(Handedness::Left, 0.5, 0.25),
            ]))
            .unwrap();
        assert_eq!(out.get_bool(params::SOUND_ENABLED), Some(true));
        assert!((out.get_f64(params::TARGET_FREQ).unwrap() - 392.44).abs() < 1e-9);
        assert!((out.get_f64(params::TARGET_VOLUME).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_gesture_mapper_hand_loss() {
        let mut mapper = gesture_mapper(1.0);
        mapper
            .map(Features::Hands(vec![
                hand(Handedness::Right, 1.0, 0.5),
                hand(Handedness::Left, 0.5, 0.0),
            ]))
            .unwrap();

        let out = mapper.map(Features::Hands(Vec::new())).unwrap();
        assert_eq!(out.get_bool(params::SOUND_ENABLED), Some(false));
        // Pitch stays where it was, volume falls back to the default
        assert!((out.get_f64(params::TARGET_FREQ).unwrap() - 523.25).abs() < 1e-9);
        assert_eq!(out.get_f64(params::TARGET_VOLUME), Some(0.3));
        // The smoothed value is frozen, not cleared
        assert!(mapper.tracker().slot(HandRole::Primary).last().is_some());
    }

    #[test]
    fn test_gesture_mapper_malformed_keeps_previous() {
        let mut mapper = gesture_mapper(1.0);
        let before = mapper.current().clone();
        let short = HandObservation::new(Handedness::Right, vec![Landmark::default(); landmarks::THUMB_TIP + 1]);
        assert!(mapper.map(Features::Hands(vec![short])).is_err());
        assert_eq!(mapper.current(), &before);
    }

    #[test]
    fn test_binary_pulse_has_no_cooldown() {
        let mut mapper = BinaryPulseMapper::new(3.0);
        let fired: Vec<_> = [Some(5.0), Some(5.0), Some(3.0), None, Some(f64::NAN), Some(3.5)]
            .into_iter()
            .map(|v| mapper.map(Features::Scalar(v)).unwrap().get_f64(params::PULSE))
            .collect();
        assert_eq!(fired, vec![Some(1.0), Some(1.0), Some(0.0), Some(0.0), Some(0.0), Some(1.0)]);
        assert!(mapper.map(Features::Hands(Vec::new())).is_err());
    }

    #[test]
    fn test_pinch_mapper_defaults_without_pinch() {
        let mut mapper = PinchMapper::default();
        let out = mapper.map(Features::Hands(Vec::new())).unwrap();
        assert_eq!(out.get_f64(params::FREQUENCY), Some(440.0));
        assert_eq!(out.get_f64(params::VOLUME), Some(0.5));

        // Index tip 0.2 away from the thumb: open
        let mut open = hand(Handedness::Right, 0.5, 0.5);
        open.landmarks[landmarks::INDEX_FINGER_TIP] = Landmark::new(0.7, 0.5, 0.0);
        let out = mapper.map(Features::Hands(vec![open])).unwrap();
        assert_eq!(out.get_f64(params::FREQUENCY), Some(440.0));
    }

    #[test]
    fn test_pinch_mapper_follows_index_tip() {
        let mut mapper = PinchMapper::default();
        let out = mapper
            .map(Features::Hands(vec![hand(Handedness::Right, 0.5, 0.25)]))
            .unwrap();
        // 100000 / (0.25 * 1000 + 100)
        assert!((out.get_f64(params::FREQUENCY).unwrap() - 285.714_285_714).abs() < 1e-6);
        assert!((out.get_f64(params::VOLUME).unwrap() - 0.25).abs() < 1e-12);
        assert!((PinchMapper::frequency_at(0.0) - 1000.0).abs() < 1e-9);

        // The other hand is ignored
        let out = mapper
            .map(Features::Hands(vec![hand(Handedness::Left, 0.5, 0.25)]))
            .unwrap();
        assert_eq!(out.get_f64(params::FREQUENCY), Some(440.0));
    }

    #[test]
    fn test_pinch_mapper_rejects_short_hand() {
        let mut mapper = PinchMapper::default();
        let short = HandObservation::new(Handedness::Right, vec![Landmark::default(); landmarks::THUMB_TIP + 1]);
        assert!(matches!(
            mapper.map(Features::Hands(vec![short])),
            Err(Error::MalformedObservation(_))
        ));
    }

    #[test]
    fn test_barycenter_mapper_holds_without_hand() {
        let mut mapper = BarycenterMapper::default();
        let out = mapper.map(Features::Hands(Vec::new())).unwrap();
        assert_eq!(out.get_f64(params::TEMPO), Some(0.5));

        let out = mapper
            .map(Features::Hands(vec![hand(Handedness::Left, 0.2, 0.9)]))
            .unwrap();
        assert!((out.get_f64(params::TEMPO).unwrap() - 0.9).abs() < 1e-12);
        assert!((out.get_f64(params::RESONANCE).unwrap() - 0.2).abs() < 1e-12);

        let out = mapper.map(Features::Hands(Vec::new())).unwrap();
        assert!((out.get_f64(params::RESONANCE).unwrap() - 0.2).abs() < 1e-12);
    }
}
