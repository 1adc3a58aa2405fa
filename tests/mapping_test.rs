//! Feature extraction and mapping across modules


use hand_sonify::config::Config;
use hand_sonify::constants::params;
use hand_sonify::features::{FeatureExtractor, Features, FrameDiffCalculator};
use hand_sonify::frame::Frame;
use hand_sonify::hand::Handedness;
use hand_sonify::mapper::{BarycenterMapper, Clock, FeatureMapper, PulseMapper};
use hand_sonify::params::AudioParameters;
use hand_sonify::scenario::hand_gesture_mapper;
use hand_sonify::tracker::HandLossPolicy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use test_helpers::{expected_freq, open_hand, pinched_hand};

struct ManualClock(AtomicU64);

impl ManualClock {
    fn at(&self, ms: u64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

fn pulse(out: &AudioParameters) -> f64 {
    out.get_f64(params::PULSE).unwrap()
}

#[test]
fn test_motion_pulse_with_cooldown() {
    let clock = Arc::new(ManualClock(AtomicU64::new(0)));
    let mut extractor = FrameDiffCalculator::new();
    let mut mapper = PulseMapper::with_clock(3.0, 500, clock.clone());
    let dark = Frame::filled(8, 8, [0, 0, 0]);
    let bright = Frame::filled(8, 8, [255, 255, 255]);

    // First frame has no predecessor: undefined signal, no pulse
    let out = mapper.map(extractor.extract(&dark).unwrap()).unwrap();
    assert_eq!(pulse(&out), 0.0);

    clock.at(100);
    let out = mapper.map(extractor.extract(&bright).unwrap()).unwrap();
    assert_eq!(pulse(&out), 1.0);

    // Large motion again, but inside the cooldown
    clock.at(300);
    let out = mapper.map(extractor.extract(&dark).unwrap()).unwrap();
    assert_eq!(pulse(&out), 0.0);

    // Still scene after the cooldown: below threshold
    clock.at(900);
    let out = mapper.map(extractor.extract(&dark).unwrap()).unwrap();
    assert_eq!(pulse(&out), 0.0);

    clock.at(901);
    let out = mapper.map(extractor.extract(&bright).unwrap()).unwrap();
    assert_eq!(pulse(&out), 1.0);
}

#[test]
fn test_pulse_sequence_from_reference_timing() {
    let mut mapper = PulseMapper::new(3.0, 500);
    let fired: Vec<f64> = [(5.0, 0), (5.0, 200), (5.0, 600)]
        .into_iter()
        .map(|(value, t)| pulse(&mapper.apply_at(Some(value), t)))
        .collect();
    assert_eq!(fired, vec![1.0, 0.0, 1.0]);
}

#[test]
fn test_zero_signal_never_pulses() {
    let mut mapper = PulseMapper::new(-1.0, 0);
    assert_eq!(pulse(&mapper.apply_at(Some(0.0), 0)), 0.0);
    assert_eq!(pulse(&mapper.apply_at(Some(0.5), 1)), 1.0);
}

#[test]
fn test_left_handed_instrument() {
    let mut config = Config::default();
    config.tracker.primary_hand = Handedness::Left;
    config.tracker.filter = "none".to_string();
    let mut mapper = hand_gesture_mapper(&config).unwrap();

    let out = mapper
        .map(Features::Hands(vec![
            pinched_hand(Handedness::Left, 0.2, 0.5),
            pinched_hand(Handedness::Right, 0.9, 0.1),
        ]))
        .unwrap();
    assert_eq!(out.get_bool(params::SOUND_ENABLED), Some(true));
    assert!((out.get_f64(params::TARGET_FREQ).unwrap() - expected_freq(0.2)).abs() < 1e-9);
    assert!((out.get_f64(params::TARGET_VOLUME).unwrap() - 0.9).abs() < 1e-9);
}

#[test]
fn test_open_hand_keeps_pitch_but_gates() {
    let mut config = Config::default();
    config.tracker.filter = "none".to_string();
    let mut mapper = hand_gesture_mapper(&config).unwrap();

    let out = mapper
        .map(Features::Hands(vec![pinched_hand(Handedness::Right, 0.5, 0.5)]))
        .unwrap();
    let pitch = out.get_f64(params::TARGET_FREQ).unwrap();

    let out = mapper
        .map(Features::Hands(vec![open_hand(Handedness::Right, 1.0, 0.5, 0.2)]))
        .unwrap();
    assert_eq!(out.get_bool(params::SOUND_ENABLED), Some(false));
    assert_eq!(out.get_f64(params::TARGET_FREQ), Some(pitch));
}

#[test]
fn test_smoothing_lags_behind_jump() {
    let config = Config::default();
    let mut mapper = hand_gesture_mapper(&config).unwrap();
    mapper
        .map(Features::Hands(vec![pinched_hand(Handedness::Right, 0.0, 0.5)]))
        .unwrap();
    let out = mapper
        .map(Features::Hands(vec![pinched_hand(Handedness::Right, 1.0, 0.5)]))
        .unwrap();
    // alpha = 0.3: one step covers 30% of the jump
    let freq = out.get_f64(params::TARGET_FREQ).unwrap();
    assert!((freq - expected_freq(0.3)).abs() < 1e-9);
}

#[test]
fn test_reset_policy_through_config() {
    let mut config = Config::default();
    config.tracker.hand_loss = HandLossPolicy::Reset;
    let mut mapper = hand_gesture_mapper(&config).unwrap();
    mapper
        .map(Features::Hands(vec![pinched_hand(Handedness::Right, 0.0, 0.5)]))
        .unwrap();
    mapper.map(Features::Hands(Vec::new())).unwrap();
    let out = mapper
        .map(Features::Hands(vec![pinched_hand(Handedness::Right, 1.0, 0.5)]))
        .unwrap();
    // Smoothing restarted, so the new position is taken as is
    assert!((out.get_f64(params::TARGET_FREQ).unwrap() - expected_freq(1.0)).abs() < 1e-9);
}

#[test]
fn test_barycenter_mapper_follows_first_hand() {
    let mut mapper = BarycenterMapper::default();
    let out = mapper
        .map(Features::Hands(vec![
            pinched_hand(Handedness::Left, 0.3, 0.6),
            pinched_hand(Handedness::Right, 0.9, 0.9),
        ]))
        .unwrap();
    assert!((out.get_f64(params::RESONANCE).unwrap() - 0.3).abs() < 1e-9);
    assert!((out.get_f64(params::TEMPO).unwrap() - 0.6).abs() < 1e-9);
}
