//! Scenario assembly: string keys from the configuration resolved to components.

use crate::capture::{CaptureDevice, TestPatternCamera};
use crate::config::Config;
use crate::constants::{params, PINCH_MAPPER_THRESHOLD};
use crate::detector::SubprocessDetector;
use crate::features::{FeatureExtractor, FrameDiffCalculator, HandLandmarker};
use crate::hand::RoleMapping;
use crate::mapper::{BarycenterMapper, BinaryPulseMapper, FeatureMapper, HandGestureMapper, PinchMapper, PulseMapper};
use crate::output::{LogTransport, OscTransport, Transport};
use crate::params::AudioParameters;
use crate::strategy::create_strategy;
use crate::tracker::HandTracker;
#[cfg(feature = "opencv")]
use crate::webcam::{VideoSource, Webcam};
use crate::{Error, Result};
use log::info;
use std::collections::BTreeMap;

/// Builds a component from the configuration
pub type Constructor<T> = fn(&Config) -> Result<T>;

/// Named constructors for one kind of component
pub struct Registry<T> {
    kind: &'static str,
    entries: BTreeMap<&'static str, Constructor<T>>,
}

impl<T> Registry<T> {
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace a constructor
    pub fn register(&mut self, name: &'static str, constructor: Constructor<T>) -> &mut Self {
        self.entries.insert(name, constructor);
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered keys in sorted order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    fn lookup(&self, name: &str) -> Result<Constructor<T>> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownComponent {
                kind: self.kind,
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Check that `name` is registered
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownComponent`] listing the registered keys
    pub fn ensure(&self, name: &str) -> Result<()> {
        self.lookup(name).map(|_| ())
    }

    /// Construct the component registered under `name`
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownComponent`] for unregistered keys, or the
    /// constructor's error
    pub fn create(&self, name: &str, config: &Config) -> Result<T> {
        self.lookup(name)?(config)
    }
}

/// The four registries a scenario is assembled from
pub struct ComponentRegistry {
    pub video_inputs: Registry<Box<dyn CaptureDevice>>,
    pub feature_extractors: Registry<Box<dyn FeatureExtractor>>,
    pub feature_mappers: Registry<Box<dyn FeatureMapper>>,
    pub audio_outputs: Registry<Box<dyn Transport>>,
}

impl Default for ComponentRegistry {
    /// Registries with all built-in components
    fn default() -> Self {
        let mut registry = Self::empty();

        registry
            .video_inputs
            .register("test_pattern", |c| {
                Ok(Box::new(TestPatternCamera::new(
                    c.capture.width as usize,
                    c.capture.height as usize,
                    c.capture.fps,
                )?))
            });
        #[cfg(feature = "opencv")]
        registry
            .video_inputs
            .register("webcam", |c| {
                Ok(Box::new(Webcam::new(
                    VideoSource::Camera(c.capture.camera_index),
                    c.capture.width,
                    c.capture.height,
                    c.capture.fps,
                    c.capture.mirror,
                )))
            })
            .register("video_file", |c| {
                let path = c.capture.video_file.as_ref().ok_or_else(|| {
                    Error::ConfigError("video_file input needs capture.video_file".to_string())
                })?;
                Ok(Box::new(Webcam::new(
                    VideoSource::File(path.display().to_string()),
                    c.capture.width,
                    c.capture.height,
                    c.capture.fps,
                    c.capture.mirror,
                )))
            });

        registry
            .feature_extractors
            .register("hand_landmarker", |c| {
                let detector = SubprocessDetector::spawn(&c.detector.command, &c.detector.args)?;
                Ok(Box::new(HandLandmarker::new(Box::new(detector), c.detector.max_hands)))
            })
            .register("frame_diff", |_| Ok(Box::new(FrameDiffCalculator::new())));

        registry
            .feature_mappers
            .register("hand_gesture", |c| Ok(Box::new(hand_gesture_mapper(c)?)))
            .register("pulse", |c| {
                Ok(Box::new(PulseMapper::new(c.pulse.threshold, c.pulse.cooldown_ms)))
            })
            .register("binary_pulse", |c| Ok(Box::new(BinaryPulseMapper::new(c.pulse.threshold))))
            .register("pinch", |c| {
                Ok(Box::new(PinchMapper::new(c.tracker.primary_hand, PINCH_MAPPER_THRESHOLD)))
            })
            .register("barycenter", |_| Ok(Box::new(BarycenterMapper::default())));

        registry
            .audio_outputs
            .register("osc", |c| Ok(Box::new(OscTransport::new(&c.output.host, c.output.port))))
            .register("log", |_| Ok(Box::new(LogTransport::new())));

        registry
    }
}

impl ComponentRegistry {
    /// Registries without any entries
    #[must_use]
    pub fn empty() -> Self {
        Self {
            video_inputs: Registry::new("video input"),
            feature_extractors: Registry::new("feature extractor"),
            feature_mappers: Registry::new("feature mapper"),
            audio_outputs: Registry::new("audio output"),
        }
    }

    /// Resolve every scenario key of `config` and assemble the components
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys, failing constructors or an
    /// extractor whose output the mapper cannot consume
    pub fn build(&self, config: &Config) -> Result<Scenario> {
        let keys = &config.scenario;
        info!(
            "Scenario: {} -> {} -> {} -> {}",
            keys.video_input, keys.feature_extractor, keys.feature_mapper, keys.audio_output
        );

        // Cheap lookups first so a typo fails before any process or device is touched
        self.video_inputs.ensure(&keys.video_input)?;
        self.feature_extractors.ensure(&keys.feature_extractor)?;
        self.feature_mappers.ensure(&keys.feature_mapper)?;
        self.audio_outputs.ensure(&keys.audio_output)?;

        let mapper = self.feature_mappers.create(&keys.feature_mapper, config)?;
        let transport = self.audio_outputs.create(&keys.audio_output, config)?;
        let capture = self.video_inputs.create(&keys.video_input, config)?;
        let extractor = self.feature_extractors.create(&keys.feature_extractor, config)?;
        Scenario::new(capture, extractor, mapper, transport)
    }
}

/// Hand tracker, role mapping and strategies for the two-handed instrument
///
/// # Errors
///
/// Returns an error for an invalid filter or an unknown strategy name
pub fn hand_gesture_mapper(config: &Config) -> Result<HandGestureMapper> {
    let tracker = HandTracker::from_filter_spec(&config.tracker.filter_spec(), config.tracker.hand_loss)?;
    let strategy_params = config.gesture.strategy_params();
    let primary = create_strategy(&config.gesture.primary_strategy, &strategy_params)?;
    let secondary = create_strategy(&config.gesture.secondary_strategy, &strategy_params)?;

    let mut initial = AudioParameters::new();
    initial.set(params::SOUND_ENABLED, false);
    initial.set(params::TARGET_FREQ, config.gesture.default_freq);
    initial.set(params::TARGET_VOLUME, config.gesture.default_volume);

    Ok(HandGestureMapper::new(
        tracker,
        RoleMapping::new(config.tracker.primary_hand),
        primary,
        secondary,
        initial,
    ))
}

/// Components of one run
pub struct Scenario {
    pub capture: Box<dyn CaptureDevice>,
    pub extractor: Box<dyn FeatureExtractor>,
    pub mapper: Box<dyn FeatureMapper>,
    pub transport: Box<dyn Transport>,
}

impl Scenario {
    /// # Errors
    ///
    /// Returns an error if the mapper cannot consume the extractor's features
    pub fn new(
        capture: Box<dyn CaptureDevice>,
        extractor: Box<dyn FeatureExtractor>,
        mapper: Box<dyn FeatureMapper>,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        if extractor.output_kind() != mapper.input_kind() {
            return Err(Error::ConfigError(format!(
                "Feature mapper '{}' consumes {:?} features but extractor '{}' produces {:?}",
                mapper.name(),
                mapper.input_kind(),
                extractor.name(),
                extractor.output_kind()
            )));
        }
        Ok(Self {
            capture,
            extractor,
            mapper,
            transport,
        })
    }

    /// Assemble a scenario from the built-in registries
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::build`]
    pub fn from_config(config: &Config) -> Result<Self> {
        ComponentRegistry::default().build(config)
    }
}
