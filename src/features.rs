//! Feature extraction: turns a captured frame into what a mapper consumes.

use crate::detector::HandDetector;
use crate::frame::Frame;
use crate::hand::HandObservation;
use crate::Result;

/// Shape of the data a feature extractor produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Per-hand landmark observations
    Hands,
    /// One scalar signal per frame
    Scalar,
}

/// Features extracted from one frame
#[derive(Debug, Clone, PartialEq)]
pub enum Features {
    Hands(Vec<HandObservation>),
    /// `None` when the signal is undefined for this frame
    Scalar(Option<f64>),
}

impl Features {
    #[must_use]
    pub const fn kind(&self) -> FeatureKind {
        match self {
            Self::Hands(_) => FeatureKind::Hands,
            Self::Scalar(_) => FeatureKind::Scalar,
        }
    }
}

/// Trait for per-frame feature extractors
pub trait FeatureExtractor: Send {
    /// Extract features from a captured frame
    ///
    /// # Errors
    ///
    /// Returns an error if extraction failed for this frame
    fn extract(&mut self, frame: &Frame) -> Result<Features>;

    /// Kind of features produced
    fn output_kind(&self) -> FeatureKind;

    /// Get extractor name
    fn name(&self) -> &str;
}

/// Hand landmarks and handedness from a [`HandDetector`]
pub struct HandLandmarker {
    detector: Box<dyn HandDetector>,
    max_hands: usize,
}

impl HandLandmarker {
    #[must_use]
    pub fn new(detector: Box<dyn HandDetector>, max_hands: usize) -> Self {
        Self { detector, max_hands }
    }
}

impl FeatureExtractor for HandLandmarker {
    fn extract(&mut self, frame: &Frame) -> Result<Features> {
        let mut hands = self.detector.detect(frame)?;
        hands.truncate(self.max_hands);
        Ok(Features::Hands(hands))
    }

    fn output_kind(&self) -> FeatureKind {
        FeatureKind::Hands
    }

    fn name(&self) -> &str {
        "hand_landmarker"
    }
}

/// Mean absolute grayscale difference between consecutive frames
#[derive(Debug, Default)]
pub struct FrameDiffCalculator {
    previous: Option<(usize, usize, Vec<u8>)>,
}

impl FrameDiffCalculator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Motion magnitude for `frame`, `None` without a comparable previous frame
    pub fn process(&mut self, frame: &Frame) -> Option<f64> {
        let gray = frame.to_gray();
        let dims = (frame.width(), frame.height());
        let diff = match &self.previous {
            Some((w, h, prev)) if (*w, *h) == dims && !gray.is_empty() => {
                let total: u64 = gray.iter().zip(prev).map(|(a, b)| u64::from(a.abs_diff(*b))).sum();
                Some(total as f64 / gray.len() as f64)
            }
            _ => None,
        };
        self.previous = Some((dims.0, dims.1, gray));
        diff
    }
}

impl FeatureExtractor for FrameDiffCalculator {
    fn extract(&mut self, frame: &Frame) -> Result<Features> {
        Ok(Features::Scalar(self.process(frame)))
    }

    fn output_kind(&self) -> FeatureKind {
        FeatureKind::Scalar
    }

    fn name(&self) -> &str {
        "frame_diff"
    }
}
