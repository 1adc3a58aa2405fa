use super::{Point3, PointFilter};
use crate::constants::{SMOOTHING_ALPHA_MAX, SMOOTHING_ALPHA_MIN};
use crate::{Error, Result};

/// Exponential smoothing filter, applied independently per axis.
///
/// The first sample after construction or reset passes through unchanged.
#[derive(Debug, Clone)]
pub struct ExponentialFilter {
    alpha: f64,
    last: Option<Point3>,
}

impl ExponentialFilter {
    /// # Panics
    ///
    /// Panics if alpha is outside (0, 1]
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        assert!(
            alpha > SMOOTHING_ALPHA_MIN && alpha <= SMOOTHING_ALPHA_MAX,
            "Alpha must be in (0, 1]"
        );
        Self { alpha, last: None }
    }

    /// Fallible constructor for values coming from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if alpha is outside (0, 1]
    pub fn try_new(alpha: f64) -> Result<Self> {
        if alpha > SMOOTHING_ALPHA_MIN && alpha <= SMOOTHING_ALPHA_MAX {
            Ok(Self { alpha, last: None })
        } else {
            Err(Error::InvalidInput(format!("Alpha must be in (0, 1], got {alpha}")))
        }
    }

    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl PointFilter for ExponentialFilter {
    fn apply(&mut self, raw: Point3) -> Point3 {
        let filtered = match self.last {
            Some(last) => {
                let mut out = [0.0; 3];
                for ((o, r), l) in out.iter_mut().zip(raw).zip(last) {
                    *o = self.alpha * r + (1.0 - self.alpha) * l;
                }
                out
            }
            None => raw,
        };
        self.last = Some(filtered);
        filtered
    }

    fn current(&self) -> Option<Point3> {
        self.last
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
