//! Smoothing filters for noisy per-frame hand positions.

/// Exponential filter for responsive smoothing
pub mod exponential;

use crate::Result;

/// A 3D point (x, y, z)
pub type Point3 = [f64; 3];

/// Trait for all position filters
pub trait PointFilter: Send + Sync {
    /// Feed one raw sample and get the filtered value
    fn apply(&mut self, raw: Point3) -> Point3;

    /// Last filtered value, if any sample was fed since the last reset
    fn current(&self) -> Option<Point3>;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes through values unchanged
#[derive(Debug, Default)]
pub struct NoFilter {
    last: Option<Point3>,
}

impl PointFilter for NoFilter {
    fn apply(&mut self, raw: Point3) -> Point3 {
        self.last = Some(raw);
        raw
    }

    fn current(&self) -> Option<Point3> {
        self.last
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Create a filter from a spec string such as `none` or `exponential:0.3`
///
/// # Errors
///
/// Returns an error for unknown filter names or out-of-range parameters
pub fn create_filter(spec: &str) -> Result<Box<dyn PointFilter>> {
    let spec = spec.to_lowercase();
    let (name, param) = match spec.split_once(':') {
        Some((name, param)) => (name, Some(param)),
        None => (spec.as_str(), None),
    };
    match name {
        "none" | "nofilter" => Ok(Box::new(NoFilter::default())),
        "exponential" | "ema" => {
            let alpha = match param {
                Some(p) => p
                    .parse::<f64>()
                    .map_err(|e| crate::Error::InvalidInput(format!("Alpha '{p}': {e}")))?,
                None => crate::constants::DEFAULT_BARYCENTER_ALPHA,
            };
            Ok(Box::new(exponential::ExponentialFilter::try_new(alpha)?))
        }
        _ => Err(crate::Error::InvalidInput(format!("Unknown filter type: {name}"))),
    }
}
