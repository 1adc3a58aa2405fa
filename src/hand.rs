//! Hand observations as reported by the landmark detector.
//!
//! Landmarks are normalized to the frame: `x` and `y` in `[0, 1]`, `z` is a
//! relative depth. Detector labels ("Left"/"Right") are mapped onto control
//! roles so strategies never deal with raw handedness strings.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single normalized landmark
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the image plane, ignoring depth
    #[must_use]
    pub fn planar_distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Physical handedness as labelled by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl FromStr for Handedness {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(Error::MalformedObservation(format!(
                "Unknown handedness label: {other}"
            ))),
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "Left"),
            Self::Right => write!(f, "Right"),
        }
    }
}

/// Control role a hand plays, independent of which physical hand it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandRole {
    /// Pitch and gate
    Primary,
    /// Volume
    Secondary,
}

impl HandRole {
    pub const ALL: [Self; 2] = [Self::Primary, Self::Secondary];
}

/// Which physical hand drives the primary role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleMapping {
    primary: Handedness,
}

impl Default for RoleMapping {
    fn default() -> Self {
        Self::new(Handedness::Right)
    }
}

impl RoleMapping {
    #[must_use]
    pub const fn new(primary: Handedness) -> Self {
        Self { primary }
    }

    #[must_use]
    pub const fn role_of(&self, hand: Handedness) -> HandRole {
        if matches!(
            (hand, self.primary),
            (Handedness::Left, Handedness::Left) | (Handedness::Right, Handedness::Right)
        ) {
            HandRole::Primary
        } else {
            HandRole::Secondary
        }
    }

    #[must_use]
    pub const fn hand_for(&self, role: HandRole) -> Handedness {
        match role {
            HandRole::Primary => self.primary,
            HandRole::Secondary => self.primary.opposite(),
        }
    }
}

/// One detected hand in one frame
#[derive(Debug, Clone, PartialEq)]
pub struct HandObservation {
    pub handedness: Handedness,
    pub landmarks: Vec<Landmark>,
}

impl HandObservation {
    #[must_use]
    pub const fn new(handedness: Handedness, landmarks: Vec<Landmark>) -> Self {
        Self {
            handedness,
            landmarks,
        }
    }

    /// Arithmetic mean of all landmarks, per axis
    ///
    /// # Errors
    ///
    /// Returns an error for an observation without landmarks
    pub fn barycenter(&self) -> Result<[f64; 3]> {
        if self.landmarks.is_empty() {
            return Err(Error::MalformedObservation(format!(
                "{} hand has no landmarks",
                self.handedness
            )));
        }
        let n = self.landmarks.len() as f64;
        let sum = self.landmarks.iter().fold([0.0; 3], |acc, lm| {
            [acc[0] + lm.x, acc[1] + lm.y, acc[2] + lm.z]
        });
        Ok([sum[0] / n, sum[1] / n, sum[2] / n])
    }

    /// Landmark by anatomical index
    ///
    /// # Errors
    ///
    /// Returns an error if the index is outside the reported landmarks
    pub fn landmark(&self, index: usize) -> Result<&Landmark> {
        self.landmarks.get(index).ok_or_else(|| {
            Error::MalformedObservation(format!(
                "{} hand has {} landmarks, index {index} requested",
                self.handedness,
                self.landmarks.len()
            ))
        })
    }

    /// Planar distance between two landmarks of this hand
    ///
    /// # Errors
    ///
    /// Returns an error if either index is missing
    pub fn planar_distance(&self, a: usize, b: usize) -> Result<f64> {
        Ok(self.landmark(a)?.planar_distance(self.landmark(b)?))
    }
}

/// Pair detector output given as parallel landmark and label lists
///
/// # Errors
///
/// Returns an error when the lists differ in length or a label is unknown
pub fn observations_from_parts<S: AsRef<str>>(
    landmarks: Vec<Vec<Landmark>>,
    handedness: &[S],
) -> Result<Vec<HandObservation>> {
    if landmarks.len() != handedness.len() {
        return Err(Error::MalformedObservation(format!(
            "{} landmark sets but {} handedness labels",
            landmarks.len(),
            handedness.len()
        )));
    }
    landmarks
        .into_iter()
        .zip(handedness)
        .map(|(lms, label)| Ok(HandObservation::new(label.as_ref().parse()?, lms)))
        .collect()
}

/// Observations for the current frame, split by role
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandsByRole {
    pub primary: Option<HandObservation>,
    pub secondary: Option<HandObservation>,
}

impl HandsByRole {
    /// Sort observations into roles; a second hand with the same label is ignored
    #[must_use]
    pub fn assign(observations: Vec<HandObservation>, mapping: RoleMapping) -> Self {
        let mut hands = Self::default();
        for obs in observations {
            let slot = match mapping.role_of(obs.handedness) {
                HandRole::Primary => &mut hands.primary,
                HandRole::Secondary => &mut hands.secondary,
            };
            if slot.is_some() {
                log::debug!("Ignoring duplicate {} hand", obs.handedness);
                continue;
            }
            *slot = Some(obs);
        }
        hands
    }

    #[must_use]
    pub const fn get(&self, role: HandRole) -> Option<&HandObservation> {
        match role {
            HandRole::Primary => self.primary.as_ref(),
            HandRole::Secondary => self.secondary.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(label: Handedness, points: &[(f64, f64, f64)]) -> HandObservation {
        HandObservation::new(
            label,
            points.iter().map(|&(x, y, z)| Landmark::new(x, y, z)).collect(),
        )
    }

    #[test]
    fn test_barycenter_mean_per_axis() {
        let obs = hand(Handedness::Right, &[(0.0, 0.0, 0.0), (1.0, 0.5, -1.0)]);
        assert_eq!(obs.barycenter().unwrap(), [0.5, 0.25, -0.5]);
    }

    #[test]
    fn test_barycenter_empty_is_error() {
        let obs = hand(Handedness::Left, &[]);
        assert!(matches!(obs.barycenter(), Err(Error::MalformedObservation(_))));
    }

    #[test]
    fn test_planar_distance_ignores_depth() {
        let a = Landmark::new(0.0, 0.0, 5.0);
        let b = Landmark::new(0.3, 0.4, -5.0);
        assert!((a.planar_distance(&b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_handedness_parse() {
        assert_eq!("Right".parse::<Handedness>().unwrap(), Handedness::Right);
        assert_eq!(" left ".parse::<Handedness>().unwrap(), Handedness::Left);
        assert!("Middle".parse::<Handedness>().is_err());
    }

    #[test]
    fn test_role_mapping() {
        let mapping = RoleMapping::default();
        assert_eq!(mapping.role_of(Handedness::Right), HandRole::Primary);
        assert_eq!(mapping.role_of(Handedness::Left), HandRole::Secondary);

        let lefty = RoleMapping::new(Handedness::Left);
        assert_eq!(lefty.role_of(Handedness::Left), HandRole::Primary);
        assert_eq!(lefty.hand_for(HandRole::Secondary), Handedness::Right);
    }

    #[test]
    fn test_observations_from_parts_mismatch() {
        let lms = vec![vec![Landmark::default()], vec![Landmark::default()]];
        let result = observations_from_parts(lms, &["Right"]);
        assert!(matches!(result, Err(Error::MalformedObservation(_))));
    }

    #[test]
    fn test_assign_keeps_first_duplicate() {
        let first = hand(Handedness::Right, &[(0.1, 0.1, 0.0)]);
        let second = hand(Handedness::Right, &[(0.9, 0.9, 0.0)]);
        let hands = HandsByRole::assign(vec![first.clone(), second], RoleMapping::default());
        assert_eq!(hands.primary, Some(first));
        assert!(hands.secondary.is_none());
    }
}
