//! Smoothed barycenter tracking per hand role.
//!
//! Each role owns one filter slot. A frame in which the hand is observed feeds
//! the raw barycenter through the filter; a frame without it reports "absent"
//! to the caller so audio can be gated, while the slot itself is handled
//! according to the [`HandLossPolicy`].

use crate::filters::{create_filter, exponential::ExponentialFilter, Point3, PointFilter};
use crate::hand::{HandObservation, HandRole, HandsByRole};
use crate::Result;
use serde::{Deserialize, Serialize};

/// What happens to a slot's smoothed value when its hand disappears
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandLossPolicy {
    /// Keep the last smoothed value; smoothing resumes from it on reappearance
    #[default]
    Freeze,
    /// Drop the smoothed value; the next observation starts unsmoothed
    Reset,
}

/// Exponentially smoothed barycenter for a single tracking slot
pub struct SmoothedTracker {
    filter: Box<dyn PointFilter>,
    policy: HandLossPolicy,
}

impl SmoothedTracker {
    /// # Errors
    ///
    /// Returns an error if alpha is outside (0, 1]
    pub fn new(alpha: f64, policy: HandLossPolicy) -> Result<Self> {
        Ok(Self::with_filter(
            Box::new(ExponentialFilter::try_new(alpha)?),
            policy,
        ))
    }

    #[must_use]
    pub fn with_filter(filter: Box<dyn PointFilter>, policy: HandLossPolicy) -> Self {
        Self { filter, policy }
    }

    /// Feed this cycle's observation, `None` if the hand was not detected
    ///
    /// Returns the smoothed barycenter, or `None` when the hand is absent.
    ///
    /// # Errors
    ///
    /// Returns an error for an observation without landmarks; state is left untouched
    pub fn update(&mut self, observation: Option<&HandObservation>) -> Result<Option<Point3>> {
        match observation {
            Some(obs) => {
                let raw = obs.barycenter()?;
                Ok(Some(self.filter.apply(raw)))
            }
            None => {
                if self.policy == HandLossPolicy::Reset {
                    self.filter.reset();
                }
                Ok(None)
            }
        }
    }

    /// Last smoothed value, frozen while the hand is absent
    #[must_use]
    pub fn last(&self) -> Option<Point3> {
        self.filter.current()
    }

    /// Forget the smoothed value
    pub fn clear(&mut self) {
        self.filter.reset();
    }

    #[must_use]
    pub const fn policy(&self) -> HandLossPolicy {
        self.policy
    }
}

/// Smoothed barycenters for this cycle, `None` for roles without a hand
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackedHands {
    pub primary: Option<Point3>,
    pub secondary: Option<Point3>,
}

impl TrackedHands {
    #[must_use]
    pub const fn get(&self, role: HandRole) -> Option<Point3> {
        match role {
            HandRole::Primary => self.primary,
            HandRole::Secondary => self.secondary,
        }
    }
}

/// One [`SmoothedTracker`] per hand role
pub struct HandTracker {
    primary: SmoothedTracker,
    secondary: SmoothedTracker,
}

impl HandTracker {
    /// # Errors
    ///
    /// Returns an error if alpha is outside (0, 1]
    pub fn new(alpha: f64, policy: HandLossPolicy) -> Result<Self> {
        Ok(Self {
            primary: SmoothedTracker::new(alpha, policy)?,
            secondary: SmoothedTracker::new(alpha, policy)?,
        })
    }

    /// Build from a filter spec understood by [`create_filter`](crate::filters::create_filter)
    ///
    /// # Errors
    ///
    /// Returns an error for unknown filters or invalid filter parameters
    pub fn from_filter_spec(spec: &str, policy: HandLossPolicy) -> Result<Self> {
        Ok(Self {
            primary: SmoothedTracker::with_filter(create_filter(spec)?, policy),
            secondary: SmoothedTracker::with_filter(create_filter(spec)?, policy),
        })
    }

    /// Update both slots from this cycle's hands
    ///
    /// Both observations are validated before either slot is touched, so a
    /// malformed hand leaves the tracker exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns an error if any observed hand has no landmarks
    pub fn update(&mut self, hands: &HandsByRole) -> Result<TrackedHands> {
        for obs in [&hands.primary, &hands.secondary].into_iter().flatten() {
            obs.barycenter()?;
        }
        Ok(TrackedHands {
            primary: self.primary.update(hands.primary.as_ref())?,
            secondary: self.secondary.update(hands.secondary.as_ref())?,
        })
    }

    #[must_use]
    pub const fn slot(&self, role: HandRole) -> &SmoothedTracker {
        match role {
            HandRole::Primary => &self.primary,
            HandRole::Secondary => &self.secondary,
        }
    }

    /// Forget the smoothed value of one role
    pub fn clear(&mut self, role: HandRole) {
        match role {
            HandRole::Primary => self.primary.clear(),
            HandRole::Secondary => self.secondary.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::{Handedness, Landmark};

    /// Single-landmark hand so the barycenter is exactly `(x, y)`
    fn hand_at(x: f64, y: f64) -> HandObservation {
        HandObservation::new(Handedness::Right, vec![Landmark::new(x, y, 0.0)])
    }

    #[test]
    fn test_full_hand_tracks_its_barycenter() {
        let mut tracker = SmoothedTracker::new(0.3, HandLossPolicy::Freeze).unwrap();
        let hand = HandObservation::new(Handedness::Right, vec![Landmark::new(0.42, 0.17, 0.0); 21]);
        let [x, y, z] = tracker.update(Some(&hand)).unwrap().unwrap();
        assert!((x - 0.42).abs() < 1e-12);
        assert!((y - 0.17).abs() < 1e-12);
        assert!(z.abs() < 1e-12);
    }

    #[test]
    fn test_first_sample_is_raw() {
        let mut tracker = SmoothedTracker::new(0.3, HandLossPolicy::Freeze).unwrap();
        let smoothed = tracker.update(Some(&hand_at(0.42, 0.17))).unwrap().unwrap();
        assert_eq!(smoothed, [0.42, 0.17, 0.0]);
    }

    #[test]
    fn test_ema_converges_monotonically() {
        let alpha = 0.3;
        let mut tracker = SmoothedTracker::new(alpha, HandLossPolicy::Freeze).unwrap();
        tracker.update(Some(&hand_at(0.0, 0.0))).unwrap();

        let target = hand_at(1.0, 1.0);
        let mut previous_gap = 1.0;
        for n in 1..=20 {
            let [x, _, _] = tracker.update(Some(&target)).unwrap().unwrap();
            let gap = 1.0 - x;
            assert!(gap < previous_gap, "gap must shrink every cycle");
            let expected = (1.0_f64 - alpha).powi(n);
            assert!((gap - expected).abs() < 1e-12);
            previous_gap = gap;
        }
    }

    #[test]
    fn test_freeze_policy_reports_absent_but_keeps_state() {
        let mut tracker = SmoothedTracker::new(0.5, HandLossPolicy::Freeze).unwrap();
        tracker.update(Some(&hand_at(0.2, 0.2))).unwrap();
        assert_eq!(tracker.update(None).unwrap(), None);
        assert_eq!(tracker.last(), Some([0.2, 0.2, 0.0]));

        // Smoothing resumes from the frozen value
        let [x, _, _] = tracker.update(Some(&hand_at(0.4, 0.2))).unwrap().unwrap();
        assert!((x - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_reset_policy_restarts_unsmoothed() {
        let mut tracker = SmoothedTracker::new(0.5, HandLossPolicy::Reset).unwrap();
        tracker.update(Some(&hand_at(0.2, 0.2))).unwrap();
        assert_eq!(tracker.update(None).unwrap(), None);
        assert_eq!(tracker.last(), None);
        assert_eq!(
            tracker.update(Some(&hand_at(0.4, 0.2))).unwrap(),
            Some([0.4, 0.2, 0.0])
        );
    }

    #[test]
    fn test_malformed_observation_leaves_state() {
        let mut tracker = HandTracker::new(0.5, HandLossPolicy::Freeze).unwrap();
        let good = HandsByRole {
            primary: Some(hand_at(0.5, 0.5)),
            secondary: None,
        };
        tracker.update(&good).unwrap();

        let bad = HandsByRole {
            primary: Some(hand_at(0.9, 0.9)),
            secondary: Some(HandObservation::new(Handedness::Left, Vec::new())),
        };
        assert!(tracker.update(&bad).is_err());
        assert_eq!(tracker.slot(HandRole::Primary).last(), Some([0.5, 0.5, 0.0]));
    }

    #[test]
    fn test_unfiltered_tracker() {
        let mut tracker = HandTracker::from_filter_spec("none", HandLossPolicy::Freeze).unwrap();
        let hands = |x| HandsByRole {
            primary: Some(hand_at(x, 0.5)),
            secondary: None,
        };
        tracker.update(&hands(0.1)).unwrap();
        let tracked = tracker.update(&hands(0.9)).unwrap();
        assert_eq!(tracked.primary, Some([0.9, 0.5, 0.0]));
        assert_eq!(tracked.secondary, None);
        assert!(HandTracker::from_filter_spec("kalman", HandLossPolicy::Freeze).is_err());
    }

    #[test]
    fn test_explicit_clear() {
        let mut tracker = HandTracker::new(0.5, HandLossPolicy::Freeze).unwrap();
        tracker
            .update(&HandsByRole {
                primary: Some(hand_at(0.5, 0.5)),
                secondary: None,
            })
            .unwrap();
        tracker.clear(HandRole::Primary);
        assert_eq!(tracker.slot(HandRole::Primary).last(), None);
    }
}
