//! Rep-count rounding for display-friendly set sizes.
//!
//! Raw rep targets are rarely integers. A target close to a whole number is
//! shown as that number; anything in the middle band becomes a half-integer,
//! which the round strategies realise as two alternating sets (`n` and
//! `n + 1` reps) so the average across the round lands on the target.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

const WHOLE_TOLERANCE: f64 = 0.001;

/// Tolerance bands for `custom_round`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct RoundingPolicy {
    /// Fractions below this round down to a whole number
    #[serde(default = "default_whole_below")]
    pub whole_below: f64,
    /// Fractions above this round up to a whole number
    #[serde(default = "default_whole_above")]
    pub whole_above: f64,
}

fn default_whole_below() -> f64 {
    0.399
}

fn default_whole_above() -> f64 {
    0.601
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self {
            whole_below: default_whole_below(),
            whole_above: default_whole_above(),
        }
    }
}

/// Displayed rep count for a round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepTarget {
    /// Every set uses the same count
    Whole(u32),
    /// Sets alternate between `lower` and `upper = lower + 1`
    Alternating { lower: u32, upper: u32 },
}

impl RepTarget {
    /// Rep counts of the set variants, in variant order
    pub fn counts(&self) -> Vec<u32> {
        match *self {
            RepTarget::Whole(n) => vec![n],
            RepTarget::Alternating { lower, upper } => vec![lower, upper],
        }
    }

    /// Variant index for each of `sets` set slots
    pub fn set_sequence(&self, sets: usize) -> Vec<usize> {
        match self {
            RepTarget::Whole(_) => uniform_sequence(sets),
            RepTarget::Alternating { .. } => alternating_sequence(sets),
        }
    }
}

impl RoundingPolicy {
    /// Round to a whole number outside the middle band, to `x.5` inside it.
    pub fn custom_round(&self, value: f64) -> f64 {
        let whole = value.trunc();
        let fraction = value - whole;
        if fraction < self.whole_below {
            whole
        } else if fraction > self.whole_above {
            whole + 1.0
        } else {
            whole + 0.5
        }
    }

    /// Rounded rep target for a raw (fractional) rep count.
    ///
    /// Targets that are not positive, or that round to zero reps, are
    /// rejected: a set with no reps has no per-rep duration.
    pub fn rep_target(&self, raw: f64) -> Result<RepTarget> {
        if !raw.is_finite() || raw <= 0.0 {
            return Err(Error::InvalidRequest(format!(
                "rep target must be positive, got {}",
                raw
            )));
        }

        let display = self.custom_round(raw);
        let target = if is_whole(display) {
            RepTarget::Whole(display.round() as u32)
        } else {
            let lower = display.floor() as u32;
            RepTarget::Alternating {
                lower,
                upper: lower + 1,
            }
        };

        match target {
            RepTarget::Whole(0) | RepTarget::Alternating { lower: 0, .. } => {
                Err(Error::InvalidRequest(format!(
                    "rep target {} rounds to zero reps",
                    raw
                )))
            }
            target => Ok(target),
        }
    }
}

/// Within ±0.001 of an integer
pub fn is_whole(value: f64) -> bool {
    (value - value.round()).abs() < WHOLE_TOLERANCE
}

/// Plain nearest-integer rep count, rejecting anything that rounds to zero
pub fn whole_reps(raw: f64) -> Result<u32> {
    if !raw.is_finite() || raw <= 0.0 {
        return Err(Error::InvalidRequest(format!(
            "rep target must be positive, got {}",
            raw
        )));
    }
    match raw.round() as u32 {
        0 => Err(Error::InvalidRequest(format!(
            "rep target {} rounds to zero reps",
            raw
        ))),
        n => Ok(n),
    }
}

/// `[0, 0, ..]`
pub fn uniform_sequence(len: usize) -> Vec<usize> {
    vec![0; len]
}

/// `[0, 1, 0, 1, ..]`
pub fn alternating_sequence(len: usize) -> Vec<usize> {
    (0..len).map(|i| i % 2).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_round_bands() {
        let policy = RoundingPolicy::default();
        assert_eq!(policy.custom_round(4.2), 4.0);
        assert_eq!(policy.custom_round(4.39), 4.0);
        assert_eq!(policy.custom_round(4.4), 4.5);
        assert_eq!(policy.custom_round(4.5), 4.5);
        assert_eq!(policy.custom_round(4.6), 4.5);
        assert_eq!(policy.custom_round(4.61), 5.0);
        assert_eq!(policy.custom_round(4.95), 5.0);
    }

    #[test]
    fn test_custom_round_is_idempotent_with_half_fractions() {
        let policy = RoundingPolicy::default();
        for i in 1..400 {
            let raw = i as f64 * 0.037;
            let once = policy.custom_round(raw);
            let fraction = once - once.floor();
            assert!(
                fraction == 0.0 || fraction == 0.5,
                "{} rounded to {} with fraction {}",
                raw,
                once,
                fraction
            );
            assert_eq!(policy.custom_round(once), once);
        }
    }

    #[test]
    fn test_is_whole_matches_band() {
        let policy = RoundingPolicy::default();
        for i in 1..200 {
            let raw = i as f64 * 0.053;
            let fraction = raw - raw.floor();
            let outside_band = fraction < policy.whole_below || fraction > policy.whole_above;
            assert_eq!(is_whole(policy.custom_round(raw)), outside_band, "raw {}", raw);
        }
    }

    #[test]
    fn test_configurable_bands() {
        let policy = RoundingPolicy {
            whole_below: 0.35,
            whole_above: 0.65,
        };
        assert_eq!(policy.custom_round(3.37), 3.5);
        assert_eq!(policy.custom_round(3.63), 3.5);
        assert_eq!(policy.custom_round(3.66), 4.0);
    }

    #[test]
    fn test_rep_target_whole() {
        let policy = RoundingPolicy::default();
        let target = policy.rep_target(4.2).unwrap();
        assert_eq!(target, RepTarget::Whole(4));
        assert_eq!(target.counts(), vec![4]);
        assert_eq!(target.set_sequence(3), vec![0, 0, 0]);
    }

    #[test]
    fn test_rep_target_alternating() {
        let policy = RoundingPolicy::default();
        let target = policy.rep_target(4.5).unwrap();
        assert_eq!(target, RepTarget::Alternating { lower: 4, upper: 5 });
        assert_eq!(target.counts(), vec![4, 5]);
        assert_eq!(target.set_sequence(3), vec![0, 1, 0]);
    }

    #[test]
    fn test_rep_target_rejects_zero() {
        let policy = RoundingPolicy::default();
        assert!(matches!(
            policy.rep_target(0.0),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            policy.rep_target(0.2),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            policy.rep_target(0.5),
            Err(Error::InvalidRequest(_))
        ));
        assert!(policy.rep_target(0.7).is_ok());
    }

    #[test]
    fn test_whole_reps() {
        assert_eq!(whole_reps(5.4).unwrap(), 5);
        assert_eq!(whole_reps(5.5).unwrap(), 6);
        assert!(whole_reps(0.4).is_err());
        assert!(whole_reps(-1.0).is_err());
    }
}
