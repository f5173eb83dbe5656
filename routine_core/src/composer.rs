//! Rep/Set composition for a single movement.
//!
//! The composer turns one exercise plus a time budget and a rep count into a
//! timed `Set`: the per-rep duration is clamped by the pacing policy, then
//! spread across the movement's positions (hardcoded holds first, the
//! residual shared by weight). Every round strategy is built on top of it.

use crate::config::{PacePolicy, PacingConfig};
use crate::rounding::{alternating_sequence, uniform_sequence};
use crate::types::*;
use crate::{Error, Result};

/// Which side of a dual-position movement is played first
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lead {
    First,
    Second,
}

impl Lead {
    /// Lead that balances a set of `count` alternating reps against its
    /// mirror: even counts start on the first side, odd counts on the second.
    pub fn for_count(count: u32) -> Self {
        if count % 2 == 0 {
            Lead::First
        } else {
            Lead::Second
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Lead::First => Lead::Second,
            Lead::Second => Lead::First,
        }
    }
}

/// Per-rep duration for `reps` repetitions inside `budget` seconds.
///
/// The result is the time one rep is allotted before position
/// distribution; a result below `min_secs` is handled by the shrink pass
/// in [`distribute`].
pub fn per_rep_secs(pacing: &PacingConfig, exercise: &Exercise, budget: f64, reps: u32) -> Result<f64> {
    if reps == 0 {
        return Err(Error::InvalidRequest(format!(
            "rep count for '{}' must be at least 1",
            exercise.id
        )));
    }
    if !budget.is_finite() || budget <= 0.0 {
        return Err(Error::InvalidRequest(format!(
            "time budget for '{}' must be positive, got {}",
            exercise.id, budget
        )));
    }

    let natural = budget / reps as f64;
    let per_rep = match pacing.policy {
        PacePolicy::Strict => natural.max(exercise.min_secs).min(exercise.max_secs),
        PacePolicy::Relaxed => {
            let upper = exercise.max_secs.max(pacing.max_stretch_ratio * natural);
            upper.min(natural)
        }
    };
    Ok(per_rep)
}

/// Hold durations for each position of one rep lasting `per_rep` seconds.
pub fn distribute(positions: &[ExerPosition], per_rep: f64, min_secs: f64) -> Result<Vec<f64>> {
    let hardcoded: f64 = positions.iter().filter_map(|p| p.hardcoded_secs).sum();
    let residual = per_rep.max(min_secs) - hardcoded;

    let mut times: Vec<f64> = positions
        .iter()
        .map(|p| p.hardcoded_secs.unwrap_or(residual * p.percent_secs))
        .collect();

    // Shrink pass: clamping happened before the hardcoded subtraction
    if min_secs > per_rep {
        let scale = per_rep / min_secs;
        for time in &mut times {
            *time *= scale;
        }
    }

    if let Some(i) = times.iter().position(|t| t.is_nan() || *t <= 0.0) {
        return Err(Error::Allocation(format!(
            "position {} of {} would last {:.3}s (rep {:.3}s, hardcoded {:.3}s)",
            i + 1,
            positions.len(),
            times[i],
            per_rep,
            hardcoded
        )));
    }

    Ok(times)
}

/// Concatenate two reps into one
pub fn combine_reps(first: Rep, second: Rep) -> Rep {
    let mut positions = first.positions;
    positions.extend(second.positions);
    let mut times = first.times;
    times.extend(second.times);

    Rep {
        positions,
        times,
        full_time: first.full_time + second.full_time,
    }
}

/// Chain sets into one, inserting `transitions[i - 1]` before set `i`.
///
/// Rep sequences are renumbered so every index still points into the
/// concatenated variant list; each transition is played exactly once.
pub fn combine_sets(sets: Vec<Set>, transitions: &[Rep]) -> Result<Set> {
    if sets.is_empty() {
        return Err(Error::InvalidRequest("cannot combine an empty list of sets".into()));
    }
    if transitions.len() + 1 != sets.len() {
        return Err(Error::InvalidRequest(format!(
            "{} sets need {} transitions, got {}",
            sets.len(),
            sets.len() - 1,
            transitions.len()
        )));
    }

    let mut sets = sets.into_iter();
    let mut combined = match sets.next() {
        Some(first) => first,
        None => return Err(Error::InvalidRequest("no sets to combine".into())),
    };

    for (set, transition) in sets.zip(transitions) {
        let offset = combined.reps.len();

        combined.reps.push(transition.clone());
        combined.rep_sequence.push(offset);
        combined
            .rep_sequence
            .extend(set.rep_sequence.iter().map(|i| i + offset + 1));
        combined.reps.extend(set.reps);

        combined.rep_count += 1 + set.rep_count;
        combined.full_time += transition.full_time + set.full_time;
        combined.position_end = set.position_end;
    }

    Ok(combined)
}

/// Builds timed reps and sets against one resolved catalog
pub struct Composer<'a> {
    catalog: &'a Catalog,
    resolution: Resolution,
    pacing: &'a PacingConfig,
}

impl<'a> Composer<'a> {
    pub fn new(catalog: &'a Catalog, resolution: Resolution, pacing: &'a PacingConfig) -> Self {
        Self {
            catalog,
            resolution,
            pacing,
        }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Frames of an image set at the composer's resolution
    pub fn frames(&self, image_set_id: &str) -> Result<Vec<String>> {
        let image_set = self.catalog.image_set(image_set_id)?;
        let frames = image_set.frames(self.resolution);
        if frames.is_empty() {
            return Err(Error::IncompleteCatalog(format!(
                "image set '{}' has no {} frames",
                image_set_id, self.resolution
            )));
        }
        Ok(frames.to_vec())
    }

    /// Neutral pose of an exercise, used as set start/end marker
    pub fn start_frames(&self, exercise: &Exercise) -> Result<Vec<String>> {
        self.frames(&exercise.start_image_set)
    }

    pub fn per_rep_secs(&self, exercise: &Exercise, budget: f64, reps: u32) -> Result<f64> {
        per_rep_secs(self.pacing, exercise, budget, reps)
    }

    /// One rep over `positions` lasting `per_rep` seconds
    pub fn exercise_rep(&self, exercise: &Exercise, positions: &[ExerPosition], per_rep: f64) -> Result<Rep> {
        let times = distribute(positions, per_rep, exercise.min_secs)?;
        let frames = positions
            .iter()
            .map(|p| self.frames(&p.image_set))
            .collect::<Result<Vec<_>>>()?;

        Ok(Rep {
            positions: frames,
            times,
            full_time: per_rep,
        })
    }

    /// `reps` identical reps of a single-position exercise
    pub fn single_rep_set(&self, exercise: &Exercise, reps: u32, budget: f64) -> Result<Set> {
        let per_rep = self.per_rep_secs(exercise, budget, reps)?;
        let rep = self.exercise_rep(exercise, &exercise.positions1, per_rep)?;
        let start = self.start_frames(exercise)?;

        Ok(Set {
            reps: vec![rep],
            rep_sequence: uniform_sequence(reps as usize),
            rep_count: reps as usize,
            full_time: per_rep * reps as f64,
            position_init: start.clone(),
            position_end: start,
        })
    }

    /// `reps` reps alternating between the two sides, `lead` side first
    pub fn alternating_rep_set(&self, exercise: &Exercise, reps: u32, budget: f64, lead: Lead) -> Result<Set> {
        let (first, second) = match exercise.arity() {
            Arity::Dual(first, second) => (first, second),
            Arity::Single(_) => {
                return Err(Error::InvalidRequest(format!(
                    "exercise '{}' has only one position list",
                    exercise.id
                )))
            }
        };

        let per_rep = self.per_rep_secs(exercise, budget, reps)?;
        let first = self.exercise_rep(exercise, first, per_rep)?;
        let second = self.exercise_rep(exercise, second, per_rep)?;
        let start = self.start_frames(exercise)?;

        let variants = match lead {
            Lead::First => vec![first, second],
            Lead::Second => vec![second, first],
        };

        Ok(Set {
            reps: variants,
            rep_sequence: alternating_sequence(reps as usize),
            rep_count: reps as usize,
            full_time: per_rep * reps as f64,
            position_init: start.clone(),
            position_end: start,
        })
    }

    /// Set for any exercise; `lead` only matters for dual-position ones
    pub fn exercise_set(&self, exercise: &Exercise, reps: u32, budget: f64, lead: Lead) -> Result<Set> {
        match exercise.arity() {
            Arity::Single(_) => self.single_rep_set(exercise, reps, budget),
            Arity::Dual(..) => self.alternating_rep_set(exercise, reps, budget, lead),
        }
    }

    /// A transition rendered as a playable rep
    pub fn transition_rep(&self, transition: &TransitionRep) -> Result<Rep> {
        if transition.image_set_ids.len() != transition.times.len() {
            return Err(Error::IncompleteCatalog(format!(
                "transition has {} positions but {} times",
                transition.image_set_ids.len(),
                transition.times.len()
            )));
        }

        let positions = transition
            .image_set_ids
            .iter()
            .map(|id| self.frames(id))
            .collect::<Result<Vec<_>>>()?;

        Ok(Rep {
            positions,
            times: transition.times.clone(),
            full_time: transition.full_time,
        })
    }
}
