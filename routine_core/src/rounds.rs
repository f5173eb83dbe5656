//! Round strategies: Regular, Combo and Split.
//!
//! Each strategy decides how many set variants a round needs, how rep
//! counts are spread across them, and how multiple exercises are stitched
//! together with transitions. The `Composer` does the per-exercise timing.

use crate::composer::{combine_reps, combine_sets, Composer, Lead};
use crate::request::WorkoutRound;
use crate::rounding::{alternating_sequence, uniform_sequence, whole_reps, RoundingPolicy};
use crate::transition::SpeedTier;
use crate::types::*;
use crate::{Error, Result};

/// Sets and sequencing produced for one round
#[derive(Clone, Debug, PartialEq)]
pub struct RoundPlan {
    pub sets: Vec<Set>,
    pub set_sequence: Vec<usize>,
    pub reps: Vec<u32>,
    pub split_pairs: Option<[bool; 2]>,
}

/// A split giant-rep set and the transition tier it was built with
#[derive(Clone, Debug)]
pub struct SplitSet {
    pub set: Set,
    pub speed: SpeedTier,
}

/// Applies the round strategies against one composer
pub struct RoundBuilder<'a> {
    composer: &'a Composer<'a>,
    rounding: RoundingPolicy,
    speed_tolerance: f64,
}

/// Display counts for a combo chain, folding each exercise's rounding
/// error into the next exercise's target.
pub fn carry_reps(targets: &[f64]) -> Result<Vec<u32>> {
    let mut carry = 1.0;
    let mut counts = Vec::with_capacity(targets.len());

    for (i, &target) in targets.iter().enumerate() {
        if !target.is_finite() || target <= 0.0 {
            return Err(Error::InvalidRequest(format!(
                "combo rep target {} must be positive, got {}",
                i + 1,
                target
            )));
        }

        let display = (target * carry).round();
        if display < 1.0 {
            return Err(Error::InvalidRequest(format!(
                "combo rep target {} rounds to zero reps",
                i + 1
            )));
        }

        carry = 1.0 + (target - display) / target;
        counts.push(display as u32);
    }

    Ok(counts)
}

impl<'a> RoundBuilder<'a> {
    pub fn new(composer: &'a Composer<'a>, rounding: RoundingPolicy, speed_tolerance: f64) -> Self {
        Self {
            composer,
            rounding,
            speed_tolerance,
        }
    }

    fn exercise(&self, id: &str) -> Result<&'a Exercise> {
        self.composer.catalog().exercise(id)
    }

    /// Dispatch on the round kind
    pub fn build(&self, round: &WorkoutRound) -> Result<RoundPlan> {
        match round.kind {
            RoundKind::Regular => self.regular(round),
            RoundKind::Combo => self.combo(round),
            RoundKind::Split => self.split(round),
        }
    }

    /// One exercise repeated for every set
    pub fn regular(&self, round: &WorkoutRound) -> Result<RoundPlan> {
        let (id, target) = match (round.exercise_ids.first(), round.reps.first()) {
            (Some(id), Some(target)) => (id, *target),
            _ => {
                return Err(Error::InvalidRequest(
                    "regular round needs an exercise and a rep target".into(),
                ))
            }
        };
        let exercise = self.exercise(id)?;
        let budget = round.times.exercise_per_set;
        let set_count = round.times.sets as usize;

        match exercise.arity() {
            Arity::Single(_) => {
                let target = self.rounding.rep_target(target)?;
                let sets = target
                    .counts()
                    .into_iter()
                    .map(|n| self.composer.single_rep_set(exercise, n, budget))
                    .collect::<Result<Vec<_>>>()?;

                Ok(RoundPlan {
                    sets,
                    set_sequence: target.set_sequence(set_count),
                    reps: target.counts(),
                    split_pairs: None,
                })
            }
            Arity::Dual(..) => {
                let count = whole_reps(target)?;
                // Regular rounds lead with the second side
                let (sets, set_sequence) = if count % 2 == 0 {
                    let set = self.composer.alternating_rep_set(exercise, count, budget, Lead::Second)?;
                    (vec![set], uniform_sequence(set_count))
                } else {
                    // An odd count ends on the lead side; swap leads between sets
                    let first = self.composer.alternating_rep_set(exercise, count, budget, Lead::Second)?;
                    let second =
                        self.composer
                            .alternating_rep_set(exercise, count, budget, Lead::Second.flipped())?;
                    (vec![first, second], alternating_sequence(set_count))
                };

                Ok(RoundPlan {
                    sets,
                    set_sequence,
                    reps: vec![count],
                    split_pairs: None,
                })
            }
        }
    }

    /// Regular-speed transitions along the chain and the working time left
    /// after paying for them
    pub fn transition_chain(&self, exercises: &[&Exercise], budget: f64) -> Result<(Vec<Rep>, f64)> {
        let matrix = self.composer.catalog().transitions()?;
        let mut transitions = Vec::with_capacity(exercises.len().saturating_sub(1));
        let mut working = budget;

        for pair in exercises.windows(2) {
            let cell = matrix.lookup(pair[0].parent, pair[1].parent, SpeedTier::Regular)?;
            working -= cell.full_time;
            transitions.push(self.composer.transition_rep(cell)?);
        }

        Ok((transitions, working))
    }

    /// Several exercises back to back inside one set
    pub fn combo(&self, round: &WorkoutRound) -> Result<RoundPlan> {
        if round.times.combo_exers == 0 {
            return Err(Error::InvalidRequest("combo round needs combo_exers > 0".into()));
        }
        if round.reps.len() != round.exercise_ids.len() {
            return Err(Error::InvalidRequest(format!(
                "combo round has {} rep targets for {} exercises",
                round.reps.len(),
                round.exercise_ids.len()
            )));
        }

        let exercises = round
            .exercise_ids
            .iter()
            .map(|id| self.exercise(id))
            .collect::<Result<Vec<_>>>()?;

        let (transitions, working) = self.transition_chain(&exercises, round.times.exercise_per_set)?;
        if working <= 0.0 {
            return Err(Error::Allocation(format!(
                "transitions consume the whole {}s combo set",
                round.times.exercise_per_set
            )));
        }

        let per_exercise = working / round.times.combo_exers as f64;
        let counts = carry_reps(&round.reps)?;
        let set_count = round.times.sets as usize;

        let chain = |lead: &dyn Fn(u32) -> Lead| -> Result<Set> {
            let sets = exercises
                .iter()
                .zip(&counts)
                .map(|(exercise, &n)| self.composer.exercise_set(exercise, n, per_exercise, lead(n)))
                .collect::<Result<Vec<_>>>()?;
            combine_sets(sets, &transitions)
        };

        let (sets, set_sequence) = if exercises.iter().any(|e| e.is_dual()) {
            let first = chain(&|_| Lead::First)?;
            let mirrored = chain(&Lead::for_count)?;
            (vec![first, mirrored], alternating_sequence(set_count))
        } else {
            (vec![chain(&|_| Lead::First)?], uniform_sequence(set_count))
        };

        tracing::debug!(
            "Combo of {} exercises: {:.2}s working, {} variant(s)",
            exercises.len(),
            working,
            sets.len()
        );

        Ok(RoundPlan {
            sets,
            set_sequence,
            reps: counts,
            split_pairs: None,
        })
    }

    /// Two exercises repeated as one giant rep
    pub fn split(&self, round: &WorkoutRound) -> Result<RoundPlan> {
        let (a, b) = match round.exercise_ids.as_slice() {
            [a, b] => (self.exercise(a)?, self.exercise(b)?),
            ids => {
                return Err(Error::InvalidRequest(format!(
                    "split round needs exactly two exercises, got {}",
                    ids.len()
                )))
            }
        };
        let target = match round.reps.first() {
            Some(target) => self.rounding.rep_target(*target)?,
            None => return Err(Error::InvalidRequest("split round has no rep target".into())),
        };

        let sets = target
            .counts()
            .into_iter()
            .map(|n| {
                self.split_set(a, b, round.times.exercise_per_set, n)
                    .map(|split| split.set)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RoundPlan {
            sets,
            set_sequence: target.set_sequence(round.times.sets as usize),
            reps: target.counts(),
            split_pairs: Some([a.is_dual(), b.is_dual()]),
        })
    }

    /// Giant rep A, A→B, B, B→A repeated `reps` times inside `budget`
    pub fn split_set(&self, a: &Exercise, b: &Exercise, budget: f64, reps: u32) -> Result<SplitSet> {
        if reps == 0 {
            return Err(Error::InvalidRequest("split set needs at least one rep".into()));
        }
        let matrix = self.composer.catalog().transitions()?;

        let desired = budget / reps as f64;
        let natural_a = a.natural_cycle_secs();
        let natural_b = b.natural_cycle_secs();
        let natural = matrix.lookup(a.parent, b.parent, SpeedTier::Regular)?.full_time
            + matrix.lookup(b.parent, a.parent, SpeedTier::Regular)?.full_time
            + natural_a
            + natural_b;

        let speed = SpeedTier::select(desired, natural, self.speed_tolerance);
        let there = matrix.lookup(a.parent, b.parent, speed)?;
        let back = matrix.lookup(b.parent, a.parent, speed)?;

        let exercise_time = desired - there.full_time - back.full_time;
        if exercise_time <= 0.0 {
            return Err(Error::Allocation(format!(
                "{:?} transitions leave no time in a {:.2}s split rep",
                speed, desired
            )));
        }

        let share_a = natural_a / (natural_a + natural_b);
        let rep_a = self.split_side(a, share_a * exercise_time)?;
        let rep_b = self.split_side(b, (1.0 - share_a) * exercise_time)?;

        let giant = combine_reps(
            combine_reps(rep_a, self.composer.transition_rep(there)?),
            combine_reps(rep_b, self.composer.transition_rep(back)?),
        );

        tracing::debug!(
            "Split {} + {}: {:.2}s per rep vs {:.2}s natural, {:?} transitions",
            a.id,
            b.id,
            desired,
            natural,
            speed
        );

        let set = Set {
            full_time: giant.full_time * reps as f64,
            reps: vec![giant],
            rep_sequence: uniform_sequence(reps as usize),
            rep_count: reps as usize,
            position_init: self.composer.start_frames(a)?,
            position_end: self.composer.start_frames(b)?,
        };

        Ok(SplitSet { set, speed })
    }

    /// One exercise's part of a giant rep; both sides of a dual-position
    /// exercise share its time equally
    fn split_side(&self, exercise: &Exercise, time: f64) -> Result<Rep> {
        match exercise.arity() {
            Arity::Single(positions) => self.composer.exercise_rep(exercise, positions, time),
            Arity::Dual(first, second) => Ok(combine_reps(
                self.composer.exercise_rep(exercise, first, time / 2.0)?,
                self.composer.exercise_rep(exercise, second, time / 2.0)?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;
    use crate::composer::tests::{catalog_with, exercise, position};
    use crate::config::PacingConfig;
    use crate::request::tests::round;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_regular_whole_scenario() {
        let catalog = catalog_with(vec![exercise("a", 2.0, 6.0)]);
        let pacing = PacingConfig::default();
        let composer = Composer::new(&catalog, Resolution::High, &pacing);
        let builder = RoundBuilder::new(&composer, RoundingPolicy::default(), 0.05);

        let plan = builder.build(&round(RoundKind::Regular, &["a"], &[4.2])).unwrap();
        assert_eq!(plan.sets.len(), 1);
        assert_eq!(plan.sets[0].rep_count, 4);
        assert_eq!(plan.sets[0].rep_sequence, vec![0, 0, 0, 0]);
        assert!(approx(plan.sets[0].reps[0].full_time, 3.75));
        assert_eq!(plan.set_sequence, vec![0, 0, 0]);
        assert_eq!(plan.reps, vec![4]);
    }

    #[test]
    fn test_regular_half_scenario() {
        let catalog = catalog_with(vec![exercise("a", 2.0, 6.0)]);
        let pacing = PacingConfig::default();
        let composer = Composer::new(&catalog, Resolution::High, &pacing);
        let builder = RoundBuilder::new(&composer, RoundingPolicy::default(), 0.05);

        let plan = builder.build(&round(RoundKind::Regular, &["a"], &[4.5])).unwrap();
        assert_eq!(plan.sets.len(), 2);
        assert_eq!(plan.sets[0].rep_count, 4);
        assert_eq!(plan.sets[1].rep_count, 5);
        assert_eq!(plan.set_sequence, vec![0, 1, 0]);
        assert_eq!(plan.reps, vec![4, 5]);
    }

    #[test]
    fn test_regular_dual_parity() {
        let mut lunge = exercise("lunge", 2.0, 5.0);
        lunge.positions1 = vec![position("left", 1.0)];
        lunge.positions2 = vec![position("right", 1.0)];
        let catalog = catalog_with(vec![lunge]);
        let pacing = PacingConfig::default();
        let composer = Composer::new(&catalog, Resolution::High, &pacing);
        let builder = RoundBuilder::new(&composer, RoundingPolicy::default(), 0.05);

        let even = builder.build(&round(RoundKind::Regular, &["lunge"], &[6.2])).unwrap();
        assert_eq!(even.sets.len(), 1);
        assert_eq!(even.set_sequence, vec![0, 0, 0]);
        assert_eq!(even.reps, vec![6]);
        assert_eq!(even.sets[0].reps[0].positions[0], vec!["right-high.png".to_string()]);

        let odd = builder.build(&round(RoundKind::Regular, &["lunge"], &[4.6])).unwrap();
        assert_eq!(odd.sets.len(), 2);
        assert_eq!(odd.set_sequence, vec![0, 1, 0]);
        assert_eq!(odd.sets[0].reps[0], odd.sets[1].reps[1]);
        assert_eq!(odd.sets[0].reps[1], odd.sets[1].reps[0]);
        assert_eq!(odd.sets[0].reps[0].positions[0], vec!["right-high.png".to_string()]);
        assert_eq!(odd.sets[1].reps[0].positions[0], vec!["left-high.png".to_string()]);
    }

    #[test]
    fn test_carry_reps() {
        // 2.4 -> 2, carry 7/6; 2.2 * 7/6 ~ 2.57 -> 3, carry 7/11; 2.2 * 7/11 = 1.4 -> 1
        assert_eq!(carry_reps(&[2.4, 2.2, 2.2]).unwrap(), vec![2, 3, 1]);
        assert_eq!(carry_reps(&[5.0, 5.0]).unwrap(), vec![5, 5]);
        assert!(matches!(carry_reps(&[4.0, 0.0]), Err(Error::InvalidRequest(_))));
        assert!(matches!(carry_reps(&[0.3]), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_combo_sum_includes_transitions() {
        let catalog = sample_catalog();
        let pacing = PacingConfig::default();
        let composer = Composer::new(catalog, Resolution::Mid, &pacing);
        let builder = RoundBuilder::new(&composer, RoundingPolicy::default(), 0.05);

        let mut combo = round(RoundKind::Combo, &["pushup", "squat", "crunch"], &[5.0, 5.0, 5.0]);
        combo.times.exercise_per_set = 60.0;
        let plan = builder.build(&combo).unwrap();

        assert_eq!(plan.sets.len(), 1);
        assert_eq!(plan.set_sequence, vec![0, 0, 0]);

        let exercises: Vec<&Exercise> = ["pushup", "squat", "crunch"]
            .iter()
            .map(|id| catalog.exercise(id).unwrap())
            .collect();
        let (transitions, working) = builder.transition_chain(&exercises, 60.0).unwrap();
        assert_eq!(transitions.len(), 2);

        let parts: f64 = exercises
            .iter()
            .map(|e| {
                composer
                    .single_rep_set(e, 5, working / 3.0)
                    .unwrap()
                    .full_time
            })
            .sum();
        let transition_time: f64 = transitions.iter().map(|t| t.full_time).sum();

        let set = &plan.sets[0];
        assert!(approx(set.full_time, parts + transition_time));
        assert_eq!(set.rep_count, 5 + 1 + 5 + 1 + 5);
        assert!(set.is_consistent());
        assert!(approx(set.sequenced_time(), set.full_time));
    }

    #[test]
    fn test_combo_with_dual_builds_mirrored_variant() {
        let catalog = sample_catalog();
        let pacing = PacingConfig::default();
        let composer = Composer::new(catalog, Resolution::High, &pacing);
        let builder = RoundBuilder::new(&composer, RoundingPolicy::default(), 0.05);

        let mut combo = round(RoundKind::Combo, &["squat", "lunge"], &[4.0, 5.0]);
        combo.times.exercise_per_set = 40.0;
        let plan = builder.build(&combo).unwrap();

        assert_eq!(plan.sets.len(), 2);
        assert_eq!(plan.set_sequence, vec![0, 1, 0]);
        assert_eq!(plan.reps, vec![4, 5]);

        // squat (1) + transition (1) + two lunge sides; odd lunge count flips the lead
        let first = &plan.sets[0];
        let mirrored = &plan.sets[1];
        assert_eq!(first.reps.len(), 4);
        assert_eq!(first.reps[2], mirrored.reps[3]);
        assert_eq!(first.reps[3], mirrored.reps[2]);
        assert!(first.is_consistent() && mirrored.is_consistent());
    }

    #[test]
    fn test_combo_transitions_exceeding_budget() {
        let catalog = sample_catalog();
        let pacing = PacingConfig::default();
        let composer = Composer::new(catalog, Resolution::High, &pacing);
        let builder = RoundBuilder::new(&composer, RoundingPolicy::default(), 0.05);

        let mut combo = round(RoundKind::Combo, &["pushup", "plank"], &[3.0, 3.0]);
        combo.times.exercise_per_set = 1.0;
        assert!(matches!(builder.build(&combo), Err(Error::Allocation(_))));
    }

    #[test]
    fn test_split_budget_identity_and_single_tier() {
        let catalog = sample_catalog();
        let pacing = PacingConfig::default();
        let composer = Composer::new(catalog, Resolution::High, &pacing);
        let builder = RoundBuilder::new(&composer, RoundingPolicy::default(), 0.05);
        let matrix = catalog.transitions().unwrap();

        let pairs = [("squat", "pushup"), ("lunge", "burpee"), ("mountain-climber", "lunge")];
        for (a_id, b_id) in pairs {
            let a = catalog.exercise(a_id).unwrap();
            let b = catalog.exercise(b_id).unwrap();
            for reps in 2..12u32 {
                let budget = 60.0;
                let split = builder.split_set(a, b, budget, reps).unwrap();
                let there = matrix.lookup(a.parent, b.parent, split.speed).unwrap();
                let back = matrix.lookup(b.parent, a.parent, split.speed).unwrap();

                let giant = &split.set.reps[0];
                let exercise_time = giant.full_time - there.full_time - back.full_time;
                assert!(approx(
                    there.full_time + back.full_time + exercise_time,
                    budget / reps as f64
                ));
                assert!(approx(giant.position_total(), giant.full_time));
                assert_eq!(split.set.rep_sequence.len(), reps as usize);
            }
        }
    }

    #[test]
    fn test_split_speed_follows_desired_pace() {
        let catalog = sample_catalog();
        let pacing = PacingConfig::default();
        let composer = Composer::new(catalog, Resolution::High, &pacing);
        let builder = RoundBuilder::new(&composer, RoundingPolicy::default(), 0.05);
        let squat = catalog.exercise("squat").unwrap();
        let pushup = catalog.exercise("pushup").unwrap();

        // adjacent categories: 1.25s each way at regular speed
        let natural = 2.0 * 1.25 + squat.natural_rep_secs() + pushup.natural_rep_secs();

        let slow = builder.split_set(squat, pushup, natural * 1.2 * 4.0, 4).unwrap();
        assert_eq!(slow.speed, SpeedTier::Slow);

        let regular = builder.split_set(squat, pushup, natural * 4.0, 4).unwrap();
        assert_eq!(regular.speed, SpeedTier::Regular);

        let fast = builder.split_set(squat, pushup, natural * 0.8 * 4.0, 4).unwrap();
        assert_eq!(fast.speed, SpeedTier::Fast);
    }

    #[test]
    fn test_split_round_pairs_and_alternation() {
        let catalog = sample_catalog();
        let pacing = PacingConfig::default();
        let composer = Composer::new(catalog, Resolution::High, &pacing);
        let builder = RoundBuilder::new(&composer, RoundingPolicy::default(), 0.05);

        let mut split = round(RoundKind::Split, &["squat", "lunge"], &[3.5, 3.5]);
        split.times.exercise_per_set = 45.0;
        let plan = builder.build(&split).unwrap();

        assert_eq!(plan.split_pairs, Some([false, true]));
        assert_eq!(plan.reps, vec![3, 4]);
        assert_eq!(plan.set_sequence, vec![0, 1, 0]);
        assert_eq!(plan.sets[0].rep_sequence, vec![0, 0, 0]);
        assert_eq!(plan.sets[1].rep_count, 4);

        let three = round(RoundKind::Split, &["squat"], &[3.0]);
        assert!(matches!(builder.build(&three), Err(Error::InvalidRequest(_))));
    }
}
