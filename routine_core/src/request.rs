//! Request bodies accepted by the assembler.
//!
//! Requests are deserialized from JSON and checked with `validate()` before
//! any catalog access, so structural problems surface as bad requests
//! instead of half-built routines.

use crate::{Error, Resolution, Result, RoundKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Most exercise rounds a single workout may carry
pub const MAX_ROUNDS: usize = 9;

/// Upper bounds on request sizes; anything past these is a malformed request
pub const MAX_SETS: u32 = 100;
pub const MAX_REP_TARGET: f64 = 1000.0;
/// One hour, for any single stretch or exercise set
pub const MAX_SET_SECS: f64 = 3600.0;

/// Time budget for the stretch blocks
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StretchTimes {
    /// Seconds per dynamic stretch, parallel to the dynamic id list
    pub dynamic_per_set: Vec<f64>,
    /// Seconds per static stretch, parallel to the static id list
    pub static_per_set: Vec<f64>,
    #[serde(default)]
    pub dynamic_sets: u32,
    #[serde(default)]
    pub static_sets: u32,
    #[serde(default)]
    pub dynamic_rest: f64,
    pub full_round: f64,
}

/// Stretch-only routine request
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StretchWorkoutRoute {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    pub dynamics: Vec<String>,
    pub statics: Vec<String>,
    pub stretch_times: StretchTimes,
}

/// Time budget for one exercise round
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseTimes {
    pub exercise_per_set: f64,
    #[serde(default)]
    pub rest_per_set: f64,
    pub sets: u32,
    #[serde(default)]
    pub rest_per_round: f64,
    pub full_round: f64,
    /// Number of exercises sharing the working time of a combo set
    #[serde(default)]
    pub combo_exers: u32,
}

/// One requested exercise round
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutRound {
    pub exercise_ids: Vec<String>,
    /// Raw rep targets, parallel to `exercise_ids`
    pub reps: Vec<f64>,
    #[serde(default)]
    pub pairs: Vec<bool>,
    #[serde(alias = "status")]
    pub kind: RoundKind,
    pub times: ExerciseTimes,
}

/// Full workout request
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutRoute {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    pub dynamics: Vec<String>,
    pub statics: Vec<String>,
    pub stretch_times: StretchTimes,
    /// 1 lifts every exercise's pace ceiling
    #[serde(default)]
    pub difficulty: u8,
    pub rounds: Vec<WorkoutRound>,
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn check_stretch_lists(
    dynamics: &[String],
    statics: &[String],
    times: &StretchTimes,
    problems: &mut Vec<String>,
) {
    if dynamics.is_empty() {
        problems.push("no dynamic stretches requested".into());
    }
    if statics.is_empty() {
        problems.push("no static stretches requested".into());
    }
    if times.dynamic_per_set.len() != dynamics.len() {
        problems.push(format!(
            "dynamic_per_set has {} entries for {} dynamic stretches",
            times.dynamic_per_set.len(),
            dynamics.len()
        ));
    }
    if times.static_per_set.len() != statics.len() {
        problems.push(format!(
            "static_per_set has {} entries for {} static stretches",
            times.static_per_set.len(),
            statics.len()
        ));
    }
    if times
        .dynamic_per_set
        .iter()
        .chain(&times.static_per_set)
        .any(|t| !positive(*t))
    {
        problems.push("stretch set times must be positive".into());
    }
    if times
        .dynamic_per_set
        .iter()
        .chain(&times.static_per_set)
        .any(|t| *t > MAX_SET_SECS)
    {
        problems.push(format!("stretch set times must be at most {}s", MAX_SET_SECS));
    }
    if !positive(times.full_round) {
        problems.push("stretch full_round must be positive".into());
    }
}

fn into_result(problems: Vec<String>) -> Result<()> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidRequest(problems.join("; ")))
    }
}

impl StretchWorkoutRoute {
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        check_stretch_lists(&self.dynamics, &self.statics, &self.stretch_times, &mut problems);
        into_result(problems)
    }
}

impl WorkoutRound {
    fn problems(&self, index: usize) -> Vec<String> {
        let mut problems = Vec::new();
        let label = format!("round {}", index + 1);

        if self.exercise_ids.is_empty() {
            problems.push(format!("{} has no exercises", label));
        }
        if self.reps.len() != self.exercise_ids.len() {
            problems.push(format!(
                "{} has {} rep targets for {} exercises",
                label,
                self.reps.len(),
                self.exercise_ids.len()
            ));
        }
        if self.reps.iter().any(|r| !positive(*r)) {
            problems.push(format!("{} rep targets must be positive", label));
        }
        if self.reps.iter().any(|r| *r > MAX_REP_TARGET) {
            problems.push(format!("{} rep targets must be at most {}", label, MAX_REP_TARGET));
        }
        if self.times.sets == 0 {
            problems.push(format!("{} must have at least one set", label));
        }
        if self.times.sets > MAX_SETS {
            problems.push(format!(
                "{} has {} sets, at most {} allowed",
                label, self.times.sets, MAX_SETS
            ));
        }
        if !positive(self.times.exercise_per_set) {
            problems.push(format!("{} exercise_per_set must be positive", label));
        } else if self.times.exercise_per_set > MAX_SET_SECS {
            problems.push(format!(
                "{} exercise_per_set must be at most {}s",
                label, MAX_SET_SECS
            ));
        }

        match self.kind {
            RoundKind::Regular if self.exercise_ids.len() != 1 => {
                problems.push(format!("{} is Regular and needs exactly one exercise", label));
            }
            RoundKind::Combo if self.times.combo_exers == 0 => {
                problems.push(format!("{} is Combo and needs combo_exers > 0", label));
            }
            RoundKind::Split if self.exercise_ids.len() != 2 => {
                problems.push(format!("{} is Split and needs exactly two exercises", label));
            }
            _ => {}
        }

        problems
    }
}

impl WorkoutRoute {
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        check_stretch_lists(&self.dynamics, &self.statics, &self.stretch_times, &mut problems);

        if self.rounds.is_empty() {
            problems.push("no exercise rounds requested".into());
        }
        if self.rounds.len() > MAX_ROUNDS {
            problems.push(format!(
                "{} rounds requested, at most {} allowed",
                self.rounds.len(),
                MAX_ROUNDS
            ));
        }
        for (i, round) in self.rounds.iter().enumerate() {
            problems.extend(round.problems(i));
        }

        into_result(problems)
    }

    /// Every exercise id named by any round, first-seen order
    pub fn exercise_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for id in self.rounds.iter().flat_map(|r| &r.exercise_ids) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}
