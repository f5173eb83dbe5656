//! Core domain types for the routine composition engine.
//!
//! This module defines:
//! - Catalog records (image sets, exercises, stretches, transitions)
//! - Timed output structures (reps, sets, rounds, full routines)
//! - The in-memory catalog resolved for one request

use crate::transition::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Resolution
// ============================================================================

/// Image fidelity tier emitted for every position
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(from = "String")]
pub enum Resolution {
    Low,
    Mid,
    #[default]
    High,
    Original,
}

impl Resolution {
    /// Parse a tier name, falling back to `High` for anything unrecognized.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => Resolution::Low,
            "mid" | "medium" => Resolution::Mid,
            "high" => Resolution::High,
            "original" => Resolution::Original,
            _ => Resolution::default(),
        }
    }
}

impl From<String> for Resolution {
    fn from(value: String) -> Self {
        Resolution::parse_or_default(&value)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resolution::Low => "Low",
            Resolution::Mid => "Mid",
            Resolution::High => "High",
            Resolution::Original => "Original",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Catalog Types
// ============================================================================

/// One physical position rendered at four fidelities
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub low: Vec<String>,
    #[serde(default)]
    pub mid: Vec<String>,
    #[serde(default)]
    pub high: Vec<String>,
    #[serde(default)]
    pub original: Vec<String>,
}

impl ImageSet {
    /// Frame identifiers for a resolution tier
    pub fn frames(&self, resolution: Resolution) -> &[String] {
        match resolution {
            Resolution::Low => &self.low,
            Resolution::Mid => &self.mid,
            Resolution::High => &self.high,
            Resolution::Original => &self.original,
        }
    }
}

/// A position within an exercise rep
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerPosition {
    pub image_set: String,
    /// Share of the rep's non-hardcoded time
    #[serde(default)]
    pub percent_secs: f64,
    /// Literal hold duration; when set, `percent_secs` is ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardcoded_secs: Option<f64>,
}

/// A position within a dynamic stretch rep
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StrPosition {
    pub image_set: String,
    pub percent_secs: f64,
}

/// Whether a movement works one side or alternates between two
#[derive(Debug)]
pub enum Arity<'a, P> {
    Single(&'a [P]),
    Dual(&'a [P], &'a [P]),
}

/// An exercise definition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub parent: Category,
    /// Neutral/start pose
    pub start_image_set: String,
    pub min_secs: f64,
    pub max_secs: f64,
    pub positions1: Vec<ExerPosition>,
    #[serde(default)]
    pub positions2: Vec<ExerPosition>,
    #[serde(default)]
    pub sample_id: String,
}

impl Exercise {
    pub fn arity(&self) -> Arity<'_, ExerPosition> {
        if self.positions2.is_empty() {
            Arity::Single(&self.positions1)
        } else {
            Arity::Dual(&self.positions1, &self.positions2)
        }
    }

    pub fn is_dual(&self) -> bool {
        matches!(self.arity(), Arity::Dual(..))
    }

    /// Midpoint of the allowed per-rep pace
    pub fn natural_rep_secs(&self) -> f64 {
        (self.min_secs + self.max_secs) / 2.0
    }

    /// Natural duration of one full cycle (both sides for dual movements)
    pub fn natural_cycle_secs(&self) -> f64 {
        match self.arity() {
            Arity::Single(_) => self.natural_rep_secs(),
            Arity::Dual(..) => 2.0 * self.natural_rep_secs(),
        }
    }
}

/// A dynamic stretch definition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DynamicStr {
    pub id: String,
    pub name: String,
    /// Natural cycle duration
    pub secs: f64,
    pub positions1: Vec<StrPosition>,
    #[serde(default)]
    pub positions2: Vec<StrPosition>,
    /// Dual-position stretches: do all of side one, then all of side two
    #[serde(default)]
    pub separate_sets: bool,
    #[serde(default)]
    pub sample_id: String,
}

impl DynamicStr {
    pub fn arity(&self) -> Arity<'_, StrPosition> {
        if self.positions2.is_empty() {
            Arity::Single(&self.positions1)
        } else {
            Arity::Dual(&self.positions1, &self.positions2)
        }
    }
}

/// A static stretch definition (one hold, or one hold per side)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StaticStr {
    pub id: String,
    pub name: String,
    pub image_set1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_set2: Option<String>,
    #[serde(default)]
    pub sample_id: String,
}

/// Canonical movement between two exercise categories
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct TransitionRep {
    pub image_set_ids: Vec<String>,
    pub times: Vec<f64>,
    pub full_time: f64,
}

/// Three 11×11 transition tables, rows are the source category
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct TransitionMatrix {
    pub slow: Vec<Vec<TransitionRep>>,
    pub regular: Vec<Vec<TransitionRep>>,
    pub fast: Vec<Vec<TransitionRep>>,
}

// ============================================================================
// Timed Output Types
// ============================================================================

/// One repetition: ordered positions (frame lists) with hold durations
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Rep {
    pub positions: Vec<Vec<String>>,
    pub times: Vec<f64>,
    pub full_time: f64,
}

impl Rep {
    /// Sum of the per-position durations
    pub fn position_total(&self) -> f64 {
        self.times.iter().sum()
    }
}

/// Rep variants plus the order they are played in
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Set {
    pub reps: Vec<Rep>,
    pub rep_sequence: Vec<usize>,
    pub rep_count: usize,
    pub full_time: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub position_init: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub position_end: Vec<String>,
}

impl Set {
    /// Duration implied by playing `rep_sequence` through the stored rep totals
    pub fn sequenced_time(&self) -> f64 {
        self.rep_sequence
            .iter()
            .filter_map(|&i| self.reps.get(i))
            .map(|rep| rep.full_time)
            .sum()
    }

    /// Duration implied by the per-position holds of every played rep
    pub fn position_time(&self) -> f64 {
        self.rep_sequence
            .iter()
            .filter_map(|&i| self.reps.get(i))
            .map(Rep::position_total)
            .sum()
    }

    /// Sequence length matches the count and every index is in range
    pub fn is_consistent(&self) -> bool {
        self.rep_sequence.len() == self.rep_count
            && self.rep_sequence.iter().all(|&i| i < self.reps.len())
    }
}

/// Round strategy requested by the caller
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String")]
pub enum RoundKind {
    Regular,
    Combo,
    Split,
}

impl RoundKind {
    /// Parse a round kind; anything that is not Regular or Combo is a Split round.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "regular" => RoundKind::Regular,
            "combo" => RoundKind::Combo,
            "split" => RoundKind::Split,
            other => {
                tracing::warn!("Unknown round kind '{}', composing it as a Split round", other);
                RoundKind::Split
            }
        }
    }
}

impl From<String> for RoundKind {
    fn from(value: String) -> Self {
        RoundKind::parse_or_default(&value)
    }
}

/// One composed training round
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WoRound {
    pub names: Vec<String>,
    pub sample_ids: Vec<String>,
    pub kind: RoundKind,
    pub set_count: usize,
    pub full_time: f64,
    pub rest_per_round: f64,
    pub rest_per_set: f64,
    pub exercise_per_set: f64,
    pub sets: Vec<Set>,
    pub set_sequence: Vec<usize>,
    /// Displayed rep counts (per exercise, or per variant)
    pub reps: Vec<u32>,
    /// Split rounds: which of the two exercises is dual-position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_pairs: Option<[bool; 2]>,
}

impl WoRound {
    /// Working time across all played sets, from stored set totals
    pub fn sequenced_time(&self) -> f64 {
        self.set_sequence
            .iter()
            .filter_map(|&i| self.sets.get(i))
            .map(|set| set.full_time)
            .sum()
    }
}

/// A run of stretches (one set per stretch)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct StretchBlock {
    pub sets: Vec<Set>,
    pub names: Vec<String>,
    pub sample_ids: Vec<String>,
}

/// Standalone positions shown between or after blocks
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Markers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congrats: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standing: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resting: Option<Vec<String>>,
}

impl Markers {
    pub fn frames(&self) -> impl Iterator<Item = &String> {
        [&self.congrats, &self.standing, &self.resting]
            .into_iter()
            .flatten()
            .flatten()
    }
}

/// A full exercise workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Workout {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub dynamics: StretchBlock,
    pub statics: StretchBlock,
    pub dynamic_time: f64,
    pub static_time: f64,
    pub dynamic_rest: f64,
    pub rounds: Vec<WoRound>,
    pub markers: Markers,
    /// Every frame referenced anywhere above, deduplicated
    pub media: Vec<String>,
}

/// A stretch-only routine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StretchWorkout {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub dynamics: StretchBlock,
    pub statics: StretchBlock,
    pub round_time: f64,
    pub markers: Markers,
    pub media: Vec<String>,
}

/// A labelled group of sets inside a routine
#[derive(Clone, Copy, Debug)]
pub struct Section<'a> {
    pub label: &'a str,
    pub index: usize,
    pub sets: &'a [Set],
}

/// Shared read access to composed routines
pub trait Routine {
    fn sections(&self) -> Vec<Section<'_>>;
    fn markers(&self) -> &Markers;
}

impl Routine for Workout {
    fn sections(&self) -> Vec<Section<'_>> {
        let mut sections = vec![
            Section {
                label: "dynamic",
                index: 0,
                sets: &self.dynamics.sets,
            },
            Section {
                label: "static",
                index: 0,
                sets: &self.statics.sets,
            },
        ];
        sections.extend(self.rounds.iter().enumerate().map(|(i, round)| Section {
            label: "round",
            index: i + 1,
            sets: &round.sets,
        }));
        sections
    }

    fn markers(&self) -> &Markers {
        &self.markers
    }
}

impl Routine for StretchWorkout {
    fn sections(&self) -> Vec<Section<'_>> {
        vec![
            Section {
                label: "dynamic",
                index: 0,
                sets: &self.dynamics.sets,
            },
            Section {
                label: "static",
                index: 0,
                sets: &self.statics.sets,
            },
        ]
    }

    fn markers(&self) -> &Markers {
        &self.markers
    }
}

/// Per-section working time of a workout
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineTotals {
    pub dynamic: f64,
    pub statics: f64,
    pub rounds: Vec<f64>,
}

impl TimelineTotals {
    /// Totals as recorded in the `full_time` fields
    pub fn stored(workout: &Workout) -> Self {
        Self {
            dynamic: workout.dynamics.sets.iter().map(|s| s.full_time).sum(),
            statics: workout.statics.sets.iter().map(|s| s.full_time).sum(),
            rounds: workout.rounds.iter().map(WoRound::sequenced_time).collect(),
        }
    }

    /// Totals rebuilt from the per-position holds
    pub fn recomputed(workout: &Workout) -> Self {
        let round_time = |round: &WoRound| -> f64 {
            round
                .set_sequence
                .iter()
                .filter_map(|&i| round.sets.get(i))
                .map(Set::position_time)
                .sum()
        };

        Self {
            dynamic: workout.dynamics.sets.iter().map(Set::position_time).sum(),
            statics: workout.statics.sets.iter().map(Set::position_time).sum(),
            rounds: workout.rounds.iter().map(round_time).collect(),
        }
    }

    /// Component-wise comparison within `tolerance` seconds
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.dynamic - other.dynamic).abs() <= tolerance
            && (self.statics - other.statics).abs() <= tolerance
            && self.rounds.len() == other.rounds.len()
            && self
                .rounds
                .iter()
                .zip(&other.rounds)
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

// ============================================================================
// Catalog Type
// ============================================================================

/// Catalog records resolved for one request
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub image_sets: HashMap<String, ImageSet>,
    pub exercises: HashMap<String, Exercise>,
    pub dynamics: HashMap<String, DynamicStr>,
    pub statics: HashMap<String, StaticStr>,
    pub transitions: Option<TransitionMatrix>,
}
