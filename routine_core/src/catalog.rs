//! Catalog lookups, validation and the built-in sample catalog.
//!
//! The sample catalog covers every record type the engine consumes and a
//! complete transition matrix, so routines can be generated without an
//! external document store (`routine catalog init` writes it to disk).

use crate::store::Collection;
use crate::transition::{Category, SpeedTier};
use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Cached sample catalog - built once and reused across all operations
static SAMPLE_CATALOG: Lazy<Catalog> = Lazy::new(build_sample_catalog);

/// Get a reference to the cached sample catalog
pub fn sample_catalog() -> &'static Catalog {
    &SAMPLE_CATALOG
}

/// Tolerance for position shares that should add up to one
const SHARE_TOLERANCE: f64 = 0.01;

fn missing(kind: &str, id: &str) -> Error {
    Error::IncompleteCatalog(format!("{} '{}' not found", kind, id))
}

impl Catalog {
    pub fn image_set(&self, id: &str) -> Result<&ImageSet> {
        self.image_sets.get(id).ok_or_else(|| missing("image set", id))
    }

    pub fn exercise(&self, id: &str) -> Result<&Exercise> {
        self.exercises.get(id).ok_or_else(|| missing("exercise", id))
    }

    pub fn dynamic(&self, id: &str) -> Result<&DynamicStr> {
        self.dynamics.get(id).ok_or_else(|| missing("dynamic stretch", id))
    }

    pub fn static_stretch(&self, id: &str) -> Result<&StaticStr> {
        self.statics.get(id).ok_or_else(|| missing("static stretch", id))
    }

    pub fn transitions(&self) -> Result<&TransitionMatrix> {
        self.transitions
            .as_ref()
            .ok_or_else(|| Error::IncompleteCatalog("transition matrix not loaded".into()))
    }

    /// Copy of the catalog with every exercise's pace ceiling raised to
    /// `ceiling` seconds
    pub fn with_unbounded_pace(&self, ceiling: f64) -> Catalog {
        let mut catalog = self.clone();
        for exercise in catalog.exercises.values_mut() {
            exercise.max_secs = exercise.max_secs.max(ceiling);
        }
        catalog
    }

    /// Image sets referenced by the loaded exercises and stretches but absent
    /// from `image_sets`, sorted and deduplicated
    pub fn missing_image_sets(&self) -> Vec<String> {
        let exercises = self.exercises.values().flat_map(|e| {
            std::iter::once(&e.start_image_set)
                .chain(e.positions1.iter().chain(&e.positions2).map(|p| &p.image_set))
        });
        let dynamics = self
            .dynamics
            .values()
            .flat_map(|d| d.positions1.iter().chain(&d.positions2).map(|p| &p.image_set));
        let statics = self
            .statics
            .values()
            .flat_map(|s| std::iter::once(&s.image_set1).chain(s.image_set2.as_ref()));

        let missing: BTreeSet<&String> = exercises
            .chain(dynamics)
            .chain(statics)
            .filter(|id| !self.image_sets.contains_key(*id))
            .collect();
        missing.into_iter().cloned().collect()
    }

    /// Validate the catalog for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, image_set) in &self.image_sets {
            if id != &image_set.id {
                errors.push(format!(
                    "Image set key '{}' doesn't match image_set.id '{}'",
                    id, image_set.id
                ));
            }
            let tiers = [&image_set.low, &image_set.mid, &image_set.high, &image_set.original];
            if tiers.iter().all(|frames| frames.is_empty()) {
                errors.push(format!("Image set '{}' has no frames", id));
            }
        }

        for (id, exercise) in &self.exercises {
            if id != &exercise.id {
                errors.push(format!(
                    "Exercise key '{}' doesn't match exercise.id '{}'",
                    id, exercise.id
                ));
            }
            if exercise.name.is_empty() {
                errors.push(format!("Exercise '{}' has empty name", id));
            }
            if exercise.min_secs <= 0.0 {
                errors.push(format!("Exercise '{}': min_secs must be positive", id));
            }
            if exercise.min_secs > exercise.max_secs {
                errors.push(format!(
                    "Exercise '{}': min_secs {} > max_secs {}",
                    id, exercise.min_secs, exercise.max_secs
                ));
            }
            if !self.image_sets.contains_key(&exercise.start_image_set) {
                errors.push(format!(
                    "Exercise '{}' references non-existent start image set '{}'",
                    id, exercise.start_image_set
                ));
            }
            match exercise.arity() {
                Arity::Single(positions) => self.check_exer_positions(id, 1, positions, &mut errors),
                Arity::Dual(first, second) => {
                    self.check_exer_positions(id, 1, first, &mut errors);
                    self.check_exer_positions(id, 2, second, &mut errors);
                }
            }
        }

        for (id, dynamic) in &self.dynamics {
            if id != &dynamic.id {
                errors.push(format!(
                    "Dynamic stretch key '{}' doesn't match dynamic.id '{}'",
                    id, dynamic.id
                ));
            }
            if dynamic.secs <= 0.0 {
                errors.push(format!("Dynamic stretch '{}': secs must be positive", id));
            }
            let lists: Vec<&[StrPosition]> = match dynamic.arity() {
                Arity::Single(positions) => vec![positions],
                Arity::Dual(first, second) => vec![first, second],
            };
            for (n, positions) in lists.into_iter().enumerate() {
                if positions.is_empty() {
                    errors.push(format!("Dynamic stretch '{}' list {} is empty", id, n + 1));
                    continue;
                }
                let share: f64 = positions.iter().map(|p| p.percent_secs).sum();
                if (share - 1.0).abs() > SHARE_TOLERANCE {
                    errors.push(format!(
                        "Dynamic stretch '{}' list {} shares sum to {:.3}",
                        id,
                        n + 1,
                        share
                    ));
                }
                for p in positions {
                    self.check_image_ref("Dynamic stretch", id, &p.image_set, &mut errors);
                }
            }
        }

        for (id, stretch) in &self.statics {
            if id != &stretch.id {
                errors.push(format!(
                    "Static stretch key '{}' doesn't match static.id '{}'",
                    id, stretch.id
                ));
            }
            self.check_image_ref("Static stretch", id, &stretch.image_set1, &mut errors);
            if let Some(second) = &stretch.image_set2 {
                self.check_image_ref("Static stretch", id, second, &mut errors);
            }
        }

        match &self.transitions {
            None => errors.push("Catalog has no transition matrix".to_string()),
            Some(matrix) => {
                let shape = matrix.shape_errors();
                if shape.is_empty() {
                    self.check_transition_cells(matrix, &mut errors);
                }
                errors.extend(shape);
            }
        }

        errors
    }

    fn check_image_ref(&self, kind: &str, owner: &str, image_set: &str, errors: &mut Vec<String>) {
        if !self.image_sets.contains_key(image_set) {
            errors.push(format!(
                "{} '{}' references non-existent image set '{}'",
                kind, owner, image_set
            ));
        }
    }

    fn check_exer_positions(&self, id: &str, list: usize, positions: &[ExerPosition], errors: &mut Vec<String>) {
        if positions.is_empty() {
            errors.push(format!("Exercise '{}' position list {} is empty", id, list));
            return;
        }

        let mut share = 0.0;
        let mut weighted = 0;
        for p in positions {
            self.check_image_ref("Exercise", id, &p.image_set, errors);
            match p.hardcoded_secs {
                Some(secs) if secs <= 0.0 => errors.push(format!(
                    "Exercise '{}' hardcodes a nonpositive hold on '{}'",
                    id, p.image_set
                )),
                Some(_) => {}
                None => {
                    if p.percent_secs <= 0.0 {
                        errors.push(format!(
                            "Exercise '{}' gives '{}' a nonpositive share",
                            id, p.image_set
                        ));
                    }
                    share += p.percent_secs;
                    weighted += 1;
                }
            }
        }

        if weighted > 0 && (share - 1.0).abs() > SHARE_TOLERANCE {
            errors.push(format!(
                "Exercise '{}' list {} shares sum to {:.3}",
                id, list, share
            ));
        }
    }

    fn check_transition_cells(&self, matrix: &TransitionMatrix, errors: &mut Vec<String>) {
        for speed in [SpeedTier::Slow, SpeedTier::Regular, SpeedTier::Fast] {
            for from in Category::ALL {
                for to in Category::ALL {
                    let Ok(cell) = matrix.lookup(from, to, speed) else {
                        continue;
                    };
                    let label = format!("{:?} transition {} -> {}", speed, from, to);
                    if cell.times.len() != cell.image_set_ids.len() {
                        errors.push(format!("{} has mismatched positions and times", label));
                    }
                    let total: f64 = cell.times.iter().sum();
                    if cell.full_time <= 0.0 || (total - cell.full_time).abs() > 1e-6 {
                        errors.push(format!(
                            "{} full_time {} doesn't match its times ({})",
                            label, cell.full_time, total
                        ));
                    }
                    for image_set in &cell.image_set_ids {
                        self.check_image_ref("Transition", &label, image_set, errors);
                    }
                }
            }
        }
    }

    /// Write every collection as `<dir>/<collection>.json`
    pub fn write_to_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        write_records(dir, Collection::ImageSets, &self.image_sets, |r| &r.id)?;
        write_records(dir, Collection::Exercises, &self.exercises, |r| &r.id)?;
        write_records(dir, Collection::DynamicStretches, &self.dynamics, |r| &r.id)?;
        write_records(dir, Collection::StaticStretches, &self.statics, |r| &r.id)?;

        if let Some(matrix) = &self.transitions {
            let path = dir.join(Collection::Transitions.file_name());
            std::fs::write(&path, serde_json::to_string_pretty(matrix)?)?;
        }

        tracing::info!("Wrote catalog to {:?}", dir);
        Ok(())
    }
}

fn write_records<T: Serialize>(
    dir: &Path,
    collection: Collection,
    records: &HashMap<String, T>,
    id: impl Fn(&T) -> &String,
) -> Result<()> {
    let mut sorted: Vec<&T> = records.values().collect();
    sorted.sort_by(|a, b| id(a).cmp(id(b)));

    let path = dir.join(collection.file_name());
    std::fs::write(&path, serde_json::to_string_pretty(&sorted)?)?;
    Ok(())
}

// ============================================================================
// Sample catalog
// ============================================================================

fn frames(id: &str, tier: &str, count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("{}/{}/{}.webp", id, tier, n)).collect()
}

fn image_set(id: &str, name: &str, count: usize) -> ImageSet {
    ImageSet {
        id: id.into(),
        name: name.into(),
        low: frames(id, "low", count),
        mid: frames(id, "mid", count),
        high: frames(id, "high", count),
        original: frames(id, "original", count),
    }
}

fn share(image_set: &str, percent_secs: f64) -> ExerPosition {
    ExerPosition {
        image_set: image_set.into(),
        percent_secs,
        hardcoded_secs: None,
    }
}

fn hold(image_set: &str, secs: f64) -> ExerPosition {
    ExerPosition {
        image_set: image_set.into(),
        percent_secs: 0.0,
        hardcoded_secs: Some(secs),
    }
}

fn str_share(image_set: &str, percent_secs: f64) -> StrPosition {
    StrPosition {
        image_set: image_set.into(),
        percent_secs,
    }
}

#[allow(clippy::too_many_arguments)]
fn exercise(
    id: &str,
    name: &str,
    parent: Category,
    start: &str,
    min_secs: f64,
    max_secs: f64,
    positions1: Vec<ExerPosition>,
    positions2: Vec<ExerPosition>,
) -> Exercise {
    Exercise {
        id: id.into(),
        name: name.into(),
        parent,
        start_image_set: start.into(),
        min_secs,
        max_secs,
        positions1,
        positions2,
        sample_id: format!("sample-{}", id),
    }
}

fn transition_table(scale: f64) -> Vec<Vec<TransitionRep>> {
    (0..Category::COUNT)
        .map(|from| {
            (0..Category::COUNT)
                .map(|to| {
                    let secs = scale * (1.0 + 0.25 * from.abs_diff(to) as f64);
                    TransitionRep {
                        image_set_ids: vec!["transition-step".into()],
                        times: vec![secs],
                        full_time: secs,
                    }
                })
                .collect()
        })
        .collect()
}

/// Builds the sample catalog
///
/// **Note**: prefer `sample_catalog()`, which returns a cached reference.
pub fn build_sample_catalog() -> Catalog {
    let image_sets: HashMap<String, ImageSet> = [
        image_set("stand", "Standing Neutral", 1),
        image_set("standing-arms-bent", "Standing Arms Bent", 1),
        image_set("congrats", "Congrats Thumbs Up", 2),
        image_set("resting", "Resting Position", 1),
        image_set("transition-step", "Transition Step", 2),
        image_set("plank-high", "High Plank", 1),
        image_set("plank-low", "Low Plank", 1),
        image_set("plank-hold", "Forearm Plank", 1),
        image_set("squat-down", "Squat Bottom", 1),
        image_set("lunge-left", "Lunge Left Forward", 1),
        image_set("lunge-right", "Lunge Right Forward", 1),
        image_set("burpee-jump", "Burpee Jump", 2),
        image_set("climber-left", "Climber Left Knee", 1),
        image_set("climber-right", "Climber Right Knee", 1),
        image_set("lying", "Lying Supine", 1),
        image_set("bridge-up", "Bridge Top", 1),
        image_set("crunch-up", "Crunch Top", 1),
        image_set("arm-circle-front", "Arm Circle Front", 2),
        image_set("arm-circle-back", "Arm Circle Back", 2),
        image_set("leg-swing-left-front", "Leg Swing Left Front", 1),
        image_set("leg-swing-left-back", "Leg Swing Left Back", 1),
        image_set("leg-swing-right-front", "Leg Swing Right Front", 1),
        image_set("leg-swing-right-back", "Leg Swing Right Back", 1),
        image_set("torso-twist-left", "Torso Twist Left", 1),
        image_set("torso-twist-right", "Torso Twist Right", 1),
        image_set("hamstring-fold", "Standing Hamstring Fold", 1),
        image_set("quad-left", "Quad Stretch Left", 1),
        image_set("quad-right", "Quad Stretch Right", 1),
    ]
    .into_iter()
    .map(|set| (set.id.clone(), set))
    .collect();

    // ========================================================================
    // Exercises
    // ========================================================================

    let exercises: HashMap<String, Exercise> = [
        exercise(
            "pushup",
            "Push-up",
            Category::Pushups,
            "plank-high",
            1.5,
            4.0,
            vec![share("plank-high", 0.5), share("plank-low", 0.5)],
            vec![],
        ),
        exercise(
            "squat",
            "Bodyweight Squat",
            Category::Squats,
            "stand",
            2.0,
            5.0,
            vec![share("stand", 0.4), share("squat-down", 0.6)],
            vec![],
        ),
        exercise(
            "lunge",
            "Alternating Lunge",
            Category::Lunges,
            "stand",
            2.0,
            5.0,
            vec![share("lunge-left", 0.6), share("stand", 0.4)],
            vec![share("lunge-right", 0.6), share("stand", 0.4)],
        ),
        exercise(
            "burpee",
            "Burpee",
            Category::Burpees,
            "stand",
            3.0,
            7.0,
            vec![
                share("squat-down", 0.3),
                share("plank-high", 0.3),
                hold("burpee-jump", 1.0),
                share("stand", 0.4),
            ],
            vec![],
        ),
        exercise(
            "mountain-climber",
            "Mountain Climber",
            Category::MountainClimbers,
            "plank-high",
            0.8,
            2.0,
            vec![share("climber-left", 1.0)],
            vec![share("climber-right", 1.0)],
        ),
        exercise(
            "plank",
            "Forearm Plank Pulse",
            Category::Planks,
            "plank-hold",
            2.0,
            6.0,
            vec![share("plank-hold", 1.0)],
            vec![],
        ),
        exercise(
            "bridge",
            "Glute Bridge",
            Category::Bridges,
            "lying",
            2.0,
            5.0,
            vec![share("bridge-up", 0.5), share("lying", 0.5)],
            vec![],
        ),
        exercise(
            "crunch",
            "Crunch",
            Category::Abs,
            "lying",
            1.5,
            4.0,
            vec![share("crunch-up", 0.5), share("lying", 0.5)],
            vec![],
        ),
    ]
    .into_iter()
    .map(|e| (e.id.clone(), e))
    .collect();

    // ========================================================================
    // Stretches
    // ========================================================================

    let dynamics: HashMap<String, DynamicStr> = [
        DynamicStr {
            id: "arm-circles".into(),
            name: "Arm Circles".into(),
            secs: 4.0,
            positions1: vec![
                str_share("arm-circle-front", 0.5),
                str_share("arm-circle-back", 0.5),
            ],
            positions2: vec![],
            separate_sets: false,
            sample_id: "sample-arm-circles".into(),
        },
        DynamicStr {
            id: "leg-swings".into(),
            name: "Leg Swings".into(),
            secs: 3.0,
            positions1: vec![
                str_share("leg-swing-left-front", 0.5),
                str_share("leg-swing-left-back", 0.5),
            ],
            positions2: vec![
                str_share("leg-swing-right-front", 0.5),
                str_share("leg-swing-right-back", 0.5),
            ],
            separate_sets: true,
            sample_id: "sample-leg-swings".into(),
        },
        DynamicStr {
            id: "torso-twist".into(),
            name: "Torso Twist".into(),
            secs: 2.0,
            positions1: vec![str_share("torso-twist-left", 1.0)],
            positions2: vec![str_share("torso-twist-right", 1.0)],
            separate_sets: false,
            sample_id: "sample-torso-twist".into(),
        },
    ]
    .into_iter()
    .map(|d| (d.id.clone(), d))
    .collect();

    let statics: HashMap<String, StaticStr> = [
        StaticStr {
            id: "hamstring".into(),
            name: "Standing Hamstring Stretch".into(),
            image_set1: "hamstring-fold".into(),
            image_set2: None,
            sample_id: "sample-hamstring".into(),
        },
        StaticStr {
            id: "quad-stretch".into(),
            name: "Standing Quad Stretch".into(),
            image_set1: "quad-left".into(),
            image_set2: Some("quad-right".into()),
            sample_id: "sample-quad-stretch".into(),
        },
    ]
    .into_iter()
    .map(|s| (s.id.clone(), s))
    .collect();

    Catalog {
        image_sets,
        exercises,
        dynamics,
        statics,
        transitions: Some(TransitionMatrix {
            slow: transition_table(1.5),
            regular: transition_table(1.0),
            fast: transition_table(0.6),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_catalog_loads() {
        let catalog = build_sample_catalog();
        assert_eq!(catalog.exercises.len(), 8);
        assert_eq!(catalog.dynamics.len(), 3);
        assert_eq!(catalog.statics.len(), 2);
        assert!(catalog.transitions.is_some());
    }

    #[test]
    fn test_sample_catalog_validates() {
        let errors = sample_catalog().validate();
        assert!(
            errors.is_empty(),
            "Sample catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_sample_catalog_has_dual_and_hardcoded_exercises() {
        let catalog = sample_catalog();
        assert!(catalog.exercise("lunge").unwrap().is_dual());
        assert!(catalog
            .exercise("burpee")
            .unwrap()
            .positions1
            .iter()
            .any(|p| p.hardcoded_secs.is_some()));
    }

    #[test]
    fn test_missing_lookups_are_incomplete_catalog() {
        let catalog = sample_catalog();
        assert!(matches!(
            catalog.exercise("handstand"),
            Err(Error::IncompleteCatalog(_))
        ));
        assert!(matches!(
            Catalog::default().transitions(),
            Err(Error::IncompleteCatalog(_))
        ));
    }

    #[test]
    fn test_validate_reports_broken_references() {
        let mut catalog = build_sample_catalog();
        if let Some(squat) = catalog.exercises.get_mut("squat") {
            squat.positions1[1].image_set = "squat-deep".into();
            squat.min_secs = 9.0;
        }
        catalog.statics.insert(
            "pigeon".into(),
            StaticStr {
                id: "pigeon".into(),
                name: "Pigeon".into(),
                image_set1: "pigeon".into(),
                image_set2: None,
                sample_id: String::new(),
            },
        );

        let errors = catalog.validate();
        assert!(errors.iter().any(|e| e.contains("squat-deep")));
        assert!(errors.iter().any(|e| e.contains("min_secs 9 > max_secs 5")));
        assert!(errors.iter().any(|e| e.contains("'pigeon'")));
    }

    #[test]
    fn test_missing_image_sets_lists_each_once() {
        let mut catalog = build_sample_catalog();
        assert!(catalog.missing_image_sets().is_empty());

        catalog.image_sets.remove("plank-low");
        catalog.image_sets.remove("hamstring-fold");
        assert_eq!(catalog.missing_image_sets(), vec!["hamstring-fold", "plank-low"]);
    }

    #[test]
    fn test_validate_reports_matrix_shape() {
        let mut catalog = build_sample_catalog();
        if let Some(matrix) = catalog.transitions.as_mut() {
            matrix.slow.pop();
        }
        let errors = catalog.validate();
        assert!(errors.iter().any(|e| e.contains("Slow transition table has 10 rows")));
    }

    #[test]
    fn test_unbounded_pace_raises_ceilings() {
        let catalog = sample_catalog().with_unbounded_pace(999.0);
        assert!(catalog.exercises.values().all(|e| e.max_secs == 999.0));
        assert_eq!(sample_catalog().exercise("pushup").unwrap().max_secs, 4.0);
    }

    #[test]
    fn test_write_to_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        sample_catalog().write_to_dir(temp_dir.path()).unwrap();

        for collection in Collection::ALL {
            assert!(temp_dir.path().join(collection.file_name()).exists());
        }

        let text =
            std::fs::read_to_string(temp_dir.path().join(Collection::Exercises.file_name())).unwrap();
        let exercises: Vec<Exercise> = serde_json::from_str(&text).unwrap();
        assert_eq!(exercises.len(), 8);
        assert_eq!(exercises[0].id, "bridge");
    }
}
