//! Routine assembly.
//!
//! Turns a validated request plus its resolved catalog into a complete
//! `Workout` or `StretchWorkout`:
//! - stretch blocks (dynamic, static)
//! - up to nine exercise rounds, each built by its round strategy
//! - marker positions and the deduplicated media manifest

use crate::composer::Composer;
use crate::config::{Config, MarkerConfig};
use crate::request::{StretchWorkoutRoute, WorkoutRoute};
use crate::rounds::RoundBuilder;
use crate::types::*;
use crate::Result;
use chrono::Utc;
use std::borrow::Cow;
use std::collections::HashSet;
use uuid::Uuid;

/// Compose a full workout
pub fn compose_workout(
    catalog: &Catalog,
    route: &WorkoutRoute,
    resolution: Resolution,
    config: &Config,
) -> Result<Workout> {
    route.validate()?;

    let catalog = if route.difficulty == 1 {
        tracing::info!(
            "Difficulty 1: lifting pace ceilings to {}s",
            config.pacing.unbounded_max_secs
        );
        Cow::Owned(catalog.with_unbounded_pace(config.pacing.unbounded_max_secs))
    } else {
        Cow::Borrowed(catalog)
    };

    let composer = Composer::new(&catalog, resolution, &config.pacing);
    let times = &route.stretch_times;
    let dynamics = composer.dynamic_block(&route.dynamics, &times.dynamic_per_set)?;
    let statics = composer.static_block(&route.statics, &times.static_per_set)?;

    let builder = RoundBuilder::new(&composer, config.rounding, config.split.speed_tolerance);
    let mut rounds = Vec::with_capacity(route.rounds.len());
    for round in &route.rounds {
        let plan = builder.build(round)?;

        let mut names = Vec::with_capacity(round.exercise_ids.len());
        let mut sample_ids = Vec::with_capacity(round.exercise_ids.len());
        for id in &round.exercise_ids {
            let exercise = catalog.exercise(id)?;
            names.push(exercise.name.clone());
            sample_ids.push(exercise.sample_id.clone());
        }

        rounds.push(WoRound {
            names,
            sample_ids,
            kind: round.kind,
            set_count: round.times.sets as usize,
            full_time: round.times.full_round,
            rest_per_round: round.times.rest_per_round,
            rest_per_set: round.times.rest_per_set,
            exercise_per_set: round.times.exercise_per_set,
            sets: plan.sets,
            set_sequence: plan.set_sequence,
            reps: plan.reps,
            split_pairs: plan.split_pairs,
        });
    }

    let mut workout = Workout {
        id: route.id.unwrap_or_else(Uuid::new_v4),
        generated_at: Utc::now(),
        dynamics,
        statics,
        dynamic_time: times.full_round,
        static_time: times.full_round,
        dynamic_rest: times.dynamic_rest,
        rounds,
        markers: resolve_markers(&catalog, resolution, &config.markers),
        media: Vec::new(),
    };
    workout.media = collect_media(&workout);

    tracing::info!(
        "Composed workout {} with {} round(s), {} media frames",
        workout.id,
        workout.rounds.len(),
        workout.media.len()
    );
    Ok(workout)
}

/// Compose a stretch-only routine
pub fn compose_stretch_workout(
    catalog: &Catalog,
    route: &StretchWorkoutRoute,
    resolution: Resolution,
    config: &Config,
) -> Result<StretchWorkout> {
    route.validate()?;

    let composer = Composer::new(catalog, resolution, &config.pacing);
    let times = &route.stretch_times;

    let mut workout = StretchWorkout {
        id: route.id.unwrap_or_else(Uuid::new_v4),
        generated_at: Utc::now(),
        dynamics: composer.dynamic_block(&route.dynamics, &times.dynamic_per_set)?,
        statics: composer.static_block(&route.statics, &times.static_per_set)?,
        round_time: times.full_round / 2.0,
        markers: resolve_markers(catalog, resolution, &config.markers),
        media: Vec::new(),
    };
    workout.media = collect_media(&workout);

    tracing::info!(
        "Composed stretch routine {} ({} dynamic, {} static)",
        workout.id,
        workout.dynamics.sets.len(),
        workout.statics.sets.len()
    );
    Ok(workout)
}

/// Frames of the first image set (by id) whose name contains `fragment`
fn find_marker(catalog: &Catalog, resolution: Resolution, fragment: &str) -> Option<Vec<String>> {
    let needle = fragment.to_lowercase();
    let found = catalog
        .image_sets
        .values()
        .filter(|set| set.name.to_lowercase().contains(&needle))
        .min_by(|a, b| a.id.cmp(&b.id))?;

    let frames = found.frames(resolution);
    if frames.is_empty() {
        tracing::warn!("Marker image set '{}' has no {} frames", found.id, resolution);
        None
    } else {
        Some(frames.to_vec())
    }
}

/// Marker positions found by name; absent markers are left out
pub fn resolve_markers(catalog: &Catalog, resolution: Resolution, names: &MarkerConfig) -> Markers {
    Markers {
        congrats: find_marker(catalog, resolution, &names.congrats),
        standing: find_marker(catalog, resolution, &names.standing),
        resting: find_marker(catalog, resolution, &names.resting),
    }
}

/// Every frame a routine references, first-seen order
pub fn collect_media<R: Routine>(routine: &R) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut media = Vec::new();
    let mut add = |frame: &String| {
        if seen.insert(frame.clone()) {
            media.push(frame.clone());
        }
    };

    for section in routine.sections() {
        for set in section.sets {
            set.position_init.iter().for_each(&mut add);
            set.reps
                .iter()
                .flat_map(|rep| rep.positions.iter().flatten())
                .for_each(&mut add);
            set.position_end.iter().for_each(&mut add);
        }
    }
    routine.markers().frames().for_each(&mut add);

    media
}
