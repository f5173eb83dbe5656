//! Flat CSV timeline of a composed routine.
//!
//! One row per position of every rep variant, so a routine can be
//! inspected in a spreadsheet without walking the nested JSON.

use crate::types::{Rep, Routine, Section};
use crate::Result;
use std::io::Write;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct TimelineRow<'a> {
    section: &'a str,
    block: usize,
    set_variant: usize,
    rep_variant: usize,
    position: usize,
    frame: &'a str,
    frame_count: usize,
    seconds: f64,
}

fn rep_rows<'a>(
    section: &Section<'a>,
    set_variant: usize,
    rep_variant: usize,
    rep: &'a Rep,
) -> impl Iterator<Item = TimelineRow<'a>> + 'a {
    let label = section.label;
    let block = section.index;

    rep.positions
        .iter()
        .zip(&rep.times)
        .enumerate()
        .map(move |(position, (frames, &seconds))| TimelineRow {
            section: label,
            block,
            set_variant,
            rep_variant,
            position,
            frame: frames.first().map(String::as_str).unwrap_or(""),
            frame_count: frames.len(),
            seconds,
        })
}

/// Write the routine's timeline as CSV, returning the number of rows
pub fn write_timeline_csv<R: Routine, W: Write>(routine: &R, writer: W) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    let mut count = 0;

    for section in routine.sections() {
        for (set_variant, set) in section.sets.iter().enumerate() {
            for (rep_variant, rep) in set.reps.iter().enumerate() {
                for row in rep_rows(&section, set_variant, rep_variant, rep) {
                    writer.serialize(row)?;
                    count += 1;
                }
            }
        }
    }

    writer.flush()?;
    tracing::debug!("Wrote {} timeline rows", count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::compose_stretch_workout;
    use crate::catalog::sample_catalog;
    use crate::request::{StretchTimes, StretchWorkoutRoute};
    use crate::types::{Resolution, StretchWorkout};
    use crate::Config;

    fn stretch_workout() -> StretchWorkout {
        let route = StretchWorkoutRoute {
            id: None,
            resolution: None,
            dynamics: vec!["torso-twist".into()],
            statics: vec!["quad-stretch".into()],
            stretch_times: StretchTimes {
                dynamic_per_set: vec![10.0],
                static_per_set: vec![30.0],
                dynamic_sets: 1,
                static_sets: 1,
                dynamic_rest: 0.0,
                full_round: 60.0,
            },
        };
        compose_stretch_workout(sample_catalog(), &route, Resolution::Low, &Config::default()).unwrap()
    }

    #[test]
    fn test_timeline_rows() {
        let workout = stretch_workout();
        let mut out = Vec::new();
        let count = write_timeline_csv(&workout, &mut out).unwrap();

        // torso twist: 2 variants x 1 position; quad stretch: 2 holds
        assert_eq!(count, 4);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "section,block,set_variant,rep_variant,position,frame,frame_count,seconds"
        );
        assert_eq!(lines.len(), count + 1);
        assert!(lines[1].starts_with("dynamic,0,0,0,0,torso-twist-left/low/1.webp,1,"));
        assert_eq!(lines[4], "static,0,0,1,0,quad-right/low/1.webp,1,15.0");
    }

    #[test]
    fn test_seconds_cover_each_variant() {
        let workout = stretch_workout();
        let mut out = Vec::new();
        write_timeline_csv(&workout, &mut out).unwrap();

        let mut reader = csv::Reader::from_reader(out.as_slice());
        let total: f64 = reader
            .records()
            .map(|r| r.unwrap()[7].parse::<f64>().unwrap())
            .sum();

        // one 2s cycle per twist side plus both 15s holds
        assert!((total - 34.0).abs() < 1e-9);
    }
}
