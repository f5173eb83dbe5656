//! Dynamic and static stretch blocks.

use crate::composer::Composer;
use crate::rounding::{alternating_sequence, uniform_sequence};
use crate::types::*;
use crate::{Error, Result};

fn check_set_time(id: &str, set_time: f64) -> Result<()> {
    if set_time.is_finite() && set_time > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "set time for stretch '{}' must be positive, got {}",
            id, set_time
        )))
    }
}

/// First half on side one, second half on side two
fn separated_sequence(len: usize) -> Vec<usize> {
    (0..len).map(|i| usize::from(i * 2 >= len)).collect()
}

impl<'a> Composer<'a> {
    fn stretch_rep(&self, positions: &[StrPosition], rep_time: f64) -> Result<Rep> {
        let mut frames = Vec::with_capacity(positions.len());
        let mut times = Vec::with_capacity(positions.len());

        for p in positions {
            let time = p.percent_secs * rep_time;
            if time.is_nan() || time <= 0.0 {
                return Err(Error::Allocation(format!(
                    "stretch position '{}' would last {:.3}s",
                    p.image_set, time
                )));
            }
            frames.push(self.frames(&p.image_set)?);
            times.push(time);
        }

        Ok(Rep {
            positions: frames,
            times,
            full_time: rep_time,
        })
    }

    /// One set of a dynamic stretch filling `set_time` seconds
    pub fn dynamic_set(&self, stretch: &DynamicStr, set_time: f64) -> Result<Set> {
        check_set_time(&stretch.id, set_time)?;
        if stretch.secs <= 0.0 {
            return Err(Error::CatalogValidation(format!(
                "dynamic stretch '{}' has a nonpositive cycle time",
                stretch.id
            )));
        }

        let cycles = set_time / stretch.secs;
        let separate = stretch.separate_sets && matches!(stretch.arity(), Arity::Dual(..));
        // Separate sides need an even count to split evenly
        let rounded = if separate {
            cycles.round_ties_even()
        } else {
            cycles.round()
        };
        let rep_count = rounded as usize;
        if rep_count == 0 {
            return Err(Error::InvalidRequest(format!(
                "{}s is too short for one rep of '{}' ({}s)",
                set_time, stretch.id, stretch.secs
            )));
        }

        let rep_time = set_time / rep_count as f64;
        let (reps, rep_sequence) = match stretch.arity() {
            Arity::Single(positions) => (
                vec![self.stretch_rep(positions, rep_time)?],
                uniform_sequence(rep_count),
            ),
            Arity::Dual(first, second) => {
                let reps = vec![
                    self.stretch_rep(first, rep_time)?,
                    self.stretch_rep(second, rep_time)?,
                ];
                let sequence = if separate {
                    separated_sequence(rep_count)
                } else {
                    alternating_sequence(rep_count)
                };
                (reps, sequence)
            }
        };

        Ok(Set {
            reps,
            rep_sequence,
            rep_count,
            full_time: set_time,
            ..Default::default()
        })
    }

    /// One hold, or one hold per side splitting the time
    pub fn static_set(&self, stretch: &StaticStr, set_time: f64) -> Result<Set> {
        check_set_time(&stretch.id, set_time)?;

        let hold = |image_set: &str, time: f64| -> Result<Rep> {
            Ok(Rep {
                positions: vec![self.frames(image_set)?],
                times: vec![time],
                full_time: time,
            })
        };

        let reps = match &stretch.image_set2 {
            None => vec![hold(&stretch.image_set1, set_time)?],
            Some(second) => vec![
                hold(&stretch.image_set1, set_time / 2.0)?,
                hold(second, set_time / 2.0)?,
            ],
        };

        Ok(Set {
            rep_sequence: (0..reps.len()).collect(),
            rep_count: reps.len(),
            reps,
            full_time: set_time,
            ..Default::default()
        })
    }

    /// Sets for each requested dynamic stretch, in request order
    pub fn dynamic_block(&self, ids: &[String], per_set: &[f64]) -> Result<StretchBlock> {
        if ids.len() != per_set.len() {
            return Err(Error::InvalidRequest(format!(
                "{} dynamic stretches but {} set times",
                ids.len(),
                per_set.len()
            )));
        }

        let mut block = StretchBlock::default();
        for (id, &set_time) in ids.iter().zip(per_set) {
            let stretch = self.catalog().dynamic(id)?;
            block.sets.push(self.dynamic_set(stretch, set_time)?);
            block.names.push(stretch.name.clone());
            block.sample_ids.push(stretch.sample_id.clone());
        }
        Ok(block)
    }

    /// Sets for each requested static stretch, in request order
    pub fn static_block(&self, ids: &[String], per_set: &[f64]) -> Result<StretchBlock> {
        if ids.len() != per_set.len() {
            return Err(Error::InvalidRequest(format!(
                "{} static stretches but {} set times",
                ids.len(),
                per_set.len()
            )));
        }

        let mut block = StretchBlock::default();
        for (id, &set_time) in ids.iter().zip(per_set) {
            let stretch = self.catalog().static_stretch(id)?;
            block.sets.push(self.static_set(stretch, set_time)?);
            block.names.push(stretch.name.clone());
            block.sample_ids.push(stretch.sample_id.clone());
        }
        Ok(block)
    }
}
