//! Category-to-category transition lookup.
//!
//! Every exercise belongs to one of eleven fixed categories. The transition
//! matrix holds three 11×11 tables (slow, regular, fast), each cell being the
//! canonical movement from one category into another.

use crate::{Error, Result, TransitionMatrix, TransitionRep};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Exercise classification used to index the transition matrix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Pushups,
    Squats,
    Burpees,
    Jumps,
    Lunges,
    MountainClimbers,
    Abs,
    Bridges,
    Kicks,
    Planks,
    Supermans,
}

/// Label → category table, built once and shared by every lookup
static CATEGORY_TABLE: Lazy<HashMap<String, Category>> = Lazy::new(|| {
    Category::ALL
        .iter()
        .map(|category| (category.label().to_lowercase(), *category))
        .collect()
});

impl Category {
    /// Number of categories (the matrix dimension)
    pub const COUNT: usize = 11;

    /// All categories in matrix order
    pub const ALL: [Category; Category::COUNT] = [
        Category::Pushups,
        Category::Squats,
        Category::Burpees,
        Category::Jumps,
        Category::Lunges,
        Category::MountainClimbers,
        Category::Abs,
        Category::Bridges,
        Category::Kicks,
        Category::Planks,
        Category::Supermans,
    ];

    /// Catalog label for this category
    pub fn label(self) -> &'static str {
        match self {
            Category::Pushups => "Pushups",
            Category::Squats => "Squats",
            Category::Burpees => "Burpees",
            Category::Jumps => "Jumps",
            Category::Lunges => "Lunges",
            Category::MountainClimbers => "Mountain Climbers",
            Category::Abs => "Abs",
            Category::Bridges => "Bridges",
            Category::Kicks => "Kicks",
            Category::Planks => "Planks",
            Category::Supermans => "Supermans",
        }
    }

    /// Row/column of this category in each transition table
    pub fn index(self) -> usize {
        match self {
            Category::Pushups => 0,
            Category::Squats => 1,
            Category::Burpees => 2,
            Category::Jumps => 3,
            Category::Lunges => 4,
            Category::MountainClimbers => 5,
            Category::Abs => 6,
            Category::Bridges => 7,
            Category::Kicks => 8,
            Category::Planks => 9,
            Category::Supermans => 10,
        }
    }

    /// Parse a catalog label (case-insensitive). Unknown labels are a
    /// catalog configuration error; there is no default category.
    pub fn from_label(label: &str) -> Result<Self> {
        CATEGORY_TABLE
            .get(&label.trim().to_lowercase())
            .copied()
            .ok_or_else(|| {
                Error::CatalogValidation(format!("unknown exercise category '{}'", label))
            })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for Category {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Category::from_label(&value)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.label().to_string()
    }
}

/// Pace variant of a transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedTier {
    Slow,
    Regular,
    Fast,
}

impl SpeedTier {
    /// Pick the tier for a desired duration against its natural duration.
    ///
    /// At or above `(1 + tolerance) × natural` the transitions slow down, at
    /// or below `(1 - tolerance) × natural` they speed up, otherwise the
    /// regular transitions are used.
    pub fn select(desired: f64, natural: f64, tolerance: f64) -> Self {
        if desired >= (1.0 + tolerance) * natural {
            SpeedTier::Slow
        } else if desired <= (1.0 - tolerance) * natural {
            SpeedTier::Fast
        } else {
            SpeedTier::Regular
        }
    }
}

impl TransitionMatrix {
    /// The 11×11 table for a speed tier
    pub fn table(&self, speed: SpeedTier) -> &[Vec<TransitionRep>] {
        match speed {
            SpeedTier::Slow => &self.slow,
            SpeedTier::Regular => &self.regular,
            SpeedTier::Fast => &self.fast,
        }
    }

    /// Canonical transition from one category into another
    pub fn lookup(
        &self,
        from: Category,
        to: Category,
        speed: SpeedTier,
    ) -> Result<&TransitionRep> {
        self.table(speed)
            .get(from.index())
            .and_then(|row| row.get(to.index()))
            .ok_or_else(|| {
                Error::IncompleteCatalog(format!(
                    "no {:?} transition from {} to {}",
                    speed, from, to
                ))
            })
    }

    /// Shape problems: every table must be exactly 11×11
    pub fn shape_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for speed in [SpeedTier::Slow, SpeedTier::Regular, SpeedTier::Fast] {
            let table = self.table(speed);
            if table.len() != Category::COUNT {
                errors.push(format!(
                    "{:?} transition table has {} rows, expected {}",
                    speed,
                    table.len(),
                    Category::COUNT
                ));
            }
            for (i, row) in table.iter().enumerate() {
                if row.len() != Category::COUNT {
                    errors.push(format!(
                        "{:?} transition table row {} has {} cells, expected {}",
                        speed,
                        i,
                        row.len(),
                        Category::COUNT
                    ));
                }
            }
        }

        errors
    }
}
