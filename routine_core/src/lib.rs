#![forbid(unsafe_code)]

//! Core composition engine for timed exercise and stretch routines.
//!
//! This crate provides:
//! - Domain types (catalog records, reps, sets, rounds, routines)
//! - Rep-count rounding and per-rep pacing
//! - Round strategies (Regular, Combo, Split) and transition lookup
//! - Catalog loading with a local cache
//! - Routine assembly and timeline export

pub mod types;
pub mod error;
pub mod transition;
pub mod rounding;
pub mod composer;
pub mod rounds;
pub mod stretch;
pub mod request;
pub mod catalog;
pub mod store;
pub mod assembler;
pub mod export;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, FetchFailures, Result};
pub use types::*;
pub use catalog::{build_sample_catalog, sample_catalog};
pub use config::Config;
pub use transition::{Category, SpeedTier};
pub use composer::{Composer, Lead};
pub use rounds::{RoundBuilder, RoundPlan};
pub use rounding::{RepTarget, RoundingPolicy};
pub use request::{StretchWorkoutRoute, WorkoutRoute};
pub use store::{CatalogStore, Collection, DirectorySource, DocumentSource};
pub use assembler::{collect_media, compose_stretch_workout, compose_workout, resolve_markers};
pub use export::write_timeline_csv;
