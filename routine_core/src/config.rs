//! Configuration file support for the routine engine.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/routine/config.toml`.

use crate::rounding::RoundingPolicy;
use crate::{Error, Resolution, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub rounding: RoundingPolicy,

    #[serde(default)]
    pub split: SplitConfig,

    #[serde(default)]
    pub markers: MarkerConfig,
}

/// Catalog and cache locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            catalog_dir: default_catalog_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

/// Output defaults
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub resolution: Resolution,
}

/// How the per-rep duration is clamped
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PacePolicy {
    /// Clamp straight into `[min_secs, max_secs]`
    Strict,
    /// Let the upper bound stretch to a fraction of the natural pace
    #[default]
    Relaxed,
}

/// Per-rep pacing parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PacingConfig {
    #[serde(default)]
    pub policy: PacePolicy,

    #[serde(default = "default_max_stretch_ratio")]
    pub max_stretch_ratio: f64,

    /// Ceiling applied to every exercise at difficulty 1
    #[serde(default = "default_unbounded_max_secs")]
    pub unbounded_max_secs: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            policy: PacePolicy::default(),
            max_stretch_ratio: default_max_stretch_ratio(),
            unbounded_max_secs: default_unbounded_max_secs(),
        }
    }
}

/// Split-round transition speed selection
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SplitConfig {
    #[serde(default = "default_speed_tolerance")]
    pub speed_tolerance: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            speed_tolerance: default_speed_tolerance(),
        }
    }
}

/// Name fragments used to find marker positions among the image sets
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MarkerConfig {
    #[serde(default = "default_congrats_marker")]
    pub congrats: String,

    #[serde(default = "default_standing_marker")]
    pub standing: String,

    #[serde(default = "default_resting_marker")]
    pub resting: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            congrats: default_congrats_marker(),
            standing: default_standing_marker(),
            resting: default_resting_marker(),
        }
    }
}

// Default value functions
fn data_root() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        PathBuf::from(home).join(".local/share")
    });
    base.join("routine")
}

fn default_catalog_dir() -> PathBuf {
    data_root().join("catalog")
}

fn default_cache_dir() -> PathBuf {
    data_root().join("cache")
}

fn default_max_stretch_ratio() -> f64 {
    0.67
}

fn default_unbounded_max_secs() -> f64 {
    999.0
}

fn default_speed_tolerance() -> f64 {
    0.05
}

fn default_congrats_marker() -> String {
    "congrat".into()
}

fn default_standing_marker() -> String {
    "standing arms bent".into()
}

fn default_resting_marker() -> String {
    "resting".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.check()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".config")
        });
        base.join("routine").join("config.toml")
    }

    /// Reject tolerance settings the engine cannot work with
    pub fn check(&self) -> Result<()> {
        let r = &self.rounding;
        if !(0.0..=0.5).contains(&r.whole_below) || !(0.5..=1.0).contains(&r.whole_above) {
            return Err(Error::Config(format!(
                "rounding bands must satisfy 0 <= whole_below <= 0.5 <= whole_above <= 1 (got {} / {})",
                r.whole_below, r.whole_above
            )));
        }
        if !(0.0..1.0).contains(&self.split.speed_tolerance) {
            return Err(Error::Config(format!(
                "split.speed_tolerance must be in [0, 1) (got {})",
                self.split.speed_tolerance
            )));
        }
        if self.pacing.max_stretch_ratio <= 0.0 || self.pacing.unbounded_max_secs <= 0.0 {
            return Err(Error::Config(
                "pacing ratios and ceilings must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
