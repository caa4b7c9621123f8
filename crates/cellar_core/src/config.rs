//! Cellar configuration
//!
//! `cellar[n, m, c, s]` = `n × n` grid, `m` bottles, `c` crates, `s` shelves.
//! Four dimension tuples have hand-placed layouts (see [`Preset`]); every
//! other tuple is laid out at random from `layout_seed`.
//!
//! ## Usage
//!
//! ```rust
//! use cellar_core::config::{CellarParams, Preset};
//!
//! let params = CellarParams::preset(Preset::Medium);
//! assert!(params.validate().is_ok());
//!
//! let custom = CellarParams::default().with_size(9).with_counts(3, 5, 5);
//! assert_eq!(custom.matching_preset(), None);
//! ```
//!
//! ## Environment Variables
//!
//! - `CELLAR_PROFILE`: Select preset (small, medium, large, huge)

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

use crate::error::{CellarError, Result};

/// Hand-placed layouts used for reproducible experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// cellar[5, 1, 0, 4]: shelves only
    Small,
    /// cellar[5, 2, 6, 4]
    Medium,
    /// cellar[7, 8, 8, 7]
    Large,
    /// cellar[11, 11, 15, 15]
    Huge,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Small, Preset::Medium, Preset::Large, Preset::Huge];

    /// `(size, bottles, crates, shelves)`
    pub fn dimensions(self) -> (usize, usize, usize, usize) {
        match self {
            Preset::Small => (5, 1, 0, 4),
            Preset::Medium => (5, 2, 6, 4),
            Preset::Large => (7, 8, 8, 7),
            Preset::Huge => (11, 11, 15, 15),
        }
    }

    pub fn parse(name: &str) -> Option<Preset> {
        match name.trim().to_lowercase().as_str() {
            "small" | "5_1" => Some(Preset::Small),
            "medium" | "5_2" => Some(Preset::Medium),
            "large" | "7_8" => Some(Preset::Large),
            "huge" | "11_11" => Some(Preset::Huge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellarParams {
    pub size: usize,
    pub bottles: usize,
    pub crates: usize,
    pub shelves: usize,
    pub discount: f64,
    /// Binary entropy (bits) under which a belief counts as resolved.
    pub entropy: f64,
    /// Probability of value a bottle must exceed to be pursued.
    pub activation_threshold: f64,
    /// Distance at which a check is correct with probability 0.75.
    pub half_efficiency_distance: f64,
    /// Checks required before a belief may count as resolved.
    pub uncertainty_count: u32,
    pub valuable_prior: f64,
    /// `None` keeps exactly `crates` crates among the objects.
    pub crate_prior: Option<f64>,
    pub layout_seed: u64,
}

impl Default for CellarParams {
    fn default() -> Self {
        Self {
            size: 5,
            bottles: 2,
            crates: 6,
            shelves: 4,
            discount: 0.95,
            entropy: 0.5,
            activation_threshold: 0.5,
            half_efficiency_distance: 20.0,
            uncertainty_count: 1,
            valuable_prior: 0.5,
            crate_prior: None,
            layout_seed: 0,
        }
    }
}

impl CellarParams {
    pub fn preset(preset: Preset) -> Self {
        let (size, bottles, crates, shelves) = preset.dimensions();
        Self {
            size,
            bottles,
            crates,
            shelves,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_counts(mut self, bottles: usize, crates: usize, shelves: usize) -> Self {
        self.bottles = bottles;
        self.crates = crates;
        self.shelves = shelves;
        self
    }

    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_half_efficiency_distance(mut self, distance: f64) -> Self {
        self.half_efficiency_distance = distance;
        self
    }

    pub fn with_layout_seed(mut self, seed: u64) -> Self {
        self.layout_seed = seed;
        self
    }

    pub fn num_objects(&self) -> usize {
        self.crates + self.shelves
    }

    /// The preset whose dimensions equal this configuration's, if any.
    pub fn matching_preset(&self) -> Option<Preset> {
        let dims = (self.size, self.bottles, self.crates, self.shelves);
        Preset::ALL.into_iter().find(|p| p.dimensions() == dims)
    }

    /// Load from environment variable CELLAR_PROFILE or use default
    pub fn from_env_or_default() -> Self {
        let Ok(name) = env::var("CELLAR_PROFILE") else {
            return Self::default();
        };
        match Preset::parse(&name) {
            Some(preset) => Self::preset(preset),
            None => {
                warn!(profile = %name, "unknown CELLAR_PROFILE, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(CellarError::InvalidConfig("size must be at least 1".into()));
        }
        if self.size > i32::MAX as usize / 2 {
            return Err(CellarError::InvalidConfig(format!("size {} is too large", self.size)));
        }
        if !(self.discount > 0.0 && self.discount <= 1.0) {
            return Err(CellarError::InvalidConfig(format!(
                "discount must lie in (0, 1], got {}",
                self.discount
            )));
        }
        check_unit("entropy", self.entropy)?;
        check_unit("activation_threshold", self.activation_threshold)?;
        check_unit("valuable_prior", self.valuable_prior)?;
        if let Some(p) = self.crate_prior {
            check_unit("crate_prior", p)?;
        }
        if !(self.half_efficiency_distance.is_finite() && self.half_efficiency_distance > 0.0) {
            return Err(CellarError::InvalidConfig(format!(
                "half_efficiency_distance must be positive, got {}",
                self.half_efficiency_distance
            )));
        }

        // The agent's start tile is never shared.
        let capacity = self.size * self.size - 1;
        let entities = self.bottles + self.num_objects();
        if entities > capacity {
            return Err(CellarError::LayoutOverflow { entities, capacity });
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CellarError::InvalidConfig(format!("{name} must lie in [0, 1], got {value}")))
    }
}
