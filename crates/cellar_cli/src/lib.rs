//! Cellar runner library
//!
//! Loads a configuration, plays seeded episodes with a rollout policy and
//! summarises them. Episodes run in parallel, each with its own state and RNG.

use anyhow::{bail, Context, Result};
use cellar_core::{
    ActionSpace, Cellar, CellarParams, Coord, History, Layout, Preset, Simulator, Status,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Reads params from a `.json`, `.yaml` or `.yml` file and validates them.
pub fn load_params(path: &Path) -> Result<CellarParams> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let params: CellarParams = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
        _ => serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
    };
    params.validate()?;
    Ok(params)
}

/// Config file first, then a named preset, then `CELLAR_PROFILE`.
pub fn resolve_params(config: Option<&Path>, preset: Option<&str>) -> Result<CellarParams> {
    if let Some(path) = config {
        return load_params(path);
    }
    match preset {
        Some(name) => match Preset::parse(name) {
            Some(p) => Ok(CellarParams::preset(p)),
            None => bail!("Unknown preset '{}' (expected small, medium, large or huge)", name),
        },
        None => Ok(CellarParams::from_env_or_default()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Uniform over legal actions
    Random,
    /// Uniform over preferred actions
    Preferred,
    /// Uniform over the PGS-greedy set
    Pgs,
}

impl FromStr for Policy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(Policy::Random),
            "preferred" => Ok(Policy::Preferred),
            "pgs" => Ok(Policy::Pgs),
            other => bail!("Unknown policy '{}' (expected random, preferred or pgs)", other),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Policy::Random => "random",
            Policy::Preferred => "preferred",
            Policy::Pgs => "pgs",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    pub policy: Policy,
    pub episodes: usize,
    /// Episode `i` is seeded with `seed + i`.
    pub seed: u64,
    pub max_steps: usize,
    /// Report PGS-shaped rewards instead of plain ones.
    pub shaped: bool,
    /// Validate the state after every step.
    pub validate: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            policy: Policy::Preferred,
            episodes: 100,
            seed: 0,
            max_steps: 200,
            shaped: false,
            validate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub seed: u64,
    pub steps: usize,
    pub total_reward: f64,
    pub discounted_return: f64,
    pub collected_bottles: u32,
    pub wasted_actions: u32,
    pub exited: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub policy: Policy,
    pub shaped: bool,
    pub mean_reward: f64,
    pub mean_discounted_return: f64,
    pub mean_steps: f64,
    pub exit_rate: f64,
    pub episodes: Vec<EpisodeSummary>,
}

/// Picks an action for `state` under `policy`; `None` when nothing is legal.
pub fn choose_action<S: Simulator, R: Rng>(
    sim: &S,
    state: &S::State,
    history: &History,
    policy: Policy,
    rng: &mut R,
) -> Result<Option<usize>> {
    let candidates = match policy {
        Policy::Random => sim.legal_actions(state, history, Status::ROLLOUT),
        Policy::Preferred => sim.preferred_actions(state, history, Status::ROLLOUT),
        Policy::Pgs => sim.guided_actions(state, history, Status::ROLLOUT, rng)?,
    };
    Ok(candidates.choose(rng).copied())
}

pub fn run_episode(cellar: &Cellar, options: &RunOptions, seed: u64) -> Result<EpisodeSummary> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut state = cellar.create_start_state(&mut rng);
    let mut history = History::new();
    let mut total_reward = 0.0;
    let mut discounted_return = 0.0;
    let mut scale = 1.0;

    while history.len() < options.max_steps && !cellar.is_terminal(&state) {
        let Some(action) = choose_action(cellar, &state, &history, options.policy, &mut rng)? else {
            break;
        };
        let outcome = if options.shaped {
            cellar.step_shaped(&mut state, action, &mut rng)?
        } else {
            cellar.step(&mut state, action, &mut rng)?
        };
        history.push(action, outcome.observation);
        total_reward += outcome.reward;
        discounted_return += scale * outcome.reward;
        scale *= cellar.discount();

        if options.validate {
            cellar.validate(&state).with_context(|| {
                format!("Episode {} broke an invariant at step {}", seed, history.len())
            })?;
        }
    }

    Ok(EpisodeSummary {
        seed,
        steps: history.len(),
        total_reward,
        discounted_return,
        collected_bottles: state.collected_bottles,
        wasted_actions: state.wasted_actions,
        exited: cellar.is_terminal(&state),
    })
}

pub fn run_batch(cellar: &Cellar, options: &RunOptions) -> Result<BatchReport> {
    if options.episodes == 0 {
        bail!("At least one episode is required");
    }
    debug!(
        policy = %options.policy,
        episodes = options.episodes,
        seed = options.seed,
        "running episode batch"
    );

    let episodes: Vec<EpisodeSummary> = (0..options.episodes as u64)
        .into_par_iter()
        .map(|i| run_episode(cellar, options, options.seed.wrapping_add(i)))
        .collect::<Result<_>>()?;

    let n = episodes.len() as f64;
    let mean = |f: fn(&EpisodeSummary) -> f64| episodes.iter().map(f).sum::<f64>() / n;
    Ok(BatchReport {
        policy: options.policy,
        shaped: options.shaped,
        mean_reward: mean(|e| e.total_reward),
        mean_discounted_return: mean(|e| e.discounted_return),
        mean_steps: mean(|e| e.steps as f64),
        exit_rate: mean(|e| if e.exited { 1.0 } else { 0.0 }),
        episodes,
    })
}

/// Static facts about one configuration, for `cellar describe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub params: CellarParams,
    pub preset: Option<Preset>,
    pub start: Coord,
    pub bottle_positions: Vec<Coord>,
    pub object_positions: Vec<Coord>,
    pub num_actions: usize,
    pub actions: ActionSpace,
}

pub fn describe(cellar: &Cellar) -> Description {
    let Layout {
        start,
        bottle_positions,
        object_positions,
        preset,
    } = cellar.layout().clone();
    Description {
        params: cellar.params().clone(),
        preset,
        start,
        bottle_positions,
        object_positions,
        num_actions: cellar.num_actions(),
        actions: *cellar.actions(),
    }
}
