//! Cellar simulator
//!
//! [`Cellar`] owns everything that is fixed for one configuration (params,
//! layout, action offsets) and operates on [`CellarState`] values owned by
//! the caller. It holds no mutable state, so one instance can serve any
//! number of search threads as long as each branch steps its own copy.
//!
//! ## Components
//!
//! - `actions`: action / observation codes
//! - `transition`: plain, shaped and transition-only steps
//! - `heuristic`: the PGS potential, its incremental form and target selection
//! - `legal`: legal, preferred and PGS-greedy action sets
//! - `repair`: local move used by particle reinvigoration

pub mod actions;
pub mod heuristic;
pub mod legal;
pub mod probability;
pub mod repair;
pub mod transition;

pub use actions::{Action, ActionSpace, Observation};
pub use heuristic::Goal;
pub use transition::{Shaping, StepOptions, StepOutcome};

use rand::Rng;
use tracing::debug;

use crate::config::CellarParams;
use crate::error::{CellarError, Result};
use crate::grid::{Coord, Grid};
use crate::layout::Layout;
use crate::state::CellarState;

#[derive(Debug, Clone)]
pub struct Cellar {
    params: CellarParams,
    layout: Layout,
    bottle_grid: Grid<Option<usize>>,
    actions: ActionSpace,
    size: i32,
}

impl Cellar {
    pub fn new(params: CellarParams) -> Result<Self> {
        let layout = Layout::for_params(&params)?;
        let size = params.size as i32;
        let bottle_grid = layout.bottle_grid(size);
        let actions = ActionSpace::new(
            layout.bottle_positions.len(),
            layout.object_positions.len(),
        );
        debug!(num_actions = actions.num_actions(), "cellar simulator built");
        Ok(Self {
            params,
            layout,
            bottle_grid,
            actions,
            size,
        })
    }

    pub fn params(&self) -> &CellarParams {
        &self.params
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn actions(&self) -> &ActionSpace {
        &self.actions
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn num_actions(&self) -> usize {
        self.actions.num_actions()
    }

    pub fn discount(&self) -> f64 {
        self.params.discount
    }

    pub fn create_start_state<R: Rng + ?Sized>(&self, rng: &mut R) -> CellarState {
        let mut state = self.layout.start_state(&self.params, rng);
        state.target = self.select_target(&state);
        state
    }

    /// Independent copy for a new search branch.
    pub fn copy_state(&self, state: &CellarState) -> CellarState {
        state.clone()
    }

    pub fn is_terminal(&self, state: &CellarState) -> bool {
        state.has_exited(self.size)
    }

    #[inline]
    pub fn inside(&self, c: Coord) -> bool {
        self.bottle_grid.inside(c)
    }

    /// Bottle placed on `c`, collected or not.
    pub fn bottle_index(&self, c: Coord) -> Option<usize> {
        self.bottle_grid.get(c).copied().flatten()
    }

    /// Uncollected bottle on `c`.
    pub fn bottle_at(&self, state: &CellarState, c: Coord) -> Option<usize> {
        self.bottle_index(c)
            .filter(|&i| !state.bottles[i].truth.collected)
    }

    pub fn bottle_position(&self, bottle: usize) -> Coord {
        self.layout.bottle_positions[bottle]
    }

    /// Walkable: in-grid and not occupied by an active object.
    pub fn free_tile(&self, state: &CellarState, c: Coord) -> bool {
        self.inside(c) && state.object_number(c).is_none()
    }

    /// A crate may be pushed here: walkable, no live bottle, no agent.
    pub fn empty_tile(&self, state: &CellarState, c: Coord) -> bool {
        self.free_tile(state, c) && self.bottle_at(state, c).is_none() && state.agent != c
    }

    pub fn bottle_resolved(&self, state: &CellarState, bottle: usize) -> bool {
        state.bottles[bottle]
            .belief
            .is_resolved(self.params.entropy, self.params.uncertainty_count)
    }

    pub fn object_resolved(&self, state: &CellarState, object: usize) -> bool {
        state.objects[object]
            .belief
            .is_resolved(self.params.entropy, self.params.uncertainty_count)
    }

    /// Checks the structural invariants of `state` against this configuration.
    pub fn validate(&self, state: &CellarState) -> Result<()> {
        if state.bottles.len() != self.layout.bottle_positions.len() {
            return Err(CellarError::Invariant(format!(
                "expected {} bottles, found {}",
                self.layout.bottle_positions.len(),
                state.bottles.len()
            )));
        }
        if state.objects.len() != self.layout.object_positions.len() {
            return Err(CellarError::Invariant(format!(
                "expected {} objects, found {}",
                self.layout.object_positions.len(),
                state.objects.len()
            )));
        }

        let agent = state.agent;
        let exited = agent.x == self.size && agent.y >= 0 && agent.y < self.size;
        if !self.inside(agent) && !exited {
            return Err(CellarError::Invariant(format!("agent out of bounds at {agent:?}")));
        }

        let mut occupied = Grid::new(self.size, None::<usize>);
        for (i, object) in state.active_objects() {
            if !self.inside(object.pos) {
                return Err(CellarError::Invariant(format!(
                    "active object {i} off-grid at {:?}",
                    object.pos
                )));
            }
            if let Some(Some(other)) = occupied.get(object.pos) {
                return Err(CellarError::Invariant(format!(
                    "objects {other} and {i} overlap at {:?}",
                    object.pos
                )));
            }
            occupied.set(object.pos, Some(i));
            if object.pos == agent {
                return Err(CellarError::Invariant(format!("object {i} overlaps the agent")));
            }
            if let Some(b) = self.bottle_at(state, object.pos) {
                return Err(CellarError::Invariant(format!(
                    "object {i} covers live bottle {b}"
                )));
            }
        }

        let valuable_collected = state
            .bottles
            .iter()
            .filter(|b| b.truth.collected && b.truth.valuable)
            .count() as u32;
        if valuable_collected != state.collected_bottles {
            return Err(CellarError::Invariant(format!(
                "collected counter {} disagrees with {} collected valuable bottles",
                state.collected_bottles, valuable_collected
            )));
        }

        if let Some(t) = state.target {
            match state.bottles.get(t) {
                None => {
                    return Err(CellarError::Invariant(format!("target {t} out of range")));
                }
                Some(b) if b.truth.collected => {
                    return Err(CellarError::Invariant(format!(
                        "collected bottle {t} is still targeted"
                    )));
                }
                Some(_) => {}
            }
        }

        let beliefs = state
            .bottles
            .iter()
            .map(|b| &b.belief)
            .chain(state.objects.iter().map(|o| &o.belief));
        for belief in beliefs {
            if !(0.0..=1.0).contains(&belief.probability)
                || belief.agreement.unsigned_abs() > belief.checks
            {
                return Err(CellarError::Invariant(format!("inconsistent belief {belief:?}")));
            }
        }
        Ok(())
    }
}
