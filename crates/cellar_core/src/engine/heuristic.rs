//! PGS guidance potential
//!
//! ```text
//! PGS(s) = Σ φ_b − PGS_DISTANCE · d(s) / (2·size) − PGS_WASTE · wasted_actions
//!
//! φ_b = PGS_VALUABLE    collected, valuable
//!       PGS_WORTHLESS   collected, worthless
//!       PGS_RESOLVED    uncollected, belief resolved
//!       0               otherwise
//! d(s) = Manhattan distance from the agent to its goal
//! ```
//!
//! The goal is the pursued target bottle, or the exit column when no bottle
//! qualifies. [`Cellar::pgs_delta`] recomputes only the terms one action can
//! change and must always agree with [`Cellar::pgs`].

use serde::{Deserialize, Serialize};

use super::actions::Action;
use super::Cellar;
use crate::error::Result;
use crate::grid::Coord;
use crate::state::CellarState;

pub const PGS_VALUABLE: f64 = 1.0;
pub const PGS_WORTHLESS: f64 = -1.0;
pub const PGS_RESOLVED: f64 = 0.25;
pub const PGS_DISTANCE: f64 = 0.5;
pub const PGS_WASTE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Goal {
    Bottle(usize),
    /// Column `x = size`, reached by moving east off the last column.
    Exit,
}

impl Cellar {
    /// Nearest uncollected bottle believed valuable above the activation
    /// threshold. Ties go to the lower index.
    pub fn select_target(&self, state: &CellarState) -> Option<usize> {
        state
            .bottles
            .iter()
            .enumerate()
            .filter(|(i, _)| self.worth_pursuing(state, *i))
            .map(|(i, _)| (state.agent.manhattan(self.bottle_position(i)), i))
            .min()
            .map(|(_, i)| i)
    }

    /// Keeps the current target while it still qualifies, otherwise selects anew.
    pub fn pursued_target(&self, state: &CellarState) -> Option<usize> {
        match state.target {
            Some(t) if t < state.bottles.len() && self.worth_pursuing(state, t) => Some(t),
            _ => self.select_target(state),
        }
    }

    fn worth_pursuing(&self, state: &CellarState, bottle: usize) -> bool {
        let b = &state.bottles[bottle];
        !b.truth.collected && b.belief.probability > self.params.activation_threshold
    }

    pub fn goal(&self, state: &CellarState) -> Goal {
        state.target.map_or(Goal::Exit, Goal::Bottle)
    }

    pub fn goal_distance(&self, state: &CellarState) -> i32 {
        self.goal_distance_from(state, state.agent)
    }

    pub fn goal_distance_from(&self, state: &CellarState, from: Coord) -> i32 {
        match self.goal(state) {
            Goal::Bottle(i) => from.manhattan(self.bottle_position(i)),
            Goal::Exit => (self.size - from.x).max(0),
        }
    }

    fn bottle_potential(&self, state: &CellarState, bottle: usize) -> f64 {
        let truth = state.bottles[bottle].truth;
        match (truth.collected, truth.valuable) {
            (true, true) => PGS_VALUABLE,
            (true, false) => PGS_WORTHLESS,
            (false, _) if self.bottle_resolved(state, bottle) => PGS_RESOLVED,
            (false, _) => 0.0,
        }
    }

    fn distance_potential(&self, state: &CellarState) -> f64 {
        -PGS_DISTANCE * f64::from(self.goal_distance(state)) / f64::from(2 * self.size)
    }

    fn waste_potential(state: &CellarState) -> f64 {
        -PGS_WASTE * f64::from(state.wasted_actions)
    }

    pub fn pgs(&self, state: &CellarState) -> f64 {
        let bottles: f64 = (0..state.bottles.len())
            .map(|i| self.bottle_potential(state, i))
            .sum();
        bottles + self.distance_potential(state) + Self::waste_potential(state)
    }

    /// PGS of `after`, given that `after` is `before` stepped by `action` and
    /// `pgs_before` is `PGS(before)`.
    pub fn pgs_delta(
        &self,
        before: &CellarState,
        after: &CellarState,
        action: usize,
        pgs_before: f64,
    ) -> Result<f64> {
        let touched = match self.actions.decode(action)? {
            Action::Sample => self.bottle_index(before.agent),
            Action::CheckBottle(i) => Some(i),
            Action::Move(_) | Action::CheckObject(_) | Action::Push(_) => None,
        };

        let mut pgs = pgs_before - self.distance_potential(before) + self.distance_potential(after)
            - Self::waste_potential(before)
            + Self::waste_potential(after);
        if let Some(b) = touched {
            pgs += self.bottle_potential(after, b) - self.bottle_potential(before, b);
        }
        Ok(pgs)
    }
}
