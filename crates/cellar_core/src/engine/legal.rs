//! Legal, preferred and PGS-greedy action sets.

use rand::Rng;

use super::actions::Action;
use super::probability::efficiency;
use super::Cellar;
use crate::error::Result;
use crate::grid::{Coord, Direction};
use crate::history::{History, Status};
use crate::state::{CellarState, ObjectKind};

/// Further checks of one bottle are not preferred past this count.
pub const MAX_PREFERRED_CHECKS: u32 = 5;

const GAIN_EPSILON: f64 = 1e-9;

impl Cellar {
    /// Actions a driver may choose from. Empty for a terminal state.
    pub fn legal_actions(
        &self,
        state: &CellarState,
        _history: &History,
        _status: Status,
    ) -> Vec<usize> {
        self.legal(state)
    }

    fn legal(&self, state: &CellarState) -> Vec<usize> {
        if self.is_terminal(state) {
            return Vec::new();
        }
        let mut legal = Vec::new();
        for dir in Direction::ALL {
            let next = state.agent.step(dir);
            let exits = dir == Direction::East && next.x == self.size;
            if exits || self.free_tile(state, next) {
                legal.push(self.actions.encode(Action::Move(dir)));
            }
        }
        if self.bottle_at(state, state.agent).is_some() {
            legal.push(self.actions.encode(Action::Sample));
        }
        for i in 0..state.bottles.len() {
            if !state.bottles[i].truth.collected && !self.bottle_resolved(state, i) {
                legal.push(self.actions.encode(Action::CheckBottle(i)));
            }
        }
        for i in 0..state.objects.len() {
            if state.objects[i].active && !self.object_resolved(state, i) {
                legal.push(self.actions.encode(Action::CheckObject(i)));
            }
        }
        for dir in Direction::ALL {
            if state.object_number(state.agent.step(dir)).is_some() {
                legal.push(self.actions.encode(Action::Push(dir)));
            }
        }
        legal
    }

    /// Legal actions the rollout policy ranks non-negatively; all legal
    /// actions when none qualifies.
    pub fn preferred_actions(
        &self,
        state: &CellarState,
        history: &History,
        status: Status,
    ) -> Vec<usize> {
        let legal = self.legal(state);
        let preferred: Vec<usize> = legal
            .iter()
            .copied()
            .filter(|&a| self.rank_action(state, a, history, status) >= 0.0)
            .collect();
        if preferred.is_empty() {
            legal
        } else {
            preferred
        }
    }

    /// Heuristic value of taking `action`; negative means not worth trying.
    pub fn rank_action(
        &self,
        state: &CellarState,
        action: usize,
        history: &History,
        status: Status,
    ) -> f64 {
        let Ok(action) = self.actions.decode(action) else {
            return -1.0;
        };
        match action {
            Action::Move(dir) => {
                let undoes_last = history
                    .back()
                    .and_then(|entry| self.actions.decode(entry.action).ok())
                    .is_some_and(|last| last == Action::Move(dir.opposite()));
                let closer = self.goal_distance_from(state, state.agent.step(dir))
                    < self.goal_distance(state);
                if closer && !undoes_last {
                    1.0
                } else {
                    -1.0
                }
            }
            Action::Sample => {
                let threshold = self.params.activation_threshold;
                match self.bottle_at(state, state.agent) {
                    Some(i) => {
                        let belief = &state.bottles[i].belief;
                        if belief.checks > 0 && belief.probability > threshold {
                            belief.probability - threshold
                        } else {
                            -1.0
                        }
                    }
                    None => -1.0,
                }
            }
            Action::CheckBottle(i) => {
                if self.bottle_resolved(state, i)
                    || state.bottles[i].belief.checks >= MAX_PREFERRED_CHECKS
                {
                    return -1.0;
                }
                let distance = state.agent.euclidean(self.bottle_position(i));
                efficiency(distance, self.params.half_efficiency_distance) - 0.5
            }
            Action::CheckObject(i) => {
                let object = &state.objects[i];
                let assumed = status.in_rollout() && object.assumed.is_some();
                if self.blocks_progress(state, i) && !self.object_resolved(state, i) && !assumed {
                    0.5
                } else {
                    -1.0
                }
            }
            Action::Push(dir) => {
                let Some(i) = state.object_number(state.agent.step(dir)) else {
                    return -1.0;
                };
                let object = &state.objects[i];
                let crate_likely = match (status.in_rollout(), object.assumed) {
                    (true, Some(kind)) => kind == ObjectKind::Crate,
                    _ => object.belief.probability >= 0.5,
                };
                if self.blocks_progress(state, i) && crate_likely {
                    (object.belief.probability - 0.5).max(0.0)
                } else {
                    -1.0
                }
            }
        }
    }

    /// Active object standing on some shortest path from the agent to its goal.
    pub fn blocks_progress(&self, state: &CellarState, object: usize) -> bool {
        let object = &state.objects[object];
        object.active && self.on_shortest_path(state, object.pos)
    }

    fn on_shortest_path(&self, state: &CellarState, c: Coord) -> bool {
        c != state.agent
            && state.agent.manhattan(c) + self.goal_distance_from(state, c)
                == self.goal_distance(state)
    }

    /// Legal actions with the largest one-step PGS gain.
    ///
    /// Each candidate is simulated on a copy with a transition-only step and
    /// scored with the incremental potential.
    pub fn pgs_actions<R: Rng + ?Sized>(
        &self,
        state: &CellarState,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        let base = self.pgs(state);
        let mut best = Vec::new();
        let mut best_gain = f64::NEG_INFINITY;
        for action in self.legal(state) {
            let mut next = self.copy_state(state);
            self.step_transition_only(&mut next, action, rng)?;
            let gain = self.pgs_delta(state, &next, action, base)? - base;
            if gain > best_gain + GAIN_EPSILON {
                best_gain = gain;
                best.clear();
                best.push(action);
            } else if gain >= best_gain - GAIN_EPSILON {
                best.push(action);
            }
        }
        Ok(best)
    }
}
