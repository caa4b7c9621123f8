//! Contract between a search driver and a simulated domain.

use rand::Rng;

use crate::engine::{Cellar, Observation, StepOutcome};
use crate::error::Result;
use crate::history::{History, Status};
use crate::state::CellarState;

/// Operations a tree-search driver needs from a domain. States are owned by
/// the caller; each concurrent branch steps its own copy.
pub trait Simulator {
    type State: Clone;

    fn num_actions(&self) -> usize;
    fn num_observations(&self) -> usize;
    fn discount(&self) -> f64;

    fn create_start_state<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::State;

    fn copy_state(&self, state: &Self::State) -> Self::State {
        state.clone()
    }

    fn validate(&self, state: &Self::State) -> Result<()>;
    fn is_terminal(&self, state: &Self::State) -> bool;

    fn step<R: Rng + ?Sized>(
        &self,
        state: &mut Self::State,
        action: usize,
        rng: &mut R,
    ) -> Result<StepOutcome>;

    fn step_shaped<R: Rng + ?Sized>(
        &self,
        state: &mut Self::State,
        action: usize,
        rng: &mut R,
    ) -> Result<StepOutcome>;

    fn step_transition_only<R: Rng + ?Sized>(
        &self,
        state: &mut Self::State,
        action: usize,
        rng: &mut R,
    ) -> Result<Observation>;

    fn legal_actions(&self, state: &Self::State, history: &History, status: Status) -> Vec<usize>;
    fn preferred_actions(
        &self,
        state: &Self::State,
        history: &History,
        status: Status,
    ) -> Vec<usize>;

    /// Greedy guidance set; domains without one fall back to the preferred set.
    fn guided_actions<R: Rng + ?Sized>(
        &self,
        state: &Self::State,
        history: &History,
        status: Status,
        _rng: &mut R,
    ) -> Result<Vec<usize>> {
        Ok(self.preferred_actions(state, history, status))
    }

    fn local_move<R: Rng + ?Sized>(
        &self,
        state: &mut Self::State,
        history: &History,
        step_obs: Observation,
        status: Status,
        rng: &mut R,
    ) -> bool;
}

impl Simulator for Cellar {
    type State = CellarState;

    fn num_actions(&self) -> usize {
        Cellar::num_actions(self)
    }

    fn num_observations(&self) -> usize {
        Observation::COUNT
    }

    fn discount(&self) -> f64 {
        Cellar::discount(self)
    }

    fn create_start_state<R: Rng + ?Sized>(&self, rng: &mut R) -> CellarState {
        Cellar::create_start_state(self, rng)
    }

    fn validate(&self, state: &CellarState) -> Result<()> {
        Cellar::validate(self, state)
    }

    fn is_terminal(&self, state: &CellarState) -> bool {
        Cellar::is_terminal(self, state)
    }

    fn step<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        action: usize,
        rng: &mut R,
    ) -> Result<StepOutcome> {
        Cellar::step(self, state, action, rng)
    }

    fn step_shaped<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        action: usize,
        rng: &mut R,
    ) -> Result<StepOutcome> {
        Cellar::step_shaped(self, state, action, rng)
    }

    fn step_transition_only<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        action: usize,
        rng: &mut R,
    ) -> Result<Observation> {
        Cellar::step_transition_only(self, state, action, rng)
    }

    fn legal_actions(&self, state: &CellarState, history: &History, status: Status) -> Vec<usize> {
        Cellar::legal_actions(self, state, history, status)
    }

    fn preferred_actions(
        &self,
        state: &CellarState,
        history: &History,
        status: Status,
    ) -> Vec<usize> {
        Cellar::preferred_actions(self, state, history, status)
    }

    fn guided_actions<R: Rng + ?Sized>(
        &self,
        state: &CellarState,
        _history: &History,
        _status: Status,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        self.pgs_actions(state, rng)
    }

    fn local_move<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        history: &History,
        step_obs: Observation,
        status: Status,
        rng: &mut R,
    ) -> bool {
        Cellar::local_move(self, state, history, step_obs, status, rng)
    }
}
