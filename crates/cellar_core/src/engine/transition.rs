//! Transition engine
//!
//! One transition function serves every entry point; [`StepOptions`] picks
//! whether a reward is computed and whether it is shaped by the PGS potential.
//!
//! Every in-range action is defined in every non-terminal state. Actions the
//! legal generator would exclude still execute: blocked or off-grid moves
//! leave the agent in place, failed pushes and empty samples are penalised.
//! Unknown codes and steps on a terminal state are rejected.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::actions::{Action, Observation};
use super::probability::{efficiency, noisy_reading};
use super::Cellar;
use crate::error::{CellarError, Result};
use crate::grid::Direction;
use crate::state::{CellarState, ObjectKind};

/// Accrued by every step on top of any action-specific reward.
pub const STEP_PENALTY: f64 = -1.0;
pub const VALUABLE_REWARD: f64 = 10.0;
pub const WORTHLESS_PENALTY: f64 = -10.0;
pub const EMPTY_SAMPLE_PENALTY: f64 = -10.0;
pub const PUSH_PENALTY: f64 = -10.0;
/// Paid per valuable bottle carried out of the east edge.
pub const EXIT_REWARD: f64 = 10.0;
pub const EMPTY_EXIT_PENALTY: f64 = -10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shaping {
    None,
    /// `r + γ·PGS(s') − PGS(s)`
    Potential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOptions {
    pub shaping: Shaping,
    pub with_reward: bool,
}

impl StepOptions {
    pub const PLAIN: StepOptions = StepOptions {
        shaping: Shaping::None,
        with_reward: true,
    };
    pub const SHAPED: StepOptions = StepOptions {
        shaping: Shaping::Potential,
        with_reward: true,
    };
    pub const TRANSITION_ONLY: StepOptions = StepOptions {
        shaping: Shaping::None,
        with_reward: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub observation: Observation,
    /// Zero when the reward was skipped.
    pub reward: f64,
    pub terminal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushResult {
    Moved,
    Removed,
    Blocked,
    Shelf,
    Nothing,
}

impl Cellar {
    pub fn step<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        action: usize,
        rng: &mut R,
    ) -> Result<StepOutcome> {
        self.transition(state, action, StepOptions::PLAIN, rng)
    }

    pub fn step_shaped<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        action: usize,
        rng: &mut R,
    ) -> Result<StepOutcome> {
        self.transition(state, action, StepOptions::SHAPED, rng)
    }

    pub fn step_transition_only<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        action: usize,
        rng: &mut R,
    ) -> Result<Observation> {
        self.transition(state, action, StepOptions::TRANSITION_ONLY, rng)
            .map(|outcome| outcome.observation)
    }

    pub fn transition<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        action: usize,
        options: StepOptions,
        rng: &mut R,
    ) -> Result<StepOutcome> {
        if self.is_terminal(state) {
            return Err(CellarError::TerminalState);
        }
        let decoded = self.actions.decode(action)?;

        let shaped = options.with_reward && options.shaping == Shaping::Potential;
        let potential_before = if shaped { self.pgs(state) } else { 0.0 };

        let (observation, reward) = self.apply(state, decoded, rng);
        state.target = self.pursued_target(state);

        let reward = match (options.with_reward, shaped) {
            (false, _) => 0.0,
            (true, false) => reward,
            (true, true) => reward + self.params.discount * self.pgs(state) - potential_before,
        };

        Ok(StepOutcome {
            observation,
            reward,
            terminal: self.is_terminal(state),
        })
    }

    fn apply<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        action: Action,
        rng: &mut R,
    ) -> (Observation, f64) {
        let mut reward = STEP_PENALTY;
        let mut observation = Observation::None;
        match action {
            Action::Move(dir) => reward += self.apply_move(state, dir),
            Action::Sample => reward += self.apply_sample(state),
            Action::CheckBottle(i) => observation = self.check_bottle(state, i, rng),
            Action::CheckObject(i) => observation = self.check_object(state, i, rng),
            Action::Push(dir) => {
                let result = self.apply_push(state, dir);
                trace!(?dir, ?result, "push");
                if !matches!(result, PushResult::Moved | PushResult::Removed) {
                    state.wasted_actions += 1;
                    reward += PUSH_PENALTY;
                }
            }
        }
        (observation, reward)
    }

    fn apply_move(&self, state: &mut CellarState, dir: Direction) -> f64 {
        let next = state.agent.step(dir);
        if dir == Direction::East && next.x == self.size {
            state.agent = next;
            return if state.collected_bottles > 0 {
                EXIT_REWARD * f64::from(state.collected_bottles)
            } else {
                EMPTY_EXIT_PENALTY
            };
        }
        if self.free_tile(state, next) {
            state.agent = next;
        } else {
            state.wasted_actions += 1;
        }
        0.0
    }

    fn apply_sample(&self, state: &mut CellarState) -> f64 {
        let Some(i) = self.bottle_at(state, state.agent) else {
            state.wasted_actions += 1;
            return EMPTY_SAMPLE_PENALTY;
        };
        let bottle = &mut state.bottles[i];
        bottle.truth.collected = true;
        if bottle.truth.valuable {
            state.collected_bottles += 1;
            VALUABLE_REWARD
        } else {
            WORTHLESS_PENALTY
        }
    }

    fn check_bottle<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        bottle: usize,
        rng: &mut R,
    ) -> Observation {
        if state.bottles[bottle].truth.collected || self.bottle_resolved(state, bottle) {
            state.wasted_actions += 1;
        }
        let distance = state.agent.euclidean(self.bottle_position(bottle));
        let eff = efficiency(distance, self.params.half_efficiency_distance);
        let entry = &mut state.bottles[bottle];
        let good = noisy_reading(entry.truth.valuable, eff, rng);
        entry.belief.record(good, eff);
        if good {
            Observation::Good
        } else {
            Observation::Bad
        }
    }

    fn check_object<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        object: usize,
        rng: &mut R,
    ) -> Observation {
        if !state.objects[object].active {
            state.wasted_actions += 1;
            return Observation::None;
        }
        if self.object_resolved(state, object) {
            state.wasted_actions += 1;
        }
        let distance = state.agent.euclidean(state.objects[object].pos);
        let eff = efficiency(distance, self.params.half_efficiency_distance);
        let entry = &mut state.objects[object];
        let reads_crate = noisy_reading(entry.is_crate(), eff, rng);
        entry.belief.record(reads_crate, eff);

        if self.object_resolved(state, object) {
            let entry = &mut state.objects[object];
            entry.assumed = Some(if entry.belief.probability >= 0.5 {
                ObjectKind::Crate
            } else {
                ObjectKind::Shelf
            });
        }
        if reads_crate {
            Observation::Crate
        } else {
            Observation::Shelf
        }
    }

    fn apply_push(&self, state: &mut CellarState, dir: Direction) -> PushResult {
        let faced = state.agent.step(dir);
        let Some(i) = state.object_number(faced) else {
            return PushResult::Nothing;
        };
        if !state.objects[i].is_crate() {
            return PushResult::Shelf;
        }
        let beyond = faced.step(dir);
        if !self.inside(beyond) {
            let object = &mut state.objects[i];
            object.active = false;
            object.assumed = Some(ObjectKind::Crate);
            return PushResult::Removed;
        }
        if !self.empty_tile(state, beyond) {
            return PushResult::Blocked;
        }
        let object = &mut state.objects[i];
        object.pos = beyond;
        object.assumed = Some(ObjectKind::Crate);
        PushResult::Moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CellarParams, Preset};
    use crate::grid::Coord;
    use crate::state::Object;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    /// Small preset with a known valuable bottle at (2, 2), agent at (0, 2).
    fn small(valuable: bool) -> (Cellar, CellarState) {
        let cellar = Cellar::new(CellarParams::preset(Preset::Small)).unwrap();
        let mut state = cellar.create_start_state(&mut rng());
        state.bottles[0].truth.valuable = valuable;
        (cellar, state)
    }

    /// 5×5 grid with one crate at (2, 2) and one shelf at (2, 3), agent at (1, 2).
    fn push_world() -> (Cellar, CellarState) {
        let params = CellarParams::default().with_size(5).with_counts(0, 1, 1);
        let cellar = Cellar::new(params).unwrap();
        let mut state = cellar.create_start_state(&mut rng());
        state.agent = Coord::new(1, 2);
        state.objects = vec![
            Object::new(Coord::new(2, 2), ObjectKind::Crate),
            Object::new(Coord::new(1, 3), ObjectKind::Shelf),
        ];
        (cellar, state)
    }

    fn code(cellar: &Cellar, action: Action) -> usize {
        cellar.actions().encode(action)
    }

    #[test]
    fn test_move_and_blocked_move() {
        let (cellar, mut state) = small(true);
        let out = cellar.step(&mut state, code(&cellar, Action::Move(Direction::East)), &mut rng()).unwrap();
        assert_eq!(state.agent, Coord::new(1, 2));
        assert_eq!(out.observation, Observation::None);
        assert_eq!(out.reward, STEP_PENALTY);

        // Shelf at (1, 3) blocks the way north: no-op with the step penalty.
        let before = state.clone();
        let out = cellar.step(&mut state, code(&cellar, Action::Move(Direction::North)), &mut rng()).unwrap();
        assert_eq!(out.reward, STEP_PENALTY);
        assert_eq!(state.agent, before.agent);
        assert_eq!(state.wasted_actions, before.wasted_actions + 1);
    }

    #[test]
    fn test_off_grid_move_is_noop() {
        let (cellar, mut state) = small(true);
        let out = cellar.step(&mut state, code(&cellar, Action::Move(Direction::West)), &mut rng()).unwrap();
        assert_eq!(state.agent, Coord::new(0, 2));
        assert_eq!(out.reward, STEP_PENALTY);
        assert!(!out.terminal);
    }

    #[test]
    fn test_sample_is_collected_once() {
        let (cellar, mut state) = small(true);
        state.agent = Coord::new(2, 2);
        let sample = code(&cellar, Action::Sample);

        let first = cellar.step(&mut state, sample, &mut rng()).unwrap();
        assert_eq!(first.reward, STEP_PENALTY + VALUABLE_REWARD);
        assert!(state.bottles[0].truth.collected);
        assert_eq!(state.collected_bottles, 1);

        let second = cellar.step(&mut state, sample, &mut rng()).unwrap();
        assert_eq!(second.reward, STEP_PENALTY + EMPTY_SAMPLE_PENALTY);
        assert!(state.bottles[0].truth.collected);
        assert_eq!(state.collected_bottles, 1);
        assert!(cellar.validate(&state).is_ok());
    }

    #[test]
    fn test_sample_worthless_and_empty() {
        let (cellar, mut state) = small(false);
        let sample = code(&cellar, Action::Sample);

        let out = cellar.step(&mut state, sample, &mut rng()).unwrap();
        assert_eq!(out.reward, STEP_PENALTY + EMPTY_SAMPLE_PENALTY);

        state.agent = Coord::new(2, 2);
        let out = cellar.step(&mut state, sample, &mut rng()).unwrap();
        assert_eq!(out.reward, STEP_PENALTY + WORTHLESS_PENALTY);
        assert_eq!(state.collected_bottles, 0);
        assert!(state.bottles[0].truth.collected);
    }

    #[test]
    fn test_exit_with_and_without_bottles() {
        let (cellar, mut state) = small(true);
        state.agent = Coord::new(4, 2);
        let east = code(&cellar, Action::Move(Direction::East));

        let mut empty = state.clone();
        let out = cellar.step(&mut empty, east, &mut rng()).unwrap();
        assert!(out.terminal);
        assert!(out.reward <= 0.0);
        assert!(cellar.is_terminal(&empty));

        state.bottles[0].truth.collected = true;
        state.collected_bottles = 1;
        let out = cellar.step(&mut state, east, &mut rng()).unwrap();
        assert!(out.terminal);
        assert!(out.reward > 0.0);
        assert_eq!(state.agent, Coord::new(5, 2));
        assert!(cellar.validate(&state).is_ok());

        assert_eq!(cellar.step(&mut state, east, &mut rng()), Err(CellarError::TerminalState));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let (cellar, mut state) = small(true);
        let before = state.clone();
        let n = cellar.num_actions();
        assert!(matches!(
            cellar.step(&mut state, n, &mut rng()),
            Err(CellarError::UnknownAction { .. })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_push_crate_into_empty_tile() {
        let (cellar, mut state) = push_world();
        let before = state.clone();
        let out = cellar.step(&mut state, code(&cellar, Action::Push(Direction::East)), &mut rng()).unwrap();
        assert_eq!(out.reward, STEP_PENALTY);
        assert_eq!(state.objects[0].pos, Coord::new(3, 2));
        assert_eq!(state.objects[1].pos, before.objects[1].pos);
        assert_eq!(state.agent, before.agent);
        assert!(state.crate_at(Coord::new(3, 2)));
        assert!(!state.crate_at(Coord::new(2, 2)));
    }

    #[test]
    fn test_push_crate_off_grid_deactivates() {
        let (cellar, mut state) = push_world();
        state.objects[0].pos = Coord::new(4, 2);
        state.agent = Coord::new(3, 2);
        let out = cellar.step(&mut state, code(&cellar, Action::Push(Direction::East)), &mut rng()).unwrap();
        assert_eq!(out.reward, STEP_PENALTY);
        assert!(!state.objects[0].active);
        assert!(!state.crate_at(Coord::new(4, 2)));
        assert_eq!(state.object_number(Coord::new(4, 2)), None);
        assert!(cellar.free_tile(&state, Coord::new(4, 2)));
        assert!(cellar.validate(&state).is_ok());
    }

    #[test]
    fn test_push_shelf_or_nothing_is_penalised() {
        let (cellar, mut state) = push_world();
        let before = state.clone();

        let out = cellar.step(&mut state, code(&cellar, Action::Push(Direction::North)), &mut rng()).unwrap();
        assert_eq!(out.reward, STEP_PENALTY + PUSH_PENALTY);
        assert_eq!(state.objects, before.objects);
        assert_eq!(state.agent, before.agent);

        let out = cellar.step(&mut state, code(&cellar, Action::Push(Direction::South)), &mut rng()).unwrap();
        assert_eq!(out.reward, STEP_PENALTY + PUSH_PENALTY);
        assert_eq!(state.objects, before.objects);
        assert_eq!(state.wasted_actions, before.wasted_actions + 2);
    }

    #[test]
    fn test_push_into_blocked_tile_fails() {
        let (cellar, mut state) = push_world();
        state.objects[1].pos = Coord::new(3, 2);
        let before = state.clone();
        let out = cellar.step(&mut state, code(&cellar, Action::Push(Direction::East)), &mut rng()).unwrap();
        assert_eq!(out.reward, STEP_PENALTY + PUSH_PENALTY);
        assert_eq!(state.objects, before.objects);
    }

    #[test]
    fn test_checks_update_belief_and_observe() {
        let (cellar, mut state) = small(true);
        state.agent = Coord::new(2, 2);
        let out = cellar.step(&mut state, code(&cellar, Action::CheckBottle(0)), &mut rng()).unwrap();
        // Distance zero: the sensor is exact.
        assert_eq!(out.observation, Observation::Good);
        assert_eq!(out.reward, STEP_PENALTY);
        assert_eq!(state.bottles[0].belief.checks, 1);
        assert!(cellar.bottle_resolved(&state, 0));
        assert_eq!(state.target, Some(0));
    }

    #[test]
    fn test_object_check_sets_assumed_type_once_resolved() {
        let (cellar, mut state) = push_world();
        let vague = Cellar::new(cellar.params().clone().with_half_efficiency_distance(1e-3)).unwrap();
        let out = vague.step(&mut state, code(&vague, Action::CheckObject(1)), &mut rng()).unwrap();
        // A coin-flip sensor leaves the belief where it was.
        assert!(matches!(out.observation, Observation::Crate | Observation::Shelf));
        assert_eq!(state.objects[1].belief.checks, 1);
        assert_eq!(state.objects[1].assumed, None);

        let out = cellar.step(&mut state, code(&cellar, Action::CheckObject(0)), &mut rng()).unwrap();
        let expected = if out.observation == Observation::Crate {
            ObjectKind::Crate
        } else {
            ObjectKind::Shelf
        };
        assert!(cellar.object_resolved(&state, 0));
        assert_eq!(state.objects[0].assumed, Some(expected));
    }

    #[test]
    fn test_check_inactive_object_is_wasted() {
        let (cellar, mut state) = push_world();
        state.objects[0].active = false;
        let out = cellar.step(&mut state, code(&cellar, Action::CheckObject(0)), &mut rng()).unwrap();
        assert_eq!(out.observation, Observation::None);
        assert_eq!(state.wasted_actions, 1);
        assert_eq!(state.objects[0].belief.checks, 0);
    }

    #[test]
    fn test_transition_only_skips_reward() {
        let (cellar, mut state) = small(true);
        state.agent = Coord::new(2, 2);
        let mut twin = state.clone();
        let obs = cellar
            .step_transition_only(&mut state, code(&cellar, Action::Sample), &mut rng())
            .unwrap();
        cellar.step(&mut twin, code(&cellar, Action::Sample), &mut rng()).unwrap();
        assert_eq!(obs, Observation::None);
        assert_eq!(state, twin);
    }

    #[test]
    fn test_shaped_step_matches_potential_difference() {
        let (cellar, mut state) = small(true);
        let mut plain = state.clone();
        let east = code(&cellar, Action::Move(Direction::East));
        let before = cellar.pgs(&state);

        let shaped = cellar.step_shaped(&mut state, east, &mut rng()).unwrap();
        let unshaped = cellar.step(&mut plain, east, &mut rng()).unwrap();
        assert_eq!(state, plain);

        let expected = unshaped.reward + cellar.discount() * cellar.pgs(&state) - before;
        assert!((shaped.reward - expected).abs() < 1e-12);
        assert_eq!(shaped.observation, unshaped.observation);
    }

    fn scripted(cellar: &Cellar) -> Vec<usize> {
        [
            Action::Move(Direction::East),
            Action::Move(Direction::East),
            Action::CheckBottle(0),
            Action::Sample,
            Action::Move(Direction::East),
            Action::Move(Direction::East),
            Action::Move(Direction::East),
        ]
        .into_iter()
        .map(|a| code(cellar, a))
        .collect()
    }

    #[test]
    fn test_small_scenario_collect_and_exit() {
        let (cellar, mut state) = small(true);
        let mut total = 0.0;
        let mut last = None;
        for action in scripted(&cellar) {
            let out = cellar.step(&mut state, action, &mut rng()).unwrap();
            total += out.reward;
            last = Some(out);
        }
        assert!(last.is_some_and(|out| out.terminal));
        assert_eq!(state.collected_bottles, 1);
        assert_eq!(total, 7.0 * STEP_PENALTY + VALUABLE_REWARD + EXIT_REWARD);

        // Walking straight out without sampling only accrues penalties.
        let (cellar, mut wanderer) = small(true);
        let east = code(&cellar, Action::Move(Direction::East));
        let mut wander_total = 0.0;
        while !cellar.is_terminal(&wanderer) {
            wander_total += cellar.step(&mut wanderer, east, &mut rng()).unwrap().reward;
        }
        assert!(total > wander_total);
        assert!(wander_total < 0.0);
    }

    #[test]
    fn test_shaping_telescopes() {
        for discount in [1.0, 0.95] {
            let params = CellarParams::preset(Preset::Small).with_discount(discount);
            let cellar = Cellar::new(params).unwrap();
            let mut shaped_state = cellar.create_start_state(&mut rng());
            let mut plain_state = shaped_state.clone();
            let initial = cellar.pgs(&shaped_state);

            let mut shaped_rng = ChaCha8Rng::seed_from_u64(77);
            let mut plain_rng = ChaCha8Rng::seed_from_u64(77);
            let (mut shaped_sum, mut plain_sum, mut scale) = (0.0, 0.0, 1.0);
            for action in scripted(&cellar).into_iter().take(5) {
                shaped_sum += scale * cellar.step_shaped(&mut shaped_state, action, &mut shaped_rng).unwrap().reward;
                plain_sum += scale * cellar.step(&mut plain_state, action, &mut plain_rng).unwrap().reward;
                scale *= discount;
            }
            assert_eq!(shaped_state, plain_state);

            let expected = plain_sum + scale * cellar.pgs(&shaped_state) - initial;
            assert!((shaped_sum - expected).abs() < 1e-9, "discount {discount}");
        }
    }

    #[test]
    fn test_check_accuracy_falls_with_distance() {
        let params = CellarParams::default()
            .with_size(12)
            .with_counts(1, 0, 0)
            .with_half_efficiency_distance(2.0);
        let cellar = Cellar::new(params).unwrap();
        let mut rng = rng();
        let mut template = cellar.create_start_state(&mut rng);
        template.bottles[0].truth.valuable = true;
        let bottle = cellar.bottle_position(0);
        let check = code(&cellar, Action::CheckBottle(0));

        // A tile roughly four half-efficiency distances (8 tiles) away.
        let far = cellar
            .layout()
            .bottle_grid(cellar.size())
            .coords()
            .filter(|&c| c != bottle)
            .min_by(|a, b| {
                let da = (a.euclidean(bottle) - 8.0).abs();
                let db = (b.euclidean(bottle) - 8.0).abs();
                da.total_cmp(&db)
            })
            .unwrap();
        assert!(far.euclidean(bottle) >= 7.0);

        let trials = 2000;
        let mut correct = |agent: Coord| {
            (0..trials)
                .filter(|_| {
                    let mut state = template.clone();
                    state.agent = agent;
                    cellar.step(&mut state, check, &mut rng).unwrap().observation == Observation::Good
                })
                .count()
        };
        let near_hits = correct(bottle);
        let far_hits = correct(far);

        assert_eq!(near_hits, trials);
        // Expected far accuracy is about 0.53–0.56; allow generous slack.
        assert!(far_hits < trials * 3 / 4, "far accuracy too high: {far_hits}/{trials}");
        assert!(far_hits > trials * 2 / 5, "far accuracy too low: {far_hits}/{trials}");
    }

    #[test]
    fn test_object_check_accuracy_falls_with_distance() {
        let params = CellarParams::default()
            .with_size(12)
            .with_counts(0, 1, 0)
            .with_half_efficiency_distance(2.0);
        let cellar = Cellar::new(params).unwrap();
        let mut rng = rng();
        let template = cellar.create_start_state(&mut rng);
        assert!(template.objects[0].is_crate());
        let object = template.objects[0].pos;
        let check = code(&cellar, Action::CheckObject(0));

        let far = cellar
            .layout()
            .bottle_grid(cellar.size())
            .coords()
            .filter(|&c| c != object)
            .min_by(|a, b| {
                let da = (a.euclidean(object) - 8.0).abs();
                let db = (b.euclidean(object) - 8.0).abs();
                da.total_cmp(&db)
            })
            .unwrap();
        assert!(far.euclidean(object) >= 7.0);

        let trials = 2000;
        let mut correct = |agent: Coord| {
            (0..trials)
                .filter(|_| {
                    let mut state = template.clone();
                    state.agent = agent;
                    cellar.step(&mut state, check, &mut rng).unwrap().observation == Observation::Crate
                })
                .count()
        };
        let near_hits = correct(object);
        let far_hits = correct(far);

        assert_eq!(near_hits, trials);
        assert!(far_hits < trials * 3 / 4, "far accuracy too high: {far_hits}/{trials}");
        assert!(far_hits > trials * 2 / 5, "far accuracy too low: {far_hits}/{trials}");
    }
}
