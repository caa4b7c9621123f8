//! Local move for particle reinvigoration.
//!
//! Perturbs the hidden truth of one entity so that a sampled state agrees
//! with the last real observation. Check counts are never reset.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::trace;

use super::actions::{Action, Observation};
use super::probability::efficiency;
use super::Cellar;
use crate::history::{History, Status};
use crate::state::{CellarState, ObjectKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entity {
    Bottle(usize),
    Object(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conditioned {
    Consistent,
    Flipped,
    Impossible,
}

impl Cellar {
    /// Returns false when no consistent perturbation exists; the caller
    /// should then discard the state.
    ///
    /// `step_obs` is the observation the state itself produced for the last
    /// action; the real one is the last history entry.
    pub fn local_move<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        history: &History,
        step_obs: Observation,
        _status: Status,
        rng: &mut R,
    ) -> bool {
        let checked = history.back().and_then(|entry| {
            let entity = match self.actions.decode(entry.action).ok()? {
                Action::CheckBottle(i) => Entity::Bottle(i),
                Action::CheckObject(i) => Entity::Object(i),
                _ => return None,
            };
            let positive = reading(entity, entry.observation)?;
            Some((entity, positive, entry.observation))
        });

        let Some((entity, positive, real_obs)) = checked else {
            return self.flip_random(state, None, rng);
        };

        // The state produced no reading of its own, so it cannot match a real one.
        if reading(entity, step_obs).is_none() {
            trace!(?entity, ?real_obs, ?step_obs, "local move rejected, no reading");
            return false;
        }

        match self.condition(state, entity, positive) {
            Conditioned::Impossible => {
                trace!(?entity, ?real_obs, "local move rejected");
                return false;
            }
            Conditioned::Flipped => trace!(?entity, ?real_obs, "conditioned on real observation"),
            Conditioned::Consistent => {
                if !self.flip_random(state, Some(entity), rng) {
                    return false;
                }
            }
        }

        if step_obs != real_obs {
            self.correct_last_reading(state, entity, positive);
        }
        true
    }

    fn condition(&self, state: &mut CellarState, entity: Entity, positive: bool) -> Conditioned {
        match entity {
            Entity::Bottle(i) => {
                let truth = &mut state.bottles[i].truth;
                if truth.valuable == positive {
                    Conditioned::Consistent
                } else if truth.collected {
                    Conditioned::Impossible
                } else {
                    truth.valuable = positive;
                    Conditioned::Flipped
                }
            }
            Entity::Object(i) => {
                if state.objects[i].is_crate() == positive {
                    Conditioned::Consistent
                } else if !positive && !self.object_flippable(state, i) {
                    // Moved or removed objects are crates.
                    Conditioned::Impossible
                } else {
                    state.objects[i].truth.kind = kind_for(positive);
                    Conditioned::Flipped
                }
            }
        }
    }

    fn object_flippable(&self, state: &CellarState, object: usize) -> bool {
        let o = &state.objects[object];
        o.active && o.pos == self.layout.object_positions[object]
    }

    fn flip_random<R: Rng + ?Sized>(
        &self,
        state: &mut CellarState,
        exclude: Option<Entity>,
        rng: &mut R,
    ) -> bool {
        let bottles = (0..state.bottles.len())
            .filter(|&i| !state.bottles[i].truth.collected)
            .map(Entity::Bottle);
        let objects = (0..state.objects.len())
            .filter(|&i| self.object_flippable(state, i))
            .map(Entity::Object);
        let candidates: Vec<Entity> = bottles
            .chain(objects)
            .filter(|&e| Some(e) != exclude)
            .collect();

        let Some(&entity) = candidates.choose(rng) else {
            return false;
        };
        match entity {
            Entity::Bottle(i) => {
                let truth = &mut state.bottles[i].truth;
                truth.valuable = !truth.valuable;
            }
            Entity::Object(i) => {
                let truth = &mut state.objects[i].truth;
                truth.kind = kind_for(truth.kind == ObjectKind::Shelf);
            }
        }
        trace!(?entity, "flipped hidden truth");
        true
    }

    fn correct_last_reading(&self, state: &mut CellarState, entity: Entity, positive: bool) {
        let half = self.params.half_efficiency_distance;
        match entity {
            Entity::Bottle(i) => {
                let eff = efficiency(state.agent.euclidean(self.bottle_position(i)), half);
                state.bottles[i].belief.replace_last(positive, eff);
            }
            Entity::Object(i) => {
                let eff = efficiency(state.agent.euclidean(state.objects[i].pos), half);
                state.objects[i].belief.replace_last(positive, eff);
            }
        }
    }
}

fn reading(entity: Entity, observation: Observation) -> Option<bool> {
    match (entity, observation) {
        (Entity::Bottle(_), Observation::Good) | (Entity::Object(_), Observation::Crate) => {
            Some(true)
        }
        (Entity::Bottle(_), Observation::Bad) | (Entity::Object(_), Observation::Shelf) => {
            Some(false)
        }
        _ => None,
    }
}

fn kind_for(crate_: bool) -> ObjectKind {
    if crate_ {
        ObjectKind::Crate
    } else {
        ObjectKind::Shelf
    }
}
