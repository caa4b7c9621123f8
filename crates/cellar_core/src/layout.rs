//! Start configurations
//!
//! Positions are fixed once per simulator instance: presets use literal
//! coordinates, every other configuration draws them without replacement from
//! `layout_seed`. Ground truth (bottle value, object type) is drawn anew for
//! every start state.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CellarParams, Preset};
use crate::error::{CellarError, Result};
use crate::grid::{Coord, Grid};
use crate::state::{Bottle, CellarState, Object, ObjectKind};

const SMALL_BOTTLES: [(i32, i32); 1] = [(2, 2)];
const SMALL_OBJECTS: [(i32, i32); 4] = [(1, 1), (1, 3), (3, 1), (3, 3)];

const MEDIUM_BOTTLES: [(i32, i32); 2] = [(1, 4), (3, 1)];
#[rustfmt::skip]
const MEDIUM_OBJECTS: [(i32, i32); 10] = [
    (1, 2), (2, 3), (3, 2), (0, 3), (4, 2),
    (2, 0), (0, 0), (4, 4), (1, 1), (3, 4),
];

#[rustfmt::skip]
const LARGE_BOTTLES: [(i32, i32); 8] = [
    (1, 0), (2, 5), (3, 3), (4, 1), (5, 6), (6, 2), (1, 6), (5, 4),
];
#[rustfmt::skip]
const LARGE_OBJECTS: [(i32, i32); 15] = [
    (1, 3), (2, 2), (2, 4), (3, 1), (3, 5),
    (4, 3), (4, 5), (5, 2), (6, 4), (0, 5),
    (0, 1), (2, 0), (6, 6), (3, 6), (5, 0),
];

#[rustfmt::skip]
const HUGE_BOTTLES: [(i32, i32); 11] = [
    (1, 1), (2, 8), (3, 4), (4, 10), (5, 2), (5, 7),
    (6, 5), (7, 0), (8, 9), (9, 3), (10, 6),
];
#[rustfmt::skip]
const HUGE_OBJECTS: [(i32, i32); 30] = [
    (1, 5), (2, 2), (2, 5), (3, 7), (3, 9), (4, 1), (4, 4), (4, 6), (5, 0), (5, 5),
    (5, 9), (6, 3), (6, 7), (7, 2), (7, 5), (7, 8), (8, 1), (8, 4), (8, 6), (9, 7),
    (9, 10), (10, 2), (10, 4), (10, 8), (0, 8), (0, 2), (1, 9), (2, 0), (3, 1), (6, 10),
];

/// Fixed geometry of one simulator instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub start: Coord,
    pub bottle_positions: Vec<Coord>,
    /// Initial object positions; objects move afterwards.
    pub object_positions: Vec<Coord>,
    pub preset: Option<Preset>,
}

impl Layout {
    pub fn for_params(params: &CellarParams) -> Result<Layout> {
        params.validate()?;
        let layout = match params.matching_preset() {
            Some(preset) => Self::preset(preset),
            None => Self::general(params)?,
        };
        debug!(
            preset = ?layout.preset,
            size = params.size,
            bottles = layout.bottle_positions.len(),
            objects = layout.object_positions.len(),
            "cellar layout ready"
        );
        Ok(layout)
    }

    pub fn preset(preset: Preset) -> Layout {
        let (size, ..) = preset.dimensions();
        let (bottles, objects): (&[(i32, i32)], &[(i32, i32)]) = match preset {
            Preset::Small => (&SMALL_BOTTLES, &SMALL_OBJECTS),
            Preset::Medium => (&MEDIUM_BOTTLES, &MEDIUM_OBJECTS),
            Preset::Large => (&LARGE_BOTTLES, &LARGE_OBJECTS),
            Preset::Huge => (&HUGE_BOTTLES, &HUGE_OBJECTS),
        };
        Layout {
            start: start_tile(size),
            bottle_positions: bottles.iter().copied().map(Coord::from).collect(),
            object_positions: objects.iter().copied().map(Coord::from).collect(),
            preset: Some(preset),
        }
    }

    /// Random positions for an arbitrary configuration, reproducible from `layout_seed`.
    pub fn general(params: &CellarParams) -> Result<Layout> {
        let start = start_tile(params.size);
        let grid = Grid::new(params.size as i32, ());
        let mut free: Vec<Coord> = grid.coords().filter(|&c| c != start).collect();

        let entities = params.bottles + params.num_objects();
        if entities > free.len() {
            return Err(CellarError::LayoutOverflow {
                entities,
                capacity: free.len(),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(params.layout_seed);
        free.shuffle(&mut rng);
        let object_positions = free.split_off(params.bottles);
        let bottle_positions = free;

        Ok(Layout {
            start,
            bottle_positions,
            object_positions: object_positions.into_iter().take(params.num_objects()).collect(),
            preset: None,
        })
    }

    /// Bottle index per tile.
    pub fn bottle_grid(&self, size: i32) -> Grid<Option<usize>> {
        let mut grid = Grid::new(size, None);
        for (i, &pos) in self.bottle_positions.iter().enumerate() {
            grid.set(pos, Some(i));
        }
        grid
    }

    /// Fresh state on this layout with ground truth drawn from the priors.
    pub fn start_state<R: Rng + ?Sized>(&self, params: &CellarParams, rng: &mut R) -> CellarState {
        let bottles = self
            .bottle_positions
            .iter()
            .map(|_| Bottle::new(rng.gen_bool(params.valuable_prior)))
            .collect();

        let kinds: Vec<ObjectKind> = match params.crate_prior {
            Some(p) => self
                .object_positions
                .iter()
                .map(|_| if rng.gen_bool(p) { ObjectKind::Crate } else { ObjectKind::Shelf })
                .collect(),
            None => {
                let mut kinds: Vec<ObjectKind> = std::iter::repeat(ObjectKind::Crate)
                    .take(params.crates)
                    .chain(std::iter::repeat(ObjectKind::Shelf).take(params.shelves))
                    .collect();
                kinds.shuffle(rng);
                kinds
            }
        };

        let objects = self
            .object_positions
            .iter()
            .zip(kinds)
            .map(|(&pos, kind)| Object::new(pos, kind))
            .collect();

        CellarState {
            agent: self.start,
            bottles,
            objects,
            target: None,
            collected_bottles: 0,
            wasted_actions: 0,
        }
    }
}

/// West edge, middle row.
fn start_tile(size: usize) -> Coord {
    Coord::new(0, (size / 2) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_disjoint(layout: &Layout, size: i32) {
        let mut seen = HashSet::new();
        assert!(seen.insert(layout.start));
        for &c in layout.bottle_positions.iter().chain(&layout.object_positions) {
            assert!(c.x >= 0 && c.y >= 0 && c.x < size && c.y < size, "{c:?} off-grid");
            assert!(seen.insert(c), "{c:?} placed twice");
        }
    }

    #[test]
    fn test_presets_are_disjoint_and_sized() {
        for preset in Preset::ALL {
            let params = CellarParams::preset(preset);
            let layout = Layout::for_params(&params).unwrap();
            assert_eq!(layout.preset, Some(preset));
            assert_eq!(layout.bottle_positions.len(), params.bottles);
            assert_eq!(layout.object_positions.len(), params.num_objects());
            assert_disjoint(&layout, params.size as i32);
        }
    }

    #[test]
    fn test_general_layout_is_reproducible() {
        let params = CellarParams::default().with_size(8).with_counts(4, 6, 6).with_layout_seed(7);
        let a = Layout::for_params(&params).unwrap();
        let b = Layout::for_params(&params).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.preset, None);
        assert_disjoint(&a, 8);

        let other = Layout::for_params(&params.clone().with_layout_seed(8)).unwrap();
        assert_ne!(a.bottle_positions, other.bottle_positions);
    }

    #[test]
    fn test_general_layout_can_fill_grid() {
        let params = CellarParams::default().with_size(3).with_counts(2, 3, 3);
        let layout = Layout::for_params(&params).unwrap();
        assert_disjoint(&layout, 3);
        assert_eq!(layout.bottle_positions.len() + layout.object_positions.len(), 8);
    }

    #[test]
    fn test_overfull_general_layout_fails() {
        let params = CellarParams::default().with_size(2).with_counts(2, 1, 1);
        assert!(matches!(
            Layout::for_params(&params),
            Err(CellarError::LayoutOverflow { entities: 4, capacity: 3 })
        ));
    }

    #[test]
    fn test_start_state_is_neutral() {
        let params = CellarParams::preset(Preset::Large);
        let layout = Layout::for_params(&params).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let state = layout.start_state(&params, &mut rng);

        assert_eq!(state.agent, Coord::new(0, 3));
        assert!(state.bottles.iter().all(|b| !b.truth.collected && b.belief.is_neutral()));
        assert!(state
            .objects
            .iter()
            .all(|o| o.active && o.belief.is_neutral() && o.assumed.is_none()));
        let crates = state.objects.iter().filter(|o| o.is_crate()).count();
        assert_eq!(crates, params.crates);
        assert_eq!(state.collected_bottles, 0);
        assert_eq!(state.target, None);
    }

    #[test]
    fn test_crate_prior_overrides_counts() {
        let params = CellarParams {
            crate_prior: Some(1.0),
            ..CellarParams::preset(Preset::Medium)
        };
        let layout = Layout::for_params(&params).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let state = layout.start_state(&params, &mut rng);
        assert!(state.objects.iter().all(|o| o.is_crate()));
    }
}
