//! Action and observation codes.
//!
//! ```text
//! 0..=3                        move north / south / east / west
//! 4                            sample
//! bottle_check..object_check   check bottle i
//! object_check..push           check object i
//! push..push+4                 push north / south / east / west
//! ```
//!
//! Offsets depend on the bottle and object counts and are fixed when the
//! simulator is built.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CellarError, Result};
use crate::grid::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Observation {
    None,
    Good,
    Bad,
    Shelf,
    Crate,
}

impl Observation {
    pub const COUNT: usize = 5;

    pub fn code(self) -> usize {
        match self {
            Observation::None => 0,
            Observation::Good => 1,
            Observation::Bad => 2,
            Observation::Shelf => 3,
            Observation::Crate => 4,
        }
    }

    pub fn from_code(code: usize) -> Option<Observation> {
        match code {
            0 => Some(Observation::None),
            1 => Some(Observation::Good),
            2 => Some(Observation::Bad),
            3 => Some(Observation::Shelf),
            4 => Some(Observation::Crate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Move(Direction),
    Sample,
    CheckBottle(usize),
    CheckObject(usize),
    Push(Direction),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Action::Move(dir) => write!(f, "move {:?}", dir),
            Action::Sample => write!(f, "sample"),
            Action::CheckBottle(i) => write!(f, "check bottle {}", i),
            Action::CheckObject(i) => write!(f, "check object {}", i),
            Action::Push(dir) => write!(f, "push {:?}", dir),
        }
    }
}

pub const SAMPLE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpace {
    pub num_bottles: usize,
    pub num_objects: usize,
    pub bottle_check: usize,
    pub object_check: usize,
    pub push: usize,
}

impl ActionSpace {
    pub fn new(num_bottles: usize, num_objects: usize) -> Self {
        let bottle_check = SAMPLE + 1;
        let object_check = bottle_check + num_bottles;
        let push = object_check + num_objects;
        Self {
            num_bottles,
            num_objects,
            bottle_check,
            object_check,
            push,
        }
    }

    pub fn num_actions(&self) -> usize {
        self.push + Direction::ALL.len()
    }

    pub fn encode(&self, action: Action) -> usize {
        match action {
            Action::Move(dir) => dir.index(),
            Action::Sample => SAMPLE,
            Action::CheckBottle(i) => self.bottle_check + i,
            Action::CheckObject(i) => self.object_check + i,
            Action::Push(dir) => self.push + dir.index(),
        }
    }

    pub fn decode(&self, code: usize) -> Result<Action> {
        let action = if code < SAMPLE {
            Direction::from_index(code).map(Action::Move)
        } else if code == SAMPLE {
            Some(Action::Sample)
        } else if code < self.object_check {
            Some(Action::CheckBottle(code - self.bottle_check))
        } else if code < self.push {
            Some(Action::CheckObject(code - self.object_check))
        } else {
            Direction::from_index(code - self.push).map(Action::Push)
        };
        action.ok_or(CellarError::UnknownAction {
            code,
            num_actions: self.num_actions(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_follow_counts() {
        let space = ActionSpace::new(2, 10);
        assert_eq!(space.bottle_check, 5);
        assert_eq!(space.object_check, 7);
        assert_eq!(space.push, 17);
        assert_eq!(space.num_actions(), 21);
    }

    #[test]
    fn test_decode_boundaries() {
        let space = ActionSpace::new(2, 3);
        assert_eq!(space.decode(0), Ok(Action::Move(Direction::North)));
        assert_eq!(space.decode(3), Ok(Action::Move(Direction::West)));
        assert_eq!(space.decode(4), Ok(Action::Sample));
        assert_eq!(space.decode(5), Ok(Action::CheckBottle(0)));
        assert_eq!(space.decode(6), Ok(Action::CheckBottle(1)));
        assert_eq!(space.decode(7), Ok(Action::CheckObject(0)));
        assert_eq!(space.decode(9), Ok(Action::CheckObject(2)));
        assert_eq!(space.decode(10), Ok(Action::Push(Direction::North)));
        assert_eq!(space.decode(13), Ok(Action::Push(Direction::West)));
        assert_eq!(
            space.decode(14),
            Err(CellarError::UnknownAction { code: 14, num_actions: 14 })
        );
    }

    #[test]
    fn test_every_code_encodes_back() {
        let space = ActionSpace::new(3, 4);
        for code in 0..space.num_actions() {
            let action = space.decode(code).unwrap();
            assert_eq!(space.encode(action), code, "{action}");
        }
    }

    #[test]
    fn test_no_entities_leaves_moves_sample_push() {
        let space = ActionSpace::new(0, 0);
        assert_eq!(space.num_actions(), 9);
        assert_eq!(space.decode(5), Ok(Action::Push(Direction::North)));
    }

    #[test]
    fn test_observation_codes() {
        for code in 0..Observation::COUNT {
            assert_eq!(Observation::from_code(code).unwrap().code(), code);
        }
        assert_eq!(Observation::from_code(Observation::COUNT), None);
    }
}
