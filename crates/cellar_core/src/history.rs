//! Action/observation history and search status handed in by the driver.

use serde::{Deserialize, Serialize};

use crate::engine::Observation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: usize,
    pub observation: Observation,
}

/// Actions taken so far along the current branch, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: usize, observation: Observation) {
        self.entries.push(HistoryEntry {
            action,
            observation,
        });
    }

    pub fn back(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops entries past `len`, used when the driver backs out of a branch.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

/// Where in the search the request comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchPhase {
    #[default]
    Tree,
    Rollout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub phase: SearchPhase,
}

impl Status {
    pub const TREE: Status = Status {
        phase: SearchPhase::Tree,
    };
    pub const ROLLOUT: Status = Status {
        phase: SearchPhase::Rollout,
    };

    pub fn in_rollout(&self) -> bool {
        self.phase == SearchPhase::Rollout
    }
}
