//! World state of one simulated trajectory node.
//!
//! Each entity record keeps its hidden ground truth and the running belief
//! about it as separate views, so invariant checks only read the truth side
//! and belief bookkeeping never touches it.

use serde::{Deserialize, Serialize};

use crate::grid::Coord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Pushable
    Crate,
    /// Immovable
    Shelf,
}

/// Running evidence about one binary hidden attribute.
///
/// "Positive" means valuable for bottles and crate for objects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    /// Number of checks observed.
    pub checks: u32,
    /// Positive observations minus negative observations.
    pub agreement: i32,
    pub likelihood_positive: f64,
    pub likelihood_negative: f64,
    /// Posterior probability of the positive hypothesis.
    pub probability: f64,
}

impl Default for Belief {
    fn default() -> Self {
        Self {
            checks: 0,
            agreement: 0,
            likelihood_positive: 1.0,
            likelihood_negative: 1.0,
            probability: 0.5,
        }
    }
}

impl Belief {
    /// Bayesian update for one observation from a sensor that is correct with
    /// probability `efficiency`.
    pub fn record(&mut self, positive: bool, efficiency: f64) {
        self.checks += 1;
        if positive {
            self.agreement += 1;
            self.likelihood_positive *= efficiency;
            self.likelihood_negative *= 1.0 - efficiency;
        } else {
            self.agreement -= 1;
            self.likelihood_positive *= 1.0 - efficiency;
            self.likelihood_negative *= efficiency;
        }
        self.normalise();
    }

    /// Rewrites the most recent observation as `positive`. The previous
    /// reading must have been the opposite one, taken at `efficiency`.
    pub fn replace_last(&mut self, positive: bool, efficiency: f64) {
        if self.checks == 0 {
            return;
        }
        if positive {
            self.agreement += 2;
        } else {
            self.agreement -= 2;
        }
        if efficiency >= 1.0 {
            self.likelihood_positive = if positive { 1.0 } else { 0.0 };
            self.likelihood_negative = 1.0 - self.likelihood_positive;
        } else {
            let ratio = efficiency / (1.0 - efficiency);
            if positive {
                self.likelihood_positive *= ratio;
                self.likelihood_negative /= ratio;
            } else {
                self.likelihood_positive /= ratio;
                self.likelihood_negative *= ratio;
            }
        }
        self.normalise();
    }

    /// Rescales the likelihoods to sum to one so long runs of weak readings
    /// never underflow.
    fn normalise(&mut self) {
        let total = self.likelihood_positive + self.likelihood_negative;
        // Contradicting certain observations leave both likelihoods at zero.
        if total > 0.0 {
            self.likelihood_positive /= total;
            self.likelihood_negative /= total;
            self.probability = self.likelihood_positive;
        }
    }

    pub fn entropy(&self) -> f64 {
        binary_entropy(self.probability)
    }

    pub fn is_resolved(&self, entropy_limit: f64, min_checks: u32) -> bool {
        self.checks >= min_checks.max(1) && self.entropy() <= entropy_limit
    }

    pub fn is_neutral(&self) -> bool {
        *self == Belief::default()
    }
}

/// Entropy in bits of a Bernoulli(p) variable.
pub fn binary_entropy(p: f64) -> f64 {
    let term = |q: f64| if q <= 0.0 { 0.0 } else { -q * q.log2() };
    term(p) + term(1.0 - p)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BottleTruth {
    pub valuable: bool,
    /// Monotonic: never reverts once set.
    pub collected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottle {
    pub truth: BottleTruth,
    pub belief: Belief,
}

impl Bottle {
    pub fn new(valuable: bool) -> Self {
        Self {
            truth: BottleTruth {
                valuable,
                collected: false,
            },
            belief: Belief::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTruth {
    pub kind: ObjectKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub pos: Coord,
    /// False once pushed off the grid; inactive objects occupy no tile.
    pub active: bool,
    pub truth: ObjectTruth,
    pub belief: Belief,
    /// Type the rollout policy works with instead of re-deriving the belief.
    pub assumed: Option<ObjectKind>,
}

impl Object {
    pub fn new(pos: Coord, kind: ObjectKind) -> Self {
        Self {
            pos,
            active: true,
            truth: ObjectTruth { kind },
            belief: Belief::default(),
            assumed: None,
        }
    }

    pub fn is_crate(&self) -> bool {
        self.truth.kind == ObjectKind::Crate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellarState {
    pub agent: Coord,
    pub bottles: Vec<Bottle>,
    pub objects: Vec<Object>,
    /// Bottle currently pursued by the guidance heuristic.
    pub target: Option<usize>,
    /// Valuable bottles collected so far.
    pub collected_bottles: u32,
    /// Blocked moves, failed pushes, empty samples and redundant checks.
    pub wasted_actions: u32,
}

impl CellarState {
    /// Index of the active object standing on `c`.
    pub fn object_number(&self, c: Coord) -> Option<usize> {
        self.objects.iter().position(|o| o.active && o.pos == c)
    }

    pub fn crate_at(&self, c: Coord) -> bool {
        self.object_number(c)
            .is_some_and(|i| self.objects[i].truth.kind == ObjectKind::Crate)
    }

    pub fn shelf_at(&self, c: Coord) -> bool {
        self.object_number(c)
            .is_some_and(|i| self.objects[i].truth.kind == ObjectKind::Shelf)
    }

    pub fn active_objects(&self) -> impl Iterator<Item = (usize, &Object)> {
        self.objects.iter().enumerate().filter(|(_, o)| o.active)
    }

    pub fn has_exited(&self, size: i32) -> bool {
        self.agent.x >= size
    }
}
