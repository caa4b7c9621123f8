//! # cellar_core - Cellar POMDP Simulator
//!
//! An agent walks an n×n cellar holding bottles of unknown value and objects
//! of unknown type (pushable crates, immovable shelves). It senses through
//! noisy, distance-dependent checks, collects bottles, pushes crates out of
//! the way and leaves through the east edge.
//!
//! ## Features
//! - Deterministic given the caller's RNG (same seed = same trajectory)
//! - Plain, PGS-shaped and transition-only steps from one transition function
//! - Legal, preferred and PGS-greedy action sets for rollout policies
//! - Local move hook for particle reinvigoration
//!
//! ```rust
//! use cellar_core::{Cellar, CellarParams, Preset};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let cellar = Cellar::new(CellarParams::preset(Preset::Small)).unwrap();
//! let mut rng = ChaCha8Rng::seed_from_u64(7);
//! let mut state = cellar.create_start_state(&mut rng);
//! let outcome = cellar.step(&mut state, 2, &mut rng).unwrap();
//! assert_eq!(outcome.reward, -1.0);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod history;
pub mod layout;
pub mod pool;
pub mod simulator;
pub mod state;

pub use config::{CellarParams, Preset};
pub use engine::{Action, ActionSpace, Cellar, Goal, Observation, Shaping, StepOptions, StepOutcome};
pub use error::{CellarError, Result};
pub use grid::{Coord, Direction, Grid};
pub use history::{History, HistoryEntry, SearchPhase, Status};
pub use layout::Layout;
pub use pool::{Handle, StatePool};
pub use simulator::Simulator;
pub use state::{Belief, Bottle, CellarState, Object, ObjectKind};
