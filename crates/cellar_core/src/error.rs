use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CellarError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Layout does not fit: {entities} entities on {capacity} free tiles")]
    LayoutOverflow { entities: usize, capacity: usize },

    #[error("Unknown action code {code} (action space has {num_actions} actions)")]
    UnknownAction { code: usize, num_actions: usize },

    #[error("State is terminal; no further steps are defined")]
    TerminalState,

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Stale state handle: slot {index}, generation {generation}")]
    StaleHandle { index: usize, generation: u32 },
}

impl CellarError {
    /// Caller contract violations are fatal; handle errors can be retried with a fresh handle.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CellarError::StaleHandle { .. } => true,
            CellarError::UnknownAction { .. } => false,
            CellarError::TerminalState => false,
            CellarError::Invariant(_) => false,
            CellarError::InvalidConfig(_) | CellarError::LayoutOverflow { .. } => false,
        }
    }
}

impl From<serde_json::Error> for CellarError {
    fn from(err: serde_json::Error) -> Self {
        CellarError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CellarError>;
