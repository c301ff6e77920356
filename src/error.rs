use std::fmt;

use thiserror::Error;

/// A user-triggered action with its own control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Extract,
    Save,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Extract => f.write_str("Extraction"),
            Action::Save => f.write_str("Save"),
        }
    }
}

/// Everything that can go wrong in a controller action. Each variant renders
/// as the single message shown to the user.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("{0}")]
    UserInput(String),

    #[error("{0} is already running.")]
    Busy(Action),

    #[error("{0}")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    Transport { status: Option<u16>, message: String },

    #[error("{0}")]
    Serialization(String),

    #[error("Result discarded: the form changed while the request was running.")]
    Superseded,
}

impl IntakeError {
    pub fn no_file() -> Self {
        IntakeError::UserInput("Please select a file first.".to_string())
    }

    /// HTTP status of a rejected request, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            IntakeError::Transport { status, .. } => *status,
            IntakeError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Failure of the local snapshot store. Callers log these and carry on.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("draft store unavailable: {0}")]
    Unavailable(String),

    #[error("draft store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),
}
