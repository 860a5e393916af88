//! Core error types.
//!
//! Two families live here:
//! - [`Diagnostic`]: collected, never thrown. Produced by table validation
//!   and by the event loop.
//! - [`CoreError`]: ordinary `Result` errors from the declarative table loader.

use thiserror::Error;

/// A collected description of a definition or runtime error.
///
/// Identifiers are rendered with `Debug` so diagnostics are independent of the
/// machine's identifier types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("duplicate state: '{state}' is already defined")]
    DuplicateState { state: String },

    #[error("duplicate default state: only one default state may be defined")]
    DuplicateDefaultState,

    #[error("duplicate default transition in state '{state}'")]
    DuplicateDefaultTransition { state: String },

    #[error("duplicate transition in state '{state}' on event '{event}'")]
    DuplicateTransition { state: String, event: String },

    #[error("transition from '{state}' on event '{event}' targets undeclared state '{target}'")]
    UndeclaredTarget {
        state: String,
        event: String,
        target: String,
    },

    #[error("initial state '{state}' is not declared")]
    UndeclaredInitialState { state: String },

    #[error("the default state cannot be the initial state")]
    DefaultInitialState,

    #[error("state '{state}' declares no transitions")]
    EmptyState { state: String },

    #[error("unresolved event '{event}' in state '{state}'")]
    UnresolvedEvent { state: String, event: String },

    #[error("{phase} action '{action}' failed in state '{state}': {reason}")]
    ActionFailed {
        state: String,
        phase: ActionPhase,
        action: String,
        reason: String,
    },

    #[error("machine is not started")]
    NotStarted,

    #[error("machine is halted; reinitialize before submitting events")]
    Halted,

    #[error("machine is processing events; cannot reinitialize from an action")]
    Busy,
}

impl Diagnostic {
    /// Returns a stable error code suitable for tooling output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Diagnostic::DuplicateState { .. } => "DUPLICATE_STATE",
            Diagnostic::DuplicateDefaultState => "DUPLICATE_DEFAULT_STATE",
            Diagnostic::DuplicateDefaultTransition { .. } => "DUPLICATE_DEFAULT_TRANSITION",
            Diagnostic::DuplicateTransition { .. } => "DUPLICATE_TRANSITION",
            Diagnostic::UndeclaredTarget { .. } => "UNDECLARED_TARGET",
            Diagnostic::UndeclaredInitialState { .. } => "UNDECLARED_INITIAL_STATE",
            Diagnostic::DefaultInitialState => "DEFAULT_INITIAL_STATE",
            Diagnostic::EmptyState { .. } => "EMPTY_STATE",
            Diagnostic::UnresolvedEvent { .. } => "UNRESOLVED_EVENT",
            Diagnostic::ActionFailed { .. } => "ACTION_FAILED",
            Diagnostic::NotStarted => "NOT_STARTED",
            Diagnostic::Halted => "HALTED",
            Diagnostic::Busy => "BUSY",
        }
    }

    /// Returns true for errors found while compiling a definition set.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            Diagnostic::DuplicateState { .. }
                | Diagnostic::DuplicateDefaultState
                | Diagnostic::DuplicateDefaultTransition { .. }
                | Diagnostic::DuplicateTransition { .. }
                | Diagnostic::UndeclaredTarget { .. }
                | Diagnostic::UndeclaredInitialState { .. }
                | Diagnostic::DefaultInitialState
                | Diagnostic::EmptyState { .. }
        )
    }

    /// Returns true for errors raised while processing events.
    pub fn is_runtime_error(&self) -> bool {
        !self.is_definition_error()
    }
}

/// Which kind of action failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    Entry,
    Exit,
    Transition,
}

impl std::fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionPhase::Entry => write!(f, "entry"),
            ActionPhase::Exit => write!(f, "exit"),
            ActionPhase::Transition => write!(f, "transition"),
        }
    }
}

/// Error returned by a failing action callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ActionError {
    message: String,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ActionError {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ActionError {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Errors from the declarative table loader.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown action '{name}' referenced by state '{state}'")]
    UnknownAction { state: String, name: String },

    #[error("invalid table definition: {reason}")]
    InvalidTable { reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Returns an error code suitable for tooling output.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::UnknownAction { .. } => "UNKNOWN_ACTION",
            CoreError::InvalidTable { .. } => "BAD_REQUEST",
            CoreError::Json(_) | CoreError::Yaml(_) => "BAD_REQUEST",
            CoreError::Io(_) => "IO_ERROR",
        }
    }
}
