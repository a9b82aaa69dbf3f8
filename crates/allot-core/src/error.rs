//! Allocation error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for allocation operations.
pub type AllotResult<T> = Result<T, AllotError>;

/// Malformed allocation input. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate unit id: {0}")]
    DuplicateUnit(u64),

    #[error("family {family} lists unit {unit} more than once")]
    DuplicatePreference { family: u64, unit: String },

    #[error("family {family} prefers unknown unit {unit}")]
    UnknownUnit { family: u64, unit: String },

    #[error("duplicate family id: {0}")]
    DuplicateFamily(u64),

    #[error("invalid identifier {value}: {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },
}

/// Which of the two timeout mechanisms fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutSource {
    /// The solver reported its own time limit was exceeded.
    Solver,
    /// The host failsafe killed a process that outlived its budget.
    Failsafe,
}

impl fmt::Display for TimeoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutSource::Solver => f.write_str("solver time limit"),
            TimeoutSource::Failsafe => f.write_str("host failsafe"),
        }
    }
}

/// Errors raised while allocating units.
#[derive(Debug, Error)]
pub enum AllotError {
    #[error("invalid allocation spec: {0}")]
    Validation(#[from] ValidationError),

    #[error("process {program} failed (exit code {code:?}): {output}")]
    Process {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("timed out ({kind}) after {elapsed_ms} ms")]
    Timeout {
        kind: TimeoutSource,
        elapsed_ms: u64,
        output: String,
    },

    #[error("no feasible assignment for {task}: {reason}")]
    Infeasible { task: String, reason: String },

    #[error("artifact {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl AllotError {
    /// Process and artifact failures are both operational solver failures.
    pub fn is_process_failure(&self) -> bool {
        matches!(self, AllotError::Process { .. } | AllotError::Artifact { .. })
    }

    /// Only timeouts may succeed with a larger budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AllotError::Timeout { .. })
    }

    pub fn is_infeasible(&self) -> bool {
        matches!(self, AllotError::Infeasible { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AllotError::Timeout { .. })
    }

    pub fn infeasible(task: impl fmt::Display, reason: impl Into<String>) -> Self {
        AllotError::Infeasible {
            task: task.to_string(),
            reason: reason.into(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AllotError::Artifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
