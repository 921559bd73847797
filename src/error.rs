//! Faults a sweep recovers from by skipping the affected repetition.

use std::time::Duration;
use thiserror::Error;

pub type TrialResult<T> = std::result::Result<T, SweepError>;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("simulator exited with {status}: {stderr}")]
    ProcessFailed { status: String, stderr: String },

    #[error("failed to launch simulator: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("simulator did not finish within {0:?}")]
    Timeout(Duration),

    #[error("incomplete report, missing: {}", .missing.join(", "))]
    IncompleteReport { missing: Vec<&'static str> },

    #[error("invalid value for `{field}`: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}
