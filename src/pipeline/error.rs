// ABOUTME: Error types for stage execution and pipeline construction.
// ABOUTME: StageError carries the failure kinds the dispatcher classifies on.

use std::fmt;
use std::time::Duration;

use crate::context::OutputError;
use crate::deploy::{FailureReason, Phase};
use crate::ports::PortError;

/// Why a stage failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageError {
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    #[error(transparent)]
    External(#[from] PortError),

    /// A measured result crossed a policy threshold (blocking findings, failed tests).
    #[error("{what}: {detail}")]
    Threshold { what: String, detail: String },

    #[error("approval denied: {0}")]
    ApprovalDenied(DenialReason),

    #[error("deployment aborted during {step}: {reason}")]
    StrategyAborted { step: Phase, reason: FailureReason },

    /// Traffic already moved to the new revision but retiring the old one failed.
    #[error("traffic is on revision {revision} but post-switch cleanup failed: {reason}")]
    PostSwitchCleanupFailed { revision: String, reason: String },

    /// An output an earlier stage should have written is absent.
    #[error("required output '{0}' is missing")]
    MissingInput(String),

    #[error("stage wrote undeclared output '{0}'")]
    UndeclaredOutput(String),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("parallel member(s) failed: {}", failed.join(", "))]
    ParallelFailed { failed: Vec<String> },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageErrorKind {
    Timeout,
    External,
    Threshold,
    ApprovalDenied,
    StrategyAborted,
    PostSwitchCleanupFailed,
    Output,
    ParallelFailed,
}

impl StageError {
    pub fn threshold(what: impl Into<String>, detail: impl Into<String>) -> Self {
        StageError::Threshold {
            what: what.into(),
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> StageErrorKind {
        match self {
            StageError::Timeout { .. } => StageErrorKind::Timeout,
            StageError::External(_) => StageErrorKind::External,
            StageError::Threshold { .. } => StageErrorKind::Threshold,
            StageError::ApprovalDenied(_) => StageErrorKind::ApprovalDenied,
            StageError::StrategyAborted { .. } => StageErrorKind::StrategyAborted,
            StageError::PostSwitchCleanupFailed { .. } => StageErrorKind::PostSwitchCleanupFailed,
            StageError::MissingInput(_) | StageError::UndeclaredOutput(_) | StageError::Output(_) => {
                StageErrorKind::Output
            }
            StageError::ParallelFailed { .. } => StageErrorKind::ParallelFailed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    Denied { by: String, reason: Option<String> },
    TimedOut { after: Duration },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Denied { by, reason: Some(reason) } => write!(f, "denied by {by}: {reason}"),
            DenialReason::Denied { by, reason: None } => write!(f, "denied by {by}"),
            DenialReason::TimedOut { after } => write!(f, "no response within {after:?}"),
        }
    }
}

/// A hook returned an error. Recorded as a warning, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl From<PortError> for HookError {
    fn from(err: PortError) -> Self {
        HookError(err.to_string())
    }
}

/// Construction-time pipeline validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline has no stages")]
    Empty,

    #[error("stage name cannot be empty")]
    EmptyName,

    #[error("duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("parallel stages '{first}' ({first_key}) and '{second}' ({second_key}) declare overlapping writes")]
    OverlappingWrites {
        first: String,
        second: String,
        first_key: String,
        second_key: String,
    },
}
