// ABOUTME: Stage results and the aggregate pipeline outcome.
// ABOUTME: Overall status is failure iff a non-skipped stage failed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::error::{StageError, StageErrorKind};
use crate::context::Outputs;
use crate::diagnostics::Warning;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The guard evaluated to false. Not an error.
    GuardFalse,
    /// An earlier stage in the outer sequence failed.
    PriorFailure { stage: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Success,
    Failure(StageError),
    Skipped(SkipReason),
}

/// Outcome without its payload, for keying hooks and quick comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Failure,
    Skipped,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Success => "success",
            StageStatus::Failure => "failure",
            StageStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub name: String,
    pub outcome: StageOutcome,
    pub outputs: Outputs,
    /// Member results for a parallel group, in declaration order.
    pub members: Vec<StageResult>,
    pub duration: Duration,
}

impl StageResult {
    pub(crate) fn skipped(name: &str, reason: SkipReason) -> Self {
        Self {
            name: name.to_string(),
            outcome: StageOutcome::Skipped(reason),
            outputs: Outputs::new(),
            members: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn status(&self) -> StageStatus {
        match self.outcome {
            StageOutcome::Success => StageStatus::Success,
            StageOutcome::Failure(_) => StageStatus::Failure,
            StageOutcome::Skipped(_) => StageStatus::Skipped,
        }
    }

    pub fn error(&self) -> Option<&StageError> {
        match &self.outcome {
            StageOutcome::Failure(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status() == StageStatus::Failure
    }

    /// Find this stage or a nested member by name.
    pub fn find(&self, name: &str) -> Option<&StageResult> {
        if self.name == name {
            return Some(self);
        }
        self.members.iter().find_map(|m| m.find(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Success,
    Failure,
}

impl PipelineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Success => "success",
            PipelineStatus::Failure => "failure",
        }
    }
}

/// Process exit codes reported for a finished run.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_APPROVAL_DENIED: i32 = 3;

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub results: Vec<StageResult>,
    pub warnings: Vec<Warning>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineOutcome {
    pub fn status(&self) -> PipelineStatus {
        if self.results.iter().any(StageResult::is_failure) {
            PipelineStatus::Failure
        } else {
            PipelineStatus::Success
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == PipelineStatus::Success
    }

    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.results.iter().find_map(|r| r.find(name))
    }

    /// The outer-sequence stage that failed, if any. Fail-fast means there is
    /// at most one.
    pub fn failed_stage(&self) -> Option<&StageResult> {
        self.results.iter().find(|r| r.is_failure())
    }

    pub fn failure(&self) -> Option<&StageError> {
        self.failed_stage().and_then(StageResult::error)
    }

    pub fn failure_kind(&self) -> Option<StageErrorKind> {
        self.failure().map(StageError::kind)
    }

    pub fn exit_code(&self) -> i32 {
        match self.failure_kind() {
            None => EXIT_SUCCESS,
            Some(StageErrorKind::ApprovalDenied) => EXIT_APPROVAL_DENIED,
            Some(_) => EXIT_FAILURE,
        }
    }
}
