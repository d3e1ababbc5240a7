// ABOUTME: Terminal values and phase traces produced by a strategy run.
// ABOUTME: A failure names the phase it happened in and a structured reason.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::DeployStrategy;
use crate::types::RevisionId;

/// A step in one of the strategy state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Submitting,
    WaitingRollout,
    DeployingCanary,
    RoutingSplit,
    Monitoring,
    Promoting,
    Aborting,
    Cleanup,
    DeployingGreen,
    Validating,
    SwitchingTraffic,
    RetiringOld,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Submitting => "submitting",
            Phase::WaitingRollout => "waiting-rollout",
            Phase::DeployingCanary => "deploying-canary",
            Phase::RoutingSplit => "routing-split",
            Phase::Monitoring => "monitoring",
            Phase::Promoting => "promoting",
            Phase::Aborting => "aborting",
            Phase::Cleanup => "cleanup",
            Phase::DeployingGreen => "deploying-green",
            Phase::Validating => "validating",
            Phase::SwitchingTraffic => "switching-traffic",
            Phase::RetiringOld => "retiring-old",
            Phase::Succeeded => "succeeded",
            Phase::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a strategy run failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("apply failed: {0}")]
    Apply(String),

    /// The deployment reported a failed rollout or never became ready.
    #[error("readiness check failed: {0}")]
    HealthCheck(String),

    #[error("not ready after {after:?}")]
    Timeout { after: Duration },

    /// The run used up its whole time budget before reaching a terminal step.
    #[error("strategy deadline reached after {after:?}")]
    DeadlineExceeded { after: Duration },

    #[error("monitoring alarm: {0}")]
    MonitoringAlarm(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("traffic switch failed: {0}")]
    TrafficSwitch(String),

    /// Traffic already moved to `revision`; retiring the old slot failed.
    #[error("post-switch cleanup failed for revision {revision}: {detail}")]
    PostSwitchCleanup { revision: String, detail: String },
}

impl FailureReason {
    pub fn is_post_switch(&self) -> bool {
        matches!(self, FailureReason::PostSwitchCleanup { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    Succeeded { revision: RevisionId },
    Failed { step: Phase, reason: FailureReason },
}

impl DeploymentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeploymentOutcome::Succeeded { .. })
    }

    pub fn revision(&self) -> Option<&RevisionId> {
        match self {
            DeploymentOutcome::Succeeded { revision } => Some(revision),
            DeploymentOutcome::Failed { .. } => None,
        }
    }
}

/// Terminal outcome plus the ordered phases the state machine passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyReport {
    pub strategy: DeployStrategy,
    pub outcome: DeploymentOutcome,
    pub trace: Vec<Phase>,
}

impl StrategyReport {
    pub fn visited(&self, phase: Phase) -> bool {
        self.trace.contains(&phase)
    }
}
