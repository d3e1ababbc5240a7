// ABOUTME: Pure classification of a finished run into notify, ticket, rollback, and archive actions.
// ABOUTME: The same outcome and environment always yield the same plan.

use std::collections::BTreeMap;

use crate::config::NotificationChannels;
use crate::context::RunContext;
use crate::pipeline::{PipelineOutcome, StageErrorKind};
use crate::ports::{ArchiveRequest, Severity, TicketRequest};
use crate::types::VersionToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: String,
    pub severity: Severity,
    pub message: String,
}

/// What to do about the deployed version after the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackDecision {
    /// The run succeeded.
    NotNeeded,
    /// Roll back to the environment's last-good version.
    Automatic,
    /// prod failures wait for an operator.
    ManualRequired,
    /// The failure kind must never be rolled back automatically.
    Suppressed(StageErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    pub notifications: Vec<Notification>,
    pub ticket: Option<TicketRequest>,
    pub rollback: RollbackDecision,
    /// Version to record as last-good, on success only.
    pub record_good: Option<VersionToken>,
    pub archive: ArchiveRequest,
}

/// Classify `outcome`. Performs no side effects.
pub fn plan(outcome: &PipelineOutcome, ctx: &RunContext, channels: &NotificationChannels) -> DispatchPlan {
    let env = ctx.environment();
    let version = ctx.deploy_version();
    let mut notifications = Vec::new();

    let (ticket, rollback, record_good) = if outcome.is_success() {
        notifications.push(Notification {
            channel: channels.success.clone(),
            severity: Severity::Info,
            message: format!("{} {version} deployed to {env}", ctx.app()),
        });

        let ticket = env.is_prod().then(|| monitoring_ticket(ctx));
        (ticket, RollbackDecision::NotNeeded, Some(version.clone()))
    } else {
        let kind = outcome.failure_kind();
        let detail = match (outcome.failed_stage(), outcome.failure()) {
            (Some(stage), Some(err)) => format!(" at stage {}: {err}", stage.name),
            _ => String::new(),
        };
        let severity = if env.is_prod() {
            Severity::Critical
        } else {
            Severity::Warning
        };
        notifications.push(Notification {
            channel: channels.failure.clone(),
            severity,
            message: format!("{} {version} failed in {env}{detail}", ctx.app()),
        });

        if kind == Some(StageErrorKind::PostSwitchCleanupFailed) {
            notifications.push(Notification {
                channel: channels.page.clone(),
                severity: Severity::Page,
                message: format!(
                    "{} in {env}: traffic is on {version} but the old deployment was not retired{detail}",
                    ctx.app()
                ),
            });
        }

        let rollback = match kind {
            Some(kind @ (StageErrorKind::ApprovalDenied | StageErrorKind::PostSwitchCleanupFailed)) => {
                RollbackDecision::Suppressed(kind)
            }
            _ if env.is_prod() => RollbackDecision::ManualRequired,
            _ => RollbackDecision::Automatic,
        };
        (None, rollback, None)
    };

    DispatchPlan {
        notifications,
        ticket,
        rollback,
        record_good,
        archive: archive_request(outcome, ctx),
    }
}

fn monitoring_ticket(ctx: &RunContext) -> TicketRequest {
    let mut fields = BTreeMap::new();
    fields.insert("app".to_string(), ctx.app().to_string());
    fields.insert("environment".to_string(), ctx.environment().to_string());
    fields.insert("version".to_string(), ctx.deploy_version().to_string());
    fields.insert("release_notes".to_string(), ctx.release_notes().to_string());
    TicketRequest {
        title: format!("Monitor {} {} in production", ctx.app(), ctx.deploy_version()),
        fields,
    }
}

fn archive_request(outcome: &PipelineOutcome, ctx: &RunContext) -> ArchiveRequest {
    ArchiveRequest {
        app: ctx.app().to_string(),
        environment: ctx.environment(),
        version: ctx.deploy_version().to_string(),
        status: outcome.status().as_str().to_string(),
        outputs: ctx
            .outputs()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        stages: outcome
            .results
            .iter()
            .map(|r| format!("{}={}", r.name, r.status().as_str()))
            .collect(),
    }
}
