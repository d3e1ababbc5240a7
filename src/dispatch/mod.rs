// ABOUTME: Outcome dispatcher: turns a finished run into notifications, tickets, and rollbacks.
// ABOUTME: Classification is pure; execution reports every secondary failure without masking the run's.

mod error;
mod plan;

pub use error::{DispatchError, DispatchErrorKind};
pub use plan::{DispatchPlan, Notification, RollbackDecision, plan};

use snafu::ResultExt;

use crate::config::NotificationChannels;
use crate::context::RunContext;
use crate::deploy::request_rollback;
use crate::pipeline::PipelineOutcome;
use crate::ports::{Collaborators, Severity};
use crate::types::{TicketId, VersionToken};

/// What the dispatcher did for one outcome.
#[derive(Debug)]
pub struct DispatchReport {
    pub outcome: PipelineOutcome,
    pub plan: DispatchPlan,
    pub ticket: Option<TicketId>,
    /// Version an automatic rollback was requested for.
    pub rolled_back_to: Option<VersionToken>,
    pub errors: Vec<DispatchError>,
}

impl DispatchReport {
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }

    pub fn rollback_error(&self) -> Option<&DispatchError> {
        self.errors.iter().find(|e| {
            matches!(
                e.kind(),
                DispatchErrorKind::Rollback | DispatchErrorKind::RollbackUnavailable
            )
        })
    }
}

/// Carry out the plan for `outcome`, consuming it.
pub async fn dispatch(
    outcome: PipelineOutcome,
    ctx: &RunContext,
    ports: &Collaborators,
    channels: &NotificationChannels,
) -> DispatchReport {
    let plan = plan(&outcome, ctx, channels);
    let mut errors = Vec::new();
    let mut ticket = None;
    let mut rolled_back_to = None;

    tracing::info!(status = ?outcome.status(), rollback = ?plan.rollback, "dispatching outcome");

    for note in &plan.notifications {
        notify(ports, note.channel.as_str(), note.severity, &note.message, &mut errors).await;
    }

    if let Some(request) = &plan.ticket {
        match ports.tickets.create_ticket(request).await.context(error::TicketSnafu) {
            Ok(id) => {
                tracing::info!(ticket = %id, "monitoring ticket created");
                ticket = Some(id);
            }
            Err(err) => errors.push(err),
        }
    }

    if let Some(version) = &plan.record_good
        && let Err(err) = ports
            .versions
            .record_good_version(ctx.app(), ctx.environment(), version)
            .await
            .context(error::RecordVersionSnafu {
                version: version.clone(),
            })
    {
        errors.push(err);
    }

    match plan.rollback {
        RollbackDecision::Automatic => {
            match request_rollback(
                ports.versions.as_ref(),
                ports.rollback.as_ref(),
                ctx.app(),
                ctx.environment(),
                None,
            )
            .await
            {
                Ok(version) => rolled_back_to = Some(version),
                Err(err) => {
                    let err = DispatchError::from(err);
                    tracing::error!(error = %err, "automatic rollback did not happen");
                    let message = format!("{} in {}: {err}", ctx.app(), ctx.environment());
                    errors.push(err);
                    notify(ports, &channels.failure, Severity::Critical, &message, &mut errors).await;
                }
            }
        }
        RollbackDecision::ManualRequired => {
            tracing::warn!(environment = %ctx.environment(), "failure requires a manual rollback");
        }
        RollbackDecision::Suppressed(kind) => {
            tracing::warn!(kind = ?kind, "automatic rollback suppressed for this failure kind");
        }
        RollbackDecision::NotNeeded => {}
    }

    if let Err(err) = ports.archiver.archive(&plan.archive).await.context(error::ArchiveSnafu) {
        errors.push(err);
    }

    for err in &errors {
        tracing::warn!(kind = ?err.kind(), error = %err, "dispatch side effect failed");
    }

    DispatchReport {
        outcome,
        plan,
        ticket,
        rolled_back_to,
        errors,
    }
}

async fn notify(
    ports: &Collaborators,
    channel: &str,
    severity: Severity,
    message: &str,
    errors: &mut Vec<DispatchError>,
) {
    if let Err(err) = ports
        .notifier
        .notify(channel, severity, message)
        .await
        .context(error::NotifySnafu { channel, severity })
    {
        errors.push(err);
    }
}
