// ABOUTME: Approval, infrastructure, and application deployment stage actions.
// ABOUTME: The approval wait is bounded; deployment runs the environment's strategy.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;

use crate::config::Policy;
use crate::context::{Outputs, RunContext};
use crate::deploy::{DeployStrategy, DeployTarget, DeploymentOutcome, FailureReason, StrategyEnv, strategy_budget};
use crate::diagnostics::Diagnostics;
use crate::pipeline::{DenialReason, StageAction, StageError};
use crate::ports::{ApprovalDecision, ApprovalGate, ApprovalRequest, ClusterOps, HealthMonitor, InfraProvisioner, Manifest};

pub const INFRA_PREFIX: &str = "infra.";
pub const ENDPOINT_KEY: &str = "infra.endpoint";
pub const REVISION_KEY: &str = "revision";
pub const STRATEGY_KEY: &str = "strategy";
pub const APPROVED_BY_KEY: &str = "approval.by";

pub struct AwaitApproval {
    pub gate: Arc<dyn ApprovalGate>,
    pub policy: Policy,
}

#[async_trait]
impl StageAction for AwaitApproval {
    async fn run(&self, ctx: &RunContext, _diag: &Diagnostics) -> Result<Outputs, StageError> {
        let request = ApprovalRequest {
            app: ctx.app().clone(),
            environment: ctx.environment(),
            version: ctx.deploy_version().clone(),
            release_notes: ctx.release_notes().to_string(),
        };
        let limit = self.policy.approval_timeout;
        tracing::info!(version = %request.version, timeout = ?limit, "waiting for approval");

        match tokio::time::timeout(limit, self.gate.request(&request)).await {
            Err(_elapsed) => Err(StageError::ApprovalDenied(DenialReason::TimedOut { after: limit })),
            Ok(Err(err)) => Err(err.into()),
            Ok(Ok(ApprovalDecision::Denied { by, reason })) => {
                Err(StageError::ApprovalDenied(DenialReason::Denied { by, reason }))
            }
            Ok(Ok(ApprovalDecision::Approved { by })) => {
                tracing::info!(by = %by, "release approved");
                Ok(Outputs::new().with(APPROVED_BY_KEY, by)?)
            }
        }
    }
}

pub struct ProvisionInfra {
    pub provisioner: Arc<dyn InfraProvisioner>,
}

#[async_trait]
impl StageAction for ProvisionInfra {
    async fn run(&self, ctx: &RunContext, _diag: &Diagnostics) -> Result<Outputs, StageError> {
        let mut vars: BTreeMap<String, String> = ctx.settings().infra.clone();
        vars.insert("environment".to_string(), ctx.environment().to_string());
        vars.insert("namespace".to_string(), ctx.namespace().to_string());
        vars.insert("version".to_string(), ctx.deploy_version().to_string());

        let plan = self.provisioner.plan(&vars).await?;
        tracing::debug!(plan = %plan, "infrastructure plan");
        let applied = self.provisioner.apply(&vars).await?;
        tracing::info!(outputs = applied.len(), "infrastructure applied");

        let mut outputs = Outputs::new();
        for (key, value) in applied {
            outputs.insert(format!("{INFRA_PREFIX}{key}"), value)?;
        }
        Ok(outputs)
    }
}

pub struct DeployApplication {
    pub cluster: Arc<dyn ClusterOps>,
    pub health: Arc<dyn HealthMonitor>,
    pub manifest: String,
    pub policy: Policy,
}

#[async_trait]
impl StageAction for DeployApplication {
    async fn run(&self, ctx: &RunContext, diag: &Diagnostics) -> Result<Outputs, StageError> {
        let strategy = DeployStrategy::for_environment(ctx.environment());
        let target = DeployTarget {
            app: ctx.app().clone(),
            manifest: Manifest::new(
                &self.manifest,
                ctx.app().as_str(),
                ctx.deploy_version().clone(),
                ctx.replicas(),
            ),
            namespace: ctx.namespace().to_string(),
        };
        let env = StrategyEnv {
            cluster: self.cluster.as_ref(),
            health: self.health.as_ref(),
            policy: &self.policy,
            diag,
            deadline: Instant::now() + strategy_budget(&self.policy),
        };

        let report = strategy.apply(env, target).await;
        tracing::info!(strategy = %strategy, trace = ?report.trace, "strategy finished");

        match report.outcome {
            DeploymentOutcome::Succeeded { revision } => Ok(Outputs::new()
                .with(REVISION_KEY, revision.as_str())?
                .with(STRATEGY_KEY, strategy.as_str())?),
            DeploymentOutcome::Failed {
                reason: FailureReason::PostSwitchCleanup { revision, detail },
                ..
            } => Err(StageError::PostSwitchCleanupFailed {
                revision,
                reason: detail,
            }),
            DeploymentOutcome::Failed { step, reason } => Err(StageError::StrategyAborted { step, reason }),
        }
    }
}
