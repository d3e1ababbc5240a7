// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: Each strategy moves it through its own states, recording the phase trace.

use std::fmt;
use tokio::time::Instant;

use crate::config::Policy;
use crate::diagnostics::{Diagnostics, Warning};
use crate::ports::{ClusterOps, HealthMonitor, Manifest, PortError};
use crate::types::AppName;

use super::outcome::{DeploymentOutcome, FailureReason, Phase, StrategyReport};
use super::strategy::DeployStrategy;

/// What is being deployed, and where.
#[derive(Debug, Clone)]
pub struct DeployTarget {
    pub app: AppName,
    /// Manifest for the stable deployment: named after the app, at the
    /// environment's target replica count.
    pub manifest: Manifest,
    pub namespace: String,
}

/// Collaborators and policy shared by every state of a strategy run.
#[derive(Clone, Copy)]
pub struct StrategyEnv<'a> {
    pub cluster: &'a dyn ClusterOps,
    pub health: &'a dyn HealthMonitor,
    pub policy: &'a Policy,
    pub diag: &'a Diagnostics,
    /// Forward steps stop here and take the abort path. Teardown still runs
    /// afterwards, one call timeout at a time.
    pub deadline: Instant,
}

/// A deployment in progress, parameterized by its current state.
///
/// The state type parameter `S` carries state-specific data (like the
/// revision a step produced) so later transitions can only be called once
/// the data exists.
pub struct Deployment<'a, S> {
    pub(crate) env: StrategyEnv<'a>,
    pub(crate) target: DeployTarget,
    strategy: DeployStrategy,
    started: Instant,
    trace: Vec<Phase>,
    pub(crate) state: S,
}

/// Result type for transitions that may need an abort on failure.
pub type TransitionResult<'a, T, S> = Result<Deployment<'a, T>, (Deployment<'a, S>, FailureReason)>;

/// A run that stopped at `step`, with its state erased.
pub struct Halted<'a> {
    pub(crate) deployment: Deployment<'a, ()>,
    pub(crate) step: Phase,
    pub(crate) reason: FailureReason,
}

impl<'a, S> From<(Deployment<'a, S>, FailureReason)> for Halted<'a> {
    fn from((deployment, reason): (Deployment<'a, S>, FailureReason)) -> Self {
        let step = deployment.phase();
        Halted {
            deployment: deployment.transition(()),
            step,
            reason,
        }
    }
}

impl<'a, S> Deployment<'a, S> {
    pub(crate) fn start(
        strategy: DeployStrategy,
        env: StrategyEnv<'a>,
        target: DeployTarget,
        phase: Phase,
        state: S,
    ) -> Self {
        tracing::info!(
            strategy = %strategy,
            app = %target.app,
            namespace = %target.namespace,
            phase = %phase,
            "strategy started"
        );
        Deployment {
            env,
            target,
            strategy,
            started: Instant::now(),
            trace: vec![phase],
            state,
        }
    }

    /// The phase the run is currently in.
    pub fn phase(&self) -> Phase {
        self.trace.last().copied().unwrap_or(Phase::Submitting)
    }

    pub fn trace(&self) -> &[Phase] {
        &self.trace
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        tracing::info!(strategy = %self.strategy, phase = %phase, "entering phase");
        self.trace.push(phase);
    }

    pub(crate) fn transition<T>(self, state: T) -> Deployment<'a, T> {
        Deployment {
            env: self.env,
            target: self.target,
            strategy: self.strategy,
            started: self.started,
            trace: self.trace,
            state,
        }
    }

    pub(crate) fn advance<T>(self, phase: Phase, state: T) -> Deployment<'a, T> {
        let mut next = self.transition(state);
        next.enter(phase);
        next
    }

    pub(crate) fn fail(self, reason: FailureReason) -> (Self, FailureReason) {
        (self, reason)
    }

    pub(crate) fn finish(mut self, outcome: DeploymentOutcome) -> StrategyReport {
        let terminal = if outcome.is_success() {
            Phase::Succeeded
        } else {
            Phase::Failed
        };
        self.enter(terminal);
        StrategyReport {
            strategy: self.strategy,
            outcome,
            trace: self.trace,
        }
    }

    pub(crate) fn service(&self) -> &str {
        self.target.app.as_str()
    }

    pub(crate) fn namespace(&self) -> &str {
        &self.target.namespace
    }

    /// Name of a sibling deployment slot, e.g. `web-canary`.
    pub(crate) fn slot(&self, suffix: &str) -> String {
        self.target.app.slot(suffix)
    }

    /// Await one external call for at most the policy's call timeout.
    pub(crate) async fn limited<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, PortError>>,
    ) -> Result<T, PortError> {
        let limit = self.env.policy.call_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_elapsed) => Err(PortError::failed(operation, format!("no response within {limit:?}"))),
        }
    }

    /// Await a forward step's call, bounded by the call timeout and by the
    /// run's deadline.
    pub(crate) async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, PortError>>,
        on_error: impl FnOnce(PortError) -> FailureReason,
    ) -> Result<T, FailureReason> {
        match tokio::time::timeout_at(self.env.deadline, self.limited(operation, call)).await {
            Ok(result) => result.map_err(on_error),
            Err(_elapsed) => Err(self.deadline_exceeded()),
        }
    }

    pub(crate) fn past_deadline(&self) -> bool {
        Instant::now() >= self.env.deadline
    }

    pub(crate) fn deadline_exceeded(&self) -> FailureReason {
        let after = self.started.elapsed();
        tracing::warn!(strategy = %self.strategy, elapsed = ?after, "strategy deadline reached");
        FailureReason::DeadlineExceeded { after }
    }

    /// Delete a deployment, treating an already-missing one as deleted.
    pub(crate) async fn remove(&self, name: &str) -> Result<(), PortError> {
        let delete = self.env.cluster.delete(name, self.namespace());
        match self.limited("delete", delete).await {
            Err(err) if err.is_not_found() => {
                tracing::debug!(deployment = %name, "already absent");
                Ok(())
            }
            other => other,
        }
    }

    /// Record a failed teardown step without changing the run's outcome.
    pub(crate) fn cleanup_warning(&self, what: &str, err: &dyn fmt::Display) {
        self.env.diag.warn(Warning::cleanup_failed(format!(
            "{} {}: {what} failed: {err}",
            self.strategy,
            self.service()
        )));
    }
}

impl Halted<'_> {
    pub(crate) fn finish(self) -> StrategyReport {
        let outcome = DeploymentOutcome::Failed {
            step: self.step,
            reason: self.reason,
        };
        self.deployment.finish(outcome)
    }
}
