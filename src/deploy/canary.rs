// ABOUTME: Canary strategy: one replica on a minority of traffic, monitored before promotion.
// ABOUTME: Any failed check aborts, restoring the stable route and removing the canary.

use std::time::Duration;
use tokio::time::Instant;

use super::deployment::{DeployTarget, Deployment, Halted, StrategyEnv, TransitionResult};
use super::outcome::{DeploymentOutcome, FailureReason, Phase, StrategyReport};
use super::strategy::DeployStrategy;
use crate::ports::TrafficSplit;
use crate::types::RevisionId;

const CANARY_SUFFIX: &str = "canary";

pub struct Pending;

/// The canary deployment is ready but receives no traffic yet.
pub struct CanaryReady;

/// A minority of traffic is routed to the canary.
pub struct Routed;

/// The canary survived the full monitoring window.
pub struct Healthy;

pub struct Promoted {
    revision: RevisionId,
}

impl<S> Deployment<'_, S> {
    fn canary_name(&self) -> String {
        self.slot(CANARY_SUFFIX)
    }

    /// Route all traffic back to stable, then remove the canary. Failures are
    /// reported as warnings so the run's own outcome is preserved.
    async fn teardown_canary(&mut self) {
        self.enter(Phase::Cleanup);
        let canary = self.canary_name();

        let split = TrafficSplit::all_stable(self.service());
        let restore = self.env.cluster.route(self.service(), self.namespace(), &split);
        if let Err(err) = self.limited("route", restore).await {
            self.cleanup_warning("restoring stable route", &err);
        }
        if let Err(err) = self.remove(&canary).await {
            self.cleanup_warning(&format!("deleting {canary}"), &err);
        }
    }
}

impl<'a> Deployment<'a, Pending> {
    #[must_use = "deployment state must be used"]
    pub async fn deploy_canary(self) -> TransitionResult<'a, CanaryReady, Pending> {
        let manifest = self
            .target
            .manifest
            .renamed(self.canary_name())
            .scaled(1)
            .labeled("track", CANARY_SUFFIX);

        let apply = self.env.cluster.apply(&manifest, self.namespace());
        if let Err(reason) = self.bounded("apply", apply, |err| FailureReason::Apply(err.to_string())).await {
            return Err(self.fail(reason));
        }
        match self.wait_ready(&manifest.name).await {
            Ok(()) => Ok(self.advance(Phase::RoutingSplit, CanaryReady)),
            Err(reason) => Err(self.fail(reason)),
        }
    }
}

impl<'a> Deployment<'a, CanaryReady> {
    #[must_use = "deployment state must be used"]
    pub async fn route_split(self) -> TransitionResult<'a, Routed, CanaryReady> {
        let split = TrafficSplit::with_canary(self.service(), self.canary_name(), self.env.policy.canary_weight);
        let route = self.env.cluster.route(self.service(), self.namespace(), &split);
        let routed = self
            .bounded("route", route, |err| FailureReason::Apply(format!("routing split: {err}")))
            .await;
        match routed {
            Ok(()) => {
                tracing::info!(
                    canary_weight = split.canary_weight,
                    stable_weight = split.stable_weight(),
                    "traffic split applied"
                );
                Ok(self.advance(Phase::Monitoring, Routed))
            }
            Err(reason) => Err(self.fail(reason)),
        }
    }
}

impl<'a> Deployment<'a, Routed> {
    /// Sample the canary every monitoring interval until the window closes.
    #[must_use = "deployment state must be used"]
    pub async fn monitor(self) -> TransitionResult<'a, Healthy, Routed> {
        let policy = self.env.policy;
        let canary = self.canary_name();
        let started = Instant::now();
        let window_end = started + policy.monitoring_window;

        loop {
            let now = Instant::now();
            if now >= window_end {
                break;
            }
            let wake = (now + policy.monitoring_interval).min(window_end);
            if wake > self.env.deadline {
                tokio::time::sleep_until(self.env.deadline).await;
                let reason = self.deadline_exceeded();
                return Err(self.fail(reason));
            }
            tokio::time::sleep_until(wake).await;

            let elapsed = started.elapsed();
            let signal = self.env.health.sample(&canary, self.namespace());
            let sampled = self
                .bounded("health sample", signal, |err| {
                    FailureReason::MonitoringAlarm(format!("health signal unavailable: {err}"))
                })
                .await;
            let sample = match sampled {
                Ok(sample) => sample,
                Err(reason) => return Err(self.fail(reason)),
            };
            tracing::debug!(
                elapsed = ?elapsed,
                error_rate = sample.error_rate,
                alarm = ?sample.alarm,
                "canary sample"
            );

            if let Some(alarm) = sample.alarm {
                return Err(self.fail(FailureReason::MonitoringAlarm(format!(
                    "{alarm} after {}",
                    format_elapsed(elapsed)
                ))));
            }
            if sample.error_rate > policy.max_error_rate {
                return Err(self.fail(FailureReason::MonitoringAlarm(format!(
                    "error rate {:.3} above {:.3} after {}",
                    sample.error_rate,
                    policy.max_error_rate,
                    format_elapsed(elapsed)
                ))));
            }
        }

        Ok(self.advance(Phase::Promoting, Healthy))
    }
}

impl<'a> Deployment<'a, Healthy> {
    /// Apply the full manifest under the stable name and wait for it.
    #[must_use = "deployment state must be used"]
    pub async fn promote(self) -> TransitionResult<'a, Promoted, Healthy> {
        let apply = self.env.cluster.apply(&self.target.manifest, self.namespace());
        let revision = match self.bounded("apply", apply, |err| FailureReason::Apply(err.to_string())).await {
            Ok(revision) => revision,
            Err(reason) => return Err(self.fail(reason)),
        };
        match self.wait_ready(&self.target.manifest.name).await {
            Ok(()) => Ok(self.transition(Promoted { revision })),
            Err(reason) => Err(self.fail(reason)),
        }
    }
}

impl Deployment<'_, Promoted> {
    pub async fn cleanup(mut self) -> StrategyReport {
        self.teardown_canary().await;
        let revision = self.state.revision.clone();
        self.finish(DeploymentOutcome::Succeeded { revision })
    }
}

impl Halted<'_> {
    async fn abort_canary(mut self) -> StrategyReport {
        tracing::warn!(step = %self.step, reason = %self.reason, "canary aborted");
        self.deployment.enter(Phase::Aborting);
        self.deployment.teardown_canary().await;
        self.finish()
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m{:02}s", secs / 60, secs % 60)
}

pub(crate) async fn run(env: StrategyEnv<'_>, target: DeployTarget) -> StrategyReport {
    let pending = Deployment::start(DeployStrategy::Canary, env, target, Phase::DeployingCanary, Pending);

    let result: Result<_, Halted<'_>> = async {
        let ready = pending.deploy_canary().await?;
        let routed = ready.route_split().await?;
        let healthy = routed.monitor().await?;
        Ok(healthy.promote().await?)
    }
    .await;

    match result {
        Ok(promoted) => promoted.cleanup().await,
        Err(halted) => halted.abort_canary().await,
    }
}
