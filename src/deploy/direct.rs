// ABOUTME: Direct strategy: apply the manifest in place and wait for readiness.
// ABOUTME: Submitting -> WaitingRollout -> Succeeded | Failed.

use super::deployment::{DeployTarget, Deployment, Halted, StrategyEnv, TransitionResult};
use super::outcome::{DeploymentOutcome, FailureReason, Phase, StrategyReport};
use super::strategy::DeployStrategy;
use crate::types::RevisionId;

pub struct Submitting;

pub struct WaitingRollout {
    revision: RevisionId,
}

pub struct Live {
    revision: RevisionId,
}

impl<'a> Deployment<'a, Submitting> {
    #[must_use = "deployment state must be used"]
    pub async fn submit(self) -> TransitionResult<'a, WaitingRollout, Submitting> {
        let apply = self.env.cluster.apply(&self.target.manifest, self.namespace());
        match self.bounded("apply", apply, |err| FailureReason::Apply(err.to_string())).await {
            Ok(revision) => Ok(self.advance(Phase::WaitingRollout, WaitingRollout { revision })),
            Err(reason) => Err(self.fail(reason)),
        }
    }
}

impl<'a> Deployment<'a, WaitingRollout> {
    #[must_use = "deployment state must be used"]
    pub async fn await_ready(self) -> TransitionResult<'a, Live, WaitingRollout> {
        match self.wait_ready(&self.target.manifest.name).await {
            Ok(()) => {
                let revision = self.state.revision.clone();
                Ok(self.transition(Live { revision }))
            }
            Err(reason) => Err(self.fail(reason)),
        }
    }
}

pub(crate) async fn run(env: StrategyEnv<'_>, target: DeployTarget) -> StrategyReport {
    let submitting = Deployment::start(DeployStrategy::Direct, env, target, Phase::Submitting, Submitting);

    let result: Result<_, Halted<'_>> = async {
        let waiting = submitting.submit().await?;
        Ok(waiting.await_ready().await?)
    }
    .await;

    match result {
        Ok(live) => {
            let revision = live.state.revision.clone();
            live.finish(DeploymentOutcome::Succeeded { revision })
        }
        Err(halted) => {
            tracing::warn!(step = %halted.step, reason = %halted.reason, "direct deploy failed");
            halted.finish()
        }
    }
}
