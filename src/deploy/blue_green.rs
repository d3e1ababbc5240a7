// ABOUTME: Blue-green strategy: validate a full green slot, switch the selector, retire blue.
// ABOUTME: Failures after the switch are reported but never reverse traffic.

use super::deployment::{DeployTarget, Deployment, Halted, StrategyEnv, TransitionResult};
use super::outcome::{DeploymentOutcome, FailureReason, Phase, StrategyReport};
use super::strategy::DeployStrategy;
use crate::ports::PortError;
use crate::types::RevisionId;

const BLUE: &str = "blue";
const GREEN: &str = "green";

pub struct Pending;

pub struct GreenReady {
    revision: RevisionId,
}

pub struct Validated {
    revision: RevisionId,
}

/// Traffic is on green. From here on nothing is rolled back automatically.
pub struct Switched {
    revision: RevisionId,
}

pub struct Retired {
    revision: RevisionId,
}

impl<S> Deployment<'_, S> {
    fn green(&self) -> String {
        self.slot(GREEN)
    }

    fn blue(&self) -> String {
        self.slot(BLUE)
    }

    /// Remove the green slot, leaving blue authoritative.
    async fn discard_green(&self) {
        let green = self.green();
        if let Err(err) = self.remove(&green).await {
            self.cleanup_warning(&format!("deleting {green}"), &err);
        }
    }
}

impl<'a> Deployment<'a, Pending> {
    #[must_use = "deployment state must be used"]
    pub async fn deploy_green(self) -> TransitionResult<'a, GreenReady, Pending> {
        let manifest = self.target.manifest.renamed(self.green()).labeled("slot", GREEN);

        let apply = self.env.cluster.apply(&manifest, self.namespace());
        let revision = match self.bounded("apply", apply, |err| FailureReason::Apply(err.to_string())).await {
            Ok(revision) => revision,
            Err(reason) => return Err(self.fail(reason)),
        };

        match self.wait_ready(&manifest.name).await {
            Ok(()) => Ok(self.advance(Phase::Validating, GreenReady { revision })),
            Err(reason) => Err(self.fail(reason)),
        }
    }
}

impl<'a> Deployment<'a, GreenReady> {
    /// Run the probe suite against green. Any failing probe fails validation.
    #[must_use = "deployment state must be used"]
    pub async fn validate(self) -> TransitionResult<'a, Validated, GreenReady> {
        let green = self.green();
        let probes = self.env.health.validate(&green, self.namespace());
        let report = match self
            .bounded("validate", probes, |err| FailureReason::Validation(err.to_string()))
            .await
        {
            Ok(report) => report,
            Err(reason) => return Err(self.fail(reason)),
        };

        if report.passed() {
            tracing::info!(probes = report.results.len(), "green validated");
            let revision = self.state.revision.clone();
            return Ok(self.advance(Phase::SwitchingTraffic, Validated { revision }));
        }

        let failed: Vec<String> = report
            .failures()
            .map(|probe| format!("{} ({})", probe.name, probe.detail))
            .collect();
        Err(self.fail(FailureReason::Validation(failed.join(", "))))
    }
}

impl<'a> Deployment<'a, Validated> {
    /// Repoint the stable selector at green, then wait out the settle delay.
    #[must_use = "deployment state must be used"]
    pub async fn switch_traffic(self) -> TransitionResult<'a, Switched, Validated> {
        let green = self.green();
        let select = self.env.cluster.set_selector(self.service(), self.namespace(), &green);
        if let Err(reason) = self
            .bounded("select", select, |err| FailureReason::TrafficSwitch(err.to_string()))
            .await
        {
            return Err(self.fail(reason));
        }
        tracing::info!(service = %self.service(), target = %green, "traffic switched");

        tokio::time::sleep(self.env.policy.settle_delay).await;

        let revision = self.state.revision.clone();
        Ok(self.advance(Phase::RetiringOld, Switched { revision }))
    }
}

impl<'a> Deployment<'a, Switched> {
    /// Remove the old blue slot and re-label green as blue so the next run
    /// finds the green slot free.
    #[must_use = "deployment state must be used"]
    pub async fn retire_old(self) -> TransitionResult<'a, Retired, Switched> {
        match self.swap_slots().await {
            Ok(()) => {
                let revision = self.state.revision.clone();
                Ok(self.transition(Retired { revision }))
            }
            Err(err) => {
                let reason = FailureReason::PostSwitchCleanup {
                    revision: self.state.revision.to_string(),
                    detail: err.to_string(),
                };
                tracing::error!(
                    service = %self.service(),
                    revision = %self.state.revision,
                    error = %err,
                    "post-switch cleanup failed; traffic stays on green"
                );
                Err(self.fail(reason))
            }
        }
    }

    async fn swap_slots(&self) -> Result<(), PortError> {
        let (blue, green) = (self.blue(), self.green());
        self.remove(&blue).await?;
        self.limited("relabel", self.env.cluster.relabel(&green, &blue, self.namespace()))
            .await?;
        self.limited("select", self.env.cluster.set_selector(self.service(), self.namespace(), &blue))
            .await
    }
}

impl Halted<'_> {
    async fn abort_green(mut self) -> StrategyReport {
        if self.reason.is_post_switch() {
            return self.finish();
        }
        tracing::warn!(step = %self.step, reason = %self.reason, "blue-green aborted");
        if self.step != Phase::DeployingGreen {
            self.deployment.enter(Phase::Aborting);
        }
        self.deployment.discard_green().await;
        self.finish()
    }
}

pub(crate) async fn run(env: StrategyEnv<'_>, target: DeployTarget) -> StrategyReport {
    let pending = Deployment::start(DeployStrategy::BlueGreen, env, target, Phase::DeployingGreen, Pending);

    let result: Result<_, Halted<'_>> = async {
        let ready = pending.deploy_green().await?;
        let validated = ready.validate().await?;
        let switched = validated.switch_traffic().await?;
        Ok(switched.retire_old().await?)
    }
    .await;

    match result {
        Ok(retired) => {
            let revision = retired.state.revision.clone();
            retired.finish(DeploymentOutcome::Succeeded { revision })
        }
        Err(halted) => halted.abort_green().await,
    }
}
