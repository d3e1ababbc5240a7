// ABOUTME: Deployment strategy selection based on the target environment.
// ABOUTME: prod runs blue-green, staging runs canary, everything else deploys directly.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::deployment::{DeployTarget, StrategyEnv};
use super::outcome::StrategyReport;
use super::{blue_green, canary, direct};
use crate::config::Policy;
use crate::types::Environment;

/// Forward steps a strategy may take before its deadline: two readiness
/// waits, the monitoring window, and one call timeout per other forward call.
pub fn strategy_budget(policy: &Policy) -> Duration {
    policy.rollout_timeout * 2 + policy.monitoring_window + policy.call_timeout * 4
}

/// Strategy for rolling out a new revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployStrategy {
    /// Apply the manifest in place and wait for readiness.
    Direct,

    /// Trial a single replica on a minority of traffic before promoting.
    Canary,

    /// Bring up a full second slot, validate it, then switch traffic wholesale.
    BlueGreen,
}

impl DeployStrategy {
    /// The strategy is fixed by environment for the whole run.
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Prod => DeployStrategy::BlueGreen,
            Environment::Staging => DeployStrategy::Canary,
            Environment::Dev | Environment::Test => DeployStrategy::Direct,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeployStrategy::Direct => "direct",
            DeployStrategy::Canary => "canary",
            DeployStrategy::BlueGreen => "blue-green",
        }
    }

    /// Run this strategy's state machine to a terminal outcome.
    pub async fn apply(self, env: StrategyEnv<'_>, target: DeployTarget) -> StrategyReport {
        match self {
            DeployStrategy::Direct => direct::run(env, target).await,
            DeployStrategy::Canary => canary::run(env, target).await,
            DeployStrategy::BlueGreen => blue_green::run(env, target).await,
        }
    }
}

impl fmt::Display for DeployStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
