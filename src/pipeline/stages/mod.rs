// ABOUTME: The standard deployment pipeline: build, scan, test, publish, approve, deploy, smoke.
// ABOUTME: Wires stage actions to collaborators and sets guards, writes, and timeouts.

mod artifact;
mod release;
mod verify;

pub use artifact::{ARTIFACT_KEY, BuildArtifact, IMAGE_KEY, PublishImage, ScanArtifact, findings_key};
pub use release::{
    APPROVED_BY_KEY, AwaitApproval, DeployApplication, ENDPOINT_KEY, INFRA_PREFIX, ProvisionInfra, REVISION_KEY,
    STRATEGY_KEY,
};
pub use verify::RunSuite;

use nonempty::NonEmpty;
use std::sync::Arc;
use std::time::Duration;

use super::{HookOutcome, Pipeline, PipelineError, PipelineHook, StageSpec};
use crate::config::{Config, Policy};
use crate::deploy::strategy_budget;
use crate::ports::Collaborators;

pub const BUILD: &str = "build";
pub const SCAN: &str = "scan";
pub const TEST: &str = "test";
pub const UNIT_TESTS: &str = "unit-tests";
pub const INTEGRATION_TESTS: &str = "integration-tests";
pub const PUBLISH: &str = "publish";
pub const APPROVAL: &str = "approval";
pub const DEPLOY_INFRASTRUCTURE: &str = "deploy-infrastructure";
pub const DEPLOY_APPLICATION: &str = "deploy-application";
pub const SMOKE_TESTS: &str = "smoke-tests";

const TIMEOUT_MARGIN: Duration = Duration::from_secs(5 * 60);

pub fn scan_stage_name(scanner: &str) -> String {
    format!("scan:{scanner}")
}

/// Stage timeout for deploy-application: the strategy's own deadline plus
/// what may run after it (settle delay and up to three teardown calls).
pub fn deploy_budget(policy: &Policy) -> Duration {
    strategy_budget(policy) + policy.settle_delay + policy.call_timeout * 3 + TIMEOUT_MARGIN
}

/// Build the standard pipeline for `config`.
pub fn standard_pipeline(
    config: &Config,
    ports: &Collaborators,
    hooks: Vec<(HookOutcome, Arc<dyn PipelineHook>)>,
) -> Result<Pipeline, PipelineError> {
    let suites = &config.tests;
    let policy = &config.policy;

    let mut builder = Pipeline::builder().stage(
        StageSpec::action(
            BUILD,
            BuildArtifact {
                builder: ports.builder.clone(),
                source: config.source.clone(),
            },
        )
        .when(|ctx| ctx.requested_version().is_none())
        .writes(ARTIFACT_KEY),
    );

    let scans: Vec<StageSpec> = ports
        .scanners
        .iter()
        .map(|scanner| {
            StageSpec::action(scan_stage_name(scanner.name()), ScanArtifact {
                scanner: scanner.clone(),
            })
            .writes(&findings_key(scanner.name()))
        })
        .collect();
    match NonEmpty::from_vec(scans) {
        Some(members) => builder = builder.stage(StageSpec::parallel(SCAN, members)),
        None => tracing::warn!("no scanners configured, scan stage omitted"),
    }

    let suite = |name: &str, suite: &str, output: &str| {
        StageSpec::action(name, RunSuite {
            runner: ports.tests.clone(),
            suite: suite.to_string(),
            output: output.to_string(),
            endpoint_key: None,
        })
        .writes(output)
    };
    let tests = NonEmpty {
        head: suite(UNIT_TESTS, &suites.unit, "tests.unit"),
        tail: vec![suite(INTEGRATION_TESTS, &suites.integration, "tests.integration")],
    };

    let smoke = RunSuite {
        runner: ports.tests.clone(),
        suite: suites.smoke.clone(),
        output: "tests.smoke".to_string(),
        endpoint_key: Some(ENDPOINT_KEY),
    };

    builder = builder
        .stage(StageSpec::parallel(TEST, tests).when(|ctx| ctx.run_tests()))
        .stage(
            StageSpec::action(PUBLISH, PublishImage {
                registry: ports.registry.clone(),
            })
            .when(|ctx| ctx.requested_version().is_none())
            .writes(IMAGE_KEY),
        )
        .stage(
            StageSpec::action(APPROVAL, AwaitApproval {
                gate: ports.approval.clone(),
                policy: policy.clone(),
            })
            .when(|ctx| ctx.environment().is_prod())
            .writes(APPROVED_BY_KEY)
            .timeout(policy.approval_timeout + TIMEOUT_MARGIN),
        )
        .stage(
            StageSpec::action(DEPLOY_INFRASTRUCTURE, ProvisionInfra {
                provisioner: ports.infra.clone(),
            })
            .writes(&format!("{INFRA_PREFIX}*")),
        )
        .stage(
            StageSpec::action(DEPLOY_APPLICATION, DeployApplication {
                cluster: ports.cluster.clone(),
                health: ports.health.clone(),
                manifest: config.manifest.clone(),
                policy: policy.clone(),
            })
            .writes(REVISION_KEY)
            .writes(STRATEGY_KEY)
            .timeout(deploy_budget(policy)),
        )
        .stage(
            StageSpec::action(SMOKE_TESTS, smoke)
                .when(|ctx| ctx.run_tests())
                .writes("tests.smoke"),
        );

    for (outcome, hook) in hooks {
        builder = builder.hook(outcome, hook);
    }
    builder.build()
}
