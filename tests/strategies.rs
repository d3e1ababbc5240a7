// ABOUTME: Integration tests for the direct, canary, and blue-green state machines.
// ABOUTME: Runs against the in-memory cluster with paused time.

mod support;

use std::time::Duration;
use tokio::time::Instant;

use stagehand::config::Policy;
use stagehand::deploy::{
    DeployStrategy, DeployTarget, DeploymentOutcome, FailureReason, Phase, StrategyEnv, strategy_budget,
};
use stagehand::diagnostics::{Diagnostics, WarningKind};
use stagehand::ports::{HealthSample, Manifest, RolloutStatus, TrafficSplit};
use support::{FakeCluster, FakeHealth, Journal, app, version};

fn target(replicas: u32) -> DeployTarget {
    DeployTarget {
        app: app(),
        manifest: Manifest::new("deploy/web", "web", version("42-abcdef0"), replicas),
        namespace: "web-staging".to_string(),
    }
}

struct Rig {
    journal: Journal,
    cluster: FakeCluster,
    health: FakeHealth,
    policy: Policy,
    diag: Diagnostics,
}

impl Rig {
    fn new() -> Self {
        support::init_tracing();
        let journal = Journal::default();
        Self {
            cluster: FakeCluster::new(journal.clone()),
            health: FakeHealth::default(),
            policy: Policy::default(),
            diag: Diagnostics::default(),
            journal,
        }
    }

    fn with_blue(mut self) -> Self {
        self.cluster = self.cluster.with_deployment("web-blue");
        self
    }

    fn env(&self) -> StrategyEnv<'_> {
        self.env_until(strategy_budget(&self.policy))
    }

    /// An environment whose deadline is `budget` from now.
    fn env_until(&self, budget: Duration) -> StrategyEnv<'_> {
        StrategyEnv {
            cluster: &self.cluster,
            health: &self.health,
            policy: &self.policy,
            diag: &self.diag,
            deadline: Instant::now() + budget,
        }
    }
}

fn failure(outcome: &DeploymentOutcome) -> (Phase, FailureReason) {
    match outcome {
        DeploymentOutcome::Failed { step, reason } => (*step, reason.clone()),
        DeploymentOutcome::Succeeded { revision } => panic!("expected failure, got revision {revision}"),
    }
}

mod direct {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn applies_then_waits_for_readiness() {
        let rig = Rig::new();
        rig.cluster.script_rollout(
            "web",
            vec![
                RolloutStatus::Progressing { ready: 0, desired: 1 },
                RolloutStatus::Ready,
            ],
        );

        let report = DeployStrategy::Direct.apply(rig.env(), target(1)).await;

        assert!(report.outcome.is_success());
        assert_eq!(
            report.trace,
            vec![Phase::Submitting, Phase::WaitingRollout, Phase::Succeeded]
        );
        assert_eq!(rig.journal.entries(), vec!["apply web x1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_rollout_fails_the_deployment() {
        let rig = Rig::new();
        rig.cluster
            .script_rollout("web", vec![RolloutStatus::Failed("CrashLoopBackOff".to_string())]);

        let report = DeployStrategy::Direct.apply(rig.env(), target(1)).await;

        let (step, reason) = failure(&report.outcome);
        assert_eq!(step, Phase::WaitingRollout);
        assert!(matches!(reason, FailureReason::HealthCheck(detail) if detail.contains("CrashLoopBackOff")));
        assert_eq!(report.trace.last(), Some(&Phase::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn rollout_that_never_settles_times_out() {
        let rig = Rig::new();
        rig.cluster
            .script_rollout("web", vec![RolloutStatus::Progressing { ready: 0, desired: 1 }]);

        let report = DeployStrategy::Direct.apply(rig.env(), target(1)).await;

        let (_, reason) = failure(&report.outcome);
        assert_eq!(
            reason,
            FailureReason::Timeout {
                after: rig.policy.rollout_timeout
            }
        );
    }

    #[tokio::test]
    async fn rejected_apply_fails_while_submitting() {
        let rig = Rig::new();
        rig.cluster.fail_apply("web");

        let report = DeployStrategy::Direct.apply(rig.env(), target(1)).await;

        let (step, reason) = failure(&report.outcome);
        assert_eq!(step, Phase::Submitting);
        assert!(matches!(reason, FailureReason::Apply(_)));
    }
}

mod canary {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn healthy_canary_is_promoted_and_cleaned_up() {
        let rig = Rig::new();

        let started = Instant::now();
        let report = DeployStrategy::Canary.apply(rig.env(), target(2)).await;

        assert!(report.outcome.is_success());
        assert_eq!(
            report.trace,
            vec![
                Phase::DeployingCanary,
                Phase::RoutingSplit,
                Phase::Monitoring,
                Phase::Promoting,
                Phase::Cleanup,
                Phase::Succeeded,
            ]
        );
        assert!(started.elapsed() >= rig.policy.monitoring_window);
        assert_eq!(rig.health.sample_count(), 20);
        assert_eq!(
            rig.journal.entries(),
            vec![
                "apply web-canary x1".to_string(),
                "route web web-canary=10".to_string(),
                "apply web x2".to_string(),
                "route web stable".to_string(),
                "delete web-canary".to_string(),
            ]
        );
        assert_eq!(rig.cluster.route(), Some(TrafficSplit::all_stable("web")));
        assert_eq!(rig.cluster.deployments(), vec!["web".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn canary_runs_one_replica_labeled_as_canary() {
        let rig = Rig::new();
        rig.cluster
            .script_rollout("web-canary", vec![RolloutStatus::Failed("image pull".to_string())]);

        DeployStrategy::Canary.apply(rig.env(), target(5)).await;

        assert!(rig.journal.contains("apply web-canary x1"));
        assert!(!rig.journal.contains("apply web x5"));
    }

    #[tokio::test(start_paused = true)]
    async fn alarm_mid_window_aborts_and_restores_stable() {
        let rig = Rig::new();
        rig.health.alarm_on_sample(8, "HighErrorRate");

        let started = Instant::now();
        let report = DeployStrategy::Canary.apply(rig.env(), target(2)).await;

        let (step, reason) = failure(&report.outcome);
        assert_eq!(step, Phase::Monitoring);
        assert_eq!(
            reason,
            FailureReason::MonitoringAlarm("HighErrorRate after 4m00s".to_string())
        );
        assert!(started.elapsed() < Duration::from_secs(5 * 60));
        assert!(report.visited(Phase::Aborting));
        assert!(!report.visited(Phase::Promoting));
        assert!(!rig.journal.contains("apply web x2"));
        assert_eq!(rig.cluster.route(), Some(TrafficSplit::all_stable("web")));
        assert!(rig.cluster.deployment("web-canary").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn error_rate_above_threshold_aborts() {
        let rig = Rig::new();
        rig.health.push_sample(FakeHealth::healthy());
        rig.health.push_sample(HealthSample {
            error_rate: 0.2,
            alarm: None,
        });

        let report = DeployStrategy::Canary.apply(rig.env(), target(2)).await;

        let (step, reason) = failure(&report.outcome);
        assert_eq!(step, Phase::Monitoring);
        assert!(matches!(reason, FailureReason::MonitoringAlarm(detail) if detail.contains("error rate 0.200")));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_health_sample_aborts_and_restores_stable() {
        let rig = Rig::new();
        rig.health.stall_samples();

        let started = Instant::now();
        let report = DeployStrategy::Canary.apply(rig.env(), target(2)).await;

        let (step, reason) = failure(&report.outcome);
        assert_eq!(step, Phase::Monitoring);
        assert!(matches!(reason, FailureReason::MonitoringAlarm(detail) if detail.contains("no response within")));
        assert!(started.elapsed() < rig.policy.monitoring_window);
        assert!(report.visited(Phase::Aborting));
        assert_eq!(rig.cluster.route(), Some(TrafficSplit::all_stable("web")));
        assert!(rig.cluster.deployment("web-canary").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_monitoring_restores_stable() {
        let rig = Rig::new();
        let budget = Duration::from_secs(5 * 60);

        let started = Instant::now();
        let report = DeployStrategy::Canary.apply(rig.env_until(budget), target(2)).await;

        let (step, reason) = failure(&report.outcome);
        assert_eq!(step, Phase::Monitoring);
        assert!(matches!(reason, FailureReason::DeadlineExceeded { .. }));
        assert!(started.elapsed() >= budget);
        assert!(started.elapsed() < rig.policy.monitoring_window);
        assert!(!rig.journal.contains("apply web x2"));
        assert_eq!(rig.cluster.route(), Some(TrafficSplit::all_stable("web")));
        assert!(rig.cluster.deployment("web-canary").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_failure_is_a_warning() {
        let rig = Rig::new();
        rig.cluster.fail_delete("web-canary");

        let report = DeployStrategy::Canary.apply(rig.env(), target(2)).await;

        assert!(report.outcome.is_success());
        let warnings = rig.diag.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::CleanupFailed);
        assert!(warnings[0].message.contains("web-canary"));
    }

    #[tokio::test(start_paused = true)]
    async fn promotion_failure_aborts_the_canary() {
        let rig = Rig::new();
        rig.cluster
            .script_rollout("web", vec![RolloutStatus::Failed("OOMKilled".to_string())]);

        let report = DeployStrategy::Canary.apply(rig.env(), target(2)).await;

        let (step, _) = failure(&report.outcome);
        assert_eq!(step, Phase::Promoting);
        assert!(report.visited(Phase::Aborting));
        assert!(rig.journal.contains("delete web-canary"));
    }
}

mod blue_green {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn validated_green_takes_over_and_becomes_blue() {
        let rig = Rig::new().with_blue();

        let report = DeployStrategy::BlueGreen.apply(rig.env(), target(3)).await;

        assert!(report.outcome.is_success());
        assert_eq!(
            report.trace,
            vec![
                Phase::DeployingGreen,
                Phase::Validating,
                Phase::SwitchingTraffic,
                Phase::RetiringOld,
                Phase::Succeeded,
            ]
        );
        assert_eq!(
            rig.journal.entries(),
            vec![
                "apply web-green x3".to_string(),
                "select web web-green".to_string(),
                "delete web-blue".to_string(),
                "relabel web-green web-blue".to_string(),
                "select web web-blue".to_string(),
            ]
        );
        assert_eq!(rig.cluster.deployments(), vec!["web-blue".to_string()]);
        assert_eq!(
            rig.cluster.deployment("web-blue").unwrap().version,
            version("42-abcdef0")
        );
        assert_eq!(rig.cluster.selector().as_deref(), Some("web-blue"));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_passes_before_blue_is_retired() {
        let rig = Rig::new().with_blue();

        let started = Instant::now();
        DeployStrategy::BlueGreen.apply(rig.env(), target(3)).await;

        assert!(started.elapsed() >= rig.policy.settle_delay);
    }

    #[tokio::test(start_paused = true)]
    async fn first_deploy_without_blue_succeeds() {
        let rig = Rig::new();

        let report = DeployStrategy::BlueGreen.apply(rig.env(), target(3)).await;

        assert!(report.outcome.is_success());
        assert_eq!(rig.cluster.deployments(), vec!["web-blue".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_validation_discards_green_and_keeps_blue() {
        let rig = Rig::new().with_blue();
        rig.health.failing_probe("checkout", "500 on /cart");

        let report = DeployStrategy::BlueGreen.apply(rig.env(), target(3)).await;

        let (step, reason) = failure(&report.outcome);
        assert_eq!(step, Phase::Validating);
        assert_eq!(reason, FailureReason::Validation("checkout (500 on /cart)".to_string()));
        assert!(!rig.journal.entries().iter().any(|e| e.starts_with("select")));
        assert_eq!(rig.cluster.deployments(), vec!["web-blue".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_while_deploying_green_keeps_blue() {
        let rig = Rig::new().with_blue();
        rig.cluster
            .script_rollout("web-green", vec![RolloutStatus::Progressing { ready: 1, desired: 3 }]);

        let report = DeployStrategy::BlueGreen
            .apply(rig.env_until(Duration::from_secs(3 * 60)), target(3))
            .await;

        let (step, reason) = failure(&report.outcome);
        assert_eq!(step, Phase::DeployingGreen);
        assert!(matches!(reason, FailureReason::DeadlineExceeded { .. }));
        assert!(!rig.journal.entries().iter().any(|e| e.starts_with("select")));
        assert!(rig.journal.contains("delete web-green"));
        assert_eq!(rig.cluster.deployments(), vec!["web-blue".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn selector_failure_leaves_blue_authoritative() {
        let rig = Rig::new().with_blue();
        rig.cluster.fail_selector_to("web-green");

        let report = DeployStrategy::BlueGreen.apply(rig.env(), target(3)).await;

        let (step, reason) = failure(&report.outcome);
        assert_eq!(step, Phase::SwitchingTraffic);
        assert!(matches!(reason, FailureReason::TrafficSwitch(_)));
        assert!(rig.cluster.deployment("web-green").is_none());
        assert!(rig.cluster.deployment("web-blue").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn post_switch_failure_never_reverses_traffic() {
        let rig = Rig::new().with_blue();
        rig.cluster.fail_relabel();

        let report = DeployStrategy::BlueGreen.apply(rig.env(), target(3)).await;

        let (step, reason) = failure(&report.outcome);
        assert_eq!(step, Phase::RetiringOld);
        assert!(reason.is_post_switch());
        assert!(!report.visited(Phase::Aborting));
        assert_eq!(rig.cluster.selector().as_deref(), Some("web-green"));
        assert!(rig.cluster.deployment("web-green").is_some());
        assert!(!rig.journal.contains("delete web-green"));
    }
}
