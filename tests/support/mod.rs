// ABOUTME: Test support utilities.
// ABOUTME: In-memory fakes for every collaborator plus config and context builders.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Once};
use std::time::Duration;

use stagehand::config::Config;
use stagehand::context::{DeployRequest, RunContext};
use stagehand::ports::*;
use stagehand::types::{AppName, ArtifactId, Environment, RevisionId, TicketId, VersionToken};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("stagehand=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const CONFIG: &str = r#"
app: web
source: git@example.com:org/web.git
manifest: deploy/web
scanners: [trivy, semgrep]
environments:
  dev: {}
  test: {}
  staging:
    replicas: 2
  prod:
    replicas: 3
    infra:
      region: eu-west-1
"#;

pub fn config() -> Config {
    Config::from_yaml(CONFIG).unwrap()
}

pub fn request(env: Environment) -> DeployRequest {
    DeployRequest::new(env, "abcdef0123456789", 42)
}

pub fn context(env: Environment) -> RunContext {
    request(env).resolve(&config()).unwrap()
}

pub fn app() -> AppName {
    AppName::new("web").unwrap()
}

pub fn version(v: &str) -> VersionToken {
    VersionToken::parse(v).unwrap()
}

/// Ordered log of side effects shared by every fake in a world.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|e| e == entry)
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ClusterState {
    deployments: BTreeMap<String, Manifest>,
    rollouts: HashMap<String, VecDeque<RolloutStatus>>,
    failing_apply: BTreeSet<String>,
    failing_delete: BTreeSet<String>,
    fail_relabel: bool,
    failing_selector_targets: BTreeSet<String>,
    route: Option<TrafficSplit>,
    selector: Option<String>,
    revisions: u32,
}

/// A cluster where every rollout is ready unless scripted otherwise.
#[derive(Clone)]
pub struct FakeCluster {
    journal: Journal,
    state: Arc<Mutex<ClusterState>>,
}

impl FakeCluster {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            state: Arc::default(),
        }
    }

    /// Pre-existing deployment, e.g. the live blue slot.
    pub fn with_deployment(self, name: &str) -> Self {
        let manifest = Manifest::new("deploy/web", name, version("1-0000000"), 1);
        self.state.lock().deployments.insert(name.to_string(), manifest);
        self
    }

    /// Statuses reported for `name` in order; the last one repeats.
    pub fn script_rollout(&self, name: &str, statuses: Vec<RolloutStatus>) {
        self.state.lock().rollouts.insert(name.to_string(), statuses.into());
    }

    pub fn fail_apply(&self, name: &str) {
        self.state.lock().failing_apply.insert(name.to_string());
    }

    pub fn fail_delete(&self, name: &str) {
        self.state.lock().failing_delete.insert(name.to_string());
    }

    pub fn fail_relabel(&self) {
        self.state.lock().fail_relabel = true;
    }

    pub fn fail_selector_to(&self, target: &str) {
        self.state.lock().failing_selector_targets.insert(target.to_string());
    }

    pub fn deployments(&self) -> Vec<String> {
        self.state.lock().deployments.keys().cloned().collect()
    }

    pub fn deployment(&self, name: &str) -> Option<Manifest> {
        self.state.lock().deployments.get(name).cloned()
    }

    pub fn route(&self) -> Option<TrafficSplit> {
        self.state.lock().route.clone()
    }

    pub fn selector(&self) -> Option<String> {
        self.state.lock().selector.clone()
    }
}

#[async_trait]
impl ClusterOps for FakeCluster {
    async fn apply(&self, manifest: &Manifest, _namespace: &str) -> Result<RevisionId, PortError> {
        self.journal.record(format!("apply {} x{}", manifest.name, manifest.replicas));
        let mut state = self.state.lock();
        if state.failing_apply.contains(&manifest.name) {
            return Err(PortError::failed("apply", format!("{} rejected", manifest.name)));
        }
        state.revisions += 1;
        state.deployments.insert(manifest.name.clone(), manifest.clone());
        Ok(RevisionId::new(format!("{}-r{}", manifest.name, state.revisions)))
    }

    async fn rollout_status(&self, name: &str, _namespace: &str) -> Result<RolloutStatus, PortError> {
        let mut state = self.state.lock();
        match state.rollouts.get_mut(name) {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap_or(RolloutStatus::Ready)),
            Some(queue) => Ok(queue.front().cloned().unwrap_or(RolloutStatus::Ready)),
            None => Ok(RolloutStatus::Ready),
        }
    }

    async fn route(&self, service: &str, _namespace: &str, split: &TrafficSplit) -> Result<(), PortError> {
        self.journal.record(match &split.canary {
            Some(canary) => format!("route {service} {canary}={}", split.canary_weight),
            None => format!("route {service} stable"),
        });
        self.state.lock().route = Some(split.clone());
        Ok(())
    }

    async fn set_selector(&self, service: &str, _namespace: &str, target: &str) -> Result<(), PortError> {
        self.journal.record(format!("select {service} {target}"));
        let mut state = self.state.lock();
        if state.failing_selector_targets.contains(target) {
            return Err(PortError::failed("select", format!("cannot select {target}")));
        }
        state.selector = Some(target.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str, _namespace: &str) -> Result<(), PortError> {
        self.journal.record(format!("delete {name}"));
        let mut state = self.state.lock();
        if state.failing_delete.contains(name) {
            return Err(PortError::failed("delete", format!("{name} is stuck terminating")));
        }
        match state.deployments.remove(name) {
            Some(_) => Ok(()),
            None => Err(PortError::NotFound(name.to_string())),
        }
    }

    async fn relabel(&self, name: &str, new_name: &str, _namespace: &str) -> Result<(), PortError> {
        self.journal.record(format!("relabel {name} {new_name}"));
        let mut state = self.state.lock();
        if state.fail_relabel {
            return Err(PortError::failed("relabel", "label update conflict"));
        }
        let manifest = state
            .deployments
            .remove(name)
            .ok_or_else(|| PortError::NotFound(name.to_string()))?;
        state.deployments.insert(new_name.to_string(), manifest.renamed(new_name));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct FakeHealth {
    samples: Arc<Mutex<VecDeque<HealthSample>>>,
    sampled: Arc<Mutex<u32>>,
    probes: Arc<Mutex<Vec<ProbeResult>>>,
    stalled: Arc<Mutex<bool>>,
}

impl FakeHealth {
    pub fn healthy() -> HealthSample {
        HealthSample {
            error_rate: 0.0,
            alarm: None,
        }
    }

    /// Healthy samples until the `n`th (1-based), which carries `alarm`.
    pub fn alarm_on_sample(&self, n: usize, alarm: &str) {
        let mut samples: VecDeque<HealthSample> = (1..n).map(|_| Self::healthy()).collect();
        samples.push_back(HealthSample {
            error_rate: 0.0,
            alarm: Some(alarm.to_string()),
        });
        *self.samples.lock() = samples;
    }

    pub fn push_sample(&self, sample: HealthSample) {
        self.samples.lock().push_back(sample);
    }

    pub fn failing_probe(&self, name: &str, detail: &str) {
        self.probes.lock().push(ProbeResult {
            name: name.to_string(),
            passed: false,
            detail: detail.to_string(),
        });
    }

    /// Every later sample call hangs without answering.
    pub fn stall_samples(&self) {
        *self.stalled.lock() = true;
    }

    pub fn sample_count(&self) -> u32 {
        *self.sampled.lock()
    }
}

#[async_trait]
impl HealthMonitor for FakeHealth {
    async fn sample(&self, _name: &str, _namespace: &str) -> Result<HealthSample, PortError> {
        *self.sampled.lock() += 1;
        let stalled = *self.stalled.lock();
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(self.samples.lock().pop_front().unwrap_or_else(Self::healthy))
    }

    async fn validate(&self, _name: &str, _namespace: &str) -> Result<ProbeReport, PortError> {
        let mut results = vec![ProbeResult {
            name: "http".to_string(),
            passed: true,
            detail: "200 OK".to_string(),
        }];
        results.extend(self.probes.lock().iter().cloned());
        Ok(ProbeReport { results })
    }
}

// ---------------------------------------------------------------------------
// Build, scan, publish, infra, tests
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FakeBuilder(pub Journal);

#[async_trait]
impl ArtifactBuilder for FakeBuilder {
    async fn build(&self, source: &SourceRef) -> Result<ArtifactId, PortError> {
        self.0.record(format!("build {}", source.version));
        Ok(ArtifactId::new(format!("sha256:{}", source.version)))
    }
}

pub struct FakeScanner {
    pub name: String,
    pub findings: Vec<Finding>,
    pub delay: Duration,
    pub journal: Journal,
}

impl FakeScanner {
    pub fn clean(name: &str, journal: Journal) -> Self {
        Self {
            name: name.to_string(),
            findings: Vec::new(),
            delay: Duration::ZERO,
            journal,
        }
    }

    pub fn with_finding(mut self, severity: FindingSeverity, id: &str) -> Self {
        self.findings.push(Finding {
            id: id.to_string(),
            severity,
            summary: format!("{id} summary"),
        });
        self
    }
}

#[async_trait]
impl Scanner for FakeScanner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self, artifact: &ArtifactId) -> Result<Vec<Finding>, PortError> {
        tokio::time::sleep(self.delay).await;
        self.journal.record(format!("scan {} {artifact}", self.name));
        Ok(self.findings.clone())
    }
}

#[derive(Clone)]
pub struct FakeRegistry(pub Journal);

#[async_trait]
impl Registry for FakeRegistry {
    async fn push(&self, artifact: &ArtifactId, tag: &VersionToken) -> Result<(), PortError> {
        self.0.record(format!("push {artifact} {tag}"));
        Ok(())
    }

    async fn sign(&self, tag: &VersionToken) -> Result<(), PortError> {
        self.0.record(format!("sign {tag}"));
        Ok(())
    }
}

#[derive(Clone)]
pub struct FakeInfra {
    pub journal: Journal,
    pub outputs: BTreeMap<String, String>,
}

#[async_trait]
impl InfraProvisioner for FakeInfra {
    async fn plan(&self, vars: &BTreeMap<String, String>) -> Result<String, PortError> {
        self.journal.record("infra plan");
        Ok(format!("{} variables", vars.len()))
    }

    async fn apply(&self, vars: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, PortError> {
        self.journal.record(format!(
            "infra apply version={}",
            vars.get("version").cloned().unwrap_or_default()
        ));
        Ok(self.outputs.clone())
    }
}

#[derive(Clone, Default)]
pub struct FakeTests {
    pub journal: Journal,
    pub failing: Arc<Mutex<BTreeSet<String>>>,
}

impl FakeTests {
    pub fn fail_suite(&self, suite: &str) {
        self.failing.lock().insert(suite.to_string());
    }
}

#[async_trait]
impl TestRunner for FakeTests {
    async fn run_suite(&self, suite: &str, target: &TestTarget) -> Result<TestReport, PortError> {
        self.journal.record(format!(
            "test {suite} {}",
            target.endpoint.clone().unwrap_or_else(|| "-".to_string())
        ));
        let failed = self.failing.lock().contains(suite);
        Ok(TestReport {
            suite: suite.to_string(),
            passed: 10,
            failed: u32::from(failed),
            failures: if failed { vec![format!("{suite}::broken")] } else { Vec::new() },
        })
    }
}

// ---------------------------------------------------------------------------
// Approval, notifications, versions
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub enum ApprovalScript {
    Approve,
    Deny,
    /// Nobody ever answers.
    Silence,
}

#[derive(Clone)]
pub struct FakeApproval {
    pub script: Arc<Mutex<ApprovalScript>>,
    pub requests: Arc<Mutex<u32>>,
}

#[async_trait]
impl ApprovalGate for FakeApproval {
    async fn request(&self, _request: &ApprovalRequest) -> Result<ApprovalDecision, PortError> {
        *self.requests.lock() += 1;
        let script = self.script.lock().clone();
        match script {
            ApprovalScript::Approve => Ok(ApprovalDecision::Approved {
                by: "release-manager".to_string(),
            }),
            ApprovalScript::Deny => Ok(ApprovalDecision::Denied {
                by: "release-manager".to_string(),
                reason: Some("change freeze".to_string()),
            }),
            ApprovalScript::Silence => std::future::pending().await,
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeNotifier {
    pub sent: Arc<Mutex<Vec<(String, Severity, String)>>>,
    pub fail: Arc<Mutex<bool>>,
}

impl FakeNotifier {
    pub fn sent(&self) -> Vec<(String, Severity, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, channel: &str, severity: Severity, message: &str) -> Result<(), PortError> {
        if *self.fail.lock() {
            return Err(PortError::failed("notify", "chat is down"));
        }
        self.sent
            .lock()
            .push((channel.to_string(), severity, message.to_string()));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeTickets {
    pub created: Arc<Mutex<Vec<TicketRequest>>>,
}

#[async_trait]
impl Ticketing for FakeTickets {
    async fn create_ticket(&self, request: &TicketRequest) -> Result<TicketId, PortError> {
        let mut created = self.created.lock();
        created.push(request.clone());
        Ok(TicketId::new(format!("OPS-{}", created.len())))
    }
}

#[derive(Clone, Default)]
pub struct FakeVersions {
    pub last_good: Arc<Mutex<BTreeMap<Environment, VersionToken>>>,
    pub recorded: Arc<Mutex<Vec<(Environment, VersionToken)>>>,
}

impl FakeVersions {
    pub fn set_last_good(&self, env: Environment, v: &str) {
        self.last_good.lock().insert(env, version(v));
    }
}

#[async_trait]
impl VersionStore for FakeVersions {
    async fn last_good_version(&self, _app: &AppName, env: Environment) -> Result<Option<VersionToken>, PortError> {
        Ok(self.last_good.lock().get(&env).cloned())
    }

    async fn record_good_version(
        &self,
        _app: &AppName,
        env: Environment,
        version: &VersionToken,
    ) -> Result<(), PortError> {
        self.recorded.lock().push((env, version.clone()));
        self.last_good.lock().insert(env, version.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeRollback {
    pub requested: Arc<Mutex<Vec<(Environment, VersionToken)>>>,
}

#[async_trait]
impl RollbackRequester for FakeRollback {
    async fn request_rollback(&self, _app: &AppName, env: Environment, version: &VersionToken) -> Result<(), PortError> {
        self.requested.lock().push((env, version.clone()));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeArchiver {
    pub archived: Arc<Mutex<Vec<ArchiveRequest>>>,
}

#[async_trait]
impl Archiver for FakeArchiver {
    async fn archive(&self, request: &ArchiveRequest) -> Result<(), PortError> {
        self.archived.lock().push(request.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Every fake wired together, sharing one journal.
pub struct World {
    pub journal: Journal,
    pub cluster: FakeCluster,
    pub health: FakeHealth,
    pub tests: FakeTests,
    pub approval: FakeApproval,
    pub notifier: FakeNotifier,
    pub tickets: FakeTickets,
    pub versions: FakeVersions,
    pub rollback: FakeRollback,
    pub archiver: FakeArchiver,
    pub scanners: Vec<Arc<dyn Scanner>>,
    pub infra_outputs: BTreeMap<String, String>,
}

impl World {
    pub fn new() -> Self {
        let journal = Journal::default();
        let scanners: Vec<Arc<dyn Scanner>> = vec![
            Arc::new(FakeScanner::clean("trivy", journal.clone())),
            Arc::new(FakeScanner::clean("semgrep", journal.clone())),
        ];
        let mut infra_outputs = BTreeMap::new();
        infra_outputs.insert("endpoint".to_string(), "https://web.internal".to_string());

        Self {
            cluster: FakeCluster::new(journal.clone()).with_deployment("web-blue"),
            health: FakeHealth::default(),
            tests: FakeTests {
                journal: journal.clone(),
                ..FakeTests::default()
            },
            approval: FakeApproval {
                script: Arc::new(Mutex::new(ApprovalScript::Approve)),
                requests: Arc::default(),
            },
            notifier: FakeNotifier::default(),
            tickets: FakeTickets::default(),
            versions: FakeVersions::default(),
            rollback: FakeRollback::default(),
            archiver: FakeArchiver::default(),
            scanners,
            infra_outputs,
            journal,
        }
    }

    pub fn set_approval(&self, script: ApprovalScript) {
        *self.approval.script.lock() = script;
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            builder: Arc::new(FakeBuilder(self.journal.clone())),
            scanners: self.scanners.clone(),
            registry: Arc::new(FakeRegistry(self.journal.clone())),
            cluster: Arc::new(self.cluster.clone()),
            health: Arc::new(self.health.clone()),
            infra: Arc::new(FakeInfra {
                journal: self.journal.clone(),
                outputs: self.infra_outputs.clone(),
            }),
            tests: Arc::new(self.tests.clone()),
            approval: Arc::new(self.approval.clone()),
            notifier: Arc::new(self.notifier.clone()),
            tickets: Arc::new(self.tickets.clone()),
            versions: Arc::new(self.versions.clone()),
            rollback: Arc::new(self.rollback.clone()),
            archiver: Arc::new(self.archiver.clone()),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Stage and hook doubles
// ---------------------------------------------------------------------------

use stagehand::diagnostics::Diagnostics;
use stagehand::pipeline::{HookError, PipelineHook, PipelineOutcome, StageAction, StageError, StageHook, StageResult};
use stagehand::context::Outputs;

/// Records its start, optionally sleeps, then emits its bindings or fails.
pub struct Step {
    pub label: String,
    pub journal: Journal,
    pub delay: Duration,
    pub emits: Vec<(String, String)>,
    pub error: Option<StageError>,
}

impl Step {
    pub fn new(label: &str, journal: &Journal) -> Self {
        Self {
            label: label.to_string(),
            journal: journal.clone(),
            delay: Duration::ZERO,
            emits: Vec::new(),
            error: None,
        }
    }

    pub fn emits(mut self, key: &str, value: &str) -> Self {
        self.emits.push((key.to_string(), value.to_string()));
        self
    }

    pub fn fails(mut self, detail: &str) -> Self {
        self.error = Some(StageError::threshold(self.label.clone(), detail));
        self
    }

    pub fn sleeps(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl StageAction for Step {
    async fn run(&self, _ctx: &RunContext, _diag: &Diagnostics) -> Result<Outputs, StageError> {
        self.journal.record(format!("start {}", self.label));
        tokio::time::sleep(self.delay).await;
        self.journal.record(format!("end {}", self.label));
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let mut outputs = Outputs::new();
        for (k, v) in &self.emits {
            outputs.insert(k.as_str(), v.as_str())?;
        }
        Ok(outputs)
    }
}

/// Stage hook that journals `hook <label> <stage> <status>`, optionally failing.
pub struct Mark {
    pub label: &'static str,
    pub journal: Journal,
    pub fail: bool,
}

impl Mark {
    pub fn new(label: &'static str, journal: &Journal) -> Self {
        Self {
            label,
            journal: journal.clone(),
            fail: false,
        }
    }

    pub fn failing(label: &'static str, journal: &Journal) -> Self {
        Self {
            fail: true,
            ..Self::new(label, journal)
        }
    }
}

#[async_trait]
impl StageHook for Mark {
    async fn on_stage(&self, result: &StageResult, _ctx: &RunContext) -> Result<(), HookError> {
        self.journal.record(format!(
            "hook {} {} {}",
            self.label,
            result.name,
            result.status().as_str()
        ));
        if self.fail {
            return Err(HookError(format!("{} hook exploded", self.label)));
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineHook for Mark {
    async fn on_pipeline(&self, outcome: &PipelineOutcome, _ctx: &RunContext) -> Result<(), HookError> {
        self.journal
            .record(format!("pipeline {} {}", self.label, outcome.status().as_str()));
        if self.fail {
            return Err(HookError(format!("{} hook exploded", self.label)));
        }
        Ok(())
    }
}
