// ABOUTME: Binds every collaborator trait to executable scripts in .stagehand/adapters.
// ABOUTME: Arguments go in as STAGEHAND_* environment variables; results come back on stdout.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use super::parse;
use crate::ports::{
    ApprovalDecision, ApprovalGate, ApprovalRequest, ArchiveRequest, Archiver, ArtifactBuilder,
    ClusterOps, Collaborators, Finding, HealthMonitor, HealthSample, InfraProvisioner, Manifest,
    Notifier, PortError, ProbeReport, Registry, RollbackRequester, RolloutStatus, Scanner, Severity,
    SourceRef, TestReport, TestRunner, TestTarget, TicketRequest, Ticketing, TrafficSplit, VersionStore,
};
use crate::types::{AppName, ArtifactId, Environment, RevisionId, TicketId, VersionToken};

/// Printed by the `delete` script when the deployment does not exist.
const NOT_FOUND: &str = "not-found";

type Vars = Vec<(String, String)>;

fn var(name: &str, value: impl Into<String>) -> (String, String) {
    (format!("STAGEHAND_{name}"), value.into())
}

/// `infra_region` becomes `STAGEHAND_<PREFIX>_INFRA_REGION`.
fn prefixed_vars(prefix: &str, map: &BTreeMap<String, String>) -> Vars {
    map.iter()
        .map(|(k, v)| {
            let key: String = k
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect();
            var(&format!("{prefix}_{key}"), v.clone())
        })
        .collect()
}

/// Runs adapter scripts from a project directory.
#[derive(Debug, Clone)]
pub struct ScriptAdapter {
    adapters_dir: PathBuf,
    base: Vars,
}

impl ScriptAdapter {
    pub fn new(project_dir: &Path, app: &AppName, environment: Environment) -> Self {
        Self {
            adapters_dir: project_dir.join(".stagehand").join("adapters"),
            base: vec![var("APP", app.as_str()), var("ENVIRONMENT", environment.as_str())],
        }
    }

    pub fn script_path(&self, op: &str) -> PathBuf {
        self.adapters_dir.join(op)
    }

    pub fn is_configured(&self, op: &str) -> bool {
        self.script_path(op).is_file()
    }

    /// Run the script for `op` and return its stdout.
    ///
    /// Dropping the returned future stops waiting but leaves the script
    /// running, so a timed-out `apply` still finishes what it started.
    pub async fn invoke(&self, op: &str, vars: Vars) -> Result<String, PortError> {
        let path = self.script_path(op);
        if !path.is_file() {
            return Err(PortError::NotConfigured(format!("adapter script {}", path.display())));
        }

        tracing::debug!(op = %op, script = %path.display(), "running adapter");
        let output = Command::new(&path)
            .envs(self.base.iter().cloned().chain(vars))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PortError::failed(op, format!("could not start {}: {e}", path.display())))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match stderr.trim() {
            "" => format!("exited with {:?}", output.status.code()),
            detail => detail.to_string(),
        };
        tracing::debug!(op = %op, code = ?output.status.code(), "adapter failed");
        Err(PortError::failed(op, message))
    }

    /// Bind every collaborator to this adapter, with one scanner per name.
    pub fn collaborators<'a>(self, scanners: impl IntoIterator<Item = &'a String>) -> Collaborators {
        let adapter = Arc::new(self);
        let scanners = scanners
            .into_iter()
            .map(|name| {
                let scanner: Arc<dyn Scanner> = Arc::new(ScriptScanner {
                    adapter: adapter.clone(),
                    name: name.clone(),
                });
                scanner
            })
            .collect();

        Collaborators {
            builder: adapter.clone(),
            scanners,
            registry: adapter.clone(),
            cluster: adapter.clone(),
            health: adapter.clone(),
            infra: adapter.clone(),
            tests: adapter.clone(),
            approval: adapter.clone(),
            notifier: adapter.clone(),
            tickets: adapter.clone(),
            versions: adapter.clone(),
            rollback: adapter.clone(),
            archiver: adapter,
        }
    }
}

/// One named scanner, run as `scan-<name>`.
#[derive(Debug)]
pub struct ScriptScanner {
    adapter: Arc<ScriptAdapter>,
    name: String,
}

#[async_trait]
impl Scanner for ScriptScanner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self, artifact: &ArtifactId) -> Result<Vec<Finding>, PortError> {
        let op = format!("scan-{}", self.name);
        let stdout = self.adapter.invoke(&op, vec![var("ARTIFACT", artifact.as_str())]).await?;
        parse::findings(&op, &stdout)
    }
}

#[async_trait]
impl ArtifactBuilder for ScriptAdapter {
    async fn build(&self, source: &SourceRef) -> Result<ArtifactId, PortError> {
        let vars = vec![var("SOURCE", source.location.as_str()), var("VERSION", source.version.as_str())];
        let stdout = self.invoke("build", vars).await?;
        parse::single_line("build", &stdout).map(ArtifactId::new)
    }
}

#[async_trait]
impl Registry for ScriptAdapter {
    async fn push(&self, artifact: &ArtifactId, tag: &VersionToken) -> Result<(), PortError> {
        let vars = vec![var("ARTIFACT", artifact.as_str()), var("TAG", tag.as_str())];
        self.invoke("push", vars).await.map(drop)
    }

    async fn sign(&self, tag: &VersionToken) -> Result<(), PortError> {
        self.invoke("sign", vec![var("TAG", tag.as_str())]).await.map(drop)
    }
}

#[async_trait]
impl ClusterOps for ScriptAdapter {
    async fn apply(&self, manifest: &Manifest, namespace: &str) -> Result<RevisionId, PortError> {
        let labels: Vec<String> = manifest.labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let vars = vec![
            var("MANIFEST", manifest.source.as_str()),
            var("NAME", manifest.name.as_str()),
            var("VERSION", manifest.version.as_str()),
            var("REPLICAS", manifest.replicas.to_string()),
            var("LABELS", labels.join(",")),
            var("NAMESPACE", namespace),
        ];
        let stdout = self.invoke("apply", vars).await?;
        parse::single_line("apply", &stdout).map(RevisionId::new)
    }

    async fn rollout_status(&self, name: &str, namespace: &str) -> Result<RolloutStatus, PortError> {
        let vars = vec![var("NAME", name), var("NAMESPACE", namespace)];
        let stdout = self.invoke("rollout-status", vars).await?;
        parse::rollout_status("rollout-status", &stdout)
    }

    async fn route(&self, service: &str, namespace: &str, split: &TrafficSplit) -> Result<(), PortError> {
        let vars = vec![
            var("SERVICE", service),
            var("NAMESPACE", namespace),
            var("STABLE", split.stable.as_str()),
            var("CANARY", split.canary.clone().unwrap_or_default()),
            var("CANARY_WEIGHT", split.canary_weight.to_string()),
        ];
        self.invoke("route", vars).await.map(drop)
    }

    async fn set_selector(&self, service: &str, namespace: &str, target: &str) -> Result<(), PortError> {
        let vars = vec![var("SERVICE", service), var("NAMESPACE", namespace), var("TARGET", target)];
        self.invoke("select", vars).await.map(drop)
    }

    async fn delete(&self, name: &str, namespace: &str) -> Result<(), PortError> {
        let vars = vec![var("NAME", name), var("NAMESPACE", namespace)];
        let stdout = self.invoke("delete", vars).await?;
        match parse::optional_line(&stdout) {
            Some(line) if line == NOT_FOUND => Err(PortError::NotFound(name.to_string())),
            _ => Ok(()),
        }
    }

    async fn relabel(&self, name: &str, new_name: &str, namespace: &str) -> Result<(), PortError> {
        let vars = vec![var("NAME", name), var("NEW_NAME", new_name), var("NAMESPACE", namespace)];
        self.invoke("relabel", vars).await.map(drop)
    }
}

#[async_trait]
impl HealthMonitor for ScriptAdapter {
    async fn sample(&self, name: &str, namespace: &str) -> Result<HealthSample, PortError> {
        let vars = vec![var("NAME", name), var("NAMESPACE", namespace)];
        let stdout = self.invoke("health", vars).await?;
        let values = parse::key_values("health", &stdout)?;
        let error_rate = match values.get("error_rate") {
            Some(raw) => raw
                .parse()
                .map_err(|_| PortError::protocol("health", format!("bad error_rate '{raw}'")))?,
            None => 0.0,
        };
        Ok(HealthSample {
            error_rate,
            alarm: values.get("alarm").filter(|a| !a.is_empty()).cloned(),
        })
    }

    async fn validate(&self, name: &str, namespace: &str) -> Result<ProbeReport, PortError> {
        let vars = vec![var("NAME", name), var("NAMESPACE", namespace)];
        let stdout = self.invoke("validate", vars).await?;
        Ok(ProbeReport {
            results: parse::results("validate", &stdout)?,
        })
    }
}

#[async_trait]
impl InfraProvisioner for ScriptAdapter {
    async fn plan(&self, vars: &BTreeMap<String, String>) -> Result<String, PortError> {
        self.invoke("infra-plan", prefixed_vars("VAR", vars)).await
    }

    async fn apply(&self, vars: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, PortError> {
        let stdout = self.invoke("infra-apply", prefixed_vars("VAR", vars)).await?;
        parse::key_values("infra-apply", &stdout)
    }
}

#[async_trait]
impl TestRunner for ScriptAdapter {
    async fn run_suite(&self, suite: &str, target: &TestTarget) -> Result<TestReport, PortError> {
        let op = format!("test-{suite}");
        let vars = vec![
            var("VERSION", target.version.as_str()),
            var("ENDPOINT", target.endpoint.clone().unwrap_or_default()),
        ];
        let stdout = self.invoke(&op, vars).await?;
        let results = parse::results(&op, &stdout)?;

        let failures: Vec<String> = results.iter().filter(|r| !r.passed).map(|r| r.name.clone()).collect();
        Ok(TestReport {
            suite: suite.to_string(),
            passed: results.iter().filter(|r| r.passed).count() as u32,
            failed: failures.len() as u32,
            failures,
        })
    }
}

#[async_trait]
impl ApprovalGate for ScriptAdapter {
    async fn request(&self, request: &ApprovalRequest) -> Result<ApprovalDecision, PortError> {
        let vars = vec![
            var("VERSION", request.version.as_str()),
            var("NOTES", request.release_notes.as_str()),
        ];
        let stdout = self.invoke("approval", vars).await?;
        parse::approval("approval", &stdout)
    }
}

#[async_trait]
impl Notifier for ScriptAdapter {
    async fn notify(&self, channel: &str, severity: Severity, message: &str) -> Result<(), PortError> {
        let vars = vec![
            var("CHANNEL", channel),
            var("SEVERITY", severity.to_string()),
            var("MESSAGE", message),
        ];
        self.invoke("notify", vars).await.map(drop)
    }
}

#[async_trait]
impl Ticketing for ScriptAdapter {
    async fn create_ticket(&self, request: &TicketRequest) -> Result<TicketId, PortError> {
        let mut vars = prefixed_vars("FIELD", &request.fields);
        vars.push(var("TITLE", request.title.as_str()));
        let stdout = self.invoke("ticket", vars).await?;
        parse::single_line("ticket", &stdout).map(TicketId::new)
    }
}

#[async_trait]
impl VersionStore for ScriptAdapter {
    async fn last_good_version(&self, app: &AppName, env: Environment) -> Result<Option<VersionToken>, PortError> {
        let vars = vec![var("APP", app.as_str()), var("ENVIRONMENT", env.as_str())];
        let stdout = self.invoke("last-good-version", vars).await?;
        parse::optional_line(&stdout)
            .map(|line| VersionToken::parse(&line))
            .transpose()
            .map_err(|e| PortError::protocol("last-good-version", e.to_string()))
    }

    async fn record_good_version(
        &self,
        app: &AppName,
        env: Environment,
        version: &VersionToken,
    ) -> Result<(), PortError> {
        let vars = vec![
            var("APP", app.as_str()),
            var("ENVIRONMENT", env.as_str()),
            var("VERSION", version.as_str()),
        ];
        self.invoke("record-good-version", vars).await.map(drop)
    }
}

#[async_trait]
impl RollbackRequester for ScriptAdapter {
    async fn request_rollback(&self, app: &AppName, env: Environment, version: &VersionToken) -> Result<(), PortError> {
        let vars = vec![
            var("APP", app.as_str()),
            var("ENVIRONMENT", env.as_str()),
            var("VERSION", version.as_str()),
        ];
        self.invoke("rollback", vars).await.map(drop)
    }
}

#[async_trait]
impl Archiver for ScriptAdapter {
    async fn archive(&self, request: &ArchiveRequest) -> Result<(), PortError> {
        let json = serde_json::to_string(request).map_err(|e| PortError::protocol("archive", e.to_string()))?;
        let vars = vec![
            var("VERSION", request.version.as_str()),
            var("STATUS", request.status.as_str()),
            var("ARCHIVE", json),
        ];
        self.invoke("archive", vars).await.map(drop)
    }
}
