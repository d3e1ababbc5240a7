// ABOUTME: Hooks system for pipeline lifecycle events.
// ABOUTME: Discovers and executes shell scripts at on-success, on-failure, and always points.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::context::RunContext;
use crate::pipeline::{HookError, HookOutcome, PipelineHook, PipelineOutcome};

/// Hook execution points at the end of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// After a successful run.
    OnSuccess,
    /// After a failed run.
    OnFailure,
    /// After every run, following the success or failure hook.
    Always,
}

impl HookPoint {
    pub const ALL: [HookPoint; 3] = [HookPoint::OnSuccess, HookPoint::OnFailure, HookPoint::Always];

    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::OnSuccess => "on-success",
            HookPoint::OnFailure => "on-failure",
            HookPoint::Always => "always",
        }
    }

    pub fn outcome(&self) -> HookOutcome {
        match self {
            HookPoint::OnSuccess => HookOutcome::Success,
            HookPoint::OnFailure => HookOutcome::Failure,
            HookPoint::Always => HookOutcome::Always,
        }
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub app: String,
    pub environment: String,
    pub version: String,
    pub status: String,
    pub failed_stage: Option<String>,
}

impl HookContext {
    pub fn from_run(outcome: &PipelineOutcome, ctx: &RunContext) -> Self {
        Self {
            app: ctx.app().to_string(),
            environment: ctx.environment().to_string(),
            version: ctx.deploy_version().to_string(),
            status: outcome.status().as_str().to_string(),
            failed_stage: outcome.failed_stage().map(|stage| stage.name.clone()),
        }
    }

    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("STAGEHAND_APP".to_string(), self.app.clone());
        env.insert("STAGEHAND_ENVIRONMENT".to_string(), self.environment.clone());
        env.insert("STAGEHAND_VERSION".to_string(), self.version.clone());
        env.insert("STAGEHAND_STATUS".to_string(), self.status.clone());
        if let Some(ref stage) = self.failed_stage {
            env.insert("STAGEHAND_FAILED_STAGE".to_string(), stage.clone());
        }
        env
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs hooks from a project directory.
#[derive(Debug, Clone)]
pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    /// Create a new hook runner looking for hooks in the given project directory.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            hooks_dir: project_dir.join(".stagehand").join("hooks"),
        }
    }

    /// Check if a hook exists for the given point.
    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!("Running {} hook: {}", point.filename(), hook_path.display());

        let output = Command::new(&hook_path)
            .envs(context.to_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let result = HookResult {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if result.success {
                    tracing::info!("{} hook completed successfully", point.filename());
                } else {
                    tracing::warn!(
                        "{} hook failed with exit code {:?}",
                        point.filename(),
                        result.exit_code
                    );
                }

                Some(result)
            }
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.filename(), e);
                Some(HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        }
    }

    /// Pipeline hooks for every script present in the hooks directory.
    pub fn pipeline_hooks(&self) -> Vec<(HookOutcome, Arc<dyn PipelineHook>)> {
        HookPoint::ALL
            .into_iter()
            .filter(|point| self.hook_exists(*point))
            .map(|point| {
                let hook: Arc<dyn PipelineHook> = Arc::new(ScriptHook {
                    runner: self.clone(),
                    point,
                });
                (point.outcome(), hook)
            })
            .collect()
    }
}

/// Adapts one hook script to the pipeline's hook interface.
#[derive(Debug)]
pub struct ScriptHook {
    runner: HookRunner,
    point: HookPoint,
}

#[async_trait]
impl PipelineHook for ScriptHook {
    async fn on_pipeline(&self, outcome: &PipelineOutcome, ctx: &RunContext) -> Result<(), HookError> {
        let context = HookContext::from_run(outcome, ctx);
        match self.runner.run(self.point, &context).await {
            None => Ok(()),
            Some(result) if result.success => Ok(()),
            Some(result) => Err(HookError(format!(
                "{} hook exited with {:?}: {}",
                self.point.filename(),
                result.exit_code,
                result.stderr.trim()
            ))),
        }
    }
}
