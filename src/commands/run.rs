// ABOUTME: Run command implementation.
// ABOUTME: Takes the run lock, executes the standard pipeline, and dispatches the outcome.

use std::path::Path;
use std::time::Duration;

use crate::cli::RequestArgs;
use stagehand::adapters::ScriptAdapter;
use stagehand::config::Config;
use stagehand::dispatch::dispatch;
use stagehand::error::Result;
use stagehand::hooks::HookRunner;
use stagehand::lock::{RunLock, default_lock_dir};
use stagehand::output::Output;
use stagehand::pipeline::{execute, stages::standard_pipeline};

/// A lock survives at most one full approval wait plus this margin.
const LOCK_GRACE: Duration = Duration::from_secs(60 * 60);

pub async fn run(cwd: &Path, args: RequestArgs, force_unlock: bool, mut output: Output) -> Result<i32> {
    output.start_timer();
    let config = Config::discover(cwd)?;
    let mut ctx = args.into_request().resolve(&config)?;

    let lock = RunLock::acquire(
        &default_lock_dir()?,
        &config.app,
        config.policy.approval_timeout + LOCK_GRACE,
        force_unlock,
    )?;
    if let Some(previous) = lock.broken() {
        output.warning(&format!(
            "broke run lock held by {} (pid {}) since {}",
            previous.holder, previous.pid, previous.started_at
        ));
    }

    output.progress(&format!(
        "Running {} {} in {} ({})",
        config.app,
        ctx.deploy_version(),
        ctx.environment(),
        ctx.namespace()
    ));

    let ports = ScriptAdapter::new(cwd, &config.app, ctx.environment()).collaborators(config.scanners.iter());
    let hooks = HookRunner::new(cwd).pipeline_hooks();
    let pipeline = standard_pipeline(&config, &ports, hooks)?;

    let outcome = execute(&pipeline, &mut ctx).await;
    let report = dispatch(outcome, &ctx, &ports, &config.notifications).await;
    output.run_report(&report);

    if let Err(e) = lock.release() {
        output.warning(&format!("failed to release run lock: {e}"));
    }
    Ok(report.exit_code())
}
