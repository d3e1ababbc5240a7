// ABOUTME: Walks a pipeline's stages in order, evaluating guards and joining parallel groups.
// ABOUTME: Fail-fast on the outer sequence; hooks always run for every stage that was reached.

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, join_all};
use std::time::Duration;
use tokio::time::Instant;

use super::error::StageError;
use super::result::{PipelineOutcome, SkipReason, StageOutcome, StageResult, StageStatus};
use super::stage::{HookOutcome, Pipeline, StageBody, StageSpec};
use crate::context::{Outputs, RunContext};
use crate::diagnostics::{Diagnostics, Warning};

/// Execute `pipeline` against `ctx`.
///
/// The run owns `ctx` exclusively; outputs of each successful stage are
/// published before the next stage starts. Members of a parallel group only
/// see outputs from stages before the group.
pub async fn execute(pipeline: &Pipeline, ctx: &mut RunContext) -> PipelineOutcome {
    let started_at = Utc::now();
    let diag = Diagnostics::default();
    let mut results = Vec::with_capacity(pipeline.stages.len());
    let mut failed: Option<String> = None;

    tracing::info!(
        app = %ctx.app(),
        environment = %ctx.environment(),
        version = %ctx.deploy_version(),
        stages = pipeline.stages.len(),
        "pipeline started"
    );

    for stage in &pipeline.stages {
        if let Some(failed_stage) = &failed {
            tracing::info!(stage = %stage.name, after = %failed_stage, "stage not started after earlier failure");
            results.push(StageResult::skipped(
                &stage.name,
                SkipReason::PriorFailure {
                    stage: failed_stage.clone(),
                },
            ));
            continue;
        }

        let mut result = run_stage(stage, ctx, None, &diag).await;

        if result.status() == StageStatus::Success
            && let Err(err) = ctx.outputs_mut().merge(&result.outputs)
        {
            tracing::error!(stage = %stage.name, error = %err, "stage outputs could not be published");
            result.outcome = StageOutcome::Failure(err.into());
        }

        if result.is_failure() {
            failed = Some(stage.name.clone());
        }
        results.push(result);
    }

    let mut outcome = PipelineOutcome {
        results,
        warnings: Vec::new(),
        started_at,
        finished_at: Utc::now(),
    };

    let ctx: &RunContext = ctx;
    let primary = if outcome.is_success() {
        HookOutcome::Success
    } else {
        HookOutcome::Failure
    };
    for outcome_key in [primary, HookOutcome::Always] {
        for hook in pipeline.hooks.get(outcome_key) {
            if let Err(err) = hook.on_pipeline(&outcome, ctx).await {
                diag.warn(Warning::hook_failed(format!(
                    "pipeline {outcome_key:?} hook failed: {err}"
                )));
            }
        }
    }

    tracing::info!(status = ?outcome.status(), "pipeline finished");

    outcome.warnings = diag.into_warnings();
    outcome.finished_at = Utc::now();
    outcome
}

fn run_stage<'a>(
    stage: &'a StageSpec,
    ctx: &'a RunContext,
    inherited_timeout: Option<Duration>,
    diag: &'a Diagnostics,
) -> BoxFuture<'a, StageResult> {
    async move {
        if !stage.guard_allows(ctx) {
            tracing::info!(stage = %stage.name, "guard false, stage skipped");
            let result = StageResult::skipped(&stage.name, SkipReason::GuardFalse);
            run_hooks(stage, HookOutcome::Always, &result, ctx, diag).await;
            return result;
        }

        tracing::info!(stage = %stage.name, "stage started");
        let started = Instant::now();
        let timeout = stage.timeout.or(inherited_timeout);

        let (outcome, outputs, members) = match &stage.body {
            StageBody::Action(action) => {
                let limit = timeout.unwrap_or_else(|| ctx.stage_timeout());
                let (outcome, outputs) = match tokio::time::timeout(limit, action.run(ctx, diag)).await {
                    Err(_elapsed) => (
                        StageOutcome::Failure(StageError::Timeout { after: limit }),
                        Outputs::new(),
                    ),
                    Ok(Err(err)) => (StageOutcome::Failure(err), Outputs::new()),
                    Ok(Ok(outputs)) => match check_outputs(stage, &outputs, ctx) {
                        Ok(()) => (StageOutcome::Success, outputs),
                        Err(err) => (StageOutcome::Failure(err), Outputs::new()),
                    },
                };
                (outcome, outputs, Vec::new())
            }
            StageBody::Parallel(members) => {
                // Run to completion: a failing member never cancels its siblings.
                let results =
                    join_all(members.iter().map(|member| run_stage(member, ctx, timeout, diag))).await;

                let failed: Vec<String> = results
                    .iter()
                    .filter(|r| r.is_failure())
                    .map(|r| r.name.clone())
                    .collect();

                let mut outputs = Outputs::new();
                let mut merge_error = None;
                for result in &results {
                    if let Err(err) = outputs.merge(&result.outputs) {
                        merge_error.get_or_insert(err);
                    }
                }

                let outcome = if !failed.is_empty() {
                    StageOutcome::Failure(StageError::ParallelFailed { failed })
                } else if let Some(err) = merge_error {
                    StageOutcome::Failure(err.into())
                } else {
                    StageOutcome::Success
                };
                (outcome, outputs, results)
            }
        };

        let result = StageResult {
            name: stage.name.clone(),
            outcome,
            outputs,
            members,
            duration: started.elapsed(),
        };

        match result.error() {
            Some(err) => tracing::warn!(stage = %stage.name, error = %err, "stage failed"),
            None => tracing::info!(stage = %stage.name, elapsed = ?result.duration, "stage succeeded"),
        }

        let primary = if result.is_failure() {
            HookOutcome::Failure
        } else {
            HookOutcome::Success
        };
        run_hooks(stage, primary, &result, ctx, diag).await;
        run_hooks(stage, HookOutcome::Always, &result, ctx, diag).await;

        result
    }
    .boxed()
}

async fn run_hooks(
    stage: &StageSpec,
    outcome: HookOutcome,
    result: &StageResult,
    ctx: &RunContext,
    diag: &Diagnostics,
) {
    for hook in stage.hooks.get(outcome) {
        if let Err(err) = hook.on_stage(result, ctx).await {
            diag.warn(Warning::hook_failed(format!(
                "{outcome:?} hook for stage {} failed: {err}",
                stage.name
            )));
        }
    }
}

/// Every written key must be declared and must not already exist.
fn check_outputs(stage: &StageSpec, outputs: &Outputs, ctx: &RunContext) -> Result<(), StageError> {
    for key in outputs.keys() {
        if !stage.writes.iter().any(|declared| declared.covers(key)) {
            return Err(StageError::UndeclaredOutput(key.to_string()));
        }
        if ctx.output(key).is_some() {
            return Err(crate::context::OutputError::Duplicate(key.to_string()).into());
        }
    }
    Ok(())
}
