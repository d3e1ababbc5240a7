// ABOUTME: Test-suite stage action shared by unit, integration, and smoke stages.
// ABOUTME: Any failed test case fails the stage.

use async_trait::async_trait;
use std::sync::Arc;

use crate::context::{Outputs, RunContext};
use crate::diagnostics::Diagnostics;
use crate::pipeline::{StageAction, StageError};
use crate::ports::{TestRunner, TestTarget};

pub struct RunSuite {
    pub runner: Arc<dyn TestRunner>,
    pub suite: String,
    /// Output key written with the pass/fail summary.
    pub output: String,
    /// Output key holding the endpoint to test against, if any.
    pub endpoint_key: Option<&'static str>,
}

#[async_trait]
impl StageAction for RunSuite {
    async fn run(&self, ctx: &RunContext, _diag: &Diagnostics) -> Result<Outputs, StageError> {
        let target = TestTarget {
            version: ctx.deploy_version().clone(),
            endpoint: self.endpoint_key.and_then(|key| ctx.output(key)).map(str::to_string),
        };
        let report = self.runner.run_suite(&self.suite, &target).await?;
        tracing::info!(
            suite = %self.suite,
            passed = report.passed,
            failed = report.failed,
            endpoint = ?target.endpoint,
            "test suite finished"
        );

        if !report.is_success() {
            let mut detail = format!("{} of {} failed", report.failed, report.passed + report.failed);
            if !report.failures.is_empty() {
                detail.push_str(": ");
                detail.push_str(&report.failures.join(", "));
            }
            return Err(StageError::threshold(format!("suite {}", self.suite), detail));
        }
        Ok(Outputs::new().with(&self.output, format!("{} passed", report.passed))?)
    }
}
