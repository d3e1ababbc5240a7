// ABOUTME: Test runner trait for unit, integration, and smoke suites.
// ABOUTME: Reports pass/fail counts for one named suite.

use async_trait::async_trait;

use super::PortError;
use crate::types::VersionToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTarget {
    pub version: VersionToken,
    /// Deployed endpoint, when the suite runs against a live environment.
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    pub suite: String,
    pub passed: u32,
    pub failed: u32,
    pub failures: Vec<String>,
}

impl TestReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run_suite(&self, suite: &str, target: &TestTarget) -> Result<TestReport, PortError>;
}
