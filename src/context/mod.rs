// ABOUTME: Per-run context owned by the stage executor for one pipeline run.
// ABOUTME: Immutable request fields plus an append-only output store.

mod outputs;
mod request;

pub use outputs::{OutputError, Outputs};
pub use request::{DeployRequest, parse_feature_flag};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::EnvironmentSettings;
use crate::types::{AppName, Environment, VersionToken};

/// Everything a stage may read about the current run.
///
/// Only the executor can write outputs, and only between stages, so a stage
/// body always sees a stable view.
#[derive(Debug, Clone)]
pub struct RunContext {
    app: AppName,
    settings: EnvironmentSettings,
    requested_version: Option<VersionToken>,
    run_tests: bool,
    feature_flags: BTreeMap<String, bool>,
    release_notes: String,
    build_version: VersionToken,
    started_at: DateTime<Utc>,
    outputs: Outputs,
}

impl RunContext {
    pub fn app(&self) -> &AppName {
        &self.app
    }

    pub fn environment(&self) -> Environment {
        self.settings.environment
    }

    pub fn settings(&self) -> &EnvironmentSettings {
        &self.settings
    }

    pub fn namespace(&self) -> &str {
        &self.settings.namespace
    }

    pub fn replicas(&self) -> u32 {
        self.settings.replicas
    }

    pub fn stage_timeout(&self) -> Duration {
        self.settings.stage_timeout
    }

    /// Explicitly requested version; `None` means build and ship the latest.
    pub fn requested_version(&self) -> Option<&VersionToken> {
        self.requested_version.as_ref()
    }

    pub fn run_tests(&self) -> bool {
        self.run_tests
    }

    pub fn feature_flags(&self) -> &BTreeMap<String, bool> {
        &self.feature_flags
    }

    pub fn feature(&self, name: &str) -> bool {
        self.feature_flags.get(name).copied().unwrap_or(false)
    }

    pub fn release_notes(&self) -> &str {
        &self.release_notes
    }

    pub fn build_version(&self) -> &VersionToken {
        &self.build_version
    }

    /// The version this run ships: the requested one, or the fresh build.
    pub fn deploy_version(&self) -> &VersionToken {
        self.requested_version.as_ref().unwrap_or(&self.build_version)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs.get(key)
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut Outputs {
        &mut self.outputs
    }
}
