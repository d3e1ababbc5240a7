// ABOUTME: Deployment request and its resolution into a run context.
// ABOUTME: Applies environment settings, feature flag overlays, and assigns the build version.

use chrono::Utc;
use std::collections::BTreeMap;

use super::{Outputs, RunContext};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Environment, VersionToken};

/// What an operator asked for when triggering a run.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub environment: Environment,
    /// Explicit version to ship; blank or `latest` means build a fresh one.
    pub version: Option<String>,
    pub run_tests: bool,
    pub features: BTreeMap<String, bool>,
    pub release_notes: String,
    /// Source revision the build version is derived from.
    pub revision: String,
    pub build_number: u64,
}

impl DeployRequest {
    pub fn new(environment: Environment, revision: impl Into<String>, build_number: u64) -> Self {
        Self {
            environment,
            version: None,
            run_tests: false,
            features: BTreeMap::new(),
            release_notes: String::new(),
            revision: revision.into(),
            build_number,
        }
    }

    /// Resolve against the environment's configuration.
    ///
    /// The build version is derived here, before any stage exists, so every
    /// stage observes the same token.
    pub fn resolve(self, config: &Config) -> Result<RunContext> {
        let settings = config.for_environment(self.environment)?;

        let requested_version = match self.version.as_deref().map(str::trim) {
            None | Some("") | Some("latest") => None,
            Some(v) => Some(VersionToken::parse(v)?),
        };

        let mut feature_flags = settings.features.clone();
        for (name, enabled) in self.features {
            if name.trim().is_empty() {
                return Err(Error::InvalidRequest("feature flag name cannot be blank".to_string()));
            }
            feature_flags.insert(name, enabled);
        }

        let build_version = VersionToken::derive(&self.revision, self.build_number)?;

        tracing::debug!(
            environment = %self.environment,
            build_version = %build_version,
            requested = ?requested_version,
            "resolved deployment request"
        );

        Ok(RunContext {
            app: config.app.clone(),
            settings,
            requested_version,
            run_tests: self.run_tests,
            feature_flags,
            release_notes: self.release_notes.trim().to_string(),
            build_version,
            started_at: Utc::now(),
            outputs: Outputs::new(),
        })
    }
}

/// Parse `NAME` or `NAME=BOOL` into a feature flag entry.
pub fn parse_feature_flag(raw: &str) -> std::result::Result<(String, bool), String> {
    let (name, value) = match raw.split_once('=') {
        Some((name, value)) => {
            let enabled = match value.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "1" | "yes" => true,
                "false" | "off" | "0" | "no" => false,
                other => return Err(format!("invalid value for feature {name}: {other}")),
            };
            (name, enabled)
        }
        None => (raw, true),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("feature flag name cannot be empty".to_string());
    }
    Ok((name.to_string(), value))
}
