// ABOUTME: Configuration types and parsing for stagehand.yml.
// ABOUTME: Handles YAML parsing, policy defaults, and per-environment resolution.

mod deserialize;
mod env_value;
mod environment;
mod init;
mod policy;

pub use env_value::{EnvValue, resolve_env_map};
pub use environment::{EnvironmentConfig, EnvironmentSettings};
pub use init::init_config;
pub use policy::Policy;

use crate::error::{Error, Result};
use crate::types::{AppName, Environment};
use deserialize::{deserialize_app_name, deserialize_scanners};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "stagehand.yml";
pub const CONFIG_FILENAME_ALT: &str = "stagehand.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".stagehand/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_app_name")]
    pub app: AppName,

    pub source: String,

    pub manifest: String,

    #[serde(default = "default_scanners", deserialize_with = "deserialize_scanners")]
    pub scanners: NonEmpty<String>,

    #[serde(default)]
    pub tests: TestSuites,

    #[serde(default)]
    pub notifications: NotificationChannels,

    #[serde(default)]
    pub policy: Policy,

    #[serde(default)]
    pub environments: BTreeMap<Environment, EnvironmentConfig>,
}

/// Suite names handed to the test runner.
#[derive(Debug, Clone, Deserialize)]
pub struct TestSuites {
    #[serde(default = "default_unit_suite")]
    pub unit: String,
    #[serde(default = "default_integration_suite")]
    pub integration: String,
    #[serde(default = "default_smoke_suite")]
    pub smoke: String,
}

impl Default for TestSuites {
    fn default() -> Self {
        Self {
            unit: default_unit_suite(),
            integration: default_integration_suite(),
            smoke: default_smoke_suite(),
        }
    }
}

fn default_unit_suite() -> String {
    "unit".to_string()
}

fn default_integration_suite() -> String {
    "integration".to_string()
}

fn default_smoke_suite() -> String {
    "smoke".to_string()
}

/// Notification channel per severity.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationChannels {
    #[serde(default = "default_deploy_channel")]
    pub success: String,
    #[serde(default = "default_deploy_channel")]
    pub failure: String,
    #[serde(default = "default_page_channel")]
    pub page: String,
}

impl Default for NotificationChannels {
    fn default() -> Self {
        Self {
            success: default_deploy_channel(),
            failure: default_deploy_channel(),
            page: default_page_channel(),
        }
    }
}

fn default_deploy_channel() -> String {
    "#deployments".to_string()
}

fn default_page_channel() -> String {
    "#oncall".to_string()
}

fn default_scanners() -> NonEmpty<String> {
    NonEmpty::new("default".to_string())
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        for (env, settings) in &self.environments {
            if settings.replicas == 0 {
                return Err(Error::InvalidConfig(format!(
                    "environment {env}: replicas must be at least 1"
                )));
            }
        }
        if let Some(dup) = first_duplicate(self.scanners.iter()) {
            return Err(Error::InvalidConfig(format!("scanner listed twice: {dup}")));
        }
        Ok(())
    }

    /// Resolve the settings for one environment, applying defaults and
    /// interpolating infrastructure variables from the process environment.
    pub fn for_environment(&self, env: Environment) -> Result<EnvironmentSettings> {
        let entry = self
            .environments
            .get(&env)
            .ok_or(Error::UnknownEnvironment(env))?;

        Ok(EnvironmentSettings {
            environment: env,
            namespace: entry
                .namespace
                .clone()
                .unwrap_or_else(|| format!("{}-{}", self.app, env)),
            replicas: entry.replicas,
            infra: resolve_env_map(&entry.infra)?,
            features: entry.features.clone(),
            stage_timeout: entry.stage_timeout.unwrap_or(self.policy.stage_timeout),
        })
    }

    pub fn template(app: AppName) -> Self {
        let environments = Environment::ALL
            .into_iter()
            .map(|env| {
                let replicas = if env.is_prod() { 3 } else { 1 };
                (env, EnvironmentConfig::with_replicas(replicas))
            })
            .collect();

        Config {
            source: format!("git@example.com:org/{app}.git"),
            manifest: format!("deploy/{app}"),
            app,
            scanners: default_scanners(),
            tests: TestSuites::default(),
            notifications: NotificationChannels::default(),
            policy: Policy::default(),
            environments,
        }
    }
}

fn first_duplicate<'a>(names: impl Iterator<Item = &'a String>) -> Option<&'a String> {
    let mut seen = std::collections::BTreeSet::new();
    names.into_iter().find(|name| !seen.insert(name.as_str()))
}
