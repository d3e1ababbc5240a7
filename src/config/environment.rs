// ABOUTME: Per-environment deployment settings.
// ABOUTME: Raw YAML shape plus the resolved form consumed by a run.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::EnvValue;
use crate::types::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default = "default_replicas")]
    pub replicas: u32,

    #[serde(default)]
    pub infra: BTreeMap<String, EnvValue>,

    #[serde(default)]
    pub features: BTreeMap<String, bool>,

    #[serde(default, with = "humantime_serde")]
    pub stage_timeout: Option<Duration>,
}

impl EnvironmentConfig {
    pub fn with_replicas(replicas: u32) -> Self {
        Self {
            namespace: None,
            replicas,
            infra: BTreeMap::new(),
            features: BTreeMap::new(),
            stage_timeout: None,
        }
    }
}

fn default_replicas() -> u32 {
    1
}

/// Settings for one environment after defaults and interpolation.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentSettings {
    pub environment: Environment,
    pub namespace: String,
    pub replicas: u32,
    pub infra: BTreeMap<String, String>,
    pub features: BTreeMap<String, bool>,
    pub stage_timeout: Duration,
}
