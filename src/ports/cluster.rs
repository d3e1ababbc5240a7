// ABOUTME: Cluster control and health signal traits used by the rollout strategies.
// ABOUTME: Manifests, rollout status, traffic splits, selectors, and validation probes.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::PortError;
use crate::types::{RevisionId, VersionToken};

/// A reference to an externally rendered manifest plus the knobs the
/// strategies turn: deployment name, image version, replica count, labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub source: String,
    pub name: String,
    pub version: VersionToken,
    pub replicas: u32,
    pub labels: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new(source: impl Into<String>, name: impl Into<String>, version: VersionToken, replicas: u32) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            version,
            replicas,
            labels: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn scaled(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    #[must_use]
    pub fn labeled(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutStatus {
    Progressing { ready: u32, desired: u32 },
    Ready,
    Failed(String),
}

/// Weighted routing between the stable deployment and an optional canary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficSplit {
    pub stable: String,
    pub canary: Option<String>,
    /// Percent of traffic sent to `canary`; zero when there is none.
    pub canary_weight: u8,
}

impl TrafficSplit {
    pub fn all_stable(stable: impl Into<String>) -> Self {
        Self {
            stable: stable.into(),
            canary: None,
            canary_weight: 0,
        }
    }

    pub fn with_canary(stable: impl Into<String>, canary: impl Into<String>, weight: u8) -> Self {
        Self {
            stable: stable.into(),
            canary: Some(canary.into()),
            canary_weight: weight,
        }
    }

    pub fn stable_weight(&self) -> u8 {
        100 - self.canary_weight
    }
}

#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Apply a manifest and return the revision the cluster assigned.
    async fn apply(&self, manifest: &Manifest, namespace: &str) -> Result<RevisionId, PortError>;

    async fn rollout_status(&self, name: &str, namespace: &str) -> Result<RolloutStatus, PortError>;

    /// Set the weighted route for `service`.
    async fn route(&self, service: &str, namespace: &str, split: &TrafficSplit) -> Result<(), PortError>;

    /// Point the stable service selector of `service` at deployment `target`.
    async fn set_selector(&self, service: &str, namespace: &str, target: &str) -> Result<(), PortError>;

    /// Delete a deployment. Deleting a missing deployment reports `NotFound`.
    async fn delete(&self, name: &str, namespace: &str) -> Result<(), PortError>;

    /// Re-label deployment `name` so it is known as `new_name`.
    async fn relabel(&self, name: &str, new_name: &str, namespace: &str) -> Result<(), PortError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthSample {
    pub error_rate: f64,
    /// Set when an external alarm is firing for the deployment.
    pub alarm: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub results: Vec<ProbeResult>,
}

impl ProbeReport {
    pub fn failures(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn passed(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[async_trait]
pub trait HealthMonitor: Send + Sync {
    /// Sample the error-rate/alarm signal for one deployment.
    async fn sample(&self, name: &str, namespace: &str) -> Result<HealthSample, PortError>;

    /// Run the validation probe suite against one deployment.
    async fn validate(&self, name: &str, namespace: &str) -> Result<ProbeReport, PortError>;
}
