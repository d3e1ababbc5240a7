// ABOUTME: Artifact builder, scanner, and registry traits.
// ABOUTME: Findings carry a severity; HIGH and CRITICAL block a run.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::PortError;
use crate::types::{ArtifactId, VersionToken};

/// What the builder should compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub location: String,
    pub version: VersionToken,
}

#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    async fn build(&self, source: &SourceRef) -> Result<ArtifactId, PortError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FindingSeverity {
    /// Whether a finding of this severity fails the scan stage.
    pub fn is_blocking(&self) -> bool {
        *self >= FindingSeverity::High
    }
}

impl fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FindingSeverity::Low => "LOW",
            FindingSeverity::Medium => "MEDIUM",
            FindingSeverity::High => "HIGH",
            FindingSeverity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

impl FromStr for FindingSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" | "INFO" => Ok(FindingSeverity::Low),
            "MEDIUM" | "MODERATE" => Ok(FindingSeverity::Medium),
            "HIGH" => Ok(FindingSeverity::High),
            "CRITICAL" => Ok(FindingSeverity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub id: String,
    pub severity: FindingSeverity,
    pub summary: String,
}

#[async_trait]
pub trait Scanner: Send + Sync {
    /// Stable scanner name, used in stage names and output keys.
    fn name(&self) -> &str;

    async fn scan(&self, artifact: &ArtifactId) -> Result<Vec<Finding>, PortError>;
}

#[async_trait]
pub trait Registry: Send + Sync {
    async fn push(&self, artifact: &ArtifactId, tag: &VersionToken) -> Result<(), PortError>;

    async fn sign(&self, tag: &VersionToken) -> Result<(), PortError>;
}
