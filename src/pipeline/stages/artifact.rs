// ABOUTME: Build, scan, and publish stage actions.
// ABOUTME: Scans fail on any blocking finding; publish pushes then signs the version tag.

use async_trait::async_trait;
use std::sync::Arc;

use crate::context::{Outputs, RunContext};
use crate::diagnostics::Diagnostics;
use crate::pipeline::{StageAction, StageError};
use crate::ports::{ArtifactBuilder, Registry, Scanner, SourceRef};
use crate::types::ArtifactId;

pub const ARTIFACT_KEY: &str = "artifact";
pub const IMAGE_KEY: &str = "image";

pub fn findings_key(scanner: &str) -> String {
    format!("scan.{scanner}.findings")
}

/// The artifact this run ships: the fresh build, or the requested version.
fn current_artifact(ctx: &RunContext) -> ArtifactId {
    match ctx.output(ARTIFACT_KEY) {
        Some(artifact) => ArtifactId::new(artifact),
        None => ArtifactId::new(ctx.deploy_version().as_str()),
    }
}

pub struct BuildArtifact {
    pub builder: Arc<dyn ArtifactBuilder>,
    pub source: String,
}

#[async_trait]
impl StageAction for BuildArtifact {
    async fn run(&self, ctx: &RunContext, _diag: &Diagnostics) -> Result<Outputs, StageError> {
        let source = SourceRef {
            location: self.source.clone(),
            version: ctx.build_version().clone(),
        };
        let artifact = self.builder.build(&source).await?;
        tracing::info!(artifact = %artifact, version = %source.version, "artifact built");
        Ok(Outputs::new().with(ARTIFACT_KEY, artifact.as_str())?)
    }
}

pub struct ScanArtifact {
    pub scanner: Arc<dyn Scanner>,
}

#[async_trait]
impl StageAction for ScanArtifact {
    async fn run(&self, ctx: &RunContext, _diag: &Diagnostics) -> Result<Outputs, StageError> {
        let name = self.scanner.name();
        let artifact = current_artifact(ctx);
        let findings = self.scanner.scan(&artifact).await?;

        let blocking: Vec<String> = findings
            .iter()
            .filter(|f| f.severity.is_blocking())
            .map(|f| format!("{} ({})", f.id, f.severity))
            .collect();
        tracing::info!(scanner = %name, findings = findings.len(), blocking = blocking.len(), "scan finished");

        if !blocking.is_empty() {
            return Err(StageError::threshold(
                format!("scanner {name}"),
                format!("{} blocking finding(s): {}", blocking.len(), blocking.join(", ")),
            ));
        }
        Ok(Outputs::new().with(findings_key(name), findings.len().to_string())?)
    }
}

pub struct PublishImage {
    pub registry: Arc<dyn Registry>,
}

#[async_trait]
impl StageAction for PublishImage {
    async fn run(&self, ctx: &RunContext, _diag: &Diagnostics) -> Result<Outputs, StageError> {
        let artifact = ctx
            .output(ARTIFACT_KEY)
            .map(ArtifactId::new)
            .ok_or_else(|| StageError::MissingInput(ARTIFACT_KEY.to_string()))?;
        let tag = ctx.build_version();

        self.registry.push(&artifact, tag).await?;
        self.registry.sign(tag).await?;
        tracing::info!(artifact = %artifact, tag = %tag, "image published and signed");

        Ok(Outputs::new().with(IMAGE_KEY, format!("{}:{}", ctx.app(), tag))?)
    }
}
