// ABOUTME: Narrow capability traits for every external collaborator.
// ABOUTME: Artifact build/scan/publish, cluster control, infra, tests, approvals, notifications, versions.

mod approval;
mod artifact;
mod cluster;
mod error;
mod infra;
mod notify;
mod testing;
mod versions;

pub use approval::{ApprovalDecision, ApprovalGate, ApprovalRequest};
pub use artifact::{ArtifactBuilder, Finding, FindingSeverity, Registry, Scanner, SourceRef};
pub use cluster::{
    ClusterOps, HealthMonitor, HealthSample, Manifest, ProbeReport, ProbeResult, RolloutStatus,
    TrafficSplit,
};
pub use error::PortError;
pub use infra::InfraProvisioner;
pub use notify::{Notifier, Severity, TicketRequest, Ticketing};
pub use testing::{TestReport, TestRunner, TestTarget};
pub use versions::{ArchiveRequest, Archiver, RollbackRequester, VersionStore};

use std::sync::Arc;

/// The full set of collaborators one pipeline run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub builder: Arc<dyn ArtifactBuilder>,
    pub scanners: Vec<Arc<dyn Scanner>>,
    pub registry: Arc<dyn Registry>,
    pub cluster: Arc<dyn ClusterOps>,
    pub health: Arc<dyn HealthMonitor>,
    pub infra: Arc<dyn InfraProvisioner>,
    pub tests: Arc<dyn TestRunner>,
    pub approval: Arc<dyn ApprovalGate>,
    pub notifier: Arc<dyn Notifier>,
    pub tickets: Arc<dyn Ticketing>,
    pub versions: Arc<dyn VersionStore>,
    pub rollback: Arc<dyn RollbackRequester>,
    pub archiver: Arc<dyn Archiver>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field(
                "scanners",
                &self.scanners.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
