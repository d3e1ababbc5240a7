// ABOUTME: Version store, rollback requester, and archiver traits.
// ABOUTME: Last-good versions per environment drive automatic rollback.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use super::PortError;
use crate::types::{AppName, Environment, VersionToken};

#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Most recent version confirmed good in `env`, if any.
    async fn last_good_version(
        &self,
        app: &AppName,
        env: Environment,
    ) -> Result<Option<VersionToken>, PortError>;

    async fn record_good_version(
        &self,
        app: &AppName,
        env: Environment,
        version: &VersionToken,
    ) -> Result<(), PortError>;
}

#[async_trait]
pub trait RollbackRequester: Send + Sync {
    async fn request_rollback(
        &self,
        app: &AppName,
        env: Environment,
        version: &VersionToken,
    ) -> Result<(), PortError>;
}

/// Result artifacts of one run, handed to the archiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveRequest {
    pub app: String,
    pub environment: Environment,
    pub version: String,
    pub status: String,
    pub outputs: BTreeMap<String, String>,
    pub stages: Vec<String>,
}

#[async_trait]
pub trait Archiver: Send + Sync {
    async fn archive(&self, request: &ArchiveRequest) -> Result<(), PortError>;
}
