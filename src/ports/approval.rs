// ABOUTME: Approval gate trait for human sign-off before production changes.
// ABOUTME: The engine bounds the wait; the gate only reports a decision.

use async_trait::async_trait;

use super::PortError;
use crate::types::{AppName, Environment, VersionToken};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub app: AppName,
    pub environment: Environment,
    pub version: VersionToken,
    pub release_notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved { by: String },
    Denied { by: String, reason: Option<String> },
}

#[async_trait]
pub trait ApprovalGate: Send + Sync {
    /// Wait for a decision. May block for a long time; callers apply a timeout.
    async fn request(&self, request: &ApprovalRequest) -> Result<ApprovalDecision, PortError>;
}
