// ABOUTME: Notification and ticketing traits.
// ABOUTME: Severity-tagged messages and durable follow-up tickets.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::PortError;
use crate::types::TicketId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
    /// Wake someone up: traffic is on a revision whose rollout did not finish.
    Page,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Page => "page",
        };
        f.write_str(s)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel: &str, severity: Severity, message: &str) -> Result<(), PortError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketRequest {
    pub title: String,
    pub fields: BTreeMap<String, String>,
}

#[async_trait]
pub trait Ticketing: Send + Sync {
    async fn create_ticket(&self, request: &TicketRequest) -> Result<TicketId, PortError>;
}
