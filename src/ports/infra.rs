// ABOUTME: Infrastructure provisioner trait.
// ABOUTME: Plans and applies variables, returning string outputs such as endpoints.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::PortError;

#[async_trait]
pub trait InfraProvisioner: Send + Sync {
    /// Produce a plan summary without changing anything.
    async fn plan(&self, vars: &BTreeMap<String, String>) -> Result<String, PortError>;

    async fn apply(&self, vars: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, PortError>;
}
