// ABOUTME: Rollback to the last known-good version of an environment.
// ABOUTME: Shared by the automatic failure path and the operator rollback command.

use crate::ports::{PortError, RollbackRequester, VersionStore};
use crate::types::{AppName, Environment, VersionToken};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RollbackError {
    /// Nothing was ever recorded as good for this environment.
    #[error("no last-good version recorded for {app} in {environment}")]
    NoLastGood { app: String, environment: Environment },

    #[error("looking up last-good version failed: {0}")]
    Lookup(#[source] PortError),

    #[error("rollback request to {version} failed: {source}")]
    Request { version: VersionToken, source: PortError },
}

/// Request a rollback of `app` in `environment`.
///
/// With no explicit `target` the version store's last-good version is used.
/// Returns the version the rollback was requested for.
pub async fn request_rollback(
    versions: &dyn VersionStore,
    requester: &dyn RollbackRequester,
    app: &AppName,
    environment: Environment,
    target: Option<VersionToken>,
) -> Result<VersionToken, RollbackError> {
    let version = match target {
        Some(version) => version,
        None => match versions.last_good_version(app, environment).await {
            Ok(Some(version)) => version,
            Ok(None) => {
                return Err(RollbackError::NoLastGood {
                    app: app.to_string(),
                    environment,
                });
            }
            Err(err) if err.is_not_found() => {
                return Err(RollbackError::NoLastGood {
                    app: app.to_string(),
                    environment,
                });
            }
            Err(err) => return Err(RollbackError::Lookup(err)),
        },
    };

    tracing::info!(app = %app, environment = %environment, version = %version, "requesting rollback");
    requester
        .request_rollback(app, environment, &version)
        .await
        .map_err(|source| RollbackError::Request {
            version: version.clone(),
            source,
        })?;
    Ok(version)
}
