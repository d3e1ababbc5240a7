// ABOUTME: Dispatcher side-effect errors with SNAFU context selectors.
// ABOUTME: Secondary failures stay distinct from the pipeline failure that caused them.

use snafu::Snafu;

use crate::deploy::RollbackError;
use crate::ports::{PortError, Severity};
use crate::types::{Environment, VersionToken};

/// A side effect the dispatcher could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DispatchError {
    #[snafu(display("{severity} notification to {channel} failed: {source}"))]
    Notify {
        channel: String,
        severity: Severity,
        source: PortError,
    },

    #[snafu(display("monitoring ticket could not be created: {source}"))]
    Ticket { source: PortError },

    /// The run failed and there is no known-good version to return to.
    #[snafu(display("automatic rollback unavailable: no last-good version for {environment}"))]
    RollbackUnavailable { environment: Environment },

    #[snafu(display("automatic rollback failed: {source}"))]
    Rollback { source: RollbackError },

    #[snafu(display("recording {version} as last-good failed: {source}"))]
    RecordVersion { version: VersionToken, source: PortError },

    #[snafu(display("archiving run results failed: {source}"))]
    Archive { source: PortError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    Notify,
    Ticket,
    RollbackUnavailable,
    Rollback,
    RecordVersion,
    Archive,
}

impl DispatchError {
    pub fn kind(&self) -> DispatchErrorKind {
        match self {
            DispatchError::Notify { .. } => DispatchErrorKind::Notify,
            DispatchError::Ticket { .. } => DispatchErrorKind::Ticket,
            DispatchError::RollbackUnavailable { .. } => DispatchErrorKind::RollbackUnavailable,
            DispatchError::Rollback { .. } => DispatchErrorKind::Rollback,
            DispatchError::RecordVersion { .. } => DispatchErrorKind::RecordVersion,
            DispatchError::Archive { .. } => DispatchErrorKind::Archive,
        }
    }
}

impl From<RollbackError> for DispatchError {
    fn from(source: RollbackError) -> Self {
        match source {
            RollbackError::NoLastGood { environment, .. } => DispatchError::RollbackUnavailable { environment },
            source => DispatchError::Rollback { source },
        }
    }
}
