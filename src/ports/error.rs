// ABOUTME: Error type shared by all collaborator traits.
// ABOUTME: Distinguishes unconfigured, not-found, failed, and malformed responses.

/// Errors reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{operation} failed: {message}")]
    Failed { operation: String, message: String },

    #[error("unexpected response from {operation}: {message}")]
    Protocol { operation: String, message: String },
}

impl PortError {
    pub fn failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        PortError::Failed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn protocol(operation: impl Into<String>, message: impl Into<String>) -> Self {
        PortError::Protocol {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound(_))
    }
}
