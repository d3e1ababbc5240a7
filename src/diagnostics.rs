// ABOUTME: Diagnostics accumulator for non-fatal warnings during a run.
// ABOUTME: Collects hook, cleanup, and lock problems that must be shown but not fail the run.

use parking_lot::Mutex;
use serde::Serialize;

/// Collects non-fatal warnings during a pipeline run.
///
/// Shared by reference between concurrently running parallel members.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Mutex<Vec<Warning>>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.lock().push(warning);
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().clone()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.lock().is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings.into_inner()
    }
}

/// A non-fatal warning collected during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn hook_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::HookFailed,
            message: message.into(),
        }
    }

    pub fn cleanup_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::CleanupFailed,
            message: message.into(),
        }
    }

    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockRelease,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A post-stage or pipeline hook returned an error.
    HookFailed,
    /// Tearing down after an aborted rollout did not fully succeed.
    CleanupFailed,
    /// Failed to remove the run lock file.
    LockRelease,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings_in_order() {
        let diag = Diagnostics::default();
        diag.warn(Warning::hook_failed("always hook exited 1"));
        diag.warn(Warning::cleanup_failed("canary delete failed"));

        let kinds: Vec<_> = diag.into_warnings().into_iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::HookFailed, WarningKind::CleanupFailed]);
    }
}
