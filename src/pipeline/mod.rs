// ABOUTME: Stage graph model and executor.
// ABOUTME: Ordered stages with guards, parallel groups, timeouts, and outcome hooks.

mod error;
mod executor;
mod result;
mod stage;
pub mod stages;
mod validate;

pub use error::{DenialReason, HookError, PipelineError, StageError, StageErrorKind};
pub use executor::execute;
pub use result::{
    EXIT_APPROVAL_DENIED, EXIT_FAILURE, EXIT_SUCCESS, PipelineOutcome, PipelineStatus, SkipReason,
    StageOutcome, StageResult, StageStatus,
};
pub use stage::{
    Guard, HookOutcome, Hooks, OutputKey, Pipeline, PipelineBuilder, PipelineHook, StageAction,
    StageBody, StageHook, StageSpec,
};
