// ABOUTME: Deployment strategies using the type state pattern.
// ABOUTME: Direct, canary, and blue-green state machines plus last-good rollback.

mod blue_green;
mod canary;
mod deployment;
mod direct;
mod outcome;
mod rollback;
mod rollout;
mod strategy;

pub use deployment::{DeployTarget, Deployment, Halted, StrategyEnv, TransitionResult};
pub use outcome::{DeploymentOutcome, FailureReason, Phase, StrategyReport};
pub use rollback::{RollbackError, request_rollback};
pub use strategy::{DeployStrategy, strategy_budget};
