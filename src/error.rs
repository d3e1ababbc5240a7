// ABOUTME: Application-wide error types for stagehand.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::RollbackError;
use crate::lock::LockError;
use crate::pipeline::PipelineError;
use crate::ports::PortError;
use crate::types::{Environment, VersionError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("environment '{0}' is not configured")]
    UnknownEnvironment(Environment),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid deployment request: {0}")]
    InvalidRequest(String),

    #[error("invalid version: {0}")]
    Version(#[from] VersionError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("invalid pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Rollback(#[from] RollbackError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
