// ABOUTME: Immutable version tokens and the build-version identifier.
// ABOUTME: Derives `<counter>-<short revision>` from source revision and build counter.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Length of the abbreviated source revision embedded in a build version.
const SHORT_REVISION_LEN: usize = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version cannot be empty")]
    Empty,

    #[error("version cannot contain whitespace: '{0}'")]
    Whitespace(String),

    #[error("source revision must be at least {SHORT_REVISION_LEN} hex characters: '{0}'")]
    InvalidRevision(String),
}

/// A version identifying one deployable build, e.g. `42-3f9c2ab` or `v1.4.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionToken(String);

impl VersionToken {
    pub fn parse(value: &str) -> Result<Self, VersionError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(VersionError::Empty);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(VersionError::Whitespace(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Derive the build version for a source revision and build counter.
    ///
    /// The same inputs always produce the same token.
    pub fn derive(revision: &str, counter: u64) -> Result<Self, VersionError> {
        let revision = revision.trim().to_ascii_lowercase();
        if revision.len() < SHORT_REVISION_LEN || !revision.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(VersionError::InvalidRevision(revision));
        }
        Ok(Self(format!(
            "{}-{}",
            counter,
            &revision[..SHORT_REVISION_LEN]
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VersionToken {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionToken> for String {
    fn from(value: VersionToken) -> Self {
        value.0
    }
}
