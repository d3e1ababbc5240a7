// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Application names, environments, version tokens, and phantom-typed ids.

mod app_name;
mod environment;
mod id;
mod version;

pub use app_name::{AppName, AppNameError};
pub use environment::{Environment, ParseEnvironmentError};
pub use id::{ArtifactId, RevisionId, TicketId};
pub use version::{VersionError, VersionToken};
