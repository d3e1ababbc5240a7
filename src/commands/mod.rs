// ABOUTME: Command module aggregator for the stagehand CLI.
// ABOUTME: Re-exports run, plan, and rollback command handlers.

mod plan;
mod rollback;
mod run;

pub use plan::plan;
pub use rollback::rollback;
pub use run::run;

use crate::cli::RequestArgs;
use stagehand::context::DeployRequest;

impl RequestArgs {
    pub fn into_request(self) -> DeployRequest {
        let mut request = DeployRequest::new(self.environment, self.revision, self.build_number);
        request.version = self.version;
        request.run_tests = self.run_tests;
        request.features = self.features.into_iter().collect();
        request.release_notes = self.notes;
        request
    }
}
