// ABOUTME: Rollback command implementation.
// ABOUTME: Requests a rollback to the last good or an explicit version; the manual path for prod.

use std::path::Path;

use stagehand::adapters::ScriptAdapter;
use stagehand::config::Config;
use stagehand::deploy::request_rollback;
use stagehand::error::{Error, Result};
use stagehand::output::Output;
use stagehand::types::{Environment, VersionToken};

pub async fn rollback(cwd: &Path, environment: Environment, to: Option<String>, mut output: Output) -> Result<()> {
    output.start_timer();
    let config = Config::discover(cwd)?;
    if !config.environments.contains_key(&environment) {
        return Err(Error::UnknownEnvironment(environment));
    }
    let target = to.as_deref().map(VersionToken::parse).transpose()?;

    output.progress(&format!("Rolling back {} in {}", config.app, environment));

    let ports = ScriptAdapter::new(cwd, &config.app, environment).collaborators(config.scanners.iter());
    let version = request_rollback(
        ports.versions.as_ref(),
        ports.rollback.as_ref(),
        &config.app,
        environment,
        target,
    )
    .await?;

    output.success(&format!("Rollback of {} in {} to {} requested", config.app, environment, version));
    Ok(())
}
