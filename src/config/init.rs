// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a commented stagehand.yml template.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::AppName;

use super::{CONFIG_FILENAME, Config};

const DEFAULT_APP: &str = "my-app";

pub fn init_config(dir: &Path, app: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let app = AppName::new(app.unwrap_or(DEFAULT_APP)).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let config = Config::template(app);

    std::fs::write(&config_path, generate_template_yaml(&config))?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"app: {app}
source: {source}
manifest: deploy/{app}

# Scanners run in parallel; any HIGH or CRITICAL finding fails the run.
scanners:
  - default

# Adapter scripts live in .stagehand/adapters/, lifecycle hooks in .stagehand/hooks/.

policy:
  canary_weight: 10
  monitoring_window: 10m
  settle_delay: 60s
  approval_timeout: 24h

environments:
  dev:
    replicas: 1
  test:
    replicas: 1
  staging:
    replicas: 2
  prod:
    replicas: 3
    # infra:
    #   region: eu-west-1
    #   db_password:
    #     env: PROD_DB_PASSWORD
"#,
        app = config.app,
        source = config.source,
    )
}
