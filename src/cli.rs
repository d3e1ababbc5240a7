// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use stagehand::context::parse_feature_flag;
use stagehand::types::Environment;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Deployment pipeline runner with direct, canary, and blue-green rollouts")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new stagehand.yml configuration file
    Init {
        /// Application name (defaults to the directory name)
        #[arg(long)]
        app: Option<String>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Run the deployment pipeline
    Run {
        #[command(flatten)]
        request: RequestArgs,

        /// Break an existing run lock for this app
        #[arg(long)]
        force_unlock: bool,
    },

    /// Show what a run would do without running it
    Plan {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Roll an environment back to its last good version
    Rollback {
        /// Target environment
        #[arg(short, long, value_enum)]
        environment: Environment,

        /// Version to roll back to (defaults to the last good version)
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Target environment
    #[arg(short, long, value_enum)]
    pub environment: Environment,

    /// Ship this version instead of building a new one
    #[arg(long)]
    pub version: Option<String>,

    /// Run the unit, integration, and smoke test stages
    #[arg(long)]
    pub run_tests: bool,

    /// Feature flag as NAME or NAME=BOOL (repeatable)
    #[arg(long = "feature", value_parser = parse_feature_flag)]
    pub features: Vec<(String, bool)>,

    /// Release notes attached to approvals and tickets
    #[arg(long, default_value = "")]
    pub notes: String,

    /// Source revision the build version is derived from
    #[arg(long, env = "STAGEHAND_REVISION", default_value = "0000000")]
    pub revision: String,

    /// Build counter the build version is derived from
    #[arg(long, env = "BUILD_NUMBER", default_value_t = 0)]
    pub build_number: u64,
}
