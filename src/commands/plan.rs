// ABOUTME: Plan command implementation.
// ABOUTME: Resolves a request and shows strategy and stage guards without side effects.

use serde::Serialize;
use std::path::Path;

use crate::cli::RequestArgs;
use stagehand::adapters::ScriptAdapter;
use stagehand::config::Config;
use stagehand::deploy::DeployStrategy;
use stagehand::error::Result;
use stagehand::output::{Output, OutputMode};
use stagehand::pipeline::stages::standard_pipeline;
use stagehand::pipeline::{StageBody, StageSpec};

#[derive(Serialize)]
struct PlannedStage {
    name: String,
    runs: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    members: Vec<PlannedStage>,
}

impl PlannedStage {
    fn new(stage: &StageSpec, ctx: &stagehand::context::RunContext) -> Self {
        let members = match stage.body() {
            StageBody::Parallel(members) => members.iter().map(|m| PlannedStage::new(m, ctx)).collect(),
            StageBody::Action(_) => Vec::new(),
        };
        Self {
            name: stage.name().to_string(),
            runs: stage.guard_allows(ctx),
            members,
        }
    }

    fn print(&self, depth: usize) {
        let indent = "  ".repeat(depth + 1);
        let mark = if self.runs { "•" } else { "-" };
        let note = if self.runs { "" } else { " (skipped by guard)" };
        println!("{indent}{mark} {}{note}", self.name);
        for member in &self.members {
            member.print(depth + 1);
        }
    }
}

#[derive(Serialize)]
struct Plan {
    event: &'static str,
    app: String,
    environment: String,
    namespace: String,
    version: String,
    build_version: String,
    strategy: DeployStrategy,
    stages: Vec<PlannedStage>,
}

pub fn plan(cwd: &Path, args: RequestArgs, output: Output) -> Result<()> {
    let config = Config::discover(cwd)?;
    let ctx = args.into_request().resolve(&config)?;

    // Adapters are only bound, never invoked, while planning.
    let ports = ScriptAdapter::new(cwd, &config.app, ctx.environment()).collaborators(config.scanners.iter());
    let pipeline = standard_pipeline(&config, &ports, Vec::new())?;

    let plan = Plan {
        event: "plan",
        app: config.app.to_string(),
        environment: ctx.environment().to_string(),
        namespace: ctx.namespace().to_string(),
        version: ctx.deploy_version().to_string(),
        build_version: ctx.build_version().to_string(),
        strategy: DeployStrategy::for_environment(ctx.environment()),
        stages: pipeline.stages().iter().map(|s| PlannedStage::new(s, &ctx)).collect(),
    };

    match output.mode() {
        OutputMode::Json => {
            if let Ok(json) = serde_json::to_string(&plan) {
                println!("{json}");
            }
        }
        OutputMode::Quiet => println!("{} {} {}", plan.environment, plan.version, plan.strategy),
        OutputMode::Normal => {
            println!(
                "{} {} → {} (namespace {}, {} strategy)",
                plan.app, plan.version, plan.environment, plan.namespace, plan.strategy
            );
            for stage in &plan.stages {
                stage.print(0);
            }
        }
    }
    Ok(())
}
