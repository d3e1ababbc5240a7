// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::diagnostics::Warning;
use crate::dispatch::DispatchReport;
use crate::pipeline::{StageResult, StageStatus};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    fn emit_json<T: Serialize>(value: &T) {
        if let Ok(json) = serde_json::to_string(value) {
            println!("{json}");
        }
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => Self::emit_json(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a warning. Shown in every mode since warnings need attention.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => Self::emit_json(&JsonEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print the result of a pipeline run and everything dispatched for it.
    pub fn run_report(&self, report: &DispatchReport) {
        let outcome = &report.outcome;

        if self.mode == OutputMode::Json {
            let summary = RunSummary {
                event: "run",
                status: outcome.status().as_str(),
                exit_code: report.exit_code(),
                duration_secs: self.duration(),
                stages: outcome.results.iter().map(StageSummary::from).collect(),
                warnings: &outcome.warnings,
                dispatch_errors: report.errors.iter().map(ToString::to_string).collect(),
                rolled_back_to: report.rolled_back_to.as_ref().map(ToString::to_string),
                ticket: report.ticket.as_ref().map(ToString::to_string),
            };
            Self::emit_json(&summary);
            return;
        }

        if self.mode == OutputMode::Normal {
            for result in &outcome.results {
                print_stage(result, 0);
            }
        }
        for warning in &outcome.warnings {
            self.warning(&warning.message);
        }
        for err in &report.errors {
            self.warning(&err.to_string());
        }
        if let Some(version) = &report.rolled_back_to {
            self.progress(&format!("  → Rollback to {version} requested"));
        }

        match outcome.failure() {
            None => self.success("Pipeline succeeded"),
            Some(err) => {
                let stage = outcome.failed_stage().map(|s| s.name.as_str()).unwrap_or("?");
                self.error(&format!("stage {stage} failed: {err}"));
            }
        }
    }
}

fn print_stage(result: &StageResult, depth: usize) {
    let indent = "  ".repeat(depth + 1);
    let mark = match result.status() {
        StageStatus::Success => "✓",
        StageStatus::Failure => "✗",
        StageStatus::Skipped => "-",
    };
    match result.error() {
        Some(err) => println!("{indent}{mark} {} ({err})", result.name),
        None => println!("{indent}{mark} {} ({:.1}s)", result.name, result.duration.as_secs_f64()),
    }
    for member in &result.members {
        print_stage(member, depth + 1);
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    event: &'a str,
    status: &'a str,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
    stages: Vec<StageSummary<'a>>,
    warnings: &'a [Warning],
    dispatch_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rolled_back_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ticket: Option<String>,
}

#[derive(Serialize)]
struct StageSummary<'a> {
    name: &'a str,
    status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    duration_secs: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    members: Vec<StageSummary<'a>>,
}

impl<'a> From<&'a StageResult> for StageSummary<'a> {
    fn from(result: &'a StageResult) -> Self {
        Self {
            name: &result.name,
            status: result.status(),
            error: result.error().map(ToString::to_string),
            duration_secs: result.duration.as_secs_f64(),
            members: result.members.iter().map(StageSummary::from).collect(),
        }
    }
}
