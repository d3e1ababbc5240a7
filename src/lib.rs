// ABOUTME: Library root for stagehand - exposes the pipeline engine for the binary and tests.
// ABOUTME: The main binary is in main.rs.

pub mod adapters;
pub mod config;
pub mod context;
pub mod deploy;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod lock;
pub mod output;
pub mod pipeline;
pub mod ports;
pub mod types;
