// ABOUTME: Stage specifications: name, guard, body, timeout, declared writes, and hooks.
// ABOUTME: Stages are built once at pipeline construction and never mutated during a run.

use async_trait::async_trait;
use nonempty::NonEmpty;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::{HookError, PipelineError, StageError};
use super::result::{PipelineOutcome, StageResult};
use super::validate;
use crate::context::{Outputs, RunContext};
use crate::diagnostics::Diagnostics;

/// Pure predicate deciding whether a stage runs.
pub type Guard = Arc<dyn Fn(&RunContext) -> bool + Send + Sync>;

/// The work a single (non-parallel) stage performs.
#[async_trait]
pub trait StageAction: Send + Sync {
    /// Run against a read-only view of the context, returning the bindings to
    /// publish for later stages. Non-fatal problems go to `diag`.
    async fn run(&self, ctx: &RunContext, diag: &Diagnostics) -> Result<Outputs, StageError>;
}

/// Side effect attached to a stage outcome.
#[async_trait]
pub trait StageHook: Send + Sync {
    async fn on_stage(&self, result: &StageResult, ctx: &RunContext) -> Result<(), HookError>;
}

/// Side effect attached to the whole pipeline's outcome.
#[async_trait]
pub trait PipelineHook: Send + Sync {
    async fn on_pipeline(&self, outcome: &PipelineOutcome, ctx: &RunContext) -> Result<(), HookError>;
}

/// Which outcome a hook is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Success,
    Failure,
    Always,
}

/// Hooks keyed by outcome.
pub struct Hooks<H: ?Sized> {
    success: Vec<Arc<H>>,
    failure: Vec<Arc<H>>,
    always: Vec<Arc<H>>,
}

impl<H: ?Sized> Default for Hooks<H> {
    fn default() -> Self {
        Self {
            success: Vec::new(),
            failure: Vec::new(),
            always: Vec::new(),
        }
    }
}

impl<H: ?Sized> Hooks<H> {
    pub fn add(&mut self, outcome: HookOutcome, hook: Arc<H>) {
        match outcome {
            HookOutcome::Success => self.success.push(hook),
            HookOutcome::Failure => self.failure.push(hook),
            HookOutcome::Always => self.always.push(hook),
        }
    }

    pub fn get(&self, outcome: HookOutcome) -> &[Arc<H>] {
        match outcome {
            HookOutcome::Success => &self.success,
            HookOutcome::Failure => &self.failure,
            HookOutcome::Always => &self.always,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.failure.is_empty() && self.always.is_empty()
    }
}

/// An output key a stage declares it may write: exact, or a `prefix.*` family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutputKey {
    Exact(String),
    Prefix(String),
}

impl OutputKey {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_suffix('*') {
            Some(prefix) => OutputKey::Prefix(prefix.to_string()),
            None => OutputKey::Exact(raw.to_string()),
        }
    }

    pub fn covers(&self, key: &str) -> bool {
        match self {
            OutputKey::Exact(k) => k == key,
            OutputKey::Prefix(p) => key.starts_with(p.as_str()),
        }
    }

    /// Whether some key could be covered by both declarations.
    pub fn overlaps(&self, other: &OutputKey) -> bool {
        match (self, other) {
            (OutputKey::Exact(a), OutputKey::Exact(b)) => a == b,
            (OutputKey::Prefix(p), OutputKey::Exact(k)) | (OutputKey::Exact(k), OutputKey::Prefix(p)) => {
                k.starts_with(p.as_str())
            }
            (OutputKey::Prefix(a), OutputKey::Prefix(b)) => {
                a.starts_with(b.as_str()) || b.starts_with(a.as_str())
            }
        }
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKey::Exact(k) => f.write_str(k),
            OutputKey::Prefix(p) => write!(f, "{p}*"),
        }
    }
}

pub enum StageBody {
    Action(Arc<dyn StageAction>),
    Parallel(Box<NonEmpty<StageSpec>>),
}

pub struct StageSpec {
    pub(crate) name: String,
    pub(crate) guard: Option<Guard>,
    pub(crate) body: StageBody,
    pub(crate) hooks: Hooks<dyn StageHook>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) writes: Vec<OutputKey>,
}

impl StageSpec {
    pub fn action(name: impl Into<String>, action: impl StageAction + 'static) -> Self {
        Self::with_body(name, StageBody::Action(Arc::new(action)))
    }

    /// A group whose members run concurrently and are joined before the
    /// next stage starts.
    pub fn parallel(name: impl Into<String>, members: NonEmpty<StageSpec>) -> Self {
        Self::with_body(name, StageBody::Parallel(Box::new(members)))
    }

    fn with_body(name: impl Into<String>, body: StageBody) -> Self {
        Self {
            name: name.into(),
            guard: None,
            body,
            hooks: Hooks::default(),
            timeout: None,
            writes: Vec::new(),
        }
    }

    #[must_use]
    pub fn when(mut self, guard: impl Fn(&RunContext) -> bool + Send + Sync + 'static) -> Self {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Declare an output key; a trailing `*` declares a prefix.
    #[must_use]
    pub fn writes(mut self, key: &str) -> Self {
        self.writes.push(OutputKey::parse(key));
        self
    }

    /// Maximum duration. On a parallel group this is the default for members
    /// that declare none.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn hook(mut self, outcome: HookOutcome, hook: impl StageHook + 'static) -> Self {
        self.hooks.add(outcome, Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_success(self, hook: impl StageHook + 'static) -> Self {
        self.hook(HookOutcome::Success, hook)
    }

    #[must_use]
    pub fn on_failure(self, hook: impl StageHook + 'static) -> Self {
        self.hook(HookOutcome::Failure, hook)
    }

    #[must_use]
    pub fn always(self, hook: impl StageHook + 'static) -> Self {
        self.hook(HookOutcome::Always, hook)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &StageBody {
        &self.body
    }

    pub fn guard_allows(&self, ctx: &RunContext) -> bool {
        self.guard.as_ref().is_none_or(|guard| guard(ctx))
    }

    /// Keys this stage may write, including those of parallel members.
    pub fn declared_writes(&self) -> Vec<OutputKey> {
        let mut keys = self.writes.clone();
        if let StageBody::Parallel(members) = &self.body {
            for member in members.iter() {
                keys.extend(member.declared_writes());
            }
        }
        keys
    }
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("StageSpec");
        s.field("name", &self.name)
            .field("guarded", &self.guard.is_some())
            .field("timeout", &self.timeout)
            .field("writes", &self.writes);
        if let StageBody::Parallel(members) = &self.body {
            s.field("members", &members.iter().collect::<Vec<_>>());
        }
        s.finish()
    }
}

/// A validated, ordered stage list plus pipeline-level hooks.
pub struct Pipeline {
    pub(crate) stages: Vec<StageSpec>,
    pub(crate) hooks: Hooks<dyn PipelineHook>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.stages).finish()
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<StageSpec>,
    hooks: Hooks<dyn PipelineHook>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn hook(mut self, outcome: HookOutcome, hook: Arc<dyn PipelineHook>) -> Self {
        self.hooks.add(outcome, hook);
        self
    }

    /// Validate names and write-key disjointness and freeze the pipeline.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        validate::validate(&self.stages)?;
        Ok(Pipeline {
            stages: self.stages,
            hooks: self.hooks,
        })
    }
}
