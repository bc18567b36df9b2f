use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::renderer::Renderer;

/// What a step reports back when it does not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The step did its work; the value is kept as the step's payload.
    Done(Value),
    /// The step had nothing to do, e.g. no GPX data is configured.
    Skip,
}

impl StepOutcome {
    pub fn done() -> Self {
        Self::Done(Value::Null)
    }
}

impl From<Value> for StepOutcome {
    fn from(value: Value) -> Self {
        Self::Done(value)
    }
}

/// One unit of renderer setup.
///
/// Steps run one after another against the renderer that owns them, so they
/// read and write shared state (options, the live map handle) through it.
#[async_trait]
pub trait Step: Send + Sync {
    /// Identity of the step within its renderer.
    fn name(&self) -> &str;

    /// Step that must have neither failed nor skipped for this one to run.
    fn depends(&self) -> Option<&str> {
        None
    }

    async fn run(&self, renderer: &mut Renderer) -> anyhow::Result<StepOutcome>;
}

/// A step backed by a synchronous closure.
pub struct FnStep<F> {
    name: String,
    depends: Option<String>,
    func: F,
}

impl<F> FnStep<F>
where
    F: Fn(&mut Renderer) -> anyhow::Result<StepOutcome> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            depends: None,
            func,
        }
    }

    pub fn depends_on(mut self, step: impl Into<String>) -> Self {
        self.depends = Some(step.into());
        self
    }

    pub fn into_step(self) -> Arc<dyn Step> {
        Arc::new(self)
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(&mut Renderer) -> anyhow::Result<StepOutcome> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn depends(&self) -> Option<&str> {
        self.depends.as_deref()
    }

    async fn run(&self, renderer: &mut Renderer) -> anyhow::Result<StepOutcome> {
        (self.func)(renderer)
    }
}

impl<F> fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep")
            .field("name", &self.name)
            .field("depends", &self.depends)
            .finish()
    }
}

/// Shorthand for a closure step without dependency.
pub fn step_fn<F>(name: impl Into<String>, func: F) -> Arc<dyn Step>
where
    F: Fn(&mut Renderer) -> anyhow::Result<StepOutcome> + Send + Sync + 'static,
{
    FnStep::new(name, func).into_step()
}
