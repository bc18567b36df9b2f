//! Renderers and the step contract they fulfil.
//!
//! A [`StepProvider`] describes a mapping library: its default options, its
//! ordered setup [`Step`]s and how to move the camera afterwards. A
//! [`Renderer`] is one materialized use of a provider, bound to one container
//! element. It owns the resolved options, the live map handle and the log of
//! step results.

pub mod basic;
pub mod draw;
pub mod engine;
pub mod materialize;
pub mod script;
pub mod step;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;

use crate::core::config::{Config, Options};
use crate::core::element::{Element, RenderStatus};
use crate::core::geo::Camera;
use crate::data::records::expand_shorthands;
use crate::options::catalog::default_options;

pub use basic::{BasicRenderer, ControlOptions, MapBackend};
pub use draw::DrawIdStrategy;
pub use engine::{finish, run, run_steps};
pub use materialize::{health_check, materialize, ModuleLoader, RendererRegistry};
pub use script::{ScriptBindings, ScriptHost};
pub use step::{step_fn, FnStep, Step, StepOutcome};

/// Live map object created by a renderer, e.g. a handle into the mapping library.
pub type MapHandle = Box<dyn Any + Send + Sync>;

/// Phase a step result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Resolving which configuration and renderer to use at all.
    Prepare,
    /// Running the renderer's own steps.
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepState {
    Success,
    Skip,
    Fail,
    Stop,
}

impl StepState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skip => "skip",
            Self::Fail => "fail",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub enum StepPayload {
    #[default]
    None,
    Value(Value),
    Error(anyhow::Error),
}

/// Outcome of one step, in execution order.
#[derive(Debug)]
pub struct StepResult {
    pub phase: Phase,
    pub step: String,
    pub state: StepState,
    pub payload: StepPayload,
}

impl StepResult {
    pub fn new(phase: Phase, step: impl Into<String>, state: StepState, payload: StepPayload) -> Self {
        Self {
            phase,
            step: step.into(),
            state,
            payload,
        }
    }

    pub fn error(&self) -> Option<&anyhow::Error> {
        match &self.payload {
            StepPayload::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.payload {
            StepPayload::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// Capabilities of a mapping library, as consumed by the step engine.
#[async_trait]
pub trait StepProvider: Send + Sync {
    fn id(&self) -> &str;

    fn version(&self) -> Option<&str> {
        None
    }

    /// Options a renderer starts from before the configuration is copied in.
    fn default_options(&self) -> Options {
        default_options()
    }

    /// Ordered setup steps for one render.
    fn steps(&self) -> Vec<Arc<dyn Step>>;

    /// Move the camera of an already rendered map.
    async fn update_camera(
        &self,
        _renderer: &mut Renderer,
        _camera: Camera,
        _animate: bool,
    ) -> anyhow::Result<()> {
        Err(anyhow!("renderer '{}' cannot update its camera", self.id()))
    }
}

pub struct Renderer {
    /// Resolved options, defaults overwritten by the configuration.
    pub options: Options,
    /// Container the map is drawn into.
    pub target: Option<Element>,
    /// Log of every prepare and render step, in execution order.
    pub results: Vec<StepResult>,
    map: Option<MapHandle>,
    provider: Option<Arc<dyn StepProvider>>,
    steps: Vec<Arc<dyn Step>>,
    generation: Option<u64>,
}

impl Renderer {
    /// Instantiate a provider: its defaults and a fresh step list.
    pub fn new(provider: Arc<dyn StepProvider>) -> Self {
        Self {
            options: provider.default_options(),
            steps: provider.steps(),
            provider: Some(provider),
            ..Self::bare()
        }
    }

    /// A renderer without provider; it has no steps.
    pub fn bare() -> Self {
        Self {
            options: Options::new(),
            target: None,
            results: Vec::new(),
            map: None,
            provider: None,
            steps: Vec::new(),
            generation: None,
        }
    }

    /// Copy every option of `config` onto this renderer, overwriting defaults.
    pub fn assign(&mut self, config: Config) {
        self.options.extend(config.options);
        if config.target.is_some() {
            self.target = config.target;
        }
        expand_shorthands(&mut self.options);
    }

    pub fn id(&self) -> Option<&str> {
        self.provider.as_deref().map(|provider| provider.id())
    }

    pub fn provider(&self) -> Option<&Arc<dyn StepProvider>> {
        self.provider.as_ref()
    }

    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    /// Whether there is a step list to run at all.
    pub fn has_steps(&self) -> bool {
        self.provider.is_some()
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    /// `true` only for a boolean `true` or the string `"true"`.
    pub fn option_flag(&self, key: &str) -> bool {
        match self.options.get(key) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => text == "true",
            _ => false,
        }
    }

    pub fn set_option(&mut self, key: &str, value: impl Into<Value>) {
        self.options.insert(key.to_string(), value.into());
    }

    pub fn eval_script(&self) -> Option<&str> {
        self.option_str("eval").filter(|script| !script.trim().is_empty())
    }

    pub fn has_map(&self) -> bool {
        self.map.is_some()
    }

    pub fn map<T: Any>(&self) -> Option<&T> {
        self.map.as_ref()?.downcast_ref()
    }

    pub fn map_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.map.as_mut()?.downcast_mut()
    }

    pub fn map_handle(&self) -> Option<&MapHandle> {
        self.map.as_ref()
    }

    pub fn set_map<T: Any + Send + Sync>(&mut self, map: T) {
        self.map = Some(Box::new(map));
    }

    pub fn set_map_handle(&mut self, map: MapHandle) {
        self.map = Some(map);
    }

    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = Some(generation);
    }

    pub fn record(&mut self, phase: Phase, step: &str, state: StepState, payload: StepPayload) {
        self.results.push(StepResult::new(phase, step, state, payload));
    }

    /// Latest render-phase result of the named step.
    pub fn result_of(&self, step: &str) -> Option<&StepResult> {
        self.results
            .iter()
            .rev()
            .find(|result| result.phase == Phase::Render && result.step == step)
    }

    pub fn state_of(&self, step: &str) -> Option<StepState> {
        self.result_of(step).map(|result| result.state)
    }

    /// Results that failed or stopped the render.
    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.results
            .iter()
            .filter(|result| matches!(result.state, StepState::Fail | StepState::Stop))
    }

    /// Unfulfilled when nothing succeeded or anything failed or stopped.
    pub fn status(&self) -> RenderStatus {
        let succeeded = self
            .results
            .iter()
            .any(|result| result.state == StepState::Success);
        if !succeeded || self.failures().next().is_some() {
            RenderStatus::Unfulfilled
        } else {
            RenderStatus::Fulfilled
        }
    }

    /// Move the camera and keep `center`/`zoom` in sync with it.
    pub async fn update_camera(&mut self, camera: Camera, animate: bool) -> anyhow::Result<()> {
        let provider = self
            .provider
            .clone()
            .ok_or_else(|| anyhow!("no renderer to update the camera with"))?;
        provider.update_camera(self, camera, animate).await?;
        camera.write_to(&mut self.options);
        Ok(())
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::bare()
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("id", &self.id())
            .field("options", &self.options)
            .field("target", &self.target)
            .field("has_map", &self.has_map())
            .field("steps", &self.steps.iter().map(|s| s.name().to_string()).collect::<Vec<_>>())
            .field("results", &self.results)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Stub;

    impl StepProvider for Stub {
        fn id(&self) -> &str {
            "stub"
        }

        fn steps(&self) -> Vec<Arc<dyn Step>> {
            vec![step_fn("noop", |_| Ok(StepOutcome::done()))]
        }
    }

    #[test]
    fn test_assign_overwrites_defaults() {
        let mut renderer = Renderer::new(Arc::new(Stub));
        renderer.assign(Config::from_value(json!({ "zoom": 12, "XYZ": "https://a.example/{z}/{x}/{y}.png" })));

        assert_eq!(renderer.option("zoom"), Some(&json!(12)));
        assert_eq!(renderer.option_str("width"), Some("300px"));
        assert_eq!(renderer.option("data").and_then(Value::as_array).map(Vec::len), Some(1));
        assert_eq!(renderer.id(), Some("stub"));
        assert_eq!(renderer.steps().len(), 1);
    }

    #[test]
    fn test_map_handle_downcast() {
        let mut renderer = Renderer::bare();
        assert!(!renderer.has_map());

        renderer.set_map(String::from("live map"));
        assert_eq!(renderer.map::<String>().map(String::as_str), Some("live map"));
        assert!(renderer.map::<u32>().is_none());

        if let Some(map) = renderer.map_mut::<String>() {
            map.push('!');
        }
        assert_eq!(renderer.map::<String>().map(String::as_str), Some("live map!"));
    }

    #[test]
    fn test_status_aggregation() {
        let mut renderer = Renderer::bare();
        assert_eq!(renderer.status(), RenderStatus::Unfulfilled);

        renderer.record(Phase::Render, "a", StepState::Success, StepPayload::None);
        renderer.record(Phase::Render, "b", StepState::Skip, StepPayload::None);
        assert_eq!(renderer.status(), RenderStatus::Fulfilled);

        renderer.record(Phase::Render, "c", StepState::Fail, StepPayload::Error(anyhow!("boom")));
        assert_eq!(renderer.status(), RenderStatus::Unfulfilled);
        assert_eq!(renderer.failures().count(), 1);
    }

    #[tokio::test]
    async fn test_camera_update_unsupported_by_default() {
        let mut renderer = Renderer::new(Arc::new(Stub));
        let camera = Camera::new(crate::core::geo::LngLat::new(0.0, 0.0), 2.0);

        let err = renderer.update_camera(camera, false).await.unwrap_err();
        assert!(err.to_string().contains("stub"));
        assert_eq!(renderer.option("zoom"), Some(&json!(7)));
    }
}
