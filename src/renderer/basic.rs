//! A renderer assembled from per-library map capabilities.
//!
//! [`BasicRenderer`] owns the step sequence every bundled renderer shares:
//!
//! 1. `create_view` sizes the container
//! 2. `add_map` creates the live map
//! 3. `add_tile_data`, `add_gpx_file` and `add_markers` load data
//! 4. `set_control`, `set_draw` and `set_extra` decorate the map
//! 5. `eval_script` runs the trailing script
//!
//! Everything after `add_map` depends on it. A [`MapBackend`] only fills in
//! what its library can do; unsupported capabilities are skipped.

use std::fmt;
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use serde_json::Value;

use crate::core::config::Options;
use crate::core::constants::{FALLBACK_TILE_URL, MARKER_ICON_ANCHOR, MARKER_ICON_SIZE};
use crate::core::geo::Camera;
use crate::data::records::{data_records, markers, records_of, show_layer_switcher};
use crate::data::{DataRecord, DataType, MarkerSpec};
use crate::renderer::draw::DrawIdStrategy;
use crate::renderer::script::{ScriptBindings, ScriptHost};
use crate::renderer::step::{Step, StepOutcome};
use crate::renderer::{MapHandle, Renderer, StepProvider};
use crate::MapclayError;

/// Which controls the `control` option asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlOptions {
    pub scale: bool,
    pub fullscreen: bool,
}

impl ControlOptions {
    pub fn from_options(options: &Options) -> Self {
        let flag = |name: &str| {
            options
                .get("control")
                .and_then(|control| control.get(name))
                .is_some_and(|value| value.as_bool() == Some(true) || value.as_str() == Some("true"))
        };
        Self {
            scale: flag("scale"),
            fullscreen: flag("fullscreen"),
        }
    }

    pub fn any(&self) -> bool {
        self.scale || self.fullscreen
    }
}

/// Marker icon geometry in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerIcon {
    pub size: (u32, u32),
    pub anchor: (u32, u32),
}

impl Default for MarkerIcon {
    fn default() -> Self {
        Self {
            size: MARKER_ICON_SIZE,
            anchor: MARKER_ICON_ANCHOR,
        }
    }
}

/// What a mapping library can do for a [`BasicRenderer`].
#[async_trait]
pub trait MapBackend: Send + Sync + 'static {
    fn id(&self) -> &str;

    fn version(&self) -> Option<&str> {
        None
    }

    /// Create the live map inside the renderer's target.
    async fn add_map(&self, renderer: &Renderer) -> anyhow::Result<MapHandle>;

    /// Add base tile layers. `layers` is never empty.
    async fn add_tile_data(
        &self,
        _renderer: &mut Renderer,
        _layers: &[DataRecord],
        _show_switcher: bool,
    ) -> anyhow::Result<StepOutcome> {
        Ok(StepOutcome::Skip)
    }

    async fn add_gpx_file(
        &self,
        _renderer: &mut Renderer,
        _record: &DataRecord,
    ) -> anyhow::Result<StepOutcome> {
        Ok(StepOutcome::Skip)
    }

    async fn add_marker(
        &self,
        _renderer: &mut Renderer,
        _marker: &MarkerSpec,
        _icon: &MarkerIcon,
    ) -> anyhow::Result<StepOutcome> {
        Ok(StepOutcome::Skip)
    }

    async fn set_control(
        &self,
        _renderer: &mut Renderer,
        _control: ControlOptions,
    ) -> anyhow::Result<StepOutcome> {
        Ok(StepOutcome::Skip)
    }

    async fn set_draw(
        &self,
        _renderer: &mut Renderer,
        _ids: DrawIdStrategy,
    ) -> anyhow::Result<StepOutcome> {
        Ok(StepOutcome::Skip)
    }

    /// Overlay showing tile boundaries.
    async fn add_debug_layer(&self, _renderer: &mut Renderer) -> anyhow::Result<StepOutcome> {
        Ok(StepOutcome::Skip)
    }

    async fn update_camera(
        &self,
        _renderer: &mut Renderer,
        _camera: Camera,
        _animate: bool,
    ) -> anyhow::Result<()> {
        bail!("renderer '{}' cannot update its camera", self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capability {
    CreateView,
    AddMap,
    AddTileData,
    AddGpxFile,
    AddMarkers,
    SetControl,
    SetDraw,
    SetExtra,
    EvalScript,
}

impl Capability {
    const ALL: [Self; 9] = [
        Self::CreateView,
        Self::AddMap,
        Self::AddTileData,
        Self::AddGpxFile,
        Self::AddMarkers,
        Self::SetControl,
        Self::SetDraw,
        Self::SetExtra,
        Self::EvalScript,
    ];

    fn name(&self) -> &'static str {
        match self {
            Self::CreateView => "create_view",
            Self::AddMap => "add_map",
            Self::AddTileData => "add_tile_data",
            Self::AddGpxFile => "add_gpx_file",
            Self::AddMarkers => "add_markers",
            Self::SetControl => "set_control",
            Self::SetDraw => "set_draw",
            Self::SetExtra => "set_extra",
            Self::EvalScript => "eval_script",
        }
    }

    fn depends(&self) -> Option<&'static str> {
        match self {
            Self::CreateView | Self::AddMap => None,
            _ => Some(Self::AddMap.name()),
        }
    }
}

/// CSS length of a size option; bare numbers are pixels.
fn css_length(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(format!("{number}px")),
        _ => None,
    }
}

struct CapabilityStep<B> {
    capability: Capability,
    backend: Arc<B>,
    script_host: Option<Arc<dyn ScriptHost>>,
}

impl<B: MapBackend> CapabilityStep<B> {
    fn create_view(&self, renderer: &mut Renderer) -> anyhow::Result<StepOutcome> {
        let Some(target) = &renderer.target else {
            return Ok(StepOutcome::Skip);
        };
        for dimension in ["width", "height"] {
            if let Some(length) = renderer.option(dimension).and_then(css_length) {
                target.set_style(dimension, length);
            }
        }
        Ok(StepOutcome::done())
    }

    async fn add_tile_data(&self, renderer: &mut Renderer) -> anyhow::Result<StepOutcome> {
        let mut layers = records_of(&renderer.options, DataType::Tile);
        if layers.is_empty() {
            layers.push(DataRecord {
                kind: DataType::Tile,
                url: FALLBACK_TILE_URL.to_string(),
                title: None,
            });
        }
        let show_switcher = show_layer_switcher(&data_records(&renderer.options));
        self.backend
            .add_tile_data(renderer, &layers, show_switcher)
            .await
    }

    async fn add_gpx_file(&self, renderer: &mut Renderer) -> anyhow::Result<StepOutcome> {
        let mut added = Vec::new();
        for record in records_of(&renderer.options, DataType::Gpx) {
            if let StepOutcome::Done(value) = self.backend.add_gpx_file(renderer, &record).await? {
                added.push(value);
            }
        }
        Ok(collected(added))
    }

    async fn add_markers(&self, renderer: &mut Renderer) -> anyhow::Result<StepOutcome> {
        let icon = MarkerIcon::default();
        let mut added = Vec::new();
        for marker in markers(&renderer.options) {
            if let StepOutcome::Done(value) = self.backend.add_marker(renderer, &marker, &icon).await? {
                added.push(value);
            }
        }
        Ok(collected(added))
    }

    fn eval_script(&self, renderer: &Renderer) -> anyhow::Result<StepOutcome> {
        let Some(script) = renderer.eval_script() else {
            return Ok(StepOutcome::Skip);
        };
        let host = self
            .script_host
            .as_ref()
            .ok_or_else(|| MapclayError::Script("no script host to evaluate custom script".into()))?;
        let bindings = ScriptBindings {
            map: renderer.map_handle().map(|map| &**map),
            config: &renderer.options,
            library: self.backend.id(),
            target: renderer.target.as_ref(),
        };
        let value = host
            .eval(script, bindings)
            .map_err(|err| MapclayError::Script(format!("{err:#}")))?;
        Ok(StepOutcome::Done(value))
    }
}

/// Values of a step that acts once per item; no item means skipped.
fn collected(values: Vec<Value>) -> StepOutcome {
    if values.is_empty() {
        StepOutcome::Skip
    } else {
        StepOutcome::Done(Value::Array(values))
    }
}

#[async_trait]
impl<B: MapBackend> Step for CapabilityStep<B> {
    fn name(&self) -> &str {
        self.capability.name()
    }

    fn depends(&self) -> Option<&str> {
        self.capability.depends()
    }

    async fn run(&self, renderer: &mut Renderer) -> anyhow::Result<StepOutcome> {
        match self.capability {
            Capability::CreateView => self.create_view(renderer),
            Capability::AddMap => {
                let map = self.backend.add_map(renderer).await?;
                renderer.set_map_handle(map);
                Ok(StepOutcome::done())
            }
            Capability::AddTileData => self.add_tile_data(renderer).await,
            Capability::AddGpxFile => self.add_gpx_file(renderer).await,
            Capability::AddMarkers => self.add_markers(renderer).await,
            Capability::SetControl => {
                let control = ControlOptions::from_options(&renderer.options);
                if !control.any() {
                    return Ok(StepOutcome::Skip);
                }
                self.backend.set_control(renderer, control).await
            }
            Capability::SetDraw => {
                if !renderer.option_flag("draw") {
                    return Ok(StepOutcome::Skip);
                }
                let ids = DrawIdStrategy::for_target(renderer.target.as_ref());
                self.backend.set_draw(renderer, ids).await
            }
            Capability::SetExtra => {
                if !renderer.option_flag("debug") {
                    return Ok(StepOutcome::Skip);
                }
                self.backend.add_debug_layer(renderer).await
            }
            Capability::EvalScript => self.eval_script(renderer),
        }
    }
}

/// Step provider built on a [`MapBackend`].
pub struct BasicRenderer<B> {
    backend: Arc<B>,
    script_host: Option<Arc<dyn ScriptHost>>,
}

impl<B: MapBackend> BasicRenderer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            script_host: None,
        }
    }

    pub fn with_script_host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.script_host = Some(host);
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Names of the steps, in execution order.
    pub fn step_names() -> Vec<&'static str> {
        Capability::ALL.iter().map(Capability::name).collect()
    }
}

#[async_trait]
impl<B: MapBackend> StepProvider for BasicRenderer<B> {
    fn id(&self) -> &str {
        self.backend.id()
    }

    fn version(&self) -> Option<&str> {
        self.backend.version()
    }

    fn steps(&self) -> Vec<Arc<dyn Step>> {
        Capability::ALL
            .into_iter()
            .map(|capability| {
                Arc::new(CapabilityStep {
                    capability,
                    backend: self.backend.clone(),
                    script_host: self.script_host.clone(),
                }) as Arc<dyn Step>
            })
            .collect()
    }

    async fn update_camera(
        &self,
        renderer: &mut Renderer,
        camera: Camera,
        animate: bool,
    ) -> anyhow::Result<()> {
        self.backend.update_camera(renderer, camera, animate).await
    }
}

impl<B: MapBackend> fmt::Debug for BasicRenderer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicRenderer")
            .field("id", &self.backend.id())
            .field("script_host", &self.script_host.is_some())
            .finish()
    }
}
