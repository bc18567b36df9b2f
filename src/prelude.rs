//! Prelude module for common mapclay types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use mapclay::prelude::*;`

pub use crate::core::{
    builder::MapclayBuilder,
    config::{Config, Options},
    element::{Element, RenderStatus},
    geo::{Camera, LngLat},
};

pub use crate::data::{parse_configs, DataRecord, DataType, MarkerSpec};

pub use crate::options::{apply_default_aliases, validate_option, PresetMerger};

pub use crate::remote::{ConfigFetcher, HttpFetcher, MemoryFetcher, PresetCache};

pub use crate::renderer::{
    step_fn, BasicRenderer, ControlOptions, DrawIdStrategy, FnStep, MapBackend, MapHandle,
    ModuleLoader, Phase, Renderer, RendererRegistry, ScriptBindings, ScriptHost, Step,
    StepOutcome, StepPayload, StepProvider, StepResult, StepState,
};

pub use crate::scheduler::Mapclay;

pub use crate::{MapclayError, Result};

pub use std::sync::Arc;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
