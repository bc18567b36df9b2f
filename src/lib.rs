//! # Mapclay
//!
//! Renders interactive maps from YAML configuration.
//!
//! A configuration text holds one or more YAML documents, each describing one
//! map. The crate resolves which renderer draws each map, applies aliases,
//! remote presets and inheritance from the previous map, and then drives the
//! renderer's ordered setup steps, recording a result for every step.
//!
//! ```no_run
//! use mapclay::prelude::*;
//!
//! # async fn demo() -> mapclay::Result<()> {
//! let mapclay = Mapclay::builder()
//!     .with_registry(RendererRegistry::new())
//!     .build();
//! let container = Element::new("div");
//! let renderers = mapclay
//!     .render_by_yaml(&container, Some("use: Leaflet\nzoom: 7"))
//!     .await?;
//! for renderer in &renderers {
//!     println!("{:?}", renderer.status());
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod data;
pub mod options;
pub mod prelude;
pub mod remote;
pub mod renderer;
pub mod scheduler;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    builder::MapclayBuilder,
    config::{fingerprint, Config, Options},
    element::{Element, RenderStatus},
    geo::{Camera, LngLat},
};

pub use data::{parse_configs, DataRecord, DataType, MarkerSpec};

pub use options::{apply_default_aliases, set_value_by_aliases, validate_option, PresetMerger};

pub use remote::{ConfigFetcher, HttpFetcher, MemoryFetcher, PresetCache};

pub use renderer::{
    BasicRenderer, MapBackend, ModuleLoader, Phase, Renderer, RendererRegistry, Step,
    StepOutcome, StepProvider, StepResult, StepState,
};

pub use scheduler::{Converter, Mapclay};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapclayError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapclayError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Fail to fetch applied config {url}: {reason}")]
    PresetFetch { url: String, reason: String },

    #[error("Cannot resolve renderer from 'use': {0}")]
    UnresolvableRenderer(String),

    #[error("Fail to load renderer module '{specifier}': {reason}")]
    ModuleLoad { specifier: String, reason: String },

    #[error("Renderer has no steps to run")]
    Unhealthy,

    #[error("Previous configuration could not be resolved")]
    PrecedingConfigUnavailable,

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Script error: {0}")]
    Script(String),
}

/// Error type alias for convenience
pub type Error = MapclayError;
