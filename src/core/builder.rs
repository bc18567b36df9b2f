//! Scheduler builder for fluent configuration
//!
//! This module provides a MapclayBuilder that wires a [`Mapclay`] scheduler
//! together from its collaborators: the input converter, the module loader
//! that resolves `use`, and the fetcher and cache behind `apply`.

use std::sync::Arc;

use crate::core::config::Config;
use crate::options::alias::apply_default_aliases;
use crate::options::preset::PresetMerger;
use crate::remote::{ConfigFetcher, HttpFetcher, PresetCache};
use crate::renderer::materialize::{ModuleLoader, RendererRegistry};
use crate::scheduler::{Converter, Mapclay};

/// Builder for creating and configuring Mapclay instances
pub struct MapclayBuilder {
    /// Conversion applied to each configuration up front
    converter: Option<Converter>,
    /// Resolves `use` module specifiers to renderers
    loader: Option<Arc<dyn ModuleLoader>>,
    /// Fetches remote configurations named by `apply`
    fetcher: Option<Arc<dyn ConfigFetcher>>,
    /// Cache of fetched remote configurations
    cache: Option<Arc<PresetCache>>,
}

impl MapclayBuilder {
    /// Create a new MapclayBuilder with the default converter
    pub fn new() -> Self {
        Self {
            converter: Some(Arc::new(apply_default_aliases)),
            loader: None,
            fetcher: None,
            cache: None,
        }
    }

    /// Set the conversion applied to every configuration before rendering
    pub fn with_converter<F>(mut self, converter: F) -> Self
    where
        F: Fn(Config) -> Config + Send + Sync + 'static,
    {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// Render configurations exactly as given
    pub fn without_converter(mut self) -> Self {
        self.converter = None;
        self
    }

    /// Set the module loader resolving `use`
    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Resolve `use` through an in-process renderer registry
    pub fn with_registry(self, registry: RendererRegistry) -> Self {
        self.with_loader(Arc::new(registry))
    }

    /// Set the fetcher used for `apply`
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ConfigFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use a dedicated preset cache instead of the process-wide one
    pub fn with_preset_cache(mut self, cache: Arc<PresetCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the scheduler with the configured collaborators
    pub fn build(self) -> Mapclay {
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(RendererRegistry::new()));
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpFetcher::new()));
        let cache = self.cache.unwrap_or_else(PresetCache::global);

        Mapclay::from_parts(self.converter, loader, PresetMerger::new(cache, fetcher))
    }
}

impl Default for MapclayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience constructors for common setups
impl MapclayBuilder {
    /// Scheduler resolving renderers from `registry`, with a private preset cache
    pub fn isolated(registry: RendererRegistry) -> Self {
        Self::new()
            .with_registry(registry)
            .with_preset_cache(Arc::new(PresetCache::new()))
    }
}
