//! Turning a resolved configuration into a renderer instance.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::config::Config;
use crate::prelude::HashMap;
use crate::renderer::{Renderer, StepProvider};
use crate::{MapclayError, Result};

/// Resolves a module specifier, such as `renderers/leaflet`, to a renderer.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, specifier: &str) -> Result<Arc<dyn StepProvider>>;
}

/// Creates a fresh provider each time a specifier is loaded.
pub type ProviderFactory = Arc<dyn Fn() -> Arc<dyn StepProvider> + Send + Sync>;

/// In-process module loader keyed by specifier.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    factories: Arc<RwLock<HashMap<String, ProviderFactory>>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, specifier: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn StepProvider> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(specifier.into(), Arc::new(factory));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(self, specifier: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn StepProvider> + Send + Sync + 'static,
    {
        self.register(specifier, factory);
        self
    }

    pub fn contains(&self, specifier: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(specifier)
    }

    pub fn specifiers(&self) -> Vec<String> {
        let mut specifiers: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        specifiers.sort();
        specifiers
    }
}

#[async_trait]
impl ModuleLoader for RendererRegistry {
    async fn load(&self, specifier: &str) -> Result<Arc<dyn StepProvider>> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(specifier)
            .cloned()
            .ok_or_else(|| MapclayError::ModuleLoad {
                specifier: specifier.to_string(),
                reason: "no renderer registered".to_string(),
            })?;
        Ok(factory())
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("specifiers", &self.specifiers())
            .finish()
    }
}

/// Build a renderer for `config` and copy its options in.
///
/// An explicit renderer wins over `use`; a string `use` is loaded through
/// `loader`; a missing or null `use` gives a renderer without steps.
pub async fn materialize(config: Config, loader: &dyn ModuleLoader) -> Result<Renderer> {
    let mut renderer = match (&config.renderer, config.use_ref()) {
        (Some(provider), _) => Renderer::new(provider.clone()),
        (None, Some(Value::String(specifier))) => {
            log::debug!("loading renderer module {specifier}");
            Renderer::new(loader.load(specifier).await?)
        }
        (None, None | Some(Value::Null)) => Renderer::bare(),
        (None, Some(other)) => {
            return Err(MapclayError::UnresolvableRenderer(other.to_string()));
        }
    };
    renderer.assign(config);
    Ok(renderer)
}

/// A renderer is usable once it has a step list.
pub fn health_check(renderer: &Renderer) -> Result<()> {
    if renderer.has_steps() {
        Ok(())
    } else {
        Err(MapclayError::Unhealthy)
    }
}
