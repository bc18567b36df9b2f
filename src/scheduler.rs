//! Render scheduler.
//!
//! [`Mapclay::render`] takes a parent element and a batch of configurations.
//! Each configuration gets its own child container; unchanged containers that
//! already rendered successfully are left alone. Every other entry gets its
//! own future running the preparation pipeline (aliases, preset, aliases
//! again, renderer, health check) and then the step engine. The futures are
//! independent: an entry with `preset: last` resolves its previous sibling's
//! configuration itself instead of waiting for that sibling to render.

use std::fmt;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use crate::core::builder::MapclayBuilder;
use crate::core::config::Config;
use crate::core::constants::CONTAINER_CLASS;
use crate::core::element::{Element, RenderStatus};
use crate::data::yaml::parse_configs;
use crate::options::alias::set_value_by_aliases;
use crate::options::preset::PresetMerger;
use crate::renderer::engine::run_steps;
use crate::renderer::materialize::{health_check, materialize, ModuleLoader};
use crate::renderer::{Phase, Renderer, StepPayload, StepResult, StepState};
use crate::{MapclayError, Result};

/// Input conversion applied to every configuration before anything else.
pub type Converter = Arc<dyn Fn(Config) -> Config + Send + Sync>;

/// Entry point that renders configurations into containers.
#[derive(Clone)]
pub struct Mapclay {
    converter: Option<Converter>,
    loader: Arc<dyn ModuleLoader>,
    presets: PresetMerger,
}

/// One configuration of a batch after provisioning.
struct Entry {
    config: Config,
    /// Render generation of the target; `None` when the container is reused.
    generation: Option<u64>,
}

/// What a `preset: last` configuration inherits from.
#[derive(Clone)]
enum Preceding {
    /// Converted sibling configuration, resolved on demand.
    Pending {
        config: Config,
        preceding: Option<Box<Preceding>>,
    },
    /// Sibling already resolved, `None` when that failed.
    Resolved(Option<Config>),
}

/// A preparation step that stopped the render.
struct Stopped {
    step: &'static str,
    error: MapclayError,
}

impl Stopped {
    fn at(step: &'static str) -> impl FnOnce(MapclayError) -> Self {
        move |error| Self { step, error }
    }

    fn record(self, results: &mut Vec<StepResult>) {
        log::warn!("{} stopped the render: {}", self.step, self.error);
        results.push(StepResult::new(
            Phase::Prepare,
            self.step,
            StepState::Stop,
            StepPayload::Error(self.error.into()),
        ));
    }
}

impl Mapclay {
    pub fn builder() -> MapclayBuilder {
        MapclayBuilder::new()
    }

    pub fn new() -> Self {
        MapclayBuilder::new().build()
    }

    pub(crate) fn from_parts(
        converter: Option<Converter>,
        loader: Arc<dyn ModuleLoader>,
        presets: PresetMerger,
    ) -> Self {
        Self {
            converter,
            loader,
            presets,
        }
    }

    pub fn loader(&self) -> &Arc<dyn ModuleLoader> {
        &self.loader
    }

    pub fn presets(&self) -> &PresetMerger {
        &self.presets
    }

    pub fn convert(&self, config: Config) -> Config {
        match &self.converter {
            Some(converter) => converter(config),
            None => config,
        }
    }

    /// Render `configs` as children of `container`, in order.
    ///
    /// Containers are assigned and attached before this returns, and written
    /// back into `configs`, so rendering the same slice again skips every map
    /// that is unchanged and fulfilled. Returns one future per entry that
    /// runs, in input order; each settles on its own.
    pub fn render(
        &self,
        container: &Element,
        configs: &mut [Config],
    ) -> Vec<BoxFuture<'_, Renderer>> {
        log::debug!("rendering {} configuration(s)", configs.len());

        let mut entries = Vec::with_capacity(configs.len());
        for original in configs.iter_mut() {
            let mut config = self.convert(original.clone());
            let generation = provision(&mut config);
            original.target = config.target.clone();
            entries.push(Entry { config, generation });
        }

        container.replace_children(
            entries
                .iter()
                .filter_map(|entry| entry.config.target.clone())
                .collect(),
        );

        link_presets(entries)
            .into_iter()
            .map(|(config, preceding, generation)| {
                self.run_entry(config, preceding, generation).boxed()
            })
            .collect()
    }

    /// Render `configs` and wait for every entry that runs.
    pub async fn render_all(&self, container: &Element, configs: &mut [Config]) -> Vec<Renderer> {
        join_all(self.render(container, configs)).await
    }

    /// Render a single configuration into `container`.
    pub async fn render_one(&self, container: &Element, config: &mut Config) -> Option<Renderer> {
        let pending = self.render(container, std::slice::from_mut(config)).pop()?;
        Some(pending.await)
    }

    /// Parse YAML text, or the container's own text content, and render it.
    pub async fn render_by_yaml(
        &self,
        container: &Element,
        text: Option<&str>,
    ) -> Result<Vec<Renderer>> {
        let text = match text {
            Some(text) => text.to_string(),
            None => container.text_content(),
        };
        let mut configs = parse_configs(&text)?;
        Ok(self.render_all(container, &mut configs).await)
    }

    /// Resolve aliases and presets of a batch without rendering anything.
    pub async fn resolve(&self, configs: &[Config]) -> Vec<Result<Config>> {
        let mut resolved: Vec<Result<Config>> = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            let config = self.convert(config.clone());
            let preceding = (index > 0 && needs_previous(&config)).then(|| {
                Preceding::Resolved(resolved.last().and_then(|last| last.as_ref().ok()).cloned())
            });

            let outcome = self
                .resolve_entry(config, preceding, &mut Vec::new())
                .await
                .map_err(|stopped| stopped.error);
            resolved.push(outcome);
        }
        resolved
    }

    async fn run_entry(
        &self,
        config: Config,
        preceding: Option<Preceding>,
        generation: u64,
    ) -> Renderer {
        let target = config.target.clone();

        let mut results = Vec::new();
        let renderer = match self.resolve_entry(config, preceding, &mut results).await {
            Ok(config) => self.prepare_renderer(config, &mut results).await,
            Err(stopped) => {
                stopped.record(&mut results);
                None
            }
        };
        let mut renderer = renderer.unwrap_or_else(|| {
            let mut bare = Renderer::bare();
            bare.target = target;
            bare
        });

        results.append(&mut renderer.results);
        renderer.results = results;
        renderer.set_generation(generation);

        let status = run_steps(&mut renderer).await;
        log::info!(
            "rendered {} with {}: {status}",
            renderer
                .target
                .as_ref()
                .and_then(Element::id)
                .unwrap_or_else(|| "container".to_string()),
            renderer.id().unwrap_or("no renderer"),
        );
        renderer
    }

    /// Aliases, preceding sibling, preset, aliases again.
    fn resolve_entry<'a>(
        &'a self,
        mut config: Config,
        preceding: Option<Preceding>,
        results: &'a mut Vec<StepResult>,
    ) -> BoxFuture<'a, std::result::Result<Config, Stopped>> {
        async move {
            set_value_by_aliases(&mut config);
            passed(results, "set_value_by_aliases");

            let previous = match preceding {
                Some(preceding) => {
                    let previous = self
                        .await_preceding(preceding)
                        .await
                        .map_err(Stopped::at("await_preceding"))?;
                    passed(results, "await_preceding");
                    Some(previous)
                }
                None => None,
            };

            let mut config = self
                .presets
                .apply(config, previous.as_ref())
                .await
                .map_err(Stopped::at("apply_preset"))?;
            passed(results, "apply_preset");

            set_value_by_aliases(&mut config);
            passed(results, "set_value_by_aliases");
            Ok(config)
        }
        .boxed()
    }

    async fn await_preceding(&self, preceding: Preceding) -> Result<Config> {
        match preceding {
            Preceding::Resolved(config) => config.ok_or(MapclayError::PrecedingConfigUnavailable),
            Preceding::Pending { config, preceding } => {
                let mut scratch = Vec::new();
                self.resolve_entry(config, preceding.map(|p| *p), &mut scratch)
                    .await
                    .map_err(|stopped| {
                        log::debug!(
                            "previous configuration stopped at {}: {}",
                            stopped.step,
                            stopped.error
                        );
                        MapclayError::PrecedingConfigUnavailable
                    })
            }
        }
    }

    async fn prepare_renderer(
        &self,
        config: Config,
        results: &mut Vec<StepResult>,
    ) -> Option<Renderer> {
        let materialized = materialize(config, self.loader.as_ref()).await;
        let renderer = checkpoint(results, "prepare_renderer", materialized)?;
        checkpoint(results, "health_check", health_check(&renderer));
        Some(renderer)
    }
}

impl Default for Mapclay {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mapclay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapclay")
            .field("converter", &self.converter.is_some())
            .field("presets", &self.presets.cache().len())
            .finish()
    }
}

/// Whether `config` inherits from its previous sibling.
fn needs_previous(config: &Config) -> bool {
    config.inherits_last() && config.apply_url().is_none()
}

/// Pick the container of `config`, returning the render generation, or
/// `None` when the container is unchanged and already fulfilled.
fn provision(config: &mut Config) -> Option<u64> {
    let fingerprint = config.fingerprint();

    if let Some(target) = &config.target {
        let unchanged = target.has_class(CONTAINER_CLASS)
            && target.fingerprint().as_deref() == Some(fingerprint.as_str())
            && target.render_status() == Some(RenderStatus::Fulfilled);
        if unchanged {
            log::debug!("container {:?} is up to date", target.id());
            return None;
        }
    }

    let target = config
        .target
        .clone()
        .filter(|target| target.has_class(CONTAINER_CLASS))
        .unwrap_or_else(Element::container);
    if let Some(id) = config.id() {
        target.set_id(id);
        target.set_title(id);
    }
    target.clear_children();
    let generation = target.begin_render(&fingerprint);
    config.target = Some(target);
    Some(generation)
}

/// Keep the entries that run, each with the chain of `preset: last`
/// siblings it inherits from. Reused siblings stay in the chain.
fn link_presets(entries: Vec<Entry>) -> Vec<(Config, Option<Preceding>, u64)> {
    let mut running = Vec::new();
    let mut last: Option<Preceding> = None;

    for (index, Entry { config, generation }) in entries.into_iter().enumerate() {
        let preceding = if index > 0 && needs_previous(&config) {
            last.take()
        } else {
            None
        };
        last = Some(Preceding::Pending {
            config: config.clone(),
            preceding: preceding.clone().map(Box::new),
        });
        if let Some(generation) = generation {
            running.push((config, preceding, generation));
        }
    }
    running
}

fn passed(results: &mut Vec<StepResult>, step: &str) {
    results.push(StepResult::new(
        Phase::Prepare,
        step,
        StepState::Success,
        StepPayload::None,
    ));
}

/// Record a preparation step; a failure stops the render.
fn checkpoint<T>(
    results: &mut Vec<StepResult>,
    step: &'static str,
    outcome: Result<T>,
) -> Option<T> {
    match outcome {
        Ok(value) => {
            passed(results, step);
            Some(value)
        }
        Err(error) => {
            Stopped::at(step)(error).record(results);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(config: Config, runs: bool) -> Entry {
        Entry {
            config,
            generation: runs.then_some(1),
        }
    }

    fn chain_ids(preceding: &Option<Preceding>) -> Vec<String> {
        let mut ids = Vec::new();
        let mut next = preceding.as_ref();
        while let Some(Preceding::Pending { config, preceding }) = next {
            ids.push(config.id().unwrap_or_default().to_string());
            next = preceding.as_deref();
        }
        ids
    }

    #[test]
    fn test_provision_reuses_fulfilled_container() {
        let mut config = Config::from_value(json!({ "id": "a", "zoom": 3 }));
        let generation = provision(&mut config);
        assert_eq!(generation, Some(1));

        let target = config.target.clone().unwrap();
        assert_eq!(target.id().as_deref(), Some("a"));
        assert_eq!(target.title().as_deref(), Some("a"));
        assert_eq!(target.render_status(), Some(RenderStatus::Rendering));

        target.settle(1, RenderStatus::Fulfilled);
        assert_eq!(provision(&mut config), None);

        config.set("zoom", 4);
        assert_eq!(provision(&mut config), Some(2));
        assert!(config.target.as_ref().unwrap().ptr_eq(&target));
    }

    #[test]
    fn test_provision_replaces_foreign_target() {
        let foreign = Element::new("section");
        let mut config = Config::default().with_target(foreign.clone());
        provision(&mut config);
        assert!(!config.target.as_ref().unwrap().ptr_eq(&foreign));
        assert!(config.target.as_ref().unwrap().has_class(CONTAINER_CLASS));
    }

    #[test]
    fn test_link_presets_follows_reused_chain() {
        let config = |id: &str, last: bool| {
            let config = Config::default().with_option("id", id);
            if last {
                config.with_option("preset", "last")
            } else {
                config
            }
        };
        let entries = vec![
            entry(config("a", true), false),
            entry(config("b", false), false),
            entry(config("c", true), false),
            entry(config("d", true), true),
            entry(config("e", false), true),
        ];
        let running = link_presets(entries);

        assert_eq!(running.len(), 2);
        assert_eq!(running[0].0.id(), Some("d"));
        assert_eq!(chain_ids(&running[0].1), ["c", "b"]);
        assert_eq!(running[1].0.id(), Some("e"));
        assert!(running[1].1.is_none());
    }

    #[test]
    fn test_first_entry_does_not_inherit() {
        let running = link_presets(vec![entry(
            Config::from_value(json!({ "preset": "last" })),
            true,
        )]);
        assert!(running[0].1.is_none());
    }

    #[test]
    fn test_apply_wins_over_preset_last() {
        let config = Config::from_value(json!({ "preset": "last", "apply": "https://a.example/c.yaml" }));
        assert!(!needs_previous(&config));
    }
}
