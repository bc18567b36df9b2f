//! Preset and inheritance merging.
//!
//! A configuration can sit on top of a base configuration: a remote document
//! named by `apply`, or the previous sibling in the same batch when it says
//! `preset: last`. Merging is eager and structural: the configuration's own
//! options win, except `aliases` which are merged per alias.

use std::sync::Arc;

use crate::core::config::{Config, Options};
use crate::options::alias::merge_aliases;
use crate::remote::{ConfigFetcher, HttpFetcher, PresetCache};
use crate::Result;

/// Options never inherited from a previous sibling.
const NON_INHERITED: [&str; 1] = ["id"];

/// Merge `config` over `base`.
pub fn merge_preset(base: &Options, mut config: Config) -> Config {
    let aliases = (base.contains_key("aliases") || config.options.contains_key("aliases"))
        .then(|| merge_aliases(base.get("aliases"), config.options.get("aliases")));

    let mut options = base.clone();
    options.extend(std::mem::take(&mut config.options));
    if let Some(aliases) = aliases {
        options.insert("aliases".to_string(), aliases);
    }
    config.options = options;
    config
}

/// Merge `config` over the resolved configuration of its previous sibling.
pub fn inherit_from(previous: &Config, config: Config) -> Config {
    let mut base = previous.options.clone();
    for key in NON_INHERITED {
        base.remove(key);
    }

    let own_renderer = config.renderer.is_some() || config.options.contains_key("use");
    let mut merged = merge_preset(&base, config);
    if !own_renderer {
        merged.renderer = previous.renderer.clone();
    }
    merged
}

/// Applies `apply` and `preset: last` to configurations.
#[derive(Clone)]
pub struct PresetMerger {
    cache: Arc<PresetCache>,
    fetcher: Arc<dyn ConfigFetcher>,
}

impl PresetMerger {
    pub fn new(cache: Arc<PresetCache>, fetcher: Arc<dyn ConfigFetcher>) -> Self {
        Self { cache, fetcher }
    }

    pub fn cache(&self) -> &Arc<PresetCache> {
        &self.cache
    }

    /// Resolve the base of `config`, if any, and merge it underneath.
    ///
    /// `previous` is the resolved previous sibling, `None` for the first
    /// configuration of a batch. `apply` takes precedence over `preset: last`.
    pub async fn apply(&self, config: Config, previous: Option<&Config>) -> Result<Config> {
        if let Some(url) = config.apply_url().map(str::to_string) {
            let base = self.cache.get_or_fetch(&url, self.fetcher.clone()).await?;
            log::debug!("applying preset {url}");
            return Ok(merge_preset(&base, config));
        }

        match previous {
            Some(previous) if config.inherits_last() => {
                log::debug!("inheriting options of the previous configuration");
                Ok(inherit_from(previous, config))
            }
            _ => Ok(config),
        }
    }
}

impl Default for PresetMerger {
    fn default() -> Self {
        Self::new(PresetCache::global(), Arc::new(HttpFetcher::new()))
    }
}
