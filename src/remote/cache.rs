use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::core::config::Options;
use crate::data::yaml::parse_document;
use crate::prelude::HashMap;
use crate::remote::source::ConfigFetcher;
use crate::{MapclayError, Result};

type PresetFuture = Shared<BoxFuture<'static, std::result::Result<Arc<Options>, String>>>;

static GLOBAL: Lazy<Arc<PresetCache>> = Lazy::new(|| Arc::new(PresetCache::new()));

/// Fetched remote configurations keyed by URL.
///
/// Each URL is fetched at most once: concurrent requests await the same
/// in-flight fetch and later ones reuse its result. Failed fetches are
/// evicted so a later render can try again.
#[derive(Default)]
pub struct PresetCache {
    entries: Mutex<HashMap<String, PresetFuture>>,
}

impl PresetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> Arc<Self> {
        GLOBAL.clone()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, PresetFuture>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the configuration at `url`, fetching it on first use.
    pub async fn get_or_fetch(
        &self,
        url: &str,
        fetcher: Arc<dyn ConfigFetcher>,
    ) -> Result<Arc<Options>> {
        let pending = {
            let mut entries = self.entries();
            match entries.get(url) {
                Some(pending) => {
                    log::debug!("preset cache hit for {url}");
                    pending.clone()
                }
                None => {
                    let pending = fetch_preset(url.to_string(), fetcher);
                    entries.insert(url.to_string(), pending.clone());
                    pending
                }
            }
        };

        match pending.await {
            Ok(options) => Ok(options),
            Err(reason) => {
                let mut entries = self.entries();
                if matches!(entries.get(url).and_then(Shared::peek), Some(Err(_))) {
                    entries.remove(url);
                }
                Err(MapclayError::PresetFetch {
                    url: url.to_string(),
                    reason,
                })
            }
        }
    }

    /// Whether `url` has been fetched successfully.
    pub fn contains(&self, url: &str) -> bool {
        matches!(self.entries().get(url).and_then(Shared::peek), Some(Ok(_)))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

fn fetch_preset(url: String, fetcher: Arc<dyn ConfigFetcher>) -> PresetFuture {
    async move {
        let text = fetcher.fetch(&url).await.map_err(|err| err.to_string())?;
        match parse_document(&text).map_err(|err| err.to_string())? {
            Value::Object(options) => {
                log::info!("fetched preset {url} ({} options)", options.len());
                Ok(Arc::new(options))
            }
            _ => Err("remote document is not a mapping".to_string()),
        }
    }
    .boxed()
    .shared()
}
