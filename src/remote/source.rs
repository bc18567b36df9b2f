use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};

use crate::prelude::HashMap;
use crate::{MapclayError, Result};

/// Shared HTTP client with a custom User-Agent. Building the client once
/// avoids the cost of TLS and connection pool setup for every preset.
pub(crate) static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("mapclay/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|err| {
            log::warn!("falling back to a default HTTP client: {err}");
            Client::new()
        })
});

/// Anything that can fetch the raw text of a remote configuration.
#[async_trait]
pub trait ConfigFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetches presets over HTTP(S) with a single GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        log::debug!("fetching preset {url}");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(MapclayError::PresetFetch {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }
        Ok(response.text().await?)
    }
}

/// In-memory documents keyed by URL, for offline use and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    documents: Arc<Mutex<HashMap<String, String>>>,
    fetches: Arc<AtomicUsize>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, url: &str, text: &str) -> Self {
        self.insert(url, text);
        self
    }

    pub fn insert(&self, url: &str, text: &str) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), text.to_string());
    }

    /// Number of fetches served so far, including misses.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
            .ok_or_else(|| MapclayError::PresetFetch {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_fetcher() {
        let fetcher = MemoryFetcher::new().with_document("https://example.com/a.yaml", "zoom: 3");

        assert_eq!(fetcher.fetch("https://example.com/a.yaml").await.unwrap(), "zoom: 3");
        let missing = fetcher.fetch("https://example.com/b.yaml").await;
        assert!(matches!(missing, Err(MapclayError::PresetFetch { .. })));
        assert_eq!(fetcher.fetch_count(), 2);
    }
}
