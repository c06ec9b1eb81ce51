//! The cache proxy.
//!
//! Precaches a fixed asset list at install time, claims every open client
//! context at activate time, and answers fetches cache-first with a
//! network fallback. The store, network, and client registry are injected
//! handles owned by the host.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::RwLock;

use crate::clients::Clients;
use crate::fetch::{FetchEvent, NetworkBackend, Request};
use crate::lifecycle::{ActivateEvent, EventHandlers, HandlerError, InstallEvent};
use crate::store::{CacheStorage, MatchOptions};

/// Name of the cache populated at install time.
pub const CACHE_NAME: &str = "offline-cache-v1";

/// Assets fetched and stored during install.
pub const PRECACHE_URLS: &[&str] = &["/", "/static/css/style.css"];

/// Proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Cache to populate at install time.
    pub cache_name: String,
    /// Assets to precache.
    pub precache: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            cache_name: CACHE_NAME.to_string(),
            precache: PRECACHE_URLS.iter().map(|url| String::from(*url)).collect(),
        }
    }
}

/// Event-driven cache intermediary.
pub struct CacheProxy {
    config: ProxyConfig,
    stores: Arc<RwLock<CacheStorage>>,
    network: Arc<dyn NetworkBackend>,
    clients: Arc<RwLock<Clients>>,
}

impl CacheProxy {
    /// Create a proxy with the default cache name and precache list.
    pub fn new(
        stores: Arc<RwLock<CacheStorage>>,
        network: Arc<dyn NetworkBackend>,
        clients: Arc<RwLock<Clients>>,
    ) -> Self {
        Self::with_config(ProxyConfig::default(), stores, network, clients)
    }

    /// Create a proxy with an explicit configuration.
    pub fn with_config(
        config: ProxyConfig,
        stores: Arc<RwLock<CacheStorage>>,
        network: Arc<dyn NetworkBackend>,
        clients: Arc<RwLock<Clients>>,
    ) -> Self {
        Self {
            config,
            stores,
            network,
            clients,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

impl EventHandlers for CacheProxy {
    /// Populate the named cache with the precache list, in one batch.
    ///
    /// Every asset is fetched before anything is stored; a failed or
    /// non-2xx fetch rejects the whole batch and the cache is left
    /// untouched.
    fn on_install(&self, _event: &InstallEvent) -> Result<(), HandlerError> {
        log::debug!(
            "[CacheProxy] install: precaching {} assets into {}",
            self.config.precache.len(),
            self.config.cache_name
        );

        let mut fetched = Vec::with_capacity(self.config.precache.len());
        for url in &self.config.precache {
            let request = Request::new(url.clone());
            let response = self.network.fetch(&request)?;
            if !response.ok() {
                return Err(HandlerError::Precache {
                    url: url.clone(),
                    status: response.status,
                });
            }
            fetched.push((request, response));
        }

        let mut stores = self.stores.write();
        let cache = stores.open(&self.config.cache_name);
        for (request, response) in fetched {
            cache.put(request, response);
        }

        log::debug!("[CacheProxy] install: {} assets cached", cache.len());
        Ok(())
    }

    /// Claim every open client context for this worker version.
    fn on_activate(&self, event: &ActivateEvent) -> Result<(), HandlerError> {
        let claimed = self.clients.write().claim(event.worker_id);
        log::debug!("[CacheProxy] activate: claimed {} clients", claimed);
        Ok(())
    }

    /// Serve from the cache when possible, otherwise from the network.
    ///
    /// Lookups run across all caches. Misses are served straight from the
    /// network; nothing is written back.
    fn on_fetch(&self, event: &mut FetchEvent) -> Result<(), HandlerError> {
        let cached = self
            .stores
            .read()
            .match_request(event.request(), &MatchOptions::default());

        if let Some(response) = cached {
            log::debug!("[CacheProxy] fetch: cache hit for {}", event.request().url);
            event.respond_with(response);
            return Ok(());
        }

        log::debug!("[CacheProxy] fetch: cache miss for {}", event.request().url);
        let response = self.network.fetch(event.request())?;
        event.respond_with(response);
        Ok(())
    }
}
