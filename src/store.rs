//! Named caches holding response snapshots.
//!
//! A `Cache` associates request identifiers with stored responses; a
//! `CacheStorage` manages the set of named caches and answers lookups
//! across all of them. Entries survive for as long as the storage handle
//! does; nothing here prunes or evicts.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::fetch::{Request, Response};

/// Options controlling how a request is matched against stored entries.
#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    /// Ignore the query string when building the lookup key.
    pub ignore_search: bool,
    /// Ignore the request method when building the lookup key.
    pub ignore_method: bool,
}

/// A stored request/response pair.
#[derive(Debug, Clone)]
struct CacheEntry {
    request: Request,
    response: Response,
}

/// One named cache.
///
/// At most one entry exists per request identifier; a later `put` for the
/// same identifier overwrites the earlier one.
#[derive(Debug)]
pub struct Cache {
    name: String,
    entries: BTreeMap<String, CacheEntry>,
}

impl Cache {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Get the cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a response snapshot keyed by the request identifier.
    pub fn put(&mut self, request: Request, response: Response) {
        let key = make_key(&request, &MatchOptions::default());
        self.entries.insert(key, CacheEntry { request, response });
    }

    /// Look up a stored response for a request.
    pub fn match_request(&self, request: &Request, options: &MatchOptions) -> Option<Response> {
        let key = make_key(request, options);
        self.entries.get(&key).map(|e| e.response.clone())
    }

    /// Remove a stored entry. Returns whether one existed.
    pub fn delete(&mut self, request: &Request, options: &MatchOptions) -> bool {
        let key = make_key(request, options);
        self.entries.remove(&key).is_some()
    }

    /// Requests for all stored entries.
    pub fn keys(&self) -> Vec<Request> {
        self.entries.values().map(|e| e.request.clone()).collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the lookup key for a request.
fn make_key(request: &Request, options: &MatchOptions) -> String {
    let mut key = request.url.clone();

    if options.ignore_search {
        if let Some(pos) = key.find('?') {
            key.truncate(pos);
        }
    }

    if !options.ignore_method {
        key = format!("{}:{}", request.method.as_str(), key);
    }

    key
}

/// The set of named caches available to the agent.
pub struct CacheStorage {
    caches: BTreeMap<String, Cache>,
}

impl CacheStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self {
            caches: BTreeMap::new(),
        }
    }

    /// Open a cache by name, creating it if absent.
    pub fn open(&mut self, name: &str) -> &mut Cache {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    /// Get a cache by name.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    /// Check if a cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Delete a cache wholesale. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// Names of all caches.
    pub fn keys(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    /// Look a request up across all caches, in name order.
    pub fn match_request(&self, request: &Request, options: &MatchOptions) -> Option<Response> {
        self.caches
            .values()
            .find_map(|cache| cache.match_request(request, options))
    }
}

impl Default for CacheStorage {
    fn default() -> Self {
        Self::new()
    }
}
