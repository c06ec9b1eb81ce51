//! Offline cache proxy
//!
//! This crate implements a service-worker style offload agent: an
//! event-driven intermediary that sits between client contexts and the
//! network, serving previously stored responses when available and passing
//! through to the network otherwise. A fixed list of assets is precached
//! when a new worker version installs, and activation claims every open
//! client context so the new version intercepts requests immediately.
//!
//! # Architecture
//!
//! - `fetch`: request/response model, fetch events, and the injected
//!   network capability
//! - `store`: named caches holding response snapshots keyed by request
//! - `clients`: registry of open client contexts and the claim takeover
//! - `lifecycle`: worker state machine and the three-event handler interface
//! - `proxy`: the cache proxy itself (precache, claim, cache-first fetch)
//! - `host`: host adapter that registers a worker and dispatches its events
//!
//! The store, network, and client registry are injected `Arc` handles
//! rather than process-wide singletons, so the full install → activate →
//! fetch lifecycle can be exercised with in-memory fakes.

#![no_std]

extern crate alloc;

pub mod clients;
pub mod fetch;
pub mod host;
pub mod lifecycle;
pub mod proxy;
pub mod store;

pub use clients::{ClientInfo, Clients};
pub use fetch::{FetchError, FetchEvent, NetworkBackend, Request, RequestMethod, Response};
pub use host::{HostError, Scope, ScriptUrl, Worker, WorkerHost};
pub use lifecycle::{
    ActivateEvent, EventHandlers, HandlerError, InstallEvent, WorkerId, WorkerState,
};
pub use proxy::{CacheProxy, ProxyConfig, CACHE_NAME, PRECACHE_URLS};
pub use store::{Cache, CacheStorage, MatchOptions};
