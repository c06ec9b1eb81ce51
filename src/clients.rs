//! Client context registry.
//!
//! Tracks the open client contexts (pages) the host knows about and which
//! worker controls each of them. `claim` is the takeover capability used
//! at activation: every registered context becomes controlled at once,
//! instead of waiting for its next reload.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::lifecycle::WorkerId;

/// An open client context.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    /// Client ID.
    pub id: String,
    /// URL the context is showing.
    pub url: String,
}

impl ClientInfo {
    /// Create a client descriptor.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// Registry of open client contexts.
pub struct Clients {
    clients: Vec<ClientInfo>,
    controllers: BTreeMap<String, WorkerId>,
}

impl Clients {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            clients: Vec::new(),
            controllers: BTreeMap::new(),
        }
    }

    /// Register an open context. New contexts start uncontrolled.
    pub fn add(&mut self, client: ClientInfo) {
        self.clients.push(client);
    }

    /// Remove a context, clearing its controller. Returns whether it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let len_before = self.clients.len();
        self.clients.retain(|c| c.id != id);
        self.controllers.remove(id);
        self.clients.len() != len_before
    }

    /// Get a context by ID.
    pub fn get(&self, id: &str) -> Option<&ClientInfo> {
        self.clients.iter().find(|c| c.id == id)
    }

    /// All registered contexts.
    pub fn match_all(&self) -> Vec<&ClientInfo> {
        self.clients.iter().collect()
    }

    /// Number of registered contexts.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Check if no contexts are registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Which worker controls a context, if any.
    pub fn controller_of(&self, id: &str) -> Option<WorkerId> {
        self.controllers.get(id).copied()
    }

    /// Check if a context is controlled by any worker.
    pub fn is_controlled(&self, id: &str) -> bool {
        self.controllers.contains_key(id)
    }

    /// Put one context under a worker's control.
    pub fn set_controller(&mut self, id: &str, worker: WorkerId) {
        if self.clients.iter().any(|c| c.id == id) {
            self.controllers.insert(String::from(id), worker);
        }
    }

    /// Take control of every registered context at once.
    ///
    /// Returns how many contexts the worker now controls. Contexts added
    /// afterwards start uncontrolled until the host assigns them.
    pub fn claim(&mut self, worker: WorkerId) -> usize {
        for client in &self.clients {
            self.controllers.insert(client.id.clone(), worker);
        }
        self.clients.len()
    }
}

impl Default for Clients {
    fn default() -> Self {
        Self::new()
    }
}
