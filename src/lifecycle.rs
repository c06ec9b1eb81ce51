//! Worker lifecycle: states, dispatched events, and the handler interface.
//!
//! The host owns the state machine. A worker version moves through
//! installing → installed → activating → activated; a failed install or
//! activate, or being superseded, makes it redundant. Transitions out of
//! installing and activating are gated on the matching handler returning.

use alloc::string::String;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::fetch::{FetchError, FetchEvent};

/// Worker ID counter.
static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Create a new unique ID.
    pub fn new() -> Self {
        Self(NEXT_WORKER_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Registered, nothing dispatched yet.
    Parsed,
    /// Install event in flight.
    Installing,
    /// Installed, waiting to activate.
    Installed,
    /// Activate event in flight.
    Activating,
    /// Active and eligible to control contexts.
    Activated,
    /// Failed or superseded; never runs again.
    Redundant,
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::Parsed
    }
}

impl WorkerState {
    /// Check whether a transition to `next` is allowed.
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;

        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Activating)
                | (Activating, Activated)
                | (Activating, Redundant)
                | (Activated, Redundant)
        )
    }
}

/// Install event: dispatched once per new worker version.
#[derive(Debug, Clone)]
pub struct InstallEvent {
    /// Worker the event targets.
    pub worker_id: WorkerId,
}

impl InstallEvent {
    /// Create an install event.
    pub fn new(worker_id: WorkerId) -> Self {
        Self { worker_id }
    }
}

/// Activate event: dispatched when a version starts superseding.
#[derive(Debug, Clone)]
pub struct ActivateEvent {
    /// Worker the event targets.
    pub worker_id: WorkerId,
}

impl ActivateEvent {
    /// Create an activate event.
    pub fn new(worker_id: WorkerId) -> Self {
        Self { worker_id }
    }
}

/// Failure raised by an event handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// A network fetch failed.
    Fetch(FetchError),
    /// A precache asset came back with a non-2xx status.
    Precache {
        /// Asset URL.
        url: String,
        /// Status the network returned.
        status: u16,
    },
}

impl From<FetchError> for HandlerError {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}

/// The three-event handler interface a worker implements.
///
/// Handlers are invoked by the host adapter (or a test driving it
/// directly) and must settle; install and activate completion gate the
/// corresponding state transitions.
pub trait EventHandlers: Send + Sync {
    /// Handle the install event.
    fn on_install(&self, event: &InstallEvent) -> Result<(), HandlerError>;

    /// Handle the activate event.
    fn on_activate(&self, event: &ActivateEvent) -> Result<(), HandlerError>;

    /// Handle a fetch event. A response is recorded on the event;
    /// returning without responding hands the request back to the host.
    fn on_fetch(&self, event: &mut FetchEvent) -> Result<(), HandlerError>;
}
