//! Host adapter.
//!
//! Owns the injected capabilities (cache storage, client registry, network)
//! and at most one registered worker. Dispatches the install, activate, and
//! fetch events to the worker's handlers and enforces the lifecycle state
//! machine around them: a transition out of installing or activating only
//! happens once the handler has returned, and a handler failure makes the
//! worker version redundant.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use spin::RwLock;

use crate::clients::{ClientInfo, Clients};
use crate::fetch::{FetchEvent, NetworkBackend, Request, Response};
use crate::lifecycle::{
    ActivateEvent, EventHandlers, HandlerError, InstallEvent, WorkerId, WorkerState,
};
use crate::store::CacheStorage;

/// URL path prefix a worker is responsible for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope(String);

impl Scope {
    /// Create a scope, normalizing the trailing slash.
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self(path)
    }

    /// Get the path.
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Check if a URL is within this scope.
    pub fn contains(&self, url: &str) -> bool {
        url.starts_with(&self.0)
    }
}

/// Worker script URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptUrl(String);

impl ScriptUrl {
    /// Create a script URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Get the URL.
    pub fn url(&self) -> &str {
        &self.0
    }

    /// Default scope: the directory the script lives in.
    pub fn directory_scope(&self) -> Scope {
        let mut path = self.0.clone();
        if let Some(pos) = path.rfind('/') {
            path.truncate(pos + 1);
        }
        Scope::new(path)
    }
}

/// One registered worker version.
#[derive(Debug)]
pub struct Worker {
    id: WorkerId,
    script_url: ScriptUrl,
    scope: Scope,
    state: WorkerState,
}

impl Worker {
    fn new(script_url: ScriptUrl, scope: Scope) -> Self {
        Self {
            id: WorkerId::new(),
            script_url,
            scope,
            state: WorkerState::Parsed,
        }
    }

    /// Get the worker ID.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Get the script URL.
    pub fn script_url(&self) -> &ScriptUrl {
        &self.script_url
    }

    /// Get the scope.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Get the current state.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Check if the worker is activated.
    pub fn is_active(&self) -> bool {
        self.state == WorkerState::Activated
    }
}

/// Host adapter errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// No worker has been registered.
    NoWorker,
    /// A worker is already registered.
    AlreadyRegistered,
    /// The requested lifecycle transition is not allowed.
    InvalidTransition {
        /// State the worker is in.
        from: WorkerState,
        /// State that was requested.
        to: WorkerState,
    },
    /// An event handler failed.
    Handler(HandlerError),
}

/// Drives one worker through its lifecycle and routes fetches.
pub struct WorkerHost {
    stores: Arc<RwLock<CacheStorage>>,
    clients: Arc<RwLock<Clients>>,
    network: Arc<dyn NetworkBackend>,
    worker: Option<(Worker, Box<dyn EventHandlers>)>,
}

impl WorkerHost {
    /// Create a host around a network capability, with empty storage and
    /// no open clients.
    pub fn new(network: Arc<dyn NetworkBackend>) -> Self {
        Self {
            stores: Arc::new(RwLock::new(CacheStorage::new())),
            clients: Arc::new(RwLock::new(Clients::new())),
            network,
            worker: None,
        }
    }

    /// Handle to the cache storage.
    pub fn stores(&self) -> Arc<RwLock<CacheStorage>> {
        self.stores.clone()
    }

    /// Handle to the client registry.
    pub fn clients(&self) -> Arc<RwLock<Clients>> {
        self.clients.clone()
    }

    /// Handle to the network capability.
    pub fn network(&self) -> Arc<dyn NetworkBackend> {
        self.network.clone()
    }

    /// The registered worker, if any.
    pub fn worker(&self) -> Option<&Worker> {
        self.worker.as_ref().map(|(worker, _)| worker)
    }

    /// Register a worker version.
    ///
    /// Without an explicit scope the worker is scoped to the directory its
    /// script lives in. At most one worker is registered at a time.
    pub fn register(
        &mut self,
        script_url: impl Into<String>,
        scope: Option<&str>,
        handlers: Box<dyn EventHandlers>,
    ) -> Result<WorkerId, HostError> {
        if self.worker.is_some() {
            return Err(HostError::AlreadyRegistered);
        }

        let script_url = ScriptUrl::new(script_url);
        let scope = match scope {
            Some(path) => Scope::new(path),
            None => script_url.directory_scope(),
        };

        let worker = Worker::new(script_url, scope);
        let id = worker.id;
        log::debug!(
            "[WorkerHost] registered worker {} for scope {}",
            id.raw(),
            worker.scope.path()
        );
        self.worker = Some((worker, handlers));
        Ok(id)
    }

    /// Note a newly opened client context.
    ///
    /// Contexts opened under an activated worker's scope are controlled
    /// from the start; everything else waits for a claim.
    pub fn connect_client(&mut self, client: ClientInfo) {
        let controller = self
            .worker
            .as_ref()
            .filter(|(worker, _)| worker.is_active() && worker.scope.contains(&client.url))
            .map(|(worker, _)| worker.id);

        let id = client.id.clone();
        let mut clients = self.clients.write();
        clients.add(client);
        if let Some(worker_id) = controller {
            clients.set_controller(&id, worker_id);
        }
    }

    /// Note a torn-down client context.
    pub fn disconnect_client(&mut self, id: &str) {
        self.clients.write().remove(id);
    }

    /// Dispatch the install event.
    ///
    /// Returns once the handler has settled; on failure the worker version
    /// is redundant and never activates.
    pub fn install(&mut self) -> Result<(), HostError> {
        let (worker, handlers) = self.worker.as_mut().ok_or(HostError::NoWorker)?;
        transition(worker, WorkerState::Installing)?;

        let event = InstallEvent::new(worker.id);
        match handlers.on_install(&event) {
            Ok(()) => transition(worker, WorkerState::Installed),
            Err(err) => {
                log::warn!("[WorkerHost] install failed: {:?}", err);
                worker.state = WorkerState::Redundant;
                Err(HostError::Handler(err))
            }
        }
    }

    /// Dispatch the activate event.
    pub fn activate(&mut self) -> Result<(), HostError> {
        let (worker, handlers) = self.worker.as_mut().ok_or(HostError::NoWorker)?;
        transition(worker, WorkerState::Activating)?;

        let event = ActivateEvent::new(worker.id);
        match handlers.on_activate(&event) {
            Ok(()) => transition(worker, WorkerState::Activated),
            Err(err) => {
                log::warn!("[WorkerHost] activate failed: {:?}", err);
                worker.state = WorkerState::Redundant;
                Err(HostError::Handler(err))
            }
        }
    }

    /// Route an outgoing request.
    ///
    /// Requests from contexts controlled by the activated worker go through
    /// its fetch handler; everything else goes straight to the network.
    pub fn dispatch_fetch(&self, request: Request) -> Result<Response, HostError> {
        let interceptor = self.worker.as_ref().filter(|(worker, _)| {
            worker.is_active()
                && request
                    .client_id
                    .as_deref()
                    .map(|id| self.clients.read().controller_of(id) == Some(worker.id))
                    .unwrap_or(false)
        });

        match interceptor {
            Some((_, handlers)) => {
                let mut event = FetchEvent::new(request);
                handlers.on_fetch(&mut event).map_err(HostError::Handler)?;
                match event.take_response() {
                    Some(response) => Ok(response),
                    // Handler declined to respond; default network path.
                    None => self
                        .network
                        .fetch(event.request())
                        .map_err(|err| HostError::Handler(HandlerError::Fetch(err))),
                }
            }
            None => self
                .network
                .fetch(&request)
                .map_err(|err| HostError::Handler(HandlerError::Fetch(err))),
        }
    }
}

/// Apply a validated state transition.
fn transition(worker: &mut Worker, to: WorkerState) -> Result<(), HostError> {
    if !worker.state.can_transition_to(to) {
        return Err(HostError::InvalidTransition {
            from: worker.state,
            to,
        });
    }
    log::debug!("[WorkerHost] worker {}: {:?}", worker.id.raw(), to);
    worker.state = to;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::proxy::{CacheProxy, CACHE_NAME};
    use alloc::collections::BTreeMap;
    use alloc::vec::Vec;
    use spin::Mutex;

    struct RoutedNetwork {
        routes: BTreeMap<String, Response>,
        calls: Mutex<Vec<String>>,
    }

    impl RoutedNetwork {
        fn serving(routes: &[(&str, &[u8])]) -> Self {
            let routes = routes
                .iter()
                .map(|(url, body)| {
                    (String::from(*url), Response::new(200).with_body(*body))
                })
                .collect();
            Self {
                routes,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls_for(&self, url: &str) -> usize {
            self.calls.lock().iter().filter(|u| *u == url).count()
        }
    }

    impl NetworkBackend for RoutedNetwork {
        fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            self.calls.lock().push(request.url.clone());
            Ok(self
                .routes
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| Response::new(404)))
        }
    }

    struct OfflineNetwork;

    impl NetworkBackend for OfflineNetwork {
        fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            Err(FetchError::Unreachable(request.url.clone()))
        }
    }

    /// Returns Ok from every handler without responding to fetches.
    struct DeclineHandlers;

    impl EventHandlers for DeclineHandlers {
        fn on_install(&self, _event: &InstallEvent) -> Result<(), HandlerError> {
            Ok(())
        }

        fn on_activate(&self, _event: &ActivateEvent) -> Result<(), HandlerError> {
            Ok(())
        }

        fn on_fetch(&self, _event: &mut FetchEvent) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    fn host_with_proxy() -> (WorkerHost, Arc<RoutedNetwork>) {
        let network = Arc::new(RoutedNetwork::serving(&[
            ("/", b"<html>index</html>"),
            ("/static/css/style.css", b"body{}"),
            ("/other.png", b"png-bytes"),
        ]));
        let mut host = WorkerHost::new(network.clone());
        let proxy = CacheProxy::new(host.stores(), network.clone(), host.clients());
        host.register("/sw.js", Some("/"), Box::new(proxy)).unwrap();
        (host, network)
    }

    #[test]
    fn test_scope_contains() {
        let scope = Scope::new("/app");
        assert_eq!(scope.path(), "/app/");
        assert!(scope.contains("/app/index.html"));
        assert!(!scope.contains("/other/page.html"));
    }

    #[test]
    fn test_default_scope_is_script_directory() {
        assert_eq!(ScriptUrl::new("/sw.js").directory_scope().path(), "/");
        assert_eq!(
            ScriptUrl::new("/app/sw.js").directory_scope().path(),
            "/app/"
        );
    }

    #[test]
    fn test_register_twice_fails() {
        let (mut host, _) = host_with_proxy();
        let result = host.register("/sw2.js", None, Box::new(DeclineHandlers));
        assert_eq!(result, Err(HostError::AlreadyRegistered));
    }

    #[test]
    fn test_install_without_worker() {
        let mut host = WorkerHost::new(Arc::new(OfflineNetwork));
        assert_eq!(host.install(), Err(HostError::NoWorker));
    }

    #[test]
    fn test_install_then_activate() {
        let (mut host, _) = host_with_proxy();
        assert_eq!(host.worker().unwrap().state(), WorkerState::Parsed);

        host.install().unwrap();
        assert_eq!(host.worker().unwrap().state(), WorkerState::Installed);
        assert!(host.stores().read().has(CACHE_NAME));

        host.activate().unwrap();
        assert!(host.worker().unwrap().is_active());
    }

    #[test]
    fn test_activate_before_install_rejected() {
        let (mut host, _) = host_with_proxy();
        assert_eq!(
            host.activate(),
            Err(HostError::InvalidTransition {
                from: WorkerState::Parsed,
                to: WorkerState::Activating,
            })
        );
    }

    #[test]
    fn test_install_failure_makes_worker_redundant() {
        let network = Arc::new(OfflineNetwork);
        let mut host = WorkerHost::new(network.clone());
        let proxy = CacheProxy::new(host.stores(), network, host.clients());
        host.register("/sw.js", None, Box::new(proxy)).unwrap();

        assert!(matches!(host.install(), Err(HostError::Handler(_))));
        assert_eq!(host.worker().unwrap().state(), WorkerState::Redundant);
        // A failed version never activates.
        assert!(matches!(
            host.activate(),
            Err(HostError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_open_client_intercepted_after_activate() {
        let (mut host, network) = host_with_proxy();
        host.connect_client(ClientInfo::new("tab-1", "/"));
        host.install().unwrap();
        host.activate().unwrap();

        // Claimed at activation, so the very next fetch is intercepted.
        let response = host
            .dispatch_fetch(Request::new("/").with_client_id("tab-1"))
            .unwrap();
        assert_eq!(response.body.as_deref(), Some(&b"<html>index</html>"[..]));
        // Served from the cache: only the install-time fetch hit the network.
        assert_eq!(network.calls_for("/"), 1);
    }

    #[test]
    fn test_uncontrolled_client_bypasses_proxy() {
        let (mut host, network) = host_with_proxy();
        host.install().unwrap();
        // Not yet activated: the context stays uncontrolled.
        host.connect_client(ClientInfo::new("tab-1", "/"));

        let response = host
            .dispatch_fetch(Request::new("/").with_client_id("tab-1"))
            .unwrap();
        assert!(response.ok());
        assert_eq!(network.calls_for("/"), 2);
    }

    #[test]
    fn test_fetch_without_client_goes_to_network() {
        let (mut host, network) = host_with_proxy();
        host.install().unwrap();
        host.activate().unwrap();

        let response = host.dispatch_fetch(Request::new("/other.png")).unwrap();
        assert_eq!(response.body.as_deref(), Some(&b"png-bytes"[..]));
        assert_eq!(network.calls_for("/other.png"), 1);
    }

    #[test]
    fn test_miss_from_controlled_client_leaves_cache_unchanged() {
        let (mut host, network) = host_with_proxy();
        host.connect_client(ClientInfo::new("tab-1", "/"));
        host.install().unwrap();
        host.activate().unwrap();

        let response = host
            .dispatch_fetch(Request::new("/other.png").with_client_id("tab-1"))
            .unwrap();
        assert_eq!(response.body.as_deref(), Some(&b"png-bytes"[..]));
        assert_eq!(network.calls_for("/other.png"), 1);
        assert_eq!(host.stores().read().get(CACHE_NAME).unwrap().len(), 2);
    }

    #[test]
    fn test_client_connected_after_activate_is_controlled() {
        let (mut host, _) = host_with_proxy();
        host.install().unwrap();
        host.activate().unwrap();

        host.connect_client(ClientInfo::new("tab-2", "/recipes"));
        assert!(host.clients().read().is_controlled("tab-2"));
    }

    #[test]
    fn test_out_of_scope_client_not_controlled() {
        let network = Arc::new(RoutedNetwork::serving(&[("/app/", b"app")]));
        let mut host = WorkerHost::new(network);
        host.register("/app/sw.js", None, Box::new(DeclineHandlers))
            .unwrap();
        host.install().unwrap();
        host.activate().unwrap();

        host.connect_client(ClientInfo::new("tab-1", "/elsewhere"));
        assert!(!host.clients().read().is_controlled("tab-1"));
        host.connect_client(ClientInfo::new("tab-2", "/app/recipes"));
        assert!(host.clients().read().is_controlled("tab-2"));
    }

    #[test]
    fn test_declining_handler_falls_back_to_network() {
        let network = Arc::new(RoutedNetwork::serving(&[("/", b"index")]));
        let mut host = WorkerHost::new(network.clone());
        host.register("/sw.js", Some("/"), Box::new(DeclineHandlers))
            .unwrap();
        host.connect_client(ClientInfo::new("tab-1", "/"));
        host.install().unwrap();
        host.activate().unwrap();
        // DeclineHandlers::on_activate claims nothing, so control the
        // context by hand to reach the fetch handler.
        let worker_id = host.worker().unwrap().id();
        host.clients().write().set_controller("tab-1", worker_id);

        let response = host
            .dispatch_fetch(Request::new("/").with_client_id("tab-1"))
            .unwrap();
        assert_eq!(response.body.as_deref(), Some(&b"index"[..]));
        assert_eq!(network.calls_for("/"), 1);
    }

    #[test]
    fn test_disconnect_client() {
        let (mut host, _) = host_with_proxy();
        host.connect_client(ClientInfo::new("tab-1", "/"));
        host.disconnect_client("tab-1");
        assert!(host.clients().read().get("tab-1").is_none());
    }
}
