//! Server lifecycle.
//!
//! A [`SilaServer`] hosts one or more features as a running, discoverable
//! RPC service. Its life is linear: constructed (identity validated, the
//! built-in SiLAService feature auto-registered), serving (socket bound,
//! accept loop running, optionally announced via a discovery
//! broadcaster), stopped (terminal; a new server must be constructed to
//! serve again).
//!
//! Teardown ordering in [`SilaServer::stop`] guarantees no new discovery,
//! no new subscription events, and no new implementation-originated work
//! once shutdown begins: the RPC shutdown signal is sent first (its
//! completion is awaited last), then broadcast registrations are
//! withdrawn, then implementations are stopped, then the child-task pool
//! drains.

use crate::broadcaster::{Broadcaster, RegistrationHandle, ServiceInfo};
use crate::child_tasks::ChildTaskExecutor;
use crate::errors::{Result, ServerError};
use crate::identity::{validate_identity, ServerConfig, ServerIdentity};
use crate::interceptor::MetadataInterceptor;
use crate::router::ServerRouter;
use crate::rpc::{RpcServer, RunningRpcServer};
use crate::servicer::{FeatureImplementation, FeatureServicer};
use crate::sila_service::{SilaServiceImpl, SILA_SERVICE_DEFINITION};
use silarpc_framework::{
    BinaryTransferHandler, Feature, FeatureNode, FullyQualifiedIdentifier,
};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// Identity and feature registry shared between the server, its router,
/// and the built-in SiLAService implementation.
pub(crate) struct ServerState {
    pub(crate) uuid: Uuid,
    pub(crate) name: RwLock<String>,
    pub(crate) server_type: String,
    pub(crate) version: String,
    pub(crate) vendor_url: String,
    pub(crate) description: String,
    pub(crate) features: RwLock<BTreeMap<String, Arc<Feature>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Serving,
    Stopped,
}

/// A process-wide RPC server hosting features bound to implementations.
pub struct SilaServer {
    state: Arc<ServerState>,
    router: Arc<ServerRouter>,
    config: ServerConfig,
    binary_transfer_handler: Arc<dyn BinaryTransferHandler>,
    child_tasks: Arc<ChildTaskExecutor>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    registrations: Vec<RegistrationHandle>,
    children: HashMap<FullyQualifiedIdentifier, FeatureNode>,
    lifecycle: Lifecycle,
    running: Option<RunningRpcServer>,
}

impl std::fmt::Debug for SilaServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SilaServer")
            .field("uuid", &self.state.uuid)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl SilaServer {
    /// Creates a server with a validated identity.
    ///
    /// Identity fields are checked against the constraints the built-in
    /// SiLAService feature definition declares for them; a violation
    /// fails construction before any resource is allocated. The
    /// SiLAService feature is auto-registered with its implementation.
    pub fn new(identity: ServerIdentity, config: ServerConfig) -> Result<Self> {
        let sila_service = Feature::new(SILA_SERVICE_DEFINITION)?;
        validate_identity(&identity, &sila_service)?;

        let state = Arc::new(ServerState {
            uuid: identity.server_uuid.unwrap_or_else(Uuid::new_v4),
            name: RwLock::new(identity.server_name),
            server_type: identity.server_type,
            version: identity.server_version,
            vendor_url: identity.server_vendor_url,
            description: identity.server_description,
            features: RwLock::new(BTreeMap::new()),
        });

        let mut server = Self {
            router: Arc::new(ServerRouter::new(state.clone())),
            child_tasks: Arc::new(ChildTaskExecutor::new(config.max_child_task_workers)),
            binary_transfer_handler: Arc::new(crate::binary_store::InMemoryBinaryStore::new()),
            broadcaster: None,
            registrations: Vec::new(),
            children: HashMap::new(),
            lifecycle: Lifecycle::Created,
            running: None,
            config,
            state: state.clone(),
        };

        let implementation = Arc::new(SilaServiceImpl::new(state));
        server.set_feature_implementation(sila_service, implementation)?;

        tracing::info!(uuid = %server.state.uuid, "server constructed");
        Ok(server)
    }

    /// Attaches a discovery broadcaster consulted by `start_insecure`.
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Binds a feature to an implementation and registers it.
    ///
    /// A prior implementation for the same feature identifier is stopped
    /// first; no two live implementations for one identifier coexist.
    /// The feature's child index is merged into the server-wide index,
    /// keyed by fully qualified identifier, so re-registration replaces
    /// rather than duplicates entries. On an already-serving server the
    /// new implementation starts immediately.
    pub fn set_feature_implementation(
        &mut self,
        feature: Feature,
        implementation: Arc<dyn FeatureImplementation>,
    ) -> Result<()> {
        if self.lifecycle == Lifecycle::Stopped {
            return Err(ServerError::InvalidState(
                "cannot register features on a stopped server".to_string(),
            ));
        }

        let feature = Arc::new(feature);
        let identifier = feature.identifier().to_string();

        feature.set_binary_transfer_handler(self.binary_transfer_handler.clone());

        if let Some(previous) = self.router.remove_servicer(&identifier) {
            tracing::info!(feature = %identifier, "replacing feature implementation");
            previous.stop();
        }

        let servicer = Arc::new(FeatureServicer::new(
            feature.clone(),
            implementation,
            self.child_tasks.clone(),
        ));
        if self.lifecycle == Lifecycle::Serving {
            servicer.start();
        }
        self.router.insert_servicer(identifier.clone(), servicer);

        self.state
            .features
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(identifier.clone(), feature.clone());

        for (fqi, node) in feature.children() {
            self.children.insert(fqi.clone(), node.clone());
        }

        tracing::info!(feature = %feature.fully_qualified_identifier(), "feature registered");
        Ok(())
    }

    /// Appends a metadata interceptor; interceptors run on every dispatch
    /// in the order they were added.
    pub fn add_metadata_interceptor(&mut self, interceptor: Arc<dyn MetadataInterceptor>) {
        self.router.add_interceptor(interceptor);
    }

    /// Starts serving on an unauthenticated socket.
    ///
    /// In order: starts every registered implementation's lifecycle hook,
    /// binds the listener, spawns the accept loop, and, when discovery is
    /// enabled and a broadcaster is attached, announces the server.
    /// Discovery is best-effort: a failed registration is logged and does
    /// not fail startup.
    pub async fn start_insecure(
        &mut self,
        address: &str,
        port: u16,
        enable_discovery: bool,
    ) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Serving => {
                return Err(ServerError::InvalidState("server is already serving".to_string()))
            }
            Lifecycle::Stopped => {
                return Err(ServerError::InvalidState(
                    "a stopped server cannot serve again".to_string(),
                ))
            }
        }

        for servicer in self.router.servicers() {
            servicer.start();
        }

        let addr: SocketAddr = format!("{address}:{port}").parse()?;
        let running =
            RpcServer::start(self.router.clone(), addr, self.config.max_rpc_workers).await?;

        if enable_discovery {
            if let Some(broadcaster) = &self.broadcaster {
                let info = ServiceInfo {
                    server_uuid: self.state.uuid,
                    server_name: self
                        .state
                        .name
                        .read()
                        .unwrap_or_else(|e| e.into_inner())
                        .clone(),
                    address: address.to_string(),
                    port: running.local_addr().port(),
                };
                match broadcaster.register_server(&info) {
                    Ok(handle) => self.registrations.push(handle),
                    Err(err) => tracing::warn!("discovery registration failed: {err}"),
                }
            }
        }

        tracing::info!(address = %running.local_addr(), "server serving");
        self.running = Some(running);
        self.lifecycle = Lifecycle::Serving;
        Ok(())
    }

    /// Stops the server. Terminal; idempotent.
    ///
    /// Requests graceful RPC shutdown immediately, then unregisters every
    /// broadcast handle exactly once, cancels subscriptions and stops
    /// each implementation, drains the child-task pool, and finally
    /// blocks on RPC shutdown completion, bounded by `grace_period` when
    /// given.
    pub async fn stop(&mut self, grace_period: Option<Duration>) -> Result<()> {
        if self.lifecycle == Lifecycle::Stopped {
            return Ok(());
        }
        tracing::info!("stopping server");

        let completion = self.running.take().map(RunningRpcServer::shutdown);

        if let Some(broadcaster) = &self.broadcaster {
            for handle in self.registrations.drain(..) {
                if let Err(err) = broadcaster.unregister_server(handle) {
                    tracing::warn!("discovery unregistration failed: {err}");
                }
            }
        }

        for servicer in self.router.servicers() {
            servicer.stop();
        }

        self.child_tasks.shutdown().await;

        if let Some(completion) = completion {
            match grace_period {
                Some(grace) => {
                    if tokio::time::timeout(grace, completion).await.is_err() {
                        tracing::warn!("grace period elapsed before RPC server drained");
                    }
                }
                None => {
                    let _ = completion.await;
                }
            }
        }

        self.lifecycle = Lifecycle::Stopped;
        tracing::info!("server stopped");
        Ok(())
    }

    pub fn server_uuid(&self) -> Uuid {
        self.state.uuid
    }

    pub fn server_name(&self) -> String {
        self.state
            .name
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_server_name(&self, name: impl Into<String>) {
        *self.state.name.write().unwrap_or_else(|e| e.into_inner()) = name.into();
    }

    /// Registered features keyed by their short identifier.
    pub fn features(&self) -> BTreeMap<String, Arc<Feature>> {
        self.state
            .features
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Server-wide node lookup across every registered feature.
    pub fn child(&self, identifier: &FullyQualifiedIdentifier) -> Option<&FeatureNode> {
        self.children.get(identifier)
    }

    /// The servicer bound to a feature, for programmatic access such as
    /// property subscription.
    pub fn servicer(&self, feature_identifier: &str) -> Option<Arc<FeatureServicer>> {
        self.router.servicer(feature_identifier)
    }

    /// Bound address while serving.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(RunningRpcServer::local_addr)
    }
}
