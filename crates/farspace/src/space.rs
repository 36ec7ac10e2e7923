//! # The Remote Space
//!
//! The runtime-context value that ties the registry, host table, proxy
//! cache, rendezvous store, and worker pool to a set of connections. Both
//! peers of a connection run their own `RemoteSpace`; the runtime is fully
//! symmetric.
//!
//! The space is handed to the transport as a frame listener. Hosting an
//! object on a connection (or endpoint) attaches that listener, after which
//! inbound invocation frames dispatch onto the worker pool and inbound
//! execution frames complete waiting transactions.

use std::fmt;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::DashSet;

use farwire::EventPool;
use farwire::Frame;
use farwire::ObjectId;
use farwire::TransactionId;

use crate::executor::Executor;
use crate::host;
use crate::host::HostTable;
use crate::proxy::ProxyCache;
use crate::proxy::RemoteHandle;
use crate::registry;
use crate::registry::Registry;
use crate::registry::RemotableSpec;
use crate::registry::TypeId;
use crate::remotable::DispatchError;
use crate::remotable::Obj;
use crate::rendezvous::Rendezvous;
use crate::transport;
use crate::transport::Connection;
use crate::transport::ConnectionId;
use crate::transport::ConnectionListener;
use crate::transport::Endpoint;
use crate::transport::EndpointListener;

/// Runtime failures surfaced to API callers.
#[derive(Debug)]
pub enum Error {
    Registry(registry::Error),
    Host(host::Error),
    Transport(transport::Error),
    /// The target operation (or a local delegate) failed.
    Dispatch(DispatchError),
    /// No registered operation matches the name and arity on this type.
    UnknownMethod {
        type_name: &'static str,
        method: String,
        arity: usize,
    },
    /// No async-execution record exists for the transaction.
    UnknownTransaction(TransactionId),
    /// A remotable slot received plain data, or the other way around.
    TypeMismatch { method: &'static str, index: usize },
    /// A frame violated the protocol.
    Protocol(String),
    /// The runtime behind a proxy handle has been dropped.
    RuntimeDropped,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(e) => write!(f, "registry error: {}", e),
            Self::Host(e) => write!(f, "host error: {}", e),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Dispatch(e) => write!(f, "dispatch error: {}", e),
            Self::UnknownMethod { type_name, method, arity } => {
                write!(f, "type '{}' has no method '{}/{}'", type_name, method, arity)
            }
            Self::UnknownTransaction(id) => write!(f, "no async execution recorded for {}", id),
            Self::TypeMismatch { method, index } => {
                write!(f, "argument {} of '{}' does not match its declared type", index, method)
            }
            Self::Protocol(msg) => write!(f, "protocol violation: {}", msg),
            Self::RuntimeDropped => write!(f, "remote space has been dropped"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registry(e) => Some(e),
            Self::Host(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::Dispatch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<registry::Error> for Error {
    fn from(e: registry::Error) -> Self {
        Self::Registry(e)
    }
}

impl From<host::Error> for Error {
    fn from(e: host::Error) -> Self {
        Self::Host(e)
    }
}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Remembered state of a non-blocking call until its result is fetched.
pub(crate) struct AsyncExecution {
    pub(crate) connection: Arc<dyn Connection>,
    pub(crate) response_timeout_ms: i64,
}

/// The peer-symmetric remote-invocation runtime.
pub struct RemoteSpace {
    pub(crate) weak: Weak<RemoteSpace>,
    pub(crate) registry: Registry,
    pub(crate) hosts: HostTable,
    pub(crate) proxies: ProxyCache,
    pub(crate) rendezvous: Rendezvous,
    pub(crate) executor: Executor,
    pub(crate) events: EventPool,
    pub(crate) async_executions: DashMap<TransactionId, AsyncExecution>,
    /// Connection each in-flight transaction was sent on, for drop handling.
    pub(crate) outstanding: DashMap<TransactionId, ConnectionId>,
    attached: DashSet<ConnectionId>,
    next_transaction_id: AtomicI64,
    last_transaction_id: AtomicI64,
    next_proxy_id: AtomicI64,
}

impl RemoteSpace {
    /// A space with the default single-worker executor, which serializes
    /// target execution. Must be called within a tokio runtime.
    pub fn new() -> Arc<Self> {
        Self::with_workers(1)
    }

    /// A space whose worker pool has `workers` tasks. With more than one
    /// worker, completion order may differ from submission order.
    pub fn with_workers(workers: usize) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            registry: Registry::new(),
            hosts: HostTable::new(),
            proxies: ProxyCache::new(),
            rendezvous: Rendezvous::new(),
            executor: Executor::new(workers),
            events: EventPool::new(),
            async_executions: DashMap::new(),
            outstanding: DashMap::new(),
            attached: DashSet::new(),
            next_transaction_id: AtomicI64::new(0),
            last_transaction_id: AtomicI64::new(-1),
            next_proxy_id: AtomicI64::new(0),
        })
    }

    // --- Type Registration ---

    /// Registers a remotable type and its transitive closure. Registration
    /// order must be identical on both peers.
    pub fn register_remotable(&self, spec: &'static RemotableSpec) -> Result<TypeId> {
        Ok(self.registry.register(spec)?)
    }

    pub fn is_registered(&self, spec: &RemotableSpec) -> bool {
        self.registry.is_registered(spec)
    }

    // --- Host Management ---

    /// Makes a local object addressable under the next automatic id.
    pub fn host(&self, object: Obj) -> ObjectId {
        self.hosts.host(object)
    }

    /// Makes a local object addressable under an explicit id.
    pub fn host_with_id(&self, id: ObjectId, object: Obj) -> Result<ObjectId> {
        Ok(self.hosts.host_with_id(id, object)?)
    }

    /// Hosts an object and attaches the invocation listener to `connection`.
    pub fn host_on(&self, connection: &Arc<dyn Connection>, object: Obj) -> ObjectId {
        let id = self.hosts.host(object);
        self.hook_connection(connection);
        id
    }

    /// Explicit-id variant of [`RemoteSpace::host_on`].
    pub fn host_on_with_id(
        &self,
        connection: &Arc<dyn Connection>,
        id: ObjectId,
        object: Obj,
    ) -> Result<ObjectId> {
        let id = self.hosts.host_with_id(id, object)?;
        self.hook_connection(connection);
        Ok(id)
    }

    /// Hosts an object and arranges for every connection the endpoint
    /// accepts to get the invocation listener.
    pub fn host_endpoint(&self, endpoint: &Arc<dyn Endpoint>, object: Obj) -> ObjectId {
        let id = self.hosts.host(object);
        if let Some(space) = self.weak.upgrade() {
            endpoint.add_listener(space);
        }
        id
    }

    /// Explicit-id variant of [`RemoteSpace::host_endpoint`].
    pub fn host_endpoint_with_id(
        &self,
        endpoint: &Arc<dyn Endpoint>,
        id: ObjectId,
        object: Obj,
    ) -> Result<ObjectId> {
        let id = self.hosts.host_with_id(id, object)?;
        if let Some(space) = self.weak.upgrade() {
            endpoint.add_listener(space);
        }
        Ok(id)
    }

    /// Attaches the frame listener to a connection without hosting anything.
    /// Idempotent per connection.
    pub fn hook_connection(&self, connection: &Arc<dyn Connection>) {
        if self.attached.insert(connection.id()) {
            if let Some(space) = self.weak.upgrade() {
                connection.add_listener(space);
            }
        }
    }

    // --- Remote Management ---

    /// Obtains the proxy for `(connection, object_id)`, creating it on first
    /// use. Subsequent calls return the identical handle; the requested spec
    /// is only consulted when the handle is first built.
    pub fn create_remote(
        &self,
        connection: &Arc<dyn Connection>,
        object_id: ObjectId,
        spec: &'static RemotableSpec,
    ) -> Arc<RemoteHandle> {
        self.create_remote_inner(connection, object_id, spec, None)
    }

    /// Like [`RemoteSpace::create_remote`], with a local delegate serving the
    /// operations it declares (and, per policy, identity operations).
    pub fn create_remote_with_delegate(
        &self,
        connection: &Arc<dyn Connection>,
        object_id: ObjectId,
        spec: &'static RemotableSpec,
        delegate: Obj,
    ) -> Arc<RemoteHandle> {
        self.create_remote_inner(connection, object_id, spec, Some(delegate))
    }

    /// Obtains a proxy under the next automatically allocated proxy id.
    pub fn create_remote_anon(
        &self,
        connection: &Arc<dyn Connection>,
        spec: &'static RemotableSpec,
    ) -> Arc<RemoteHandle> {
        let id = ObjectId(self.next_proxy_id.fetch_add(1, Ordering::AcqRel));
        self.create_remote_inner(connection, id, spec, None)
    }

    fn create_remote_inner(
        &self,
        connection: &Arc<dyn Connection>,
        object_id: ObjectId,
        spec: &'static RemotableSpec,
        delegate: Option<Obj>,
    ) -> Arc<RemoteHandle> {
        let handle = self.proxies.get_or_create(connection.id(), object_id, || {
            tracing::debug!(
                connection = %connection.id(),
                %object_id,
                type_name = spec.name,
                "creating remote proxy"
            );
            RemoteHandle::new(
                self.weak.clone(),
                connection.clone(),
                object_id,
                spec,
                delegate,
            )
        });
        self.hook_connection(connection);
        handle
    }

    // --- Transactions ---

    pub(crate) fn allocate_transaction(&self) -> TransactionId {
        let id = TransactionId(self.next_transaction_id.fetch_add(1, Ordering::AcqRel));
        self.last_transaction_id.store(id.0, Ordering::Release);
        id
    }

    /// The most recently issued transaction id, or `txn--1` before any call.
    ///
    /// Shared across all caller threads; only meaningful when the caller
    /// knows no other thread issued an intervening call.
    pub fn last_transaction_id(&self) -> TransactionId {
        TransactionId(self.last_transaction_id.load(Ordering::Acquire))
    }

    pub fn has_transaction(&self, transaction_id: TransactionId) -> bool {
        self.rendezvous.contains_pending(transaction_id)
    }

    pub fn has_any_transaction(&self) -> bool {
        self.has_transaction(self.last_transaction_id())
    }

    pub fn has_result(&self, transaction_id: TransactionId) -> bool {
        self.rendezvous.contains_delivered(transaction_id)
    }

    pub fn has_last_result(&self) -> bool {
        self.has_result(self.last_transaction_id())
    }

    // --- Utility ---

    /// Graceful worker-pool shutdown: wait up to five seconds for drain,
    /// then force-cancel and log how many tasks were pending.
    pub async fn shutdown_executor(&self) {
        self.executor.shutdown().await;
    }

    /// Event frames obtained and not yet released. Zero once every issued
    /// transaction has completed and been consumed.
    pub fn outstanding_events(&self) -> usize {
        self.events.outstanding()
    }

    fn connection_closed(&self, connection: &Arc<dyn Connection>) {
        let connection_id = connection.id();
        tracing::debug!(connection = %connection_id, "connection closed; invalidating state");
        self.attached.remove(&connection_id);
        self.proxies.drop_connection(connection_id);

        let stale: Vec<TransactionId> = self
            .outstanding
            .iter()
            .filter(|entry| *entry.value() == connection_id)
            .map(|entry| *entry.key())
            .collect();
        for transaction_id in stale {
            self.outstanding.remove(&transaction_id);
            self.rendezvous.cancel(transaction_id);
        }

        self.async_executions
            .retain(|_, record| record.connection.id() != connection_id);
    }
}

#[async_trait]
impl ConnectionListener for RemoteSpace {
    async fn frame_received(&self, connection: &Arc<dyn Connection>, frame: Frame) {
        match frame {
            Frame::Invocation(event) => self.handle_invocation(connection, event).await,
            Frame::Execution(event) => self.handle_execution(event),
        }
    }

    async fn disconnected(&self, connection: &Arc<dyn Connection>) {
        self.connection_closed(connection);
    }
}

#[async_trait]
impl EndpointListener for RemoteSpace {
    async fn connected(&self, connection: Arc<dyn Connection>) {
        self.hook_connection(&connection);
    }
}
