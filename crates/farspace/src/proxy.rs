//! # Proxy Cache and Remote Handles
//!
//! A [`RemoteHandle`] is the local stand-in for an object hosted by the peer:
//! it closes over `(connection, object id, delegate)` and routes every
//! operation through the outbound invoker. Handles are cached per connection
//! and keyed by object id alone, so creating a remote twice for one pair
//! returns the identical handle.
//!
//! `RemoteHandle` implements [`Remotable`], which makes a proxy received as a
//! parameter indistinguishable from a local object: it can be invoked,
//! hosted, or passed onward, and invoking it re-enters the peer that owns
//! the real object.

use std::fmt;
use std::sync::Arc;
use std::sync::Weak;

use async_trait::async_trait;
use dashmap::DashMap;

use farwire::ObjectId;

use crate::registry::RemotableSpec;
use crate::remotable::DispatchError;
use crate::remotable::DispatchResult;
use crate::remotable::Obj;
use crate::remotable::Remotable;
use crate::remotable::Value;
use crate::space::RemoteSpace;
use crate::space;
use crate::transport::Connection;
use crate::transport::ConnectionId;

/// Per-connection map of remote object id to local proxy handle.
pub struct ProxyCache {
    by_connection: DashMap<ConnectionId, Arc<DashMap<ObjectId, Arc<RemoteHandle>>>>,
}

impl ProxyCache {
    pub fn new() -> Self {
        Self {
            by_connection: DashMap::new(),
        }
    }

    /// Returns the cached handle for `(connection, object_id)` or inserts the
    /// one produced by `make`. Concurrent callers observe a single handle.
    pub fn get_or_create(
        &self,
        connection_id: ConnectionId,
        object_id: ObjectId,
        make: impl FnOnce() -> RemoteHandle,
    ) -> Arc<RemoteHandle> {
        let cache = self
            .by_connection
            .entry(connection_id)
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone();
        let handle = cache
            .entry(object_id)
            .or_insert_with(|| Arc::new(make()))
            .clone();
        handle
    }

    pub fn contains(&self, connection_id: ConnectionId, object_id: ObjectId) -> bool {
        self.by_connection
            .get(&connection_id)
            .map(|cache| cache.contains_key(&object_id))
            .unwrap_or(false)
    }

    /// Forgets every proxy created on a closed connection.
    pub fn drop_connection(&self, connection_id: ConnectionId) {
        self.by_connection.remove(&connection_id);
    }
}

impl Default for ProxyCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A polymorphic handle to an object hosted by the peer.
pub struct RemoteHandle {
    space: Weak<RemoteSpace>,
    connection: Arc<dyn Connection>,
    object_id: ObjectId,
    spec: &'static RemotableSpec,
    delegate: Option<Obj>,
}

impl RemoteHandle {
    pub(crate) fn new(
        space: Weak<RemoteSpace>,
        connection: Arc<dyn Connection>,
        object_id: ObjectId,
        spec: &'static RemotableSpec,
        delegate: Option<Obj>,
    ) -> Self {
        Self {
            space,
            connection,
            object_id,
            spec,
            delegate,
        }
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Invokes one operation across the transport, honoring the method's
    /// call policy. Typed per-interface wrappers are built on top of this.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> space::Result<Value> {
        let space = self.space.upgrade().ok_or(space::Error::RuntimeDropped)?;
        space
            .invoke(
                &self.connection,
                self.object_id,
                self.spec,
                self.delegate.as_ref(),
                method,
                args,
            )
            .await
    }
}

#[async_trait]
impl Remotable for RemoteHandle {
    fn spec(&self) -> &'static RemotableSpec {
        self.spec
    }

    async fn dispatch(&self, method: &str, args: Vec<Value>) -> DispatchResult {
        self.call(method, args)
            .await
            .map_err(|e| DispatchError::Failed(e.to_string()))
    }
}

impl fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RemoteHandle({} {} on {})",
            self.spec.name,
            self.object_id,
            self.connection.id()
        )
    }
}
