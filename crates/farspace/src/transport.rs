//! # Transport Collaborator Traits
//!
//! The runtime rides on an external connection-oriented transport. These
//! traits are the full surface it requires: two send classes per connection,
//! frame listeners, and connection-establishment listeners at the endpoint
//! level. The transport owns its own threads and codec; listeners receive
//! decoded frames.
//!
//! ## Invariants
//!
//! - Frames sent on the reliable class arrive in order per connection.
//! - A listener's `frame_received` must not run target code inline; the
//!   runtime hands invocations to its worker pool immediately.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use farwire::Frame;

/// Stable identity of one connection for the life of the process.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone)]
pub enum Error {
    /// The peer is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "connection lost: {}", msg),
            Self::Io(msg) => write!(f, "i/o error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// One established peer-to-peer connection.
///
/// Object-safe (`Arc<dyn Connection>`); proxies capture the connection they
/// were created on and route every operation through it.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    fn id(&self) -> ConnectionId;

    /// Queues a frame on the ordered reliable class.
    async fn send_reliable(&self, frame: &Frame) -> Result<()>;

    /// Queues a frame on the unordered datagram class.
    async fn send_unreliable(&self, frame: &Frame) -> Result<()>;

    /// Attaches a frame listener. Attaching the same listener twice is the
    /// transport's problem to dedupe or tolerate; the runtime attaches at
    /// most once per connection.
    fn add_listener(&self, listener: Arc<dyn ConnectionListener>);
}

/// Receives decoded frames and lifecycle events for one connection.
#[async_trait]
pub trait ConnectionListener: Send + Sync + 'static {
    async fn frame_received(&self, connection: &Arc<dyn Connection>, frame: Frame);

    async fn disconnected(&self, connection: &Arc<dyn Connection>) {
        let _ = connection;
    }
}

/// The accepting side of the transport.
pub trait Endpoint: Send + Sync + 'static {
    /// Attaches a listener for connection-establishment events.
    fn add_listener(&self, listener: Arc<dyn EndpointListener>);
}

/// Receives newly established connections.
#[async_trait]
pub trait EndpointListener: Send + Sync + 'static {
    async fn connected(&self, connection: Arc<dyn Connection>);
}
