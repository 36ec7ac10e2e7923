//! Mock transport for testing.
//!
//! An in-process duplex connection pair. Frames are encoded with the
//! reference codec, carried over tokio channels, decoded on the far side,
//! and delivered to attached listeners in order, exactly one message at a
//! time per direction. Every sent frame is also recorded so tests can assert
//! on the literal wire traffic.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use farwire::Frame;
use farwire::FrameCodec;
use farwire::JsonCodec;

use crate::transport;
use crate::transport::Connection;
use crate::transport::ConnectionId;
use crate::transport::ConnectionListener;
use crate::transport::Endpoint;
use crate::transport::EndpointListener;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

type Outbound = (bool, Vec<u8>);

/// One side of an in-process connection pair.
pub struct MockConnection {
    id: ConnectionId,
    tx: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    listeners: Arc<Mutex<Vec<Arc<dyn ConnectionListener>>>>,
    sent: Mutex<Vec<(bool, Frame)>>,
}

impl MockConnection {
    /// Creates two connected sides. Frames sent on one are decoded and
    /// delivered to the listeners of the other.
    pub fn pair() -> (Arc<MockConnection>, Arc<MockConnection>) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let a = Arc::new(MockConnection::new(tx_a));
        let b = Arc::new(MockConnection::new(tx_b));

        // a's sends surface on b, and vice versa.
        spawn_pump(rx_a, b.clone());
        spawn_pump(rx_b, a.clone());

        (a, b)
    }

    fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            tx: Mutex::new(Some(tx)),
            listeners: Arc::new(Mutex::new(Vec::new())),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Every frame this side has sent, with its transport class
    /// (`true` = unreliable).
    pub fn sent_frames(&self) -> Vec<(bool, Frame)> {
        lock(&self.sent).clone()
    }

    /// Closes this side: the peer observes a disconnect, and this side's own
    /// listeners are notified too.
    pub async fn close(self: Arc<Self>) {
        lock(&self.tx).take();
        let conn: Arc<dyn Connection> = self.clone();
        for listener in lock(&self.listeners).clone() {
            listener.disconnected(&conn).await;
        }
    }

    fn send(&self, unreliable: bool, frame: &Frame) -> transport::Result<()> {
        let bytes = JsonCodec
            .encode(frame)
            .map_err(|e| transport::Error::Io(e.to_string()))?;
        lock(&self.sent).push((unreliable, frame.clone()));
        let guard = lock(&self.tx);
        let Some(tx) = guard.as_ref() else {
            return Err(transport::Error::ConnectionLost("connection closed".into()));
        };
        tx.send((unreliable, bytes))
            .map_err(|_| transport::Error::ConnectionLost("peer is gone".into()))
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send_reliable(&self, frame: &Frame) -> transport::Result<()> {
        self.send(false, frame)
    }

    async fn send_unreliable(&self, frame: &Frame) -> transport::Result<()> {
        self.send(true, frame)
    }

    fn add_listener(&self, listener: Arc<dyn ConnectionListener>) {
        let mut listeners = lock(&self.listeners);
        let already = listeners
            .iter()
            .any(|l| Arc::as_ptr(l) as *const () == Arc::as_ptr(&listener) as *const ());
        if !already {
            listeners.push(listener);
        }
    }
}

/// Delivers frames arriving from the peer to `side`'s listeners, one at a
/// time, then signals a disconnect when the peer's sender is dropped.
fn spawn_pump(mut rx: mpsc::UnboundedReceiver<Outbound>, side: Arc<MockConnection>) {
    let conn: Arc<dyn Connection> = side.clone();
    let listeners = side.listeners.clone();
    tokio::spawn(async move {
        while let Some((_, bytes)) = rx.recv().await {
            let frame = match JsonCodec.decode(&bytes) {
                Ok(frame) => frame,
                Err(e) => {
                    eprintln!("mock transport dropped a malformed frame: {}", e);
                    continue;
                }
            };
            let current = lock(&listeners).clone();
            for listener in current {
                listener.frame_received(&conn, frame.clone()).await;
            }
        }
        let current = lock(&listeners).clone();
        for listener in current {
            listener.disconnected(&conn).await;
        }
    });
}

/// An accepting endpoint whose `accept` hands connections to listeners.
pub struct MockEndpoint {
    listeners: Mutex<Vec<Arc<dyn EndpointListener>>>,
}

impl MockEndpoint {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Simulates the transport accepting a new connection.
    pub async fn accept(&self, connection: Arc<dyn Connection>) {
        for listener in lock(&self.listeners).clone() {
            listener.connected(connection.clone()).await;
        }
    }
}

impl Endpoint for MockEndpoint {
    fn add_listener(&self, listener: Arc<dyn EndpointListener>) {
        let mut listeners = lock(&self.listeners);
        let already = listeners
            .iter()
            .any(|l| Arc::as_ptr(l) as *const () == Arc::as_ptr(&listener) as *const ());
        if !already {
            listeners.push(listener);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
