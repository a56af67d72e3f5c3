//! In-process messaging fabric.
//!
//! A small ZeroMQ-compatible transport for publishers and consumers living in
//! the same process. Consumers bind endpoints, publish clients connect to
//! them:
//!
//! ```text
//! PUSH socket ──connect──> PullEndpoint   (bind_pull)
//! XPUB socket ──connect──> SubEndpoint    (bind_sub)
//!      ^                        │
//!      └── 0x01/0x00 frames ────┘  subscribe / unsubscribe
//! ```
//!
//! # Features
//!
//! - **Zero-copy**: frames are `Bytes`, shared between sender and receiver
//! - **Thread-safe**: global registry protected by `DashMap`
//! - **Subscriber feedback**: a connecting XPUB socket first receives one
//!   subscribe frame per existing subscription, then every later change
//! - **ZeroMQ URIs**: uses the `inproc://` scheme
//!
//! # Bind before connect
//!
//! Unlike libzmq, the fabric has no pending connections: connecting to a
//! name nothing is bound to fails with `NotFound`. Bind consumers before
//! building a publish client on this fabric.
//!
//! # Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use pubcontrol_core::endpoint::Endpoint;
//! use pubcontrol_core::inproc::{bind_sub, inproc_context};
//! use pubcontrol_core::socket_type::SocketType;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let subscriber = bind_sub("inproc://events")?;
//! subscriber.subscribe("news");
//!
//! let mut xpub = inproc_context().socket(SocketType::XPub)?;
//! xpub.connect(&Endpoint::parse("inproc://events")?)?;
//!
//! // The existing subscription is replayed to the new publisher
//! assert_eq!(xpub.try_recv()?, Some(Bytes::from_static(b"\x01news")));
//!
//! xpub.send_multipart(vec![Bytes::from("news"), Bytes::from("hello")])?;
//! let msg = subscriber.recv_timeout(Duration::from_millis(100));
//! assert!(msg.is_some());
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use dashmap::DashMap;
use flume::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::endpoint::Endpoint;
use crate::error::{PubControlError, Result};
use crate::socket_type::SocketType;
use crate::subscription::{SubscriptionEvent, SubscriptionSet};
use crate::transport::{Context, PollState, ReadySignal, Socket, Transport};

/// Frames of one delivered message.
pub type InprocMessage = Vec<Bytes>;

type InprocSender = Sender<InprocMessage>;
type InprocReceiver = Receiver<InprocMessage>;

#[derive(Clone)]
enum Binding {
    Pull(InprocSender),
    Sub(Arc<SubShared>),
}

/// Bound endpoints by name
static INPROC_REGISTRY: once_cell::sync::Lazy<DashMap<String, Binding>> =
    once_cell::sync::Lazy::new(DashMap::new);

/// Process-wide inproc context
static INPROC_CONTEXT: once_cell::sync::Lazy<Context> =
    once_cell::sync::Lazy::new(|| Context::new(InprocTransport));

/// The process-wide in-process fabric context.
///
/// Created on first use; every call returns a handle to the same context.
pub fn inproc_context() -> Context {
    INPROC_CONTEXT.clone()
}

/// Transport over the in-process fabric. Only `inproc://` endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct InprocTransport;

impl Transport for InprocTransport {
    fn name(&self) -> &'static str {
        "inproc"
    }

    fn supports(&self, endpoint: &Endpoint) -> bool {
        endpoint.is_inproc()
    }

    fn socket(&self, socket_type: SocketType) -> Result<Box<dyn Socket>> {
        Ok(match socket_type {
            SocketType::Push => Box::new(InprocPushSocket::default()),
            SocketType::XPub => Box::new(InprocXPubSocket::new()),
        })
    }
}

/// A bound PULL endpoint collecting everything PUSH sockets send to it.
///
/// Unbinds on drop.
pub struct PullEndpoint {
    name: String,
    sender: InprocSender,
    receiver: InprocReceiver,
}

/// Bind a PULL endpoint.
///
/// # Errors
///
/// - `InvalidInput` unless `endpoint` is a non-empty `inproc://` URI
/// - `AddrInUse` if something is already bound there
pub fn bind_pull(endpoint: &str) -> io::Result<PullEndpoint> {
    let name = inproc_name(endpoint)?;
    let (tx, rx) = flume::unbounded();
    register(&name, Binding::Pull(tx.clone()))?;
    debug!("[INPROC] PULL bound to inproc://{}", name);

    Ok(PullEndpoint {
        name,
        sender: tx,
        receiver: rx,
    })
}

impl PullEndpoint {
    /// Wait up to `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<InprocMessage> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Take the next message if one is queued.
    pub fn try_recv(&self) -> Option<InprocMessage> {
        self.receiver.try_recv().ok()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Drop for PullEndpoint {
    fn drop(&mut self) {
        INPROC_REGISTRY.remove_if(&self.name, |_, binding| {
            matches!(binding, Binding::Pull(tx) if tx.same_channel(&self.sender))
        });
    }
}

/// Subscriber-side state shared between a `SubEndpoint` and the XPUB sockets
/// connected to it.
struct SubShared {
    subscriptions: Mutex<SubscriptionSet>,
    inbox: InprocSender,
    publishers: Mutex<Vec<Weak<ControlQueue>>>,
}

impl SubShared {
    /// Register a publisher and replay current subscriptions to it.
    fn attach(&self, queue: &Arc<ControlQueue>) {
        let subscriptions = self.subscriptions.lock();
        for prefix in subscriptions.prefixes() {
            queue.push(SubscriptionEvent::Subscribe(prefix.clone()).to_message());
        }
        self.publishers.lock().push(Arc::downgrade(queue));
    }

    /// Unregister a publisher.
    fn detach(&self, queue: &Arc<ControlQueue>) {
        self.publishers
            .lock()
            .retain(|weak| weak.upgrade().is_some_and(|q| !Arc::ptr_eq(&q, queue)));
    }

    /// Forward a control frame to every live publisher.
    fn send_control(&self, frame: &Bytes) {
        let mut publishers = self.publishers.lock();
        publishers.retain(|weak| match weak.upgrade() {
            Some(queue) if !queue.is_closed() => {
                queue.push(frame.clone());
                true
            }
            _ => false,
        });
    }

    /// Deliver a message if its first frame matches a subscription.
    fn deliver(&self, msg: &[Bytes]) {
        let topic = msg.first().map_or(&[][..], |f| f.as_ref());
        if self.subscriptions.lock().matches(topic) {
            // Receiver gone means the endpoint was dropped; drop like PUB does
            let _ = self.inbox.send(msg.to_vec());
        }
    }
}

/// A bound subscriber endpoint for XPUB sockets to connect to.
///
/// Behaves like a bound XSUB socket: `subscribe`/`unsubscribe` send control
/// frames upstream and filter incoming messages by prefix, `send_control`
/// forwards a raw control frame without touching the filter.
///
/// Unbinds on drop.
pub struct SubEndpoint {
    name: String,
    shared: Arc<SubShared>,
    receiver: InprocReceiver,
}

/// Bind a subscriber endpoint.
///
/// # Errors
///
/// Same as [`bind_pull`].
pub fn bind_sub(endpoint: &str) -> io::Result<SubEndpoint> {
    let name = inproc_name(endpoint)?;
    let (tx, rx) = flume::unbounded();
    let shared = Arc::new(SubShared {
        subscriptions: Mutex::new(SubscriptionSet::new()),
        inbox: tx,
        publishers: Mutex::new(Vec::new()),
    });
    register(&name, Binding::Sub(Arc::clone(&shared)))?;
    debug!("[INPROC] SUB bound to inproc://{}", name);

    Ok(SubEndpoint {
        name,
        shared,
        receiver: rx,
    })
}

impl SubEndpoint {
    /// Subscribe to a channel prefix and notify connected publishers.
    pub fn subscribe(&self, prefix: impl AsRef<[u8]>) {
        let prefix = Bytes::copy_from_slice(prefix.as_ref());
        self.shared.subscriptions.lock().subscribe(prefix.clone());
        self.shared
            .send_control(&SubscriptionEvent::Subscribe(prefix).to_message());
    }

    /// Drop a channel prefix and notify connected publishers.
    pub fn unsubscribe(&self, prefix: impl AsRef<[u8]>) {
        let prefix = Bytes::copy_from_slice(prefix.as_ref());
        self.shared.subscriptions.lock().unsubscribe(&prefix);
        self.shared
            .send_control(&SubscriptionEvent::Unsubscribe(prefix).to_message());
    }

    /// Forward a raw control frame to connected publishers.
    pub fn send_control(&self, frame: impl Into<Bytes>) {
        let frame = frame.into();
        trace!("[INPROC] raw control frame ({} bytes)", frame.len());
        self.shared.send_control(&frame);
    }

    /// Wait up to `timeout` for the next delivered message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<InprocMessage> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Take the next delivered message if one is queued.
    pub fn try_recv(&self) -> Option<InprocMessage> {
        self.receiver.try_recv().ok()
    }

    /// Number of live publishers connected to this endpoint.
    pub fn publisher_count(&self) -> usize {
        self.shared
            .publishers
            .lock()
            .iter()
            .filter(|w| w.upgrade().is_some_and(|q| !q.is_closed()))
            .count()
    }
}

impl Drop for SubEndpoint {
    fn drop(&mut self) {
        INPROC_REGISTRY.remove_if(&self.name, |_, binding| {
            matches!(binding, Binding::Sub(s) if Arc::ptr_eq(s, &self.shared))
        });
    }
}

/// Names (without `inproc://`) of every bound endpoint.
pub fn list_inproc_endpoints() -> Vec<String> {
    INPROC_REGISTRY
        .iter()
        .map(|entry| entry.key().clone())
        .collect()
}

fn register(name: &str, binding: Binding) -> io::Result<()> {
    use dashmap::mapref::entry::Entry;

    match INPROC_REGISTRY.entry(name.to_string()) {
        Entry::Occupied(_) => Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("inproc://{} is already bound", name),
        )),
        Entry::Vacant(slot) => {
            slot.insert(binding);
            Ok(())
        }
    }
}

fn lookup(endpoint: &Endpoint) -> Result<Binding> {
    let Endpoint::Inproc(name) = endpoint else {
        return Err(PubControlError::config(format!(
            "inproc transport cannot connect to {}",
            endpoint
        )));
    };
    INPROC_REGISTRY
        .get(name.as_str())
        .map(|entry| entry.value().clone())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("nothing is bound at inproc://{}", name),
            )
            .into()
        })
}

fn not_connected(endpoint: &Endpoint) -> PubControlError {
    io::Error::new(
        io::ErrorKind::NotConnected,
        format!("not connected to {}", endpoint),
    )
    .into()
}

/// Name part of an `inproc://` URI.
fn inproc_name(uri: &str) -> io::Result<String> {
    match Endpoint::parse(uri) {
        Ok(Endpoint::Inproc(name)) => Ok(name),
        Ok(other) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("only inproc:// uris can be bound in process, got {}", other),
        )),
        Err(e) => Err(io::Error::new(io::ErrorKind::InvalidInput, e)),
    }
}

/// Queue of control frames delivered to one XPUB socket.
///
/// Doubles as the socket's readiness signal: it is level-triggered, so
/// `Readable` always means a frame is queued.
struct ControlQueue {
    state: Mutex<ControlState>,
    ready: Condvar,
}

#[derive(Default)]
struct ControlState {
    frames: VecDeque<Bytes>,
    closed: bool,
}

impl ControlQueue {
    fn new() -> Self {
        Self {
            state: Mutex::new(ControlState::default()),
            ready: Condvar::new(),
        }
    }

    fn push(&self, frame: Bytes) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.frames.push_back(frame);
        self.ready.notify_all();
    }

    fn pop(&self) -> Option<Bytes> {
        self.state.lock().frames.pop_front()
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.frames.clear();
        self.ready.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl ReadySignal for ControlQueue {
    fn wait_readable(&self, timeout: Duration) -> PollState {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return PollState::Closed;
            }
            if !state.frames.is_empty() {
                return PollState::Readable;
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return if state.closed {
                    PollState::Closed
                } else if state.frames.is_empty() {
                    PollState::TimedOut
                } else {
                    PollState::Readable
                };
            }
        }
    }
}

/// PUSH socket over the fabric. Round-robins across connected endpoints.
#[derive(Default)]
struct InprocPushSocket {
    peers: Vec<InprocSender>,
    next: usize,
    closed: bool,
}

impl Socket for InprocPushSocket {
    fn socket_type(&self) -> SocketType {
        SocketType::Push
    }

    fn set_linger(&mut self, _linger: Option<Duration>) -> Result<()> {
        // Delivery is immediate, nothing ever lingers
        Ok(())
    }

    fn set_recv_hwm(&mut self, _hwm: usize) -> Result<()> {
        Ok(())
    }

    fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        match lookup(endpoint)? {
            Binding::Pull(tx) => {
                self.peers.push(tx);
                debug!("[INPROC] PUSH connected to {}", endpoint);
                Ok(())
            }
            Binding::Sub(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a PULL endpoint", endpoint),
            )
            .into()),
        }
    }

    fn disconnect(&mut self, endpoint: &Endpoint) -> Result<()> {
        let before = self.peers.len();
        if let Binding::Pull(tx) = lookup(endpoint)? {
            self.peers.retain(|peer| !peer.same_channel(&tx));
        }
        if self.peers.len() == before {
            return Err(not_connected(endpoint));
        }
        debug!("[INPROC] PUSH disconnected from {}", endpoint);
        Ok(())
    }

    fn send(&mut self, frame: Bytes) -> Result<()> {
        self.send_multipart(vec![frame])
    }

    fn send_multipart(&mut self, frames: Vec<Bytes>) -> Result<()> {
        if self.closed {
            return Err(PubControlError::SocketClosed);
        }
        while !self.peers.is_empty() {
            let idx = self.next % self.peers.len();
            if self.peers[idx].send(frames.clone()).is_ok() {
                self.next = idx + 1;
                trace!("[INPROC] PUSH sent {} frames to peer {}", frames.len(), idx);
                return Ok(());
            }
            // Endpoint dropped
            self.peers.remove(idx);
        }
        Err(io::Error::new(io::ErrorKind::WouldBlock, "no connected PULL peers").into())
    }

    fn try_recv(&mut self) -> Result<Option<Bytes>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "PUSH sockets cannot receive").into())
    }

    fn ready_signal(&self) -> Option<Arc<dyn ReadySignal>> {
        None
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.peers.clear();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// XPUB socket over the fabric.
struct InprocXPubSocket {
    control: Arc<ControlQueue>,
    peers: Vec<Arc<SubShared>>,
    closed: bool,
}

impl InprocXPubSocket {
    fn new() -> Self {
        Self {
            control: Arc::new(ControlQueue::new()),
            peers: Vec::new(),
            closed: false,
        }
    }
}

impl Socket for InprocXPubSocket {
    fn socket_type(&self) -> SocketType {
        SocketType::XPub
    }

    fn set_linger(&mut self, _linger: Option<Duration>) -> Result<()> {
        Ok(())
    }

    fn set_recv_hwm(&mut self, _hwm: usize) -> Result<()> {
        // Control queue is always unbounded
        Ok(())
    }

    fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        if self.closed {
            return Err(PubControlError::SocketClosed);
        }
        match lookup(endpoint)? {
            Binding::Sub(shared) => {
                shared.attach(&self.control);
                self.peers.push(shared);
                debug!("[INPROC] XPUB connected to {}", endpoint);
                Ok(())
            }
            Binding::Pull(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a SUB endpoint", endpoint),
            )
            .into()),
        }
    }

    fn disconnect(&mut self, endpoint: &Endpoint) -> Result<()> {
        if self.closed {
            return Err(PubControlError::SocketClosed);
        }
        let Binding::Sub(shared) = lookup(endpoint)? else {
            return Err(not_connected(endpoint));
        };
        let Some(idx) = self.peers.iter().position(|p| Arc::ptr_eq(p, &shared)) else {
            return Err(not_connected(endpoint));
        };
        self.peers.remove(idx).detach(&self.control);
        debug!("[INPROC] XPUB disconnected from {}", endpoint);
        Ok(())
    }

    fn send(&mut self, frame: Bytes) -> Result<()> {
        self.send_multipart(vec![frame])
    }

    fn send_multipart(&mut self, frames: Vec<Bytes>) -> Result<()> {
        if self.closed {
            return Err(PubControlError::SocketClosed);
        }
        // Never blocks: unmatched subscribers simply don't get the message
        for peer in &self.peers {
            peer.deliver(&frames);
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Bytes>> {
        if self.closed {
            return Err(PubControlError::SocketClosed);
        }
        Ok(self.control.pop())
    }

    fn ready_signal(&self) -> Option<Arc<dyn ReadySignal>> {
        Some(Arc::clone(&self.control) as Arc<dyn ReadySignal>)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.peers.clear();
        self.control.close();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for InprocXPubSocket {
    fn drop(&mut self) {
        self.control.close();
    }
}
