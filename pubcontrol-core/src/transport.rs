//! Trait-based messaging substrate.
//!
//! The publish client does not implement a wire transport. It drives sockets
//! obtained from a [`Context`], which wraps any [`Transport`]: libzmq in
//! production (`pubcontrol-zmq`), or the in-process fabric
//! ([`crate::inproc`]) for single-process deployments and tests.
//!
//! Sockets are synchronous and non-blocking. A socket is never used from two
//! threads at once: the owner keeps it behind a mutex, and only the
//! [`ReadySignal`] (which is `Sync`) is waited on outside that mutex.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::socket_type::SocketType;

/// A messaging library able to create the two sender archetypes.
pub trait Transport: Send + Sync {
    /// Short name for logs (`"libzmq"`, `"inproc"`).
    fn name(&self) -> &'static str;

    /// Whether this transport can connect to the given endpoint.
    fn supports(&self, endpoint: &Endpoint) -> bool;

    /// Create an unconnected socket.
    fn socket(&self, socket_type: SocketType) -> Result<Box<dyn Socket>>;
}

/// A sender socket.
///
/// # Examples
///
/// ```no_run
/// use bytes::Bytes;
/// use pubcontrol_core::endpoint::Endpoint;
/// use pubcontrol_core::inproc::inproc_context;
/// use pubcontrol_core::socket_type::SocketType;
///
/// # fn example() -> pubcontrol_core::error::Result<()> {
/// let mut socket = inproc_context().socket(SocketType::XPub)?;
/// socket.set_linger(None)?;
/// socket.connect(&Endpoint::parse("inproc://events")?)?;
/// socket.send_multipart(vec![Bytes::from("news"), Bytes::from("payload")])?;
/// # Ok(())
/// # }
/// ```
pub trait Socket: Send {
    /// The archetype this socket was created as.
    fn socket_type(&self) -> SocketType;

    /// Linger period on close (`ZMQ_LINGER`). `None` discards pending
    /// messages immediately.
    fn set_linger(&mut self, linger: Option<Duration>) -> Result<()>;

    /// Receive high-water mark (`ZMQ_RCVHWM`). `0` means unbounded.
    fn set_recv_hwm(&mut self, hwm: usize) -> Result<()>;

    /// Connect to a remote endpoint. A socket may be connected to several.
    fn connect(&mut self, endpoint: &Endpoint) -> Result<()>;

    /// Drop a connection made by [`connect`](Self::connect).
    fn disconnect(&mut self, endpoint: &Endpoint) -> Result<()>;

    /// Send a single-frame message without blocking.
    fn send(&mut self, frame: Bytes) -> Result<()>;

    /// Send a multipart message without blocking.
    fn send_multipart(&mut self, frames: Vec<Bytes>) -> Result<()>;

    /// Receive one frame if one is queued.
    ///
    /// - `Ok(Some(frame))` - frame received
    /// - `Ok(None)` - nothing queued
    /// - `Err(_)` - receive failed (socket closed, transport fault)
    fn try_recv(&mut self) -> Result<Option<Bytes>>;

    /// Readiness signal for incoming frames.
    ///
    /// `None` for archetypes that never receive.
    fn ready_signal(&self) -> Option<Arc<dyn ReadySignal>>;

    /// Close the socket. Idempotent; wakes anyone waiting on the signal.
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Outcome of waiting on a [`ReadySignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Incoming data may be available.
    Readable,
    /// Nothing happened within the timeout.
    TimedOut,
    /// The socket was closed; nothing will ever arrive again.
    Closed,
}

/// Wait handle for socket read readiness, usable without the socket lock.
///
/// `Readable` is a hint: the following `try_recv` may still return `None`
/// (edge-triggered transports such as libzmq's `ZMQ_FD`).
pub trait ReadySignal: Send + Sync {
    fn wait_readable(&self, timeout: Duration) -> PollState;
}

/// Shared handle to a transport.
///
/// Cheap to clone; every clone refers to the same underlying messaging
/// context.
#[derive(Clone)]
pub struct Context {
    transport: Arc<dyn Transport>,
}

impl Context {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn supports(&self, endpoint: &Endpoint) -> bool {
        self.transport.supports(endpoint)
    }

    pub fn socket(&self, socket_type: SocketType) -> Result<Box<dyn Socket>> {
        self.transport.socket(socket_type)
    }

    /// Returns true if both handles refer to the same transport instance.
    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.transport, &other.transport)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("transport", &self.transport.name())
            .finish()
    }
}
