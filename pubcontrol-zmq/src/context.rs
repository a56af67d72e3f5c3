//! Process-wide libzmq context.
//!
//! libzmq contexts are thread-safe and meant to be shared: one per process
//! is the norm. The global one is created on first use and lives until the
//! process exits, so closing a client never tears it down.

use once_cell::sync::Lazy;
use tracing::debug;

use pubcontrol_core::endpoint::Endpoint;
use pubcontrol_core::error::Result;
use pubcontrol_core::socket_type::SocketType;
use pubcontrol_core::transport::{Context, Socket, Transport};

use crate::socket::ZmqSocket;

static GLOBAL_CONTEXT: Lazy<zmq::Context> = Lazy::new(|| {
    let (major, minor, patch) = zmq::version();
    debug!("[ZMQ] creating global context (libzmq {}.{}.{})", major, minor, patch);
    zmq::Context::new()
});

static ZMQ_CONTEXT: Lazy<Context> = Lazy::new(|| Context::new(ZmqTransport::global()));

/// The process-wide raw libzmq context.
///
/// Peers living in the same process (e.g. a PULL socket bound on
/// `inproc://`) must be created from this context to be reachable.
pub fn global_context() -> zmq::Context {
    GLOBAL_CONTEXT.clone()
}

/// The process-wide libzmq context as a pubcontrol [`Context`].
pub fn zmq_context() -> Context {
    ZMQ_CONTEXT.clone()
}

/// Transport creating libzmq sockets from one `zmq::Context`.
#[derive(Clone)]
pub struct ZmqTransport {
    ctx: zmq::Context,
}

impl ZmqTransport {
    /// Transport over a caller-owned libzmq context.
    pub fn new(ctx: zmq::Context) -> Self {
        Self { ctx }
    }

    /// Transport over the process-wide context.
    pub fn global() -> Self {
        Self::new(global_context())
    }
}

impl Transport for ZmqTransport {
    fn name(&self) -> &'static str {
        "libzmq"
    }

    fn supports(&self, _endpoint: &Endpoint) -> bool {
        true
    }

    fn socket(&self, socket_type: SocketType) -> Result<Box<dyn Socket>> {
        Ok(Box::new(ZmqSocket::new(&self.ctx, socket_type)?))
    }
}
