//! Standalone XPUB controller.
//!
//! A [`PubController`] owns its own XPUB socket instead of sharing a
//! [`PublishClient`](crate::PublishClient)'s. Endpoints are connected and
//! dropped at runtime, messages are published as raw `[channel, content]`
//! pairs, and subscriptions are tracked with [`MonitorPolicy::strict`]:
//! unsubscribes are only reported for known channels, and non-UTF-8
//! channels are skipped.

use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use pubcontrol_core::endpoint::Endpoint;
use pubcontrol_core::error::{PubControlError, Result};
use pubcontrol_core::item::channel_bytes;
use pubcontrol_core::socket_type::SocketType;
use pubcontrol_core::subscription::SubscriptionEvent;
use pubcontrol_core::transport::{Context, Socket};

use crate::client::{default_context, SharedSocket, SocketSlot};
use crate::monitor::{MonitorPolicy, SubscriptionMonitor};

/// XPUB socket plus subscription monitor, with endpoints managed at runtime.
///
/// # Example
///
/// ```rust
/// use pubcontrol::prelude::*;
/// use pubcontrol::inproc::{bind_sub, inproc_context};
/// use std::sync::mpsc;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let edge = bind_sub("inproc://doc-controller-edge")?;
///
/// let (tx, rx) = mpsc::channel();
/// let controller = PubController::new(Some(inproc_context()), move |event: &SubscriptionEvent| {
///     let _ = tx.send(event.kind());
/// })?;
/// controller.connect("inproc://doc-controller-edge")?;
///
/// edge.subscribe("news");
/// assert_eq!(rx.recv_timeout(Duration::from_secs(1))?, "sub");
/// assert!(controller.is_subscribed("news"));
///
/// controller.publish("news", "hello")?;
/// assert!(edge.recv_timeout(Duration::from_secs(1)).is_some());
///
/// controller.stop()?;
/// # Ok(())
/// # }
/// ```
pub struct PubController {
    context: Context,
    socket: SharedSocket,
    monitor: Option<SubscriptionMonitor>,
}

impl PubController {
    /// Create the XPUB socket and start monitoring it. No endpoint is
    /// connected yet.
    ///
    /// `context` defaults to [`default_context`]. The callback has the same
    /// constraints as a [`SubscriptionMonitor`] callback.
    pub fn new<F>(context: Option<Context>, callback: F) -> Result<Self>
    where
        F: FnMut(&SubscriptionEvent) + Send + 'static,
    {
        let context = context.unwrap_or_else(default_context);
        let mut socket = context.socket(SocketType::XPub)?;
        socket.set_linger(None)?;
        socket.set_recv_hwm(0)?;

        let mut slot = SocketSlot::new();
        slot.install(socket);
        let socket: SharedSocket = Arc::new(Mutex::new(slot));
        let monitor =
            SubscriptionMonitor::with_policy(Arc::clone(&socket), MonitorPolicy::strict(), callback)?;
        debug!("[CONTROLLER] started over {}", context.name());

        Ok(Self {
            context,
            socket,
            monitor: Some(monitor),
        })
    }

    /// Connect the XPUB socket to another endpoint.
    ///
    /// # Errors
    ///
    /// Configuration error for a malformed URI or one the context cannot
    /// reach, `SocketClosed` after [`stop`](Self::stop), or the transport's
    /// connect error.
    pub fn connect(&self, uri: &str) -> Result<()> {
        let endpoint = self.endpoint(uri)?;
        self.with_socket(|socket| socket.connect(&endpoint))
    }

    /// Drop a connection made by [`connect`](Self::connect).
    pub fn disconnect(&self, uri: &str) -> Result<()> {
        let endpoint = self.endpoint(uri)?;
        self.with_socket(|socket| socket.disconnect(&endpoint))
    }

    /// Send `[channel, content]` to every connected subscriber whose filter
    /// matches `channel`.
    pub fn publish(&self, channel: impl AsRef<[u8]>, content: impl Into<Bytes>) -> Result<()> {
        let frames = vec![channel_bytes(channel), content.into()];
        trace!("[CONTROLLER] publish {} bytes on {:?}", frames[1].len(), frames[0]);
        self.with_socket(|socket| socket.send_multipart(frames))
    }

    /// Whether a subscriber currently holds a subscription to `channel`.
    pub fn is_subscribed(&self, channel: impl AsRef<[u8]>) -> bool {
        self.monitor
            .as_ref()
            .is_some_and(|m| m.is_subscribed(channel))
    }

    /// Snapshot of the known channels.
    pub fn subscriptions(&self) -> Vec<Bytes> {
        self.monitor
            .as_ref()
            .map_or_else(Vec::new, SubscriptionMonitor::subscriptions)
    }

    /// Returns true while the monitor thread is alive.
    pub fn is_running(&self) -> bool {
        self.monitor.as_ref().is_some_and(SubscriptionMonitor::is_running)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Close the socket and wait for the monitor thread to end.
    pub fn stop(mut self) -> Result<()> {
        match self.monitor.take() {
            Some(monitor) => monitor.stop(),
            None => Ok(()),
        }
    }

    fn endpoint(&self, uri: &str) -> Result<Endpoint> {
        let endpoint = Endpoint::parse(uri)?;
        if !self.context.supports(&endpoint) {
            return Err(PubControlError::config(format!(
                "{} transport cannot reach {}",
                self.context.name(),
                endpoint
            )));
        }
        Ok(endpoint)
    }

    fn with_socket<T>(&self, op: impl FnOnce(&mut dyn Socket) -> Result<T>) -> Result<T> {
        let mut slot = self.socket.lock();
        let socket = slot.socket_mut().ok_or(PubControlError::SocketClosed)?;
        op(socket)
    }
}

impl Drop for PubController {
    fn drop(&mut self) {
        // The monitor thread sees the close and exits on its own
        let _ = self.socket.lock().close();
    }
}

impl fmt::Debug for PubController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubController")
            .field("context", &self.context)
            .field("socket", &*self.socket.lock())
            .field("monitor", &self.monitor)
            .finish()
    }
}
