//! Publish client.
//!
//! A [`PublishClient`] owns one lazily created socket, either PUSH or XPUB,
//! chosen from its [`ClientOptions`]. The socket sits in a [`SocketSlot`]
//! behind a mutex shared with any [`SubscriptionMonitor`] watching it, so the
//! publish send and the monitor receive never run concurrently.

use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use pubcontrol_core::endpoint::Endpoint;
use pubcontrol_core::error::{PubControlError, Result};
use pubcontrol_core::item::{channel_bytes, Envelope, FormattedItem, CHANNEL_FIELD};
use pubcontrol_core::options::ClientOptions;
use pubcontrol_core::socket_type::SocketType;
use pubcontrol_core::subscription::SubscriptionEvent;
use pubcontrol_core::tnetstring::{self, Value};
use pubcontrol_core::transport::{Context, Socket};

use crate::monitor::SubscriptionMonitor;

/// Socket slot shared between a client and its monitors.
pub type SharedSocket = Arc<Mutex<SocketSlot>>;

/// Completion callback: `(success, error_message)`.
pub type PublishCallback = Box<dyn FnOnce(bool, &str) + Send>;

/// The process-wide default context.
///
/// libzmq's global context when the `zmq` feature is enabled, otherwise the
/// in-process fabric. Created on first use and never torn down by a client.
#[cfg(feature = "zmq")]
pub fn default_context() -> Context {
    pubcontrol_zmq::zmq_context()
}

/// The process-wide default context.
///
/// libzmq's global context when the `zmq` feature is enabled, otherwise the
/// in-process fabric. Created on first use and never torn down by a client.
#[cfg(not(feature = "zmq"))]
pub fn default_context() -> Context {
    pubcontrol_core::inproc::inproc_context()
}

/// Connection state of a client.
pub enum ConnectionState {
    /// No socket yet; the next connect picks an archetype.
    Unresolved,
    /// A live socket. Its archetype is fixed until close.
    Resolved(Box<dyn Socket>),
    /// Closed explicitly; the next connect starts over.
    Closed,
}

/// Holder of the client's single socket.
///
/// Every installed socket gets a new generation number, so a monitor can
/// tell its own socket apart from one created after a close.
pub struct SocketSlot {
    state: ConnectionState,
    generation: u64,
}

impl SocketSlot {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Unresolved,
            generation: 0,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true while a socket is resolved.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Resolved(_))
    }

    /// Archetype of the resolved socket.
    pub fn socket_type(&self) -> Option<SocketType> {
        match &self.state {
            ConnectionState::Resolved(socket) => Some(socket.socket_type()),
            _ => None,
        }
    }

    pub fn socket_mut(&mut self) -> Option<&mut (dyn Socket + 'static)> {
        match &mut self.state {
            ConnectionState::Resolved(socket) => Some(socket.as_mut()),
            _ => None,
        }
    }

    pub(crate) fn install(&mut self, socket: Box<dyn Socket>) -> u64 {
        self.generation += 1;
        self.state = ConnectionState::Resolved(socket);
        self.generation
    }

    /// Close the resolved socket, if any, and move to `Closed`.
    ///
    /// Idempotent. The socket is dropped even when closing it fails.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, ConnectionState::Closed) {
            ConnectionState::Resolved(mut socket) => {
                debug!("[CLIENT] closing {} socket (generation {})", socket.socket_type(), self.generation);
                socket.close()
            }
            _ => Ok(()),
        }
    }
}

impl Default for SocketSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SocketSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            ConnectionState::Unresolved => "unresolved",
            ConnectionState::Resolved(socket) => socket.socket_type().as_str(),
            ConnectionState::Closed => "closed",
        };
        f.debug_struct("SocketSlot")
            .field("state", &state)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Publish client over a PUSH or XPUB socket.
///
/// # Transport selection
///
/// | push uri | pub uri | require_subscriptions | disable_pub | socket |
/// |----------|---------|-----------------------|-------------|--------|
/// | set      | unset   | false                 | any         | PUSH   |
/// | unset    | set     | any                   | false       | XPUB   |
/// | set      | set     | false                 | false       | PUSH   |
/// | set      | set     | true                  | false       | XPUB   |
/// | set      | set     | false                 | true        | PUSH   |
/// | set      | set     | true                  | true        | none   |
///
/// With no eligible socket, publishing succeeds without sending anything.
///
/// # Example
///
/// ```rust
/// use pubcontrol::prelude::*;
/// use pubcontrol::inproc::{bind_pull, inproc_context};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pull = bind_pull("inproc://doc-client-push")?;
///
/// let options = ClientOptions::new("inproc://doc-client-control")
///     .with_push_uri("inproc://doc-client-push");
/// let client = PublishClient::new(options, Some(inproc_context()))?;
///
/// let item = Item::new().with_format("http-stream", Value::from("hello\n"));
/// client.publish("news", &item, false, None)?;
///
/// let frames = pull.recv_timeout(Duration::from_secs(1)).unwrap();
/// assert_eq!(frames.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct PublishClient {
    options: ClientOptions,
    push_endpoint: Option<Endpoint>,
    pub_endpoint: Option<Endpoint>,
    context: Context,
    socket: SharedSocket,
}

impl PublishClient {
    /// Create a client.
    ///
    /// Validates the configuration and, when a transport URI is set,
    /// connects eagerly. `context` defaults to [`default_context`].
    ///
    /// # Errors
    ///
    /// - configuration error if the control URI is empty, a transport URI
    ///   is malformed or the context cannot reach it
    /// - whatever the eager connect returns
    pub fn new(options: ClientOptions, context: Option<Context>) -> Result<Self> {
        let (push_endpoint, pub_endpoint) = options.validate()?;
        let context = context.unwrap_or_else(default_context);

        for endpoint in push_endpoint.iter().chain(pub_endpoint.iter()) {
            if !context.supports(endpoint) {
                return Err(PubControlError::config(format!(
                    "{} transport cannot reach {}",
                    context.name(),
                    endpoint
                )));
            }
        }

        let client = Self {
            options,
            push_endpoint,
            pub_endpoint,
            context,
            socket: Arc::new(Mutex::new(SocketSlot::new())),
        };
        if client.options.has_transport() {
            client.connect()?;
        }
        Ok(client)
    }

    /// Resolve and connect the socket.
    ///
    /// Idempotent: once a socket is resolved, later calls only re-check the
    /// configuration, even if the mode flags changed in between.
    pub fn connect(&self) -> Result<()> {
        self.options.validate_publish_targets()?;
        let mut slot = self.socket.lock();
        self.connect_locked(&mut slot)
    }

    fn connect_locked(&self, slot: &mut SocketSlot) -> Result<()> {
        if slot.is_connected() {
            return Ok(());
        }
        let Some(socket_type) = self.options.select_socket_type() else {
            trace!("[CLIENT] no eligible transport for current options");
            return Ok(());
        };
        let endpoint = match socket_type {
            SocketType::Push => self.push_endpoint.as_ref(),
            SocketType::XPub => self.pub_endpoint.as_ref(),
        }
        .ok_or_else(|| PubControlError::config(format!("no {} uri configured", socket_type)))?;

        let mut socket = self.context.socket(socket_type)?;
        socket.set_linger(None)?;
        if socket_type.reports_subscriptions() {
            // Subscription notifications must never be dropped
            socket.set_recv_hwm(0)?;
        }
        socket.connect(endpoint)?;

        let generation = slot.install(socket);
        debug!(
            "[CLIENT] {} socket connected to {} over {} (generation {})",
            socket_type,
            endpoint,
            self.context.name(),
            generation
        );
        Ok(())
    }

    /// Publish an item on a channel.
    ///
    /// PUSH sends one frame: the exported envelope plus a `channel` field.
    /// XPUB sends two frames: `[channel, envelope]`. Sends never block, so
    /// `blocking` has no effect; the callback, if any, is invoked with
    /// `(true, "")` once the message is handed to the transport.
    ///
    /// # Errors
    ///
    /// Configuration errors from [`connect`](Self::connect), codec errors,
    /// and transport faults. Nothing is retried.
    pub fn publish<I>(
        &self,
        channel: impl AsRef<[u8]>,
        item: &I,
        blocking: bool,
        callback: Option<PublishCallback>,
    ) -> Result<()>
    where
        I: FormattedItem + ?Sized,
    {
        let _ = blocking;
        self.options.validate_publish_targets()?;
        let envelope = item.export(true, true);
        let channel = channel_bytes(channel);

        {
            let mut slot = self.socket.lock();
            self.connect_locked(&mut slot)?;
            if let Some(socket) = slot.socket_mut() {
                send_envelope(socket, channel, envelope)?;
            } else {
                trace!("[CLIENT] publish dropped, no eligible transport");
            }
        }

        if let Some(callback) = callback {
            callback(true, "");
        }
        Ok(())
    }

    /// Close the socket. The next connect or publish reconnects.
    ///
    /// Idempotent. Ends any monitor watching the socket.
    pub fn close(&self) -> Result<()> {
        self.socket.lock().close()
    }

    /// Forbid or allow the XPUB transport. Has no effect on an already
    /// resolved socket.
    pub fn set_disable_pub(&mut self, disable: bool) {
        self.options.disable_pub = disable;
    }

    /// Require observable subscribers. Has no effect on an already resolved
    /// socket, but is checked by every later connect.
    pub fn set_require_subscriptions(&mut self, require: bool) {
        self.options.require_subscriptions = require;
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Archetype of the resolved socket, if any.
    pub fn socket_type(&self) -> Option<SocketType> {
        self.socket.lock().socket_type()
    }

    pub fn is_connected(&self) -> bool {
        self.socket.lock().is_connected()
    }

    /// The slot holding this client's socket, for monitors.
    pub fn shared_socket(&self) -> SharedSocket {
        Arc::clone(&self.socket)
    }

    /// Connect and start a [`SubscriptionMonitor`] on this client's socket.
    ///
    /// # Errors
    ///
    /// Configuration error unless the client resolves to an XPUB socket.
    pub fn monitor_subscriptions<F>(&self, callback: F) -> Result<SubscriptionMonitor>
    where
        F: FnMut(&SubscriptionEvent) + Send + 'static,
    {
        self.connect()?;
        SubscriptionMonitor::new(self.shared_socket(), callback)
    }
}

impl Drop for PublishClient {
    fn drop(&mut self) {
        let _ = self.socket.lock().close();
    }
}

impl fmt::Debug for PublishClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishClient")
            .field("options", &self.options)
            .field("context", &self.context)
            .field("socket", &*self.socket.lock())
            .finish()
    }
}

fn send_envelope(socket: &mut dyn Socket, channel: Bytes, mut envelope: Envelope) -> Result<()> {
    let socket_type = socket.socket_type();
    if socket_type.frames_channel() {
        let payload = tnetstring::encode_dict(&envelope)?;
        trace!("[CLIENT] {} {} bytes on {:?}", socket_type, payload.len(), channel);
        socket.send_multipart(vec![channel, payload])
    } else {
        envelope.insert(CHANNEL_FIELD.to_string(), Value::Bytes(channel));
        let frame = tnetstring::encode_dict(&envelope)?;
        trace!("[CLIENT] {} {} bytes", socket_type, frame.len());
        socket.send(frame)
    }
}
