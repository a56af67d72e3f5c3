//! XPUB subscription monitor.
//!
//! Watches the control frames an XPUB socket receives and reports
//! subscription changes to a callback, on a dedicated OS thread:
//!
//! ```text
//! loop:
//!   wait for readiness (bounded, outside the lock)
//!   lock slot -> still my socket? -> try_recv one frame -> handle -> unlock
//! ```
//!
//! Subscribe events are deduplicated against the channels already seen.
//! Unsubscribe events are always reported, even for channels that were never
//! seen subscribing.

use bytes::Bytes;
use hashbrown::HashSet;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

use pubcontrol_core::error::{PubControlError, Result};
use pubcontrol_core::subscription::SubscriptionEvent;
use pubcontrol_core::transport::{PollState, ReadySignal};

use crate::client::SharedSocket;

/// Upper bound on one readiness wait. Lets the loop notice a socket that was
/// replaced without its signal firing, and covers edge-triggered readiness.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type KnownChannels = Arc<Mutex<HashSet<Bytes>>>;

/// Which control frames a monitor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorPolicy {
    /// Report unsubscribes for channels never seen subscribing.
    pub report_unknown_unsubscribes: bool,
    /// Drop frames whose channel is not valid UTF-8, with a warning.
    pub utf8_channels_only: bool,
}

impl MonitorPolicy {
    /// Only known channels are reported as unsubscribed, and channels must
    /// be UTF-8. Used by [`PubController`](crate::PubController).
    pub const fn strict() -> Self {
        Self {
            report_unknown_unsubscribes: false,
            utf8_channels_only: true,
        }
    }
}

impl Default for MonitorPolicy {
    /// Every unsubscribe is reported and channels are raw bytes.
    fn default() -> Self {
        Self {
            report_unknown_unsubscribes: true,
            utf8_channels_only: false,
        }
    }
}

/// Background observer of XPUB subscription changes.
///
/// The callback runs on the monitor thread while the client's socket lock is
/// held: it must not block for long and must not publish through the same
/// client.
///
/// The monitor runs until the watched socket is closed: by
/// [`PublishClient::close`](crate::PublishClient::close), by dropping the
/// client, or by [`stop`](Self::stop).
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
/// let sub = bind_sub("inproc://doc-monitor")?;
/// let options = ClientOptions::new("inproc://doc-monitor-control")
///     .with_pub_uri("inproc://doc-monitor");
/// let client = PublishClient::new(options, Some(inproc_context()))?;
///
/// let (tx, rx) = mpsc::channel();
/// let monitor = client.monitor_subscriptions(move |event: &SubscriptionEvent| {
///     let _ = tx.send((event.kind(), event.channel().clone()));
/// })?;
///
/// sub.subscribe("news");
/// let (kind, channel) = rx.recv_timeout(Duration::from_secs(1))?;
/// assert_eq!(kind, "sub");
/// assert_eq!(channel.as_ref(), b"news");
///
/// monitor.stop()?;
/// # Ok(())
/// # }
/// ```
pub struct SubscriptionMonitor {
    socket: SharedSocket,
    known: KnownChannels,
    handle: Option<JoinHandle<Result<()>>>,
}

impl SubscriptionMonitor {
    /// Start monitoring the XPUB socket held in `socket` with the default
    /// [`MonitorPolicy`].
    ///
    /// # Errors
    ///
    /// Configuration error if the slot does not hold a connected XPUB
    /// socket; I/O error if the thread cannot be spawned.
    pub fn new<F>(socket: SharedSocket, callback: F) -> Result<Self>
    where
        F: FnMut(&SubscriptionEvent) + Send + 'static,
    {
        Self::with_policy(socket, MonitorPolicy::default(), callback)
    }

    /// Start monitoring with an explicit [`MonitorPolicy`].
    pub fn with_policy<F>(socket: SharedSocket, policy: MonitorPolicy, callback: F) -> Result<Self>
    where
        F: FnMut(&SubscriptionEvent) + Send + 'static,
    {
        let (generation, signal) = {
            let mut slot = socket.lock();
            let generation = slot.generation();
            let live = slot
                .socket_mut()
                .filter(|s| s.socket_type().reports_subscriptions());
            let Some(live) = live else {
                return Err(PubControlError::config(
                    "subscription monitoring needs a connected XPUB socket",
                ));
            };
            let signal = live.ready_signal().ok_or_else(|| {
                PubControlError::config("socket does not provide a readiness signal")
            })?;
            (generation, signal)
        };

        let known: KnownChannels = Arc::new(Mutex::new(HashSet::new()));
        let worker = Worker {
            socket: Arc::clone(&socket),
            generation,
            signal,
            filter: EventFilter {
                known: Arc::clone(&known),
                policy,
                callback,
            },
        };
        let handle = thread::Builder::new()
            .name("pubcontrol-submon".to_string())
            .spawn(move || {
                let result = worker.run();
                if let Err(e) = &result {
                    warn!("[MONITOR] stopped on receive error: {}", e);
                }
                result
            })?;
        debug!("[MONITOR] started (generation {}, {:?})", generation, policy);

        Ok(Self {
            socket,
            known,
            handle: Some(handle),
        })
    }

    /// Returns true while the monitor thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Whether a subscribe for `channel` has been seen and not undone.
    pub fn is_subscribed(&self, channel: impl AsRef<[u8]>) -> bool {
        self.known.lock().contains(channel.as_ref())
    }

    /// Snapshot of the currently known channels.
    pub fn subscriptions(&self) -> Vec<Bytes> {
        self.known.lock().iter().cloned().collect()
    }

    /// Wait for the monitor thread to end and return its result.
    ///
    /// Blocks until the watched socket is closed.
    pub fn join(mut self) -> Result<()> {
        self.join_thread()
    }

    /// Close the watched socket and wait for the thread to end.
    ///
    /// This closes the owning client's socket too; the client reconnects on
    /// its next publish.
    pub fn stop(mut self) -> Result<()> {
        self.socket.lock().close()?;
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| {
                PubControlError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "subscription monitor thread panicked",
                ))
            })?,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for SubscriptionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionMonitor")
            .field("running", &self.is_running())
            .field("subscriptions", &self.known.lock().len())
            .finish()
    }
}

struct Worker<F> {
    socket: SharedSocket,
    generation: u64,
    signal: Arc<dyn ReadySignal>,
    filter: EventFilter<F>,
}

impl<F> Worker<F>
where
    F: FnMut(&SubscriptionEvent),
{
    fn run(mut self) -> Result<()> {
        let mut pending = false;
        loop {
            // Frames may already be queued right after a successful receive
            if !pending && self.signal.wait_readable(POLL_INTERVAL) == PollState::Closed {
                debug!("[MONITOR] socket closed, exiting");
                return Ok(());
            }

            let mut slot = self.socket.lock();
            if slot.generation() != self.generation {
                debug!("[MONITOR] socket replaced, exiting");
                return Ok(());
            }
            let Some(socket) = slot.socket_mut() else {
                debug!("[MONITOR] socket closed, exiting");
                return Ok(());
            };
            let frame = match socket.try_recv() {
                Ok(frame) => frame,
                Err(PubControlError::SocketClosed) => return Ok(()),
                Err(e) => return Err(e),
            };
            pending = frame.is_some();
            if let Some(frame) = frame {
                self.filter.handle_frame(&frame);
            }
        }
    }
}

/// Known-channel bookkeeping and callback dispatch, kept apart from the
/// socket so it can run while the slot guard is held.
struct EventFilter<F> {
    known: KnownChannels,
    policy: MonitorPolicy,
    callback: F,
}

impl<F> EventFilter<F>
where
    F: FnMut(&SubscriptionEvent),
{
    fn handle_frame(&mut self, frame: &Bytes) {
        let Some(event) = SubscriptionEvent::from_message(frame) else {
            debug!("[MONITOR] ignoring control frame {:02x?}", frame.first());
            return;
        };
        if self.policy.utf8_channels_only && std::str::from_utf8(event.channel()).is_err() {
            warn!("[MONITOR] ignoring non-utf8 channel {:?}", event.channel());
            return;
        }
        match &event {
            SubscriptionEvent::Subscribe(channel) => {
                if !self.known.lock().insert(channel.clone()) {
                    trace!("[MONITOR] duplicate subscribe {:?}", channel);
                    return;
                }
            }
            SubscriptionEvent::Unsubscribe(channel) => {
                let was_known = self.known.lock().remove(channel);
                if !was_known && !self.policy.report_unknown_unsubscribes {
                    trace!("[MONITOR] unsubscribe for unknown {:?}", channel);
                    return;
                }
            }
        }
        trace!("[MONITOR] {} {:?}", event.kind(), event.channel());
        (self.callback)(&event);
    }
}
