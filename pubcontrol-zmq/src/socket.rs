//! libzmq socket wrapper.

use bytes::Bytes;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use pubcontrol_core::endpoint::Endpoint;
use pubcontrol_core::error::{PubControlError, Result};
use pubcontrol_core::socket_type::SocketType;
use pubcontrol_core::transport::{PollState, ReadySignal, Socket};

/// A PUSH or XPUB libzmq socket.
///
/// Every send and receive uses `ZMQ_DONTWAIT`: a full queue surfaces as a
/// `WouldBlock` I/O error instead of stalling the caller while it holds the
/// client lock.
pub struct ZmqSocket {
    socket: Option<zmq::Socket>,
    kind: SocketType,
    closed: Arc<AtomicBool>,
}

impl ZmqSocket {
    pub fn new(ctx: &zmq::Context, kind: SocketType) -> Result<Self> {
        let raw = match kind {
            SocketType::Push => zmq::PUSH,
            SocketType::XPub => zmq::XPUB,
        };
        let socket = ctx.socket(raw).map_err(map_zmq_error)?;
        Ok(Self {
            socket: Some(socket),
            kind,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn live(&self) -> Result<&zmq::Socket> {
        self.socket.as_ref().ok_or(PubControlError::SocketClosed)
    }
}

impl Socket for ZmqSocket {
    fn socket_type(&self) -> SocketType {
        self.kind
    }

    fn set_linger(&mut self, linger: Option<Duration>) -> Result<()> {
        let ms = linger.map_or(0, |d| i32::try_from(d.as_millis()).unwrap_or(i32::MAX));
        self.live()?.set_linger(ms).map_err(map_zmq_error)
    }

    fn set_recv_hwm(&mut self, hwm: usize) -> Result<()> {
        let hwm = i32::try_from(hwm).unwrap_or(i32::MAX);
        self.live()?.set_rcvhwm(hwm).map_err(map_zmq_error)
    }

    fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.live()?
            .connect(&endpoint.to_string())
            .map_err(map_zmq_error)?;
        debug!("[ZMQ] {} connected to {}", self.kind, endpoint);
        Ok(())
    }

    fn disconnect(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.live()?
            .disconnect(&endpoint.to_string())
            .map_err(map_zmq_error)?;
        debug!("[ZMQ] {} disconnected from {}", self.kind, endpoint);
        Ok(())
    }

    fn send(&mut self, frame: Bytes) -> Result<()> {
        self.live()?
            .send(&frame[..], zmq::DONTWAIT)
            .map_err(map_zmq_error)?;
        trace!("[ZMQ] {} sent {} bytes", self.kind, frame.len());
        Ok(())
    }

    fn send_multipart(&mut self, frames: Vec<Bytes>) -> Result<()> {
        self.live()?
            .send_multipart(frames.iter().map(|f| &f[..]), zmq::DONTWAIT)
            .map_err(map_zmq_error)?;
        trace!("[ZMQ] {} sent {} frames", self.kind, frames.len());
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Bytes>> {
        match self.live()?.recv_bytes(zmq::DONTWAIT) {
            Ok(frame) => Ok(Some(Bytes::from(frame))),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(e) => Err(map_zmq_error(e)),
        }
    }

    fn ready_signal(&self) -> Option<Arc<dyn ReadySignal>> {
        if !self.kind.reports_subscriptions() {
            return None;
        }
        let socket = self.socket.as_ref()?;
        ready_signal_for(socket, Arc::clone(&self.closed))
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        if let Some(socket) = self.socket.take() {
            // Pending outbound messages are discarded, never flushed
            let _ = socket.set_linger(0);
            drop(socket);
            debug!("[ZMQ] {} closed", self.kind);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.socket.is_none()
    }
}

impl Drop for ZmqSocket {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

fn map_zmq_error(e: zmq::Error) -> PubControlError {
    match e {
        zmq::Error::EAGAIN => PubControlError::Io(io::Error::from(e)),
        zmq::Error::ETERM | zmq::Error::ENOTSOCK => PubControlError::SocketClosed,
        _ => PubControlError::transport(e.to_string()),
    }
}

#[cfg(unix)]
fn ready_signal_for(socket: &zmq::Socket, closed: Arc<AtomicBool>) -> Option<Arc<dyn ReadySignal>> {
    let fd = socket.get_fd().ok()?;
    Some(Arc::new(FdSignal { fd, closed }))
}

#[cfg(not(unix))]
fn ready_signal_for(_socket: &zmq::Socket, closed: Arc<AtomicBool>) -> Option<Arc<dyn ReadySignal>> {
    Some(Arc::new(SleepSignal { closed }))
}

/// Polls the socket's `ZMQ_FD`.
///
/// The descriptor is edge-triggered and only says "libzmq has work for this
/// socket", so `Readable` is a hint; callers follow it with `try_recv`.
#[cfg(unix)]
struct FdSignal {
    fd: std::os::unix::io::RawFd,
    closed: Arc<AtomicBool>,
}

#[cfg(unix)]
impl ReadySignal for FdSignal {
    fn wait_readable(&self, timeout: Duration) -> PollState {
        if self.closed.load(Ordering::Acquire) {
            return PollState::Closed;
        }
        // The fd is polled without the socket lock, so a concurrent close can
        // free it and the number can be reused. A stray wakeup costs at most
        // one timeout, and the caller's generation check under the lock stops
        // it from touching a replaced socket.
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        let mut items = [zmq::PollItem::from_fd(self.fd, zmq::POLLIN)];
        let polled = zmq::poll(&mut items, timeout_ms);
        if self.closed.load(Ordering::Acquire) {
            return PollState::Closed;
        }
        match polled {
            Ok(n) if n > 0 => PollState::Readable,
            Ok(_) => PollState::TimedOut,
            // EINTR and friends: let the caller retry the receive
            Err(_) => PollState::Readable,
        }
    }
}

/// Fallback where the socket descriptor can't be polled: wake up on every
/// timeout and let the caller try a receive.
#[cfg(not(unix))]
struct SleepSignal {
    closed: Arc<AtomicBool>,
}

#[cfg(not(unix))]
impl ReadySignal for SleepSignal {
    fn wait_readable(&self, timeout: Duration) -> PollState {
        if self.closed.load(Ordering::Acquire) {
            return PollState::Closed;
        }
        std::thread::sleep(timeout.min(Duration::from_millis(10)));
        if self.closed.load(Ordering::Acquire) {
            PollState::Closed
        } else {
            PollState::Readable
        }
    }
}
