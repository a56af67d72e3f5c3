//! # Pubcontrol ZMQ
//!
//! libzmq-backed [`Transport`](pubcontrol_core::transport::Transport) for the
//! publish client.
//!
//! ## Overview
//!
//! - **PUSH**: single-frame sends, `ZMQ_DONTWAIT`
//! - **XPUB**: multipart sends plus subscription control frames, with an
//!   unbounded receive high-water mark
//! - **Readiness**: the socket's `ZMQ_FD` is polled from the monitor thread
//!   without touching the socket itself
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pubcontrol_core::endpoint::Endpoint;
//! use pubcontrol_core::socket_type::SocketType;
//! use pubcontrol_zmq::zmq_context;
//! use bytes::Bytes;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut socket = zmq_context().socket(SocketType::Push)?;
//!     socket.set_linger(None)?;
//!     socket.connect(&Endpoint::parse("tcp://127.0.0.1:5560")?)?;
//!     socket.send(Bytes::from_static(b"5:hello,"))?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]

mod context;
mod socket;

pub use context::{global_context, zmq_context, ZmqTransport};
pub use socket::ZmqSocket;
