//! # Pubcontrol
//!
//! Publish-side client for a ZeroMQ messaging fabric.
//!
//! ## Architecture
//!
//! - **`pubcontrol-core`**: options, endpoints, tnetstring codec, item
//!   contract, transport traits and the in-process fabric
//! - **`pubcontrol-zmq`**: libzmq transport (feature `zmq`)
//! - **`pubcontrol`**: [`PublishClient`], [`SubscriptionMonitor`] and
//!   [`PubController`] (this crate)
//!
//! ## Transports
//!
//! A client publishes over exactly one socket:
//!
//! - **PUSH**: fire-and-forget; one frame, the tnetstring envelope with a
//!   `channel` field added
//! - **XPUB**: broadcast; two frames, `[channel, envelope]`, and subscriber
//!   presence reported through control frames
//!
//! The archetype is picked from [`ClientOptions`] on first connect and kept
//! until [`PublishClient::close`].
//!
//! ```toml
//! [dependencies]
//! pubcontrol = { version = "0.1", features = ["zmq"] }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pubcontrol::prelude::*;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ClientOptions::new("tcp://localhost:5563")
//!     .with_pub_uri("tcp://localhost:5562")
//!     .with_require_subscriptions(true);
//! let client = PublishClient::new(options, None)?;
//!
//! let _monitor = client.monitor_subscriptions(|event: &SubscriptionEvent| {
//!     println!("{} {:?}", event.kind(), event.channel());
//! })?;
//!
//! let item = Item::new().with_format("http-stream", Value::from("hello\n"));
//! client.publish("news", &item, false, None)?;
//! # Ok(())
//! # }
//! ```
//!
//! Without the `zmq` feature the default context is the in-process fabric,
//! which only reaches `inproc://` endpoints bound in the same process.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod controller;
pub mod dev_tracing;
pub mod monitor;

pub use bytes::Bytes;
pub use client::{default_context, ConnectionState, PublishCallback, PublishClient, SharedSocket, SocketSlot};
pub use controller::PubController;
pub use monitor::{MonitorPolicy, SubscriptionMonitor};
pub use pubcontrol_core::endpoint::{Endpoint, EndpointError};
pub use pubcontrol_core::error::{PubControlError, Result};
pub use pubcontrol_core::item::{channel_bytes, Envelope, FormattedItem, Item, CHANNEL_FIELD};
pub use pubcontrol_core::options::ClientOptions;
pub use pubcontrol_core::socket_type::SocketType;
pub use pubcontrol_core::subscription::SubscriptionEvent;
pub use pubcontrol_core::tnetstring;
pub use pubcontrol_core::transport::{Context, PollState, ReadySignal, Socket, Transport};

/// In-process fabric: bindable PULL/SUB endpoints and their context.
pub mod inproc {
    pub use pubcontrol_core::inproc::{
        bind_pull, bind_sub, inproc_context, list_inproc_endpoints, InprocMessage,
        InprocTransport, PullEndpoint, SubEndpoint,
    };
}

/// libzmq transport.
#[cfg(feature = "zmq")]
pub mod zmq {
    pub use pubcontrol_zmq::{global_context, zmq_context, ZmqSocket, ZmqTransport};
}

/// Convenient imports for publishing.
///
/// # Example
///
/// ```rust
/// use pubcontrol::prelude::*;
///
/// // Now you have:
/// // - PublishClient, SubscriptionMonitor, PubController, ClientOptions
/// // - Item, Value, SubscriptionEvent, Bytes
/// ```
pub mod prelude {
    pub use crate::client::{PublishCallback, PublishClient};
    pub use crate::controller::PubController;
    pub use crate::monitor::{MonitorPolicy, SubscriptionMonitor};
    pub use bytes::Bytes;
    pub use pubcontrol_core::error::PubControlError;
    pub use pubcontrol_core::item::{Envelope, FormattedItem, Item};
    pub use pubcontrol_core::options::ClientOptions;
    pub use pubcontrol_core::socket_type::SocketType;
    pub use pubcontrol_core::subscription::SubscriptionEvent;
    pub use pubcontrol_core::tnetstring::{Dict, Value};
}
