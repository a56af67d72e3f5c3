//! Pubcontrol Core
//!
//! This crate contains the transport-agnostic building blocks of the publish
//! client:
//! - Client configuration and transport selection (`options`)
//! - Socket archetypes (`socket_type`) and endpoints (`endpoint`)
//! - Messaging substrate traits and the shared `Context` (`transport`)
//! - In-process fabric transport (`inproc`)
//! - Tnetstring wire codec (`tnetstring`)
//! - Publish items and envelopes (`item`)
//! - XPUB subscription control frames (`subscription`)
//! - Error types (`error`)

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
pub mod endpoint;
pub mod error;
pub mod inproc;
pub mod item;
pub mod options;
pub mod socket_type;
pub mod subscription;
pub mod tnetstring;
pub mod transport;

// Optional: a small prelude to make downstream crates ergonomic.
pub mod prelude {
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{PubControlError, Result};
    pub use crate::inproc::{bind_pull, bind_sub, inproc_context, InprocTransport};
    pub use crate::item::{channel_bytes, Envelope, FormattedItem, Item};
    pub use crate::options::ClientOptions;
    pub use crate::socket_type::SocketType;
    pub use crate::subscription::SubscriptionEvent;
    pub use crate::tnetstring::{Dict, Value};
    pub use crate::transport::{Context, PollState, ReadySignal, Socket, Transport};
}
