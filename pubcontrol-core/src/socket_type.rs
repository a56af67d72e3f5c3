//! Socket archetypes used by the publish client.
//!
//! The client only ever instantiates one of two ZeroMQ sender types: a
//! fire-and-forget PUSH socket or a subscription-aware XPUB socket. The
//! archetype decides how an envelope is framed on the wire.

use std::fmt;

/// Sender socket archetypes.
///
/// Discriminants match the ZeroMQ `ZMQ_TYPE` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SocketType {
    /// PUSH socket: queue-backed, no subscriber feedback, single-frame sends
    Push = 8,

    /// XPUB socket: topic-filtered broadcast that reports subscriber presence
    /// through inline control frames
    XPub = 9,
}

impl SocketType {
    /// Get the socket type as a string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "PUSH",
            Self::XPub => "XPUB",
        }
    }

    /// Whether sends on this archetype carry the channel as a separate
    /// leading frame.
    ///
    /// XPUB subscribers filter on the first frame, so the channel travels
    /// outside the payload. PUSH consumers read the channel from the
    /// envelope itself.
    #[inline]
    pub const fn frames_channel(&self) -> bool {
        matches!(self, Self::XPub)
    }

    /// Whether this archetype delivers subscribe/unsubscribe control frames.
    #[inline]
    pub const fn reports_subscriptions(&self) -> bool {
        matches!(self, Self::XPub)
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
