//! Subscription control frames and prefix filtering.
//!
//! XPUB sockets receive one control frame per subscription change:
//!
//! ```text
//! +------+----------------------+
//! | 0x01 | channel bytes ...    |   subscribe
//! +------+----------------------+
//! | 0x00 | channel bytes ...    |   unsubscribe
//! +------+----------------------+
//! ```

use bytes::Bytes;

/// Control frame type byte for subscribe.
pub const SUBSCRIBE: u8 = 0x01;

/// Control frame type byte for unsubscribe.
pub const UNSUBSCRIBE: u8 = 0x00;

/// Subscription event decoded from an XPUB control frame
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionEvent {
    /// A peer subscribed to a channel
    Subscribe(Bytes),
    /// A peer unsubscribed from a channel
    Unsubscribe(Bytes),
}

impl SubscriptionEvent {
    /// Decode a control frame.
    ///
    /// Returns `None` for empty frames and unknown type bytes.
    #[must_use]
    pub fn from_message(msg: &Bytes) -> Option<Self> {
        let (&kind, _) = msg.split_first()?;
        let channel = msg.slice(1..);
        match kind {
            SUBSCRIBE => Some(Self::Subscribe(channel)),
            UNSUBSCRIBE => Some(Self::Unsubscribe(channel)),
            _ => None,
        }
    }

    /// Encode this event as a control frame
    #[must_use]
    pub fn to_message(&self) -> Bytes {
        let (cmd, channel) = match self {
            Self::Subscribe(c) => (SUBSCRIBE, c),
            Self::Unsubscribe(c) => (UNSUBSCRIBE, c),
        };

        let mut msg = Vec::with_capacity(1 + channel.len());
        msg.push(cmd);
        msg.extend_from_slice(channel);
        Bytes::from(msg)
    }

    /// Event kind as reported to observers: `"sub"` or `"unsub"`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => "sub",
            Self::Unsubscribe(_) => "unsub",
        }
    }

    /// Raw channel bytes
    #[must_use]
    pub const fn channel(&self) -> &Bytes {
        match self {
            Self::Subscribe(c) | Self::Unsubscribe(c) => c,
        }
    }

    /// Check if this is a subscribe event
    #[must_use]
    pub const fn is_subscribe(&self) -> bool {
        matches!(self, Self::Subscribe(_))
    }
}

/// Prefix subscriptions held by a subscriber endpoint.
///
/// Follows SUB socket semantics: a message is delivered when its first frame
/// starts with any subscribed prefix; the empty prefix matches everything.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
    prefixes: Vec<Bytes>,
}

impl SubscriptionSet {
    /// Create a new empty set
    #[must_use]
    pub const fn new() -> Self {
        Self {
            prefixes: Vec::new(),
        }
    }

    /// Add a prefix. Returns false if it was already present.
    pub fn subscribe(&mut self, prefix: Bytes) -> bool {
        if self.prefixes.contains(&prefix) {
            return false;
        }
        self.prefixes.push(prefix);
        true
    }

    /// Remove a prefix. Returns false if it was not present.
    pub fn unsubscribe(&mut self, prefix: &[u8]) -> bool {
        let before = self.prefixes.len();
        self.prefixes.retain(|p| p.as_ref() != prefix);
        self.prefixes.len() != before
    }

    /// Check if a topic matches any subscription
    #[must_use]
    pub fn matches(&self, topic: &[u8]) -> bool {
        self.prefixes.iter().any(|p| topic.starts_with(p))
    }

    /// Current prefixes, in subscription order
    #[must_use]
    pub fn prefixes(&self) -> &[Bytes] {
        &self.prefixes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_control_frames() {
        let sub = SubscriptionEvent::from_message(&Bytes::from_static(b"\x01news")).unwrap();
        assert_eq!(sub, SubscriptionEvent::Subscribe(Bytes::from_static(b"news")));
        assert_eq!(sub.kind(), "sub");

        let unsub = SubscriptionEvent::from_message(&Bytes::from_static(b"\x00news")).unwrap();
        assert_eq!(unsub.kind(), "unsub");
        assert_eq!(unsub.channel().as_ref(), b"news");
        assert!(!unsub.is_subscribe());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(SubscriptionEvent::from_message(&Bytes::new()), None);
        assert_eq!(SubscriptionEvent::from_message(&Bytes::from_static(b"\x02news")), None);
    }

    #[test]
    fn test_empty_channel_subscribe() {
        // Subscribing to everything is a bare type byte
        let event = SubscriptionEvent::from_message(&Bytes::from_static(b"\x01")).unwrap();
        assert!(event.channel().is_empty());
        assert_eq!(event.to_message().as_ref(), b"\x01");
    }

    #[test]
    fn test_prefix_matching() {
        let mut set = SubscriptionSet::new();
        assert!(!set.matches(b"news"));

        assert!(set.subscribe(Bytes::from_static(b"news.")));
        assert!(!set.subscribe(Bytes::from_static(b"news.")));
        assert!(set.matches(b"news.sports"));
        assert!(!set.matches(b"weather"));

        assert!(set.unsubscribe(b"news."));
        assert!(!set.unsubscribe(b"news."));
        assert!(set.is_empty());

        set.subscribe(Bytes::new());
        assert!(set.matches(b"anything"));
    }
}
