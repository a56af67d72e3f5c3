//! Publishable items and channel normalization.
//!
//! A publish client never looks inside the payload it sends. It asks the item
//! to export itself into an [`Envelope`], a tnetstring dictionary, and only
//! ever adds a `channel` field to it (PUSH transport).

use bytes::Bytes;

use crate::tnetstring::{Dict, Value};

/// Envelope ready for wire serialization.
pub type Envelope = Dict;

/// Field added to PUSH envelopes carrying the target channel.
pub const CHANNEL_FIELD: &str = "channel";

/// Anything that can render itself into a transport envelope.
///
/// The two capability flags are requests from the transport:
/// - `binary_safe`: the wire format can carry arbitrary bytes, so content
///   does not need text-safe encoding (e.g. base64)
/// - `framed`: the transport frames channel and payload itself and can carry
///   the multi-format envelope as-is
pub trait FormattedItem {
    fn export(&self, binary_safe: bool, framed: bool) -> Envelope;
}

impl FormattedItem for Envelope {
    fn export(&self, _binary_safe: bool, _framed: bool) -> Envelope {
        self.clone()
    }
}

/// A publish item: optional id / previous id plus one or more named formats.
///
/// # Examples
///
/// ```
/// use pubcontrol_core::item::{FormattedItem, Item};
/// use pubcontrol_core::tnetstring::{Dict, Value};
///
/// let mut stream = Dict::new();
/// stream.insert("content".into(), Value::from("hello\n"));
///
/// let item = Item::new()
///     .with_id("2")
///     .with_prev_id("1")
///     .with_format("http-stream", Value::Dict(stream));
///
/// let envelope = item.export(true, true);
/// assert_eq!(envelope["id"].as_str(), Some("2"));
/// assert_eq!(envelope["prev-id"].as_str(), Some("1"));
/// assert!(envelope.contains_key("http-stream"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    id: Option<String>,
    prev_id: Option<String>,
    formats: Dict,
}

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_prev_id(mut self, prev_id: impl Into<String>) -> Self {
        self.prev_id = Some(prev_id.into());
        self
    }

    /// Add a named format. A later format with the same name replaces the
    /// earlier one.
    #[must_use]
    pub fn with_format(mut self, name: impl Into<String>, content: Value) -> Self {
        self.formats.insert(name.into(), content);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn prev_id(&self) -> Option<&str> {
        self.prev_id.as_deref()
    }
}

impl FormattedItem for Item {
    fn export(&self, _binary_safe: bool, _framed: bool) -> Envelope {
        let mut out = self.formats.clone();
        if let Some(id) = &self.id {
            out.insert("id".into(), Value::from(id.as_str()));
        }
        if let Some(prev_id) = &self.prev_id {
            out.insert("prev-id".into(), Value::from(prev_id.as_str()));
        }
        out
    }
}

/// Normalize a channel name to the bytes used on the wire.
///
/// `&str`/`String` channels are already UTF-8; byte channels are passed
/// through untouched.
pub fn channel_bytes(channel: impl AsRef<[u8]>) -> Bytes {
    Bytes::copy_from_slice(channel.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_export_fields() {
        let item = Item::new().with_format("json-object", Value::from("{}"));
        let envelope = item.export(true, true);
        assert_eq!(envelope.len(), 1);
        assert!(!envelope.contains_key("id"));

        let envelope = item.clone().with_id("a").export(false, false);
        assert_eq!(envelope["id"].as_str(), Some("a"));
        assert_eq!(envelope["json-object"].as_str(), Some("{}"));
    }

    #[test]
    fn test_envelope_exports_itself() {
        let mut envelope = Envelope::new();
        envelope.insert("content".into(), Value::Int(1));
        assert_eq!(envelope.export(true, true), envelope);
    }

    #[test]
    fn test_channel_bytes() {
        assert_eq!(channel_bytes("news").as_ref(), b"news");
        assert_eq!(channel_bytes(String::from("caf\u{e9}")).as_ref(), "caf\u{e9}".as_bytes());
        assert_eq!(channel_bytes(b"\xffraw").as_ref(), b"\xffraw");
    }
}
