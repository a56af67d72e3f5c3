//! Publish client configuration
//!
//! `ClientOptions` carries the endpoint configuration of a publish client and
//! the two mode flags that decide which transport archetype is used. Mode
//! selection is a pure function of these options so it can be reasoned about
//! (and tested) without any sockets.

use crate::endpoint::Endpoint;
use crate::error::{PubControlError, Result};
use crate::socket_type::SocketType;

/// Endpoint configuration for a publish client.
///
/// # Examples
///
/// ```
/// use pubcontrol_core::options::ClientOptions;
/// use pubcontrol_core::socket_type::SocketType;
///
/// let opts = ClientOptions::new("tcp://localhost:5563")
///     .with_push_uri("tcp://localhost:5560")
///     .with_pub_uri("tcp://localhost:5562");
///
/// // PUSH wins when both are configured and subscriptions are not required
/// assert_eq!(opts.select_socket_type(), Some(SocketType::Push));
///
/// let opts = opts.with_require_subscriptions(true);
/// assert_eq!(opts.select_socket_type(), Some(SocketType::XPub));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Control (request) endpoint. Required, never used by the publish path.
    pub control_uri: String,

    /// Fire-and-forget PUSH endpoint.
    pub push_uri: Option<String>,

    /// Broadcast XPUB endpoint.
    pub pub_uri: Option<String>,

    /// Only publish when subscribers can be observed.
    ///
    /// - `false` (default): PUSH is allowed
    /// - `true`: PUSH is forbidden, XPUB is forced even if a push URI is set
    pub require_subscriptions: bool,

    /// Forbid the XPUB transport under any configuration.
    pub disable_pub: bool,
}

impl ClientOptions {
    /// Create options for the given control endpoint with no transports.
    pub fn new(control_uri: impl Into<String>) -> Self {
        Self {
            control_uri: control_uri.into(),
            push_uri: None,
            pub_uri: None,
            require_subscriptions: false,
            disable_pub: false,
        }
    }

    /// Set the PUSH endpoint.
    #[must_use]
    pub fn with_push_uri(mut self, uri: impl Into<String>) -> Self {
        self.push_uri = Some(uri.into());
        self
    }

    /// Set the XPUB endpoint.
    #[must_use]
    pub fn with_pub_uri(mut self, uri: impl Into<String>) -> Self {
        self.pub_uri = Some(uri.into());
        self
    }

    /// Require observable subscribers (forces XPUB).
    #[must_use]
    pub const fn with_require_subscriptions(mut self, require: bool) -> Self {
        self.require_subscriptions = require;
        self
    }

    /// Forbid the XPUB transport.
    #[must_use]
    pub const fn with_disable_pub(mut self, disable: bool) -> Self {
        self.disable_pub = disable;
        self
    }

    /// Returns true if at least one transport endpoint is configured.
    pub fn has_transport(&self) -> bool {
        self.push_uri.is_some() || self.pub_uri.is_some()
    }

    /// Check the static shape of the configuration.
    ///
    /// The control URI must be non-empty and every configured transport URI
    /// must parse as an endpoint. Returns the parsed transport endpoints as
    /// `(push, pub)`.
    pub fn validate(&self) -> Result<(Option<Endpoint>, Option<Endpoint>)> {
        if self.control_uri.trim().is_empty() {
            return Err(PubControlError::config("control uri must not be empty"));
        }
        let push = self.push_uri.as_deref().map(Endpoint::parse).transpose()?;
        let publ = self.pub_uri.as_deref().map(Endpoint::parse).transpose()?;
        Ok((push, publ))
    }

    /// Check that the configuration allows publishing at all.
    ///
    /// Runs before every connect attempt:
    /// - at least one of the PUSH/XPUB endpoints must be set
    /// - `require_subscriptions` needs an XPUB endpoint
    pub fn validate_publish_targets(&self) -> Result<()> {
        if !self.has_transport() {
            return Err(PubControlError::config(
                "either a pub or push uri must be set to publish",
            ));
        }
        if self.pub_uri.is_none() && self.require_subscriptions {
            return Err(PubControlError::config(
                "pub uri must be set if require_subscriptions is set to true",
            ));
        }
        Ok(())
    }

    /// Pick the transport archetype for this configuration.
    ///
    /// Precedence:
    /// 1. XPUB if a pub URI is set, pub is not disabled, and either no push
    ///    URI is set or subscriptions are required
    /// 2. PUSH if a push URI is set and subscriptions are not required
    /// 3. nothing: no eligible transport, publishing becomes a no-op
    pub fn select_socket_type(&self) -> Option<SocketType> {
        if self.pub_uri.is_some()
            && !self.disable_pub
            && (self.push_uri.is_none() || self.require_subscriptions)
        {
            Some(SocketType::XPub)
        } else if self.push_uri.is_some() && !self.require_subscriptions {
            Some(SocketType::Push)
        } else {
            None
        }
    }
}
