/// Pubcontrol Error Types
///
/// Error handling for client configuration, transports and the wire codec.

use std::io;
use thiserror::Error;

use crate::endpoint::EndpointError;
use crate::tnetstring::TnetstringError;

/// Main error type for pubcontrol operations
#[derive(Error, Debug)]
pub enum PubControlError {
    /// Missing or contradictory client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed endpoint URI
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// IO error from an in-process transport
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Fault reported by the underlying messaging library
    #[error("Transport error: {0}")]
    Transport(String),

    /// Wire encoding or decoding failure
    #[error("Codec error: {0}")]
    Codec(#[from] TnetstringError),

    /// Socket closed
    #[error("Socket closed")]
    SocketClosed,
}

/// Result type alias for pubcontrol operations
pub type Result<T> = std::result::Result<T, PubControlError>;

impl PubControlError {
    /// Create a configuration error with a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transport error with a message
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Check if this error is a configuration problem.
    ///
    /// Configuration errors are programmer errors: they are raised before any
    /// I/O happens and must never be retried.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Endpoint(_))
    }

    /// Check if this is a connection error
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::SocketClosed | Self::Transport(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::NotConnected
                    | io::ErrorKind::NotFound
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionRefused
            ),
            _ => false,
        }
    }
}
