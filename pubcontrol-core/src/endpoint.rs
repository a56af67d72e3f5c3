//! Publish endpoint URIs.
//!
//! Client configuration parses every transport URI up front, so a malformed
//! address is reported as a configuration error when the client is built
//! instead of as a transport fault on the first publish. Addresses follow the
//! ZeroMQ connect syntax: `tcp://host:port`, `ipc://path`, `inproc://name`.

use std::fmt;
#[cfg(unix)]
use std::path::PathBuf;
use std::str::FromStr;

/// A parsed connect address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `tcp://host:port`. The host (name, IPv4 or bracketed IPv6) is kept
    /// verbatim and resolved by the transport.
    Tcp { host: String, port: u16 },
    /// `ipc:///path/to/socket` (Unix domain socket).
    #[cfg(unix)]
    Ipc(PathBuf),
    /// `inproc://name`, only reachable from the same process.
    Inproc(String),
}

impl Endpoint {
    /// Parse a connect URI.
    ///
    /// # Examples
    ///
    /// ```
    /// use pubcontrol_core::endpoint::Endpoint;
    ///
    /// let push = Endpoint::parse("tcp://localhost:5560").unwrap();
    /// assert_eq!(push.scheme(), "tcp");
    ///
    /// let local = Endpoint::parse("inproc://publish").unwrap();
    /// assert!(local.is_inproc());
    ///
    /// // Publishers connect, so bind wildcards are rejected
    /// assert!(Endpoint::parse("tcp://*:5560").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        s.parse()
    }

    /// URI scheme without the `://` separator.
    pub fn scheme(&self) -> &'static str {
        match self {
            Endpoint::Tcp { .. } => "tcp",
            #[cfg(unix)]
            Endpoint::Ipc(_) => "ipc",
            Endpoint::Inproc(_) => "inproc",
        }
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self, Endpoint::Tcp { .. })
    }

    #[cfg(unix)]
    pub fn is_ipc(&self) -> bool {
        matches!(self, Endpoint::Ipc(_))
    }

    pub fn is_inproc(&self) -> bool {
        matches!(self, Endpoint::Inproc(_))
    }

    fn parse_tcp(addr: &str) -> Result<Self, EndpointError> {
        let bad = || EndpointError::BadTcpAddress(addr.to_string());
        let (host, port) = addr.rsplit_once(':').ok_or_else(bad)?;
        if host.is_empty() || host == "*" {
            return Err(bad());
        }
        let port = port.parse::<u16>().map_err(|_| bad())?;
        if port == 0 {
            return Err(bad());
        }
        Ok(Endpoint::Tcp {
            host: host.to_string(),
            port,
        })
    }

    #[cfg(unix)]
    fn parse_ipc(path: &str) -> Result<Self, EndpointError> {
        if path.is_empty() {
            return Err(EndpointError::EmptyAddress("ipc"));
        }
        Ok(Endpoint::Ipc(PathBuf::from(path)))
    }

    #[cfg(not(unix))]
    fn parse_ipc(_path: &str) -> Result<Self, EndpointError> {
        Err(EndpointError::IpcUnavailable)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| EndpointError::UnknownScheme(s.to_string()))?;
        match scheme {
            "tcp" => Self::parse_tcp(rest),
            "ipc" => Self::parse_ipc(rest),
            "inproc" if rest.is_empty() => Err(EndpointError::EmptyAddress("inproc")),
            "inproc" => Ok(Endpoint::Inproc(rest.to_string())),
            _ => Err(EndpointError::UnknownScheme(s.to_string())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            #[cfg(unix)]
            Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
            Endpoint::Inproc(name) => write!(f, "inproc://{}", name),
        }
    }
}

/// Why a transport URI was rejected.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("unsupported transport uri '{0}' (use tcp://, ipc:// or inproc://)")]
    UnknownScheme(String),

    #[error("tcp uri needs a host and a non-zero port to connect to, got '{0}'")]
    BadTcpAddress(String),

    #[error("{0} uri has an empty address")]
    EmptyAddress(&'static str),

    #[error("ipc transport is unavailable on this platform")]
    IpcUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_keeps_host_verbatim() {
        let endpoint = Endpoint::parse("tcp://pushpin.local:5560").unwrap();
        assert_eq!(
            endpoint,
            Endpoint::Tcp {
                host: "pushpin.local".into(),
                port: 5560
            }
        );
        assert_eq!(endpoint.to_string(), "tcp://pushpin.local:5560");

        let v6 = Endpoint::parse("tcp://[::1]:5562").unwrap();
        assert_eq!(v6.scheme(), "tcp");
        assert_eq!(v6.to_string(), "tcp://[::1]:5562");
    }

    #[test]
    fn test_tcp_rejects_unconnectable_addresses() {
        for uri in [
            "tcp://localhost",
            "tcp://localhost:http",
            "tcp://:5560",
            "tcp://*:5560",
            "tcp://localhost:0",
            "tcp://localhost:70000",
        ] {
            assert!(
                matches!(Endpoint::parse(uri), Err(EndpointError::BadTcpAddress(_))),
                "{} should be rejected",
                uri
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_ipc_round_trips_path() {
        let endpoint = Endpoint::parse("ipc:///var/run/pushpin/push_in").unwrap();
        assert!(endpoint.is_ipc());
        assert_eq!(endpoint.to_string(), "ipc:///var/run/pushpin/push_in");
        assert!(matches!(
            Endpoint::parse("ipc://"),
            Err(EndpointError::EmptyAddress("ipc"))
        ));
    }

    #[test]
    fn test_inproc_names() {
        let endpoint = Endpoint::parse("inproc://publish-xpub").unwrap();
        assert_eq!(endpoint, Endpoint::Inproc("publish-xpub".into()));
        assert!(matches!(
            Endpoint::parse("inproc://"),
            Err(EndpointError::EmptyAddress("inproc"))
        ));
    }

    #[test]
    fn test_unknown_schemes() {
        for uri in ["http://localhost:5560", "localhost:5560", "udp://x:1", ""] {
            assert!(matches!(
                Endpoint::parse(uri),
                Err(EndpointError::UnknownScheme(_))
            ));
        }
    }
}
