use std::fmt;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::Stream;

/// Where a server listens or a client connects.
///
/// Accepted spellings:
/// - `tcp://host:port` or a bare `host:port`
/// - `unix:///path/to/socket` or a bare path containing `/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(addr) = s.strip_prefix("tcp://") {
            return parse_tcp(addr, s);
        }
        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if s.contains('/') {
            return Ok(Self::Unix(PathBuf::from(s)));
        }
        parse_tcp(s, s)
    }
}

fn parse_tcp(addr: &str, original: &str) -> Result<Endpoint> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(Endpoint::Tcp(addr.to_string()))
        }
        _ => Err(TransportError::InvalidEndpoint(original.to_string())),
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl Endpoint {
    /// Connect to this endpoint (blocking).
    pub fn connect(&self) -> Result<Stream> {
        match self {
            Self::Tcp(addr) => {
                let stream =
                    TcpStream::connect(addr.as_str()).map_err(|source| TransportError::Connect {
                        endpoint: self.to_string(),
                        source,
                    })?;
                debug!(endpoint = %self, "connected");
                let stream = Stream::from(stream);
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            #[cfg(unix)]
            Self::Unix(path) => crate::uds::UnixSocketListener::connect(path),
            #[cfg(not(unix))]
            Self::Unix(_) => Err(TransportError::Unsupported(self.to_string())),
        }
    }

    /// Bind a listener on this endpoint.
    pub fn bind(&self) -> Result<Listener> {
        Listener::bind(self)
    }
}

/// A bound listener for either endpoint kind.
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(crate::uds::UnixSocketListener),
}

impl Listener {
    /// Bind to `endpoint`.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let listener =
                    TcpListener::bind(addr.as_str()).map_err(|source| TransportError::Bind {
                        endpoint: endpoint.to_string(),
                        source,
                    })?;
                info!(endpoint = %endpoint, "listening on tcp");
                Ok(Self::Tcp(listener))
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Self::Unix(crate::uds::UnixSocketListener::bind(path)?)),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Unsupported(endpoint.to_string())),
        }
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<Stream> {
        match self {
            Self::Tcp(listener) => {
                let (stream, addr) = listener.accept().map_err(TransportError::Accept)?;
                debug!(%addr, "accepted tcp connection");
                let stream = Stream::from(stream);
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept(),
        }
    }

    /// The endpoint actually bound, with the OS-assigned port for `:0` binds.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        match self {
            Self::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            Self::Unix(listener) => Ok(Endpoint::Unix(listener.path().to_path_buf())),
        }
    }
}
