//! Byte-stream transports for cxorb.
//!
//! The protocol core only needs something that is `Read + Write`. This crate
//! supplies the concrete streams used in practice:
//! - TCP connections (any platform)
//! - Unix domain sockets (Linux/macOS)
//!
//! [`Endpoint`] parses a textual address and connects or binds; [`Stream`]
//! is the connected, cloneable duplex channel handed to the protocol layers.

pub mod endpoint;
pub mod error;
pub mod stream;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{Endpoint, Listener};
pub use error::{Result, TransportError};
pub use stream::Stream;

#[cfg(unix)]
pub use uds::UnixSocketListener;
