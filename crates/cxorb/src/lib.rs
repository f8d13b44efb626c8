//! Remote objects over byte streams for controllers and embedded devices.
//!
//! cxorb lets a client invoke operations on objects that live in another
//! process or on a device, over TCP, a Unix socket or any `Read + Write`
//! stream, using a compact binary wire format.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix socket streams, endpoints, listeners
//! - [`wire`]: sequence buffers, the aligned binary codec and packet framing
//! - [`orb`]: object registry, per-connection dispatcher, client and stubs
//! - [`digio`]: digital I/O objects and a simulated port

/// Re-export transport types.
pub mod transport {
    pub use cxorb_transport::*;
}

/// Re-export wire types.
pub mod wire {
    pub use cxorb_wire::*;
}

/// Re-export object server and client types.
pub mod orb {
    pub use cxorb_orb::*;
}

pub mod digio;
