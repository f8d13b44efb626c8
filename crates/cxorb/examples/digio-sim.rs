//! Digital I/O simulator: serves a 32-bit input port and output port that
//! share one bit bank, on TCP port 12345.
//!
//! Run with:
//!   cargo run --example digio-sim
//!
//! In another terminal:
//!   cargo run --example digio-client
//!   cargo run --features cli -- toggle localhost:12345 3

use cxorb::digio::SimulatedPort;
use cxorb::orb::{ObjectRegistry, ObjectServer};
use cxorb::transport::Endpoint;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let endpoint: Endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:12345".to_string())
        .parse()?;

    let port = SimulatedPort::default();
    let mut registry = ObjectRegistry::new();
    port.register(&mut registry, 0)?;

    let listener = endpoint.bind()?;
    eprintln!("DigIO simulator listening on {}", listener.local_endpoint()?);
    for key in registry.keys() {
        eprintln!("  serving {key}");
    }

    // Runs until the process is killed.
    ObjectServer::new(registry).serve(&listener)?;
    Ok(())
}
