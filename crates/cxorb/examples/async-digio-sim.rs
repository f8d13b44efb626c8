//! The DigIO simulator on the tokio runtime, one task per connection.
//!
//! Run with:
//!   cargo run --example async-digio-sim --features async
//!
//! Stop with Ctrl-C.

use cxorb::digio::SimulatedPort;
use cxorb::orb::{ObjectRegistry, ObjectServer};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:12345".to_string());

    let port = SimulatedPort::default();
    let mut registry = ObjectRegistry::new();
    port.register(&mut registry, 0)?;
    let server = ObjectServer::new(registry);

    let listener = TcpListener::bind(&addr).await?;
    eprintln!("DigIO simulator (async) listening on {}", listener.local_addr()?);

    server
        .serve_async(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    eprintln!("bits at exit: {:?}", port.snapshot());
    Ok(())
}
