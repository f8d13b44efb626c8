//! Connects to the DigIO simulator, prints the output port width, then
//! reads bit 1, toggles it and reads it again.
//!
//! Run with:
//!   cargo run --example digio-client -- [endpoint] [bit]

use cxorb::digio::{DigInStub, DigOutStub};
use cxorb::orb::connect;
use cxorb::transport::Endpoint;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let endpoint: Endpoint = args
        .next()
        .unwrap_or_else(|| "127.0.0.1:12345".to_string())
        .parse()?;
    let bit: i32 = match args.next() {
        Some(bit) => bit.parse()?,
        None => 1,
    };

    let client = connect(&endpoint)?;
    let dig_in = DigInStub::new(&client, 0);
    let dig_out = DigOutStub::new(&client, 0);

    println!("Dig out port is {} bits wide", dig_out.width()?);
    println!("Bit {bit} is {}", level(dig_in.value(bit)?));

    dig_out.toggle(bit)?;
    println!("Bit {bit} is {}", level(dig_in.value(bit)?));
    Ok(())
}

fn level(high: bool) -> &'static str {
    if high {
        "high"
    } else {
        "low"
    }
}
