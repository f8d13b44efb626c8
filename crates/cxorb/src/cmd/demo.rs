use cxorb::digio::{DigInStub, DigOutStub};

use crate::cmd::{connect, DemoArgs};
use crate::exit::{orb_error, CliResult, SUCCESS};
use crate::output::{print_readings, OutputFormat, Reading};

/// Width of the output port, then the bit's value before and after a
/// toggle, all over one connection.
pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let (endpoint, client) = connect(&args.client)?;
    let dig_in = DigInStub::new(&client, args.client.instance);
    let dig_out = DigOutStub::new(&client, args.client.instance);
    let endpoint = endpoint.to_string();
    let bit = args.bit;

    let reading = |action: &'static str,
                   target: String,
                   value: Option<bool>,
                   width: Option<u32>| Reading {
        action,
        endpoint: endpoint.clone(),
        target,
        bit: value.map(|_| bit),
        value,
        width,
    };
    let mut readings = Vec::with_capacity(3);

    let width = dig_out
        .width()
        .map_err(|err| orb_error("width failed", err))?;
    readings.push(reading("width", dig_out.target().to_string(), None, Some(width)));

    let before = dig_in
        .value(bit)
        .map_err(|err| orb_error("read failed", err))?;
    readings.push(reading("read", dig_in.target().to_string(), Some(before), None));

    dig_out
        .toggle(bit)
        .map_err(|err| orb_error("toggle failed", err))?;
    let after = dig_in
        .value(bit)
        .map_err(|err| orb_error("read failed", err))?;
    readings.push(reading("toggle", dig_out.target().to_string(), Some(after), None));

    print_readings(&readings, format);
    Ok(SUCCESS)
}
