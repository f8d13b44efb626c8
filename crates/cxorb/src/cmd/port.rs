use cxorb::digio::{DigInStub, DigOutStub};
use cxorb::orb::{Client, Result as OrbResult};
use cxorb::transport::Endpoint;

use crate::cmd::{connect, BitArgs, PortKind, SetArgs, WidthArgs};
use crate::exit::{orb_error, CliResult, SUCCESS};
use crate::output::{print_readings, OutputFormat, Reading};

pub fn width(args: WidthArgs, format: OutputFormat) -> CliResult<i32> {
    let (endpoint, client) = connect(&args.client)?;
    let instance = args.client.instance;

    let (target, width) = match args.port {
        PortKind::In => {
            let port = DigInStub::new(&client, instance);
            (port.target(), port.width())
        }
        PortKind::Out => {
            let port = DigOutStub::new(&client, instance);
            (port.target(), port.width())
        }
    };
    let width = width.map_err(|err| orb_error("width failed", err))?;

    print_readings(
        &[Reading {
            action: "width",
            endpoint: endpoint.to_string(),
            target: target.to_string(),
            bit: None,
            value: None,
            width: Some(width),
        }],
        format,
    );
    Ok(SUCCESS)
}

pub fn read(args: BitArgs, format: OutputFormat) -> CliResult<i32> {
    let (endpoint, client) = connect(&args.client)?;
    let port = DigInStub::new(&client, args.client.instance);
    let value = port
        .value(args.bit)
        .map_err(|err| orb_error("read failed", err))?;

    print_readings(
        &[Reading {
            action: "read",
            endpoint: endpoint.to_string(),
            target: port.target().to_string(),
            bit: Some(args.bit),
            value: Some(value),
            width: None,
        }],
        format,
    );
    Ok(SUCCESS)
}

pub fn set(args: SetArgs, format: OutputFormat) -> CliResult<i32> {
    let high = !args.low;
    write_bit(&args.target, "set", format, |port, bit| port.set(bit, high))
}

pub fn clear(args: BitArgs, format: OutputFormat) -> CliResult<i32> {
    write_bit(&args, "clear", format, |port, bit| port.clear(bit))
}

pub fn toggle(args: BitArgs, format: OutputFormat) -> CliResult<i32> {
    write_bit(&args, "toggle", format, |port, bit| port.toggle(bit))
}

/// Apply `op` to the output bit, then report the bit as read back through
/// the input port of the same instance, if the server has one.
fn write_bit<F>(args: &BitArgs, action: &'static str, format: OutputFormat, op: F) -> CliResult<i32>
where
    F: FnOnce(&DigOutStub<'_>, i32) -> OrbResult<()>,
{
    let (endpoint, client) = connect(&args.client)?;
    let port = DigOutStub::new(&client, args.client.instance);
    op(&port, args.bit).map_err(|err| orb_error(&format!("{action} failed"), err))?;

    let reading = Reading {
        action,
        endpoint: endpoint.to_string(),
        target: port.target().to_string(),
        bit: Some(args.bit),
        value: read_back(&client, &endpoint, args),
        width: None,
    };
    print_readings(&[reading], format);
    Ok(SUCCESS)
}

fn read_back(client: &Client, endpoint: &Endpoint, args: &BitArgs) -> Option<bool> {
    match DigInStub::new(client, args.client.instance).value(args.bit) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(%endpoint, error = %err, "read-back unavailable");
            None
        }
    }
}
