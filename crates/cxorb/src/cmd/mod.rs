use std::time::{Duration, Instant};

use clap::{Args, Subcommand, ValueEnum};
use cxorb::digio::DEFAULT_WIDTH;
use cxorb::orb::{connect_with_config, Client, ClientConfig, OrbError};
use cxorb::transport::{Endpoint, TransportError};
use cxorb::wire::WireConfig;

use crate::exit::{orb_error, transport_error, CliError, CliResult, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod demo;
pub mod port;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a simulated digital I/O port.
    Serve(ServeArgs),
    /// Query the width of a remote port.
    Width(WidthArgs),
    /// Read one input bit.
    Read(BitArgs),
    /// Drive one output bit high (or low with --low).
    Set(SetArgs),
    /// Drive one output bit low.
    Clear(BitArgs),
    /// Invert one output bit.
    Toggle(BitArgs),
    /// Run the width / read / toggle / read sequence against a server.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Width(args) => port::width(args, format),
        Command::Read(args) => port::read(args, format),
        Command::Set(args) => port::set(args, format),
        Command::Clear(args) => port::clear(args, format),
        Command::Toggle(args) => port::toggle(args, format),
        Command::Demo(args) => demo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Endpoint to listen on (tcp://host:port, host:port, unix:///path or a path).
    pub endpoint: String,
    /// Number of bits in the simulated port.
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub bits: u32,
    /// Instance id the input and output objects are registered under.
    #[arg(long, default_value_t = 0)]
    pub instance: u16,
    /// Skip bytes until the packet magic when a header is out of sync.
    #[arg(long)]
    pub scan_for_magic: bool,
}

/// Connection options shared by client commands.
#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Endpoint of the object server.
    pub endpoint: String,
    /// Port instance id.
    #[arg(long, default_value_t = 0)]
    pub instance: u16,
    /// Connect and call timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PortKind {
    In,
    Out,
}

#[derive(Args, Debug)]
pub struct WidthArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    /// Which port to ask.
    #[arg(long, value_enum, default_value = "out")]
    pub port: PortKind,
}

#[derive(Args, Debug)]
pub struct BitArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    /// Bit number.
    pub bit: i32,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub target: BitArgs,
    /// Drive the bit low instead of high.
    #[arg(long)]
    pub low: bool,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    /// Bit to read and toggle.
    #[arg(long, default_value_t = 1)]
    pub bit: i32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_endpoint(input: &str) -> CliResult<Endpoint> {
    input
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Connect to the server named by `args`, retrying while it is not yet
/// listening, with `--timeout` applied to the connect and to every call.
pub fn connect(args: &ClientArgs) -> CliResult<(Endpoint, Client)> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let timeout = parse_duration(&args.timeout)?;
    let config = ClientConfig {
        wire: WireConfig {
            read_timeout: Some(timeout),
            write_timeout: Some(timeout),
            ..WireConfig::default()
        },
        ..ClientConfig::default()
    };

    let start = Instant::now();
    loop {
        match connect_with_config(&endpoint, &config) {
            Ok(client) => return Ok((endpoint, client)),
            Err(err) => {
                if !is_retryable_connect_error(&err) {
                    return Err(orb_error("connect failed", err));
                }
                if start.elapsed() >= timeout {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect to {endpoint} timed out after {timeout:?}"),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn is_retryable_connect_error(err: &OrbError) -> bool {
    match err {
        OrbError::Transport(TransportError::Connect { source, .. }) => matches!(
            source.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn bad_endpoint_is_usage_error() {
        let err = parse_endpoint("no-port-here").unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn refused_connect_is_retryable() {
        let err = OrbError::Transport(TransportError::Connect {
            endpoint: "tcp://127.0.0.1:1".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        });
        assert!(is_retryable_connect_error(&err));
        assert!(!is_retryable_connect_error(&OrbError::Poisoned));
    }
}
