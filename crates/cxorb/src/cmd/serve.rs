use cxorb::digio::SimulatedPort;
use cxorb::orb::{ObjectRegistry, ObjectServer, ServerConfig, StopHandle};
use cxorb::transport::Endpoint;
use cxorb::wire::WireConfig;

use crate::cmd::{parse_endpoint, ServeArgs};
use crate::exit::{orb_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_listening, Listening, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;

    let port = SimulatedPort::new(args.bits);
    let mut registry = ObjectRegistry::new();
    port.register(&mut registry, args.instance)
        .map_err(|err| orb_error("register failed", err))?;
    let objects: Vec<String> = registry.keys().iter().map(ToString::to_string).collect();

    let config = ServerConfig {
        wire: WireConfig {
            scan_for_magic: args.scan_for_magic,
            ..WireConfig::default()
        },
        ..ServerConfig::default()
    };
    let server = ObjectServer::new(registry).with_config(config);

    let listener = endpoint
        .bind()
        .map_err(|err| transport_error("bind failed", err))?;
    let bound = listener
        .local_endpoint()
        .map_err(|err| transport_error("bind failed", err))?;
    install_ctrlc_handler(server.stop_handle(), bound.clone())?;

    print_listening(
        &Listening {
            event: "listening",
            endpoint: bound.to_string(),
            objects,
            width: args.bits,
        },
        format,
    );

    server
        .serve(&listener)
        .map_err(|err| orb_error("serve failed", err))?;
    tracing::info!(endpoint = %bound, "simulator stopped");
    Ok(SUCCESS)
}

/// Ctrl-C sets the stop flag, then connects once so the blocked accept
/// returns and sees it.
fn install_ctrlc_handler(stop: StopHandle, wake: Endpoint) -> CliResult<()> {
    ctrlc::set_handler(move || {
        stop.stop();
        let _ = wake.connect();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
