use cxorb_transport::{Endpoint, Stream};
use cxorb_wire::{PacketReader, PacketWriter};
use tracing::debug;

use crate::client::{Client, ClientConfig};
use crate::error::Result;

/// Connect to an object server with default configuration.
pub fn connect(endpoint: &Endpoint) -> Result<Client> {
    connect_with_config(endpoint, &ClientConfig::default())
}

/// Connect with explicit configuration.
///
/// Read and write timeouts from `config.wire` are applied to the socket;
/// a call that exceeds the read timeout fails with
/// [`OrbError::Timeout`](crate::OrbError::Timeout) and poisons the client.
pub fn connect_with_config(endpoint: &Endpoint, config: &ClientConfig) -> Result<Client> {
    let stream = endpoint.connect()?;
    debug!(%endpoint, transport = stream.transport_name(), "connected");
    client_for_stream(stream, config)
}

/// Wrap an already connected stream.
pub fn client_for_stream(stream: Stream, config: &ClientConfig) -> Result<Client> {
    let reader = PacketReader::for_stream(stream.try_clone()?, config.wire.clone())?;
    let writer = PacketWriter::for_stream(stream, config.wire.clone())?;
    Ok(Client::from_parts(reader, writer, config.clone()))
}
