use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cxorb_transport::{Listener, Stream, TransportError};
use cxorb_wire::{PacketReader, PacketWriter, WireConfig, DEFAULT_BUFFER_SIZE};
use tracing::{debug, error, info, warn};

use crate::dispatcher::{DispatchSummary, Dispatcher, StopHandle};
use crate::error::Result;
use crate::registry::ObjectRegistry;

/// Pause before retrying an accept that failed for lack of descriptors or memory.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Server-side buffer sizes and wire limits.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub wire: WireConfig,
    /// Capacity of the per-connection command buffer (header + parameters).
    pub command_buffer_size: usize,
    /// Capacity of the per-connection reply buffer (header + payload).
    pub reply_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            wire: WireConfig::default(),
            command_buffer_size: DEFAULT_BUFFER_SIZE,
            reply_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Serves a registry of objects over accepted connections.
///
/// Each connection gets its own thread and [`Dispatcher`]; the registry is
/// shared between them read-only.
#[derive(Clone)]
pub struct ObjectServer {
    registry: Arc<ObjectRegistry>,
    config: ServerConfig,
    stop: StopHandle,
}

impl ObjectServer {
    pub fn new(registry: ObjectRegistry) -> Self {
        Self::from_shared(Arc::new(registry))
    }

    pub fn from_shared(registry: Arc<ObjectRegistry>) -> Self {
        Self {
            registry,
            config: ServerConfig::default(),
            stop: StopHandle::new(),
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Flag shared with every connection loop this server starts.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run one dispatch loop on an accepted transport stream.
    pub fn run_connection(&self, stream: Stream) -> Result<DispatchSummary> {
        let reader = PacketReader::for_stream(stream.try_clone()?, self.config.wire.clone())?;
        let writer = PacketWriter::for_stream(stream, self.config.wire.clone())?;
        self.dispatcher(reader, writer).run()
    }

    /// Run one dispatch loop over any reader/writer pair.
    pub fn run_io<R: Read, W: Write>(&self, reader: R, writer: W) -> Result<DispatchSummary> {
        let reader = PacketReader::with_config(reader, self.config.wire.clone());
        let writer = PacketWriter::with_config(writer, self.config.wire.clone());
        self.dispatcher(reader, writer).run()
    }

    /// Accept connections until stopped, one thread per connection.
    ///
    /// The stop flag is checked after each accept; a blocked accept returns
    /// only when the next client connects. Errors tied to one incoming
    /// connection are skipped, descriptor or memory exhaustion is retried
    /// after [`ACCEPT_BACKOFF`], and anything else ends the loop.
    pub fn serve(&self, listener: &Listener) -> Result<()> {
        info!(
            objects = self.registry.len(),
            "serving objects"
        );
        while !self.stop.is_stopped() {
            let stream = match listener.accept() {
                Ok(stream) => stream,
                Err(err) => match accept_retry_delay(&err) {
                    Some(delay) => {
                        warn!(error = %err, retry_in = ?delay, "accept failed");
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                        continue;
                    }
                    None => {
                        error!(error = %err, "accept failed, stopping server");
                        return Err(err.into());
                    }
                },
            };
            if self.stop.is_stopped() {
                break;
            }

            let peer = stream.peer_description();
            info!(%peer, transport = stream.transport_name(), "connection accepted");
            let server = self.clone();
            thread::spawn(move || match server.run_connection(stream) {
                Ok(summary) => info!(
                    %peer,
                    commands = summary.commands,
                    failures = summary.failures,
                    "connection closed"
                ),
                Err(err) => warn!(%peer, error = %err, "connection ended with error"),
            });
        }
        debug!("server stopped");
        Ok(())
    }

    fn dispatcher<R: Read, W: Write>(
        &self,
        reader: PacketReader<R>,
        writer: PacketWriter<W>,
    ) -> Dispatcher<R, W> {
        Dispatcher::new(reader, writer, Arc::clone(&self.registry), &self.config)
            .with_stop_handle(self.stop.clone())
    }
}

/// How long to wait before accepting again, or `None` when the listener
/// itself is broken.
fn accept_retry_delay(err: &TransportError) -> Option<Duration> {
    match err {
        TransportError::Accept(source) => accept_io_retry_delay(source),
        // Setting up an already accepted stream failed; only that peer is lost.
        TransportError::Io(_) => Some(Duration::ZERO),
        _ => None,
    }
}

pub(crate) fn accept_io_retry_delay(source: &io::Error) -> Option<Duration> {
    if matches!(
        source.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    ) {
        return Some(Duration::ZERO);
    }
    is_resource_exhaustion(source).then_some(ACCEPT_BACKOFF)
}

#[cfg(unix)]
fn is_resource_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    )
}

#[cfg(not(unix))]
fn is_resource_exhaustion(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::OutOfMemory
}
