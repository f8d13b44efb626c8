//! Per-connection command loop.
//!
//! ```text
//!            ┌──────────────────────────────────────────────────────┐
//!            ▼                                                      │
//! AwaitingHeader ─► AwaitingCommandHeader ─► AwaitingPayload ─► Dispatching
//!      │
//!      └─► Closed   (end of stream, stop requested, or fatal error)
//! ```
//!
//! One command is read, dispatched and answered before the next header is
//! read. Unknown targets and operations are answered with a failure status
//! and the loop continues.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cxorb_wire::{
    status, CommandHeader, MessageType, PacketReader, PacketWriter, ResponseHeader, SeqBuffer,
    WireError, COMMAND_HEADER_SIZE, RESPONSE_HEADER_SIZE,
};
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::registry::ObjectRegistry;
use crate::server::ServerConfig;

/// Where the loop is in the read/dispatch/write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    AwaitingHeader,
    AwaitingCommandHeader,
    AwaitingPayload,
    Dispatching,
    Closed,
}

/// Shared flag asking dispatch loops to stop before their next header read.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for one connection's loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Commands answered, whatever their status.
    pub commands: u64,
    /// Commands answered with a nonzero status.
    pub failures: u64,
    /// Non-command packets drained and dropped.
    pub ignored: u64,
}

/// Reads commands from one connection, dispatches them through the
/// registry and writes the responses back.
pub struct Dispatcher<R, W> {
    reader: PacketReader<R>,
    writer: PacketWriter<W>,
    registry: Arc<ObjectRegistry>,
    command_buf: SeqBuffer,
    reply_buf: SeqBuffer,
    state: DispatchState,
    stop: StopHandle,
    summary: DispatchSummary,
}

impl<R: Read, W: Write> Dispatcher<R, W> {
    pub fn new(
        reader: PacketReader<R>,
        writer: PacketWriter<W>,
        registry: Arc<ObjectRegistry>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            reader,
            writer,
            registry,
            command_buf: SeqBuffer::with_capacity(
                config.command_buffer_size.max(COMMAND_HEADER_SIZE),
            ),
            reply_buf: SeqBuffer::with_capacity(
                config.reply_buffer_size.max(RESPONSE_HEADER_SIZE),
            ),
            state: DispatchState::AwaitingHeader,
            stop: StopHandle::new(),
            summary: DispatchSummary::default(),
        }
    }

    /// Share a stop flag with other loops or a signal handler.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn summary(&self) -> DispatchSummary {
        self.summary
    }

    /// Run until the peer closes the stream or a stop is requested.
    ///
    /// A clean close returns the summary; transport errors and malformed
    /// frames end the loop with an error.
    pub fn run(&mut self) -> Result<DispatchSummary> {
        while self.step()? {}
        debug!(
            commands = self.summary.commands,
            failures = self.summary.failures,
            "dispatch loop closed"
        );
        Ok(self.summary)
    }

    /// Process one message. Returns `false` once the loop is closed.
    pub fn step(&mut self) -> Result<bool> {
        if self.state == DispatchState::Closed {
            return Ok(false);
        }
        match self.handle_next() {
            Ok(open) => {
                if !open {
                    self.state = DispatchState::Closed;
                }
                Ok(open)
            }
            Err(err) => {
                error!(state = ?self.state, error = %err, "dispatch loop failed");
                self.state = DispatchState::Closed;
                Err(err)
            }
        }
    }

    fn handle_next(&mut self) -> Result<bool> {
        self.state = DispatchState::AwaitingHeader;
        if self.stop.is_stopped() {
            debug!("stop requested");
            return Ok(false);
        }

        let header = match self.reader.read_packet_header() {
            Ok(header) => header,
            Err(WireError::ConnectionClosed) => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        let msg_size = header.msg_size as usize;

        if header.msg_type != MessageType::Command {
            warn!(
                msg_type = header.msg_type.name(),
                msg_size, "ignoring non-command packet"
            );
            self.reader.discard(msg_size)?;
            self.summary.ignored += 1;
            return Ok(true);
        }
        CommandHeader::check_message_size(msg_size)?;

        self.state = DispatchState::AwaitingCommandHeader;
        let mut raw = [0u8; COMMAND_HEADER_SIZE];
        self.reader.read_exact(&mut raw)?;

        self.state = DispatchState::AwaitingPayload;
        let payload_len = msg_size - COMMAND_HEADER_SIZE;
        if self.command_buf.clear_to(msg_size).is_err() {
            let command = CommandHeader::from_bytes(&raw);
            warn!(
                msg_id = command.msg_id,
                object = %command.target,
                payload_len,
                capacity = self.command_buf.capacity(),
                "parameter block exceeds command buffer"
            );
            self.reader.discard(payload_len)?;
            self.respond(ResponseHeader::new(command.msg_id, status::PACKET_SIZE), false)?;
            return Ok(true);
        }
        self.command_buf.put_slice(&raw)?;
        self.reader.read_exact(self.command_buf.remaining_mut())?;
        self.command_buf.advance(payload_len)?;
        self.command_buf.flip();

        self.state = DispatchState::Dispatching;
        let (_, response) = self
            .registry
            .dispatch_frame(&mut self.command_buf, &mut self.reply_buf)?;
        self.respond(response, true)?;
        Ok(true)
    }

    fn respond(&mut self, response: ResponseHeader, with_payload: bool) -> Result<()> {
        let payload = if with_payload {
            &self.reply_buf.filled()[RESPONSE_HEADER_SIZE..]
        } else {
            &[][..]
        };
        self.writer.write_message(
            MessageType::Response,
            &[&response.to_bytes()[..], payload],
        )?;

        self.summary.commands += 1;
        if response.status != status::SUCCESS {
            self.summary.failures += 1;
            debug!(
                msg_id = response.msg_id,
                status = response.status,
                status_name = status::name(response.status),
                protocol = status::is_protocol_error(response.status),
                "sent failure response"
            );
        }
        Ok(())
    }
}
