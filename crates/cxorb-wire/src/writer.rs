use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use cxorb_transport::Stream;
use tracing::debug;

use crate::error::{Result, WireError};
use crate::header::{MessageType, PacketHeader, PACKET_HEADER_SIZE};
use crate::packet::{Packet, WireConfig};

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Writes complete packets to any `Write` stream.
///
/// Each message is assembled in one buffer and handed to the stream as a
/// single contiguous write, so a peer never observes a header without its
/// body.
pub struct PacketWriter<T> {
    inner: T,
    buf: BytesMut,
    config: WireConfig,
}

impl<T: Write> PacketWriter<T> {
    /// Create a new packet writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, WireConfig::default())
    }

    /// Create a new packet writer with explicit configuration.
    pub fn with_config(inner: T, config: WireConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write one message whose body is the concatenation of `parts`.
    ///
    /// The packet header's `msg_size` is the total length of the parts.
    pub fn write_message(&mut self, msg_type: MessageType, parts: &[&[u8]]) -> Result<()> {
        let msg_size: usize = parts.iter().map(|part| part.len()).sum();
        if msg_size > self.config.max_message_size {
            return Err(WireError::MessageTooLarge {
                size: msg_size,
                max: self.config.max_message_size,
            });
        }
        let announced = u32::try_from(msg_size).map_err(|_| WireError::MessageTooLarge {
            size: msg_size,
            max: u32::MAX as usize,
        })?;

        self.buf.clear();
        self.buf.reserve(PACKET_HEADER_SIZE + msg_size);
        self.buf
            .put_slice(&PacketHeader::new(msg_type, announced).to_bytes());
        for part in parts {
            self.buf.put_slice(part);
        }

        self.write_buffered()?;
        debug!(msg_type = msg_type.name(), msg_size, "wrote packet");
        self.flush()
    }

    /// Write a prebuilt packet.
    pub fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        if packet.header.msg_size as usize != packet.body.len() {
            return Err(WireError::MalformedFrame(format!(
                "header announces {} bytes, body has {}",
                packet.header.msg_size,
                packet.body.len()
            )));
        }
        self.write_message(packet.header.msg_type, &[packet.body.as_ref()])
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum message size for subsequent writes.
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.config.max_message_size = max_message_size;
    }

    /// Current writer configuration.
    pub fn config(&self) -> &WireConfig {
        &self.config
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
        Ok(())
    }
}

impl PacketWriter<Stream> {
    /// Create a packet writer for a transport stream and apply the write
    /// timeout from config.
    pub fn for_stream(inner: Stream, config: WireConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
