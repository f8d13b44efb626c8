//! `tokio_util::codec` adapter for async transports.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Result, WireError};
use crate::packet::{decode_packet, encode_packet, Packet, DEFAULT_MAX_MESSAGE_SIZE};

/// Frames a byte stream into [`Packet`]s.
#[derive(Debug, Clone)]
pub struct PacketCodec {
    max_message_size: usize,
}

impl PacketCodec {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        decode_packet(src, self.max_message_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => Err(WireError::Truncated {
                expected: crate::header::PACKET_HEADER_SIZE,
                got: src.len(),
            }),
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = WireError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        if packet.body.len() > self.max_message_size {
            return Err(WireError::MessageTooLarge {
                size: packet.body.len(),
                max: self.max_message_size,
            });
        }
        encode_packet(&packet, dst)
    }
}
