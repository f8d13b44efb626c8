use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::header::{
    CommandHeader, MessageType, PacketHeader, ResponseHeader, COMMAND_HEADER_SIZE,
    PACKET_HEADER_SIZE, RESPONSE_HEADER_SIZE,
};

/// Default maximum message size (bytes after the packet header): 64 KiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// One complete message: packet header plus everything it announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    /// Command or response header followed by its payload.
    pub body: Bytes,
}

impl Packet {
    /// Build a packet whose header announces exactly `body.len()` bytes.
    pub fn new(msg_type: MessageType, body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();
        let msg_size = u32::try_from(body.len()).map_err(|_| WireError::MessageTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        })?;
        Ok(Self {
            header: PacketHeader::new(msg_type, msg_size),
            body,
        })
    }

    /// A command packet: command header followed by `params`.
    pub fn command(header: &CommandHeader, params: &[u8]) -> Result<Self> {
        let mut body = BytesMut::with_capacity(COMMAND_HEADER_SIZE + params.len());
        body.put_slice(&header.to_bytes());
        body.put_slice(params);
        Self::new(MessageType::Command, body.freeze())
    }

    /// A response packet: response header followed by `payload`.
    pub fn response(header: &ResponseHeader, payload: &[u8]) -> Result<Self> {
        let mut body = BytesMut::with_capacity(RESPONSE_HEADER_SIZE + payload.len());
        body.put_slice(&header.to_bytes());
        body.put_slice(payload);
        Self::new(MessageType::Response, body.freeze())
    }

    /// Split a command body into its header and parameter block.
    pub fn split_command(&self) -> Result<(CommandHeader, Bytes)> {
        if self.header.msg_type != MessageType::Command {
            return Err(WireError::UnknownMessageType(self.header.msg_type as u8));
        }
        CommandHeader::check_message_size(self.body.len())?;
        let mut raw = [0u8; COMMAND_HEADER_SIZE];
        raw.copy_from_slice(&self.body[..COMMAND_HEADER_SIZE]);
        Ok((
            CommandHeader::from_bytes(&raw),
            self.body.slice(COMMAND_HEADER_SIZE..),
        ))
    }

    /// Split a response body into its header and payload.
    pub fn split_response(&self) -> Result<(ResponseHeader, Bytes)> {
        if self.header.msg_type != MessageType::Response {
            return Err(WireError::UnknownMessageType(self.header.msg_type as u8));
        }
        let raw: &[u8; RESPONSE_HEADER_SIZE] = self
            .body
            .get(..RESPONSE_HEADER_SIZE)
            .and_then(|head| head.try_into().ok())
            .ok_or_else(|| {
                WireError::MalformedFrame(format!(
                    "response message of {} bytes is shorter than its header",
                    self.body.len()
                ))
            })?;
        Ok((
            ResponseHeader::from_bytes(raw),
            self.body.slice(RESPONSE_HEADER_SIZE..),
        ))
    }

    /// The total wire size of this packet (header + body).
    pub fn wire_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.body.len()
    }
}

/// Encode a packet into the wire format.
pub fn encode_packet(packet: &Packet, dst: &mut BytesMut) -> Result<()> {
    if packet.header.msg_size as usize != packet.body.len() {
        return Err(WireError::MalformedFrame(format!(
            "header announces {} bytes, body has {}",
            packet.header.msg_size,
            packet.body.len()
        )));
    }
    dst.reserve(packet.wire_size());
    dst.put_slice(&packet.header.to_bytes());
    dst.put_slice(&packet.body);
    Ok(())
}

/// Decode a packet from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete packet yet.
/// On success, consumes the packet bytes from the buffer.
pub fn decode_packet(src: &mut BytesMut, max_message_size: usize) -> Result<Option<Packet>> {
    let Some(raw) = src
        .get(..PACKET_HEADER_SIZE)
        .and_then(|head| <&[u8; PACKET_HEADER_SIZE]>::try_from(head).ok())
    else {
        return Ok(None);
    };
    let header = PacketHeader::from_bytes(raw)?;

    let msg_size = header.msg_size as usize;
    if msg_size > max_message_size {
        return Err(WireError::MessageTooLarge {
            size: msg_size,
            max: max_message_size,
        });
    }

    if src.len() < PACKET_HEADER_SIZE + msg_size {
        return Ok(None);
    }

    src.advance(PACKET_HEADER_SIZE);
    let body = src.split_to(msg_size).freeze();
    Ok(Some(Packet { header, body }))
}

/// Limits and timeouts for packet I/O.
#[derive(Debug, Clone)]
pub struct WireConfig {
    /// Largest `msg_size` accepted from a peer. Default: 64 KiB.
    pub max_message_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
    /// Skip bytes until the next "CX" tag instead of failing on bad magic.
    pub scan_for_magic: bool,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_timeout: None,
            write_timeout: None,
            scan_for_magic: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::MAGIC;
    use crate::key::ObjectKey;

    #[test]
    fn command_packet_roundtrip() {
        let header = CommandHeader::new(5, ObjectKey::new(2, 0), 1);
        let packet = Packet::command(&header, &[3, 0, 0, 0, 1]).unwrap();
        assert_eq!(packet.header.msg_size, 17);

        let mut wire = BytesMut::new();
        encode_packet(&packet, &mut wire).unwrap();
        assert_eq!(wire.len(), 25);

        let decoded = decode_packet(&mut wire, DEFAULT_MAX_MESSAGE_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, packet);
        assert!(wire.is_empty());

        let (cmd, params) = decoded.split_command().unwrap();
        assert_eq!(cmd, header);
        assert_eq!(params.as_ref(), &[3, 0, 0, 0, 1]);
    }

    #[test]
    fn response_split() {
        let packet = Packet::response(&ResponseHeader::new(5, 0), &[1]).unwrap();
        let (head, payload) = packet.split_response().unwrap();
        assert_eq!(head.msg_id, 5);
        assert_eq!(payload.as_ref(), &[1]);
        assert!(packet.split_command().is_err());
    }

    #[test]
    fn short_command_body_is_malformed() {
        let packet = Packet::new(MessageType::Command, Bytes::from_static(&[0; 4])).unwrap();
        assert!(matches!(
            packet.split_command(),
            Err(WireError::MalformedFrame(_))
        ));
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[b'C', b'X', 0][..]);
        assert!(decode_packet(&mut buf, DEFAULT_MAX_MESSAGE_SIZE)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn decode_incomplete_body() {
        let packet = Packet::response(&ResponseHeader::new(1, 0), b"abcd").unwrap();
        let mut buf = BytesMut::new();
        encode_packet(&packet, &mut buf).unwrap();
        buf.truncate(PACKET_HEADER_SIZE + 3);

        assert!(decode_packet(&mut buf, DEFAULT_MAX_MESSAGE_SIZE)
            .unwrap()
            .is_none());
    }

    #[test]
    fn decode_rejects_oversized_message() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_u32_le(1024 * 1024);

        assert!(matches!(
            decode_packet(&mut buf, DEFAULT_MAX_MESSAGE_SIZE),
            Err(WireError::MessageTooLarge { size, .. }) if size == 1024 * 1024
        ));
    }

    #[test]
    fn decode_back_to_back_packets() {
        let first = Packet::response(&ResponseHeader::new(1, 0), b"one").unwrap();
        let second = Packet::response(&ResponseHeader::new(2, -6), b"").unwrap();
        let mut buf = BytesMut::new();
        encode_packet(&first, &mut buf).unwrap();
        encode_packet(&second, &mut buf).unwrap();

        let a = decode_packet(&mut buf, DEFAULT_MAX_MESSAGE_SIZE).unwrap().unwrap();
        let b = decode_packet(&mut buf, DEFAULT_MAX_MESSAGE_SIZE).unwrap().unwrap();
        assert_eq!(a, first);
        assert_eq!(b.split_response().unwrap().0.status, -6);
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_rejects_inconsistent_size() {
        let mut packet = Packet::response(&ResponseHeader::new(1, 0), b"xy").unwrap();
        packet.header.msg_size += 1;
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_packet(&packet, &mut buf),
            Err(WireError::MalformedFrame(_))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn wire_config_defaults() {
        let config = WireConfig::default();
        assert_eq!(config.max_message_size, 64 * 1024);
        assert!(config.read_timeout.is_none());
        assert!(!config.scan_for_magic);
    }
}
