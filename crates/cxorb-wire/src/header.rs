//! Fixed-size headers that delimit every message.
//!
//! ```text
//! Packet header (8 bytes)
//! ┌────────────┬────────────┬──────────┬──────────────────┐
//! │ Magic (2B) │ Byte order │ Msg type │ Msg size         │
//! │ "CX"       │ (1B)       │ (1B)     │ (4B LE, aligned) │
//! └────────────┴────────────┴──────────┴──────────────────┘
//!
//! Command header (12 bytes)        Response header (8 bytes)
//! ┌────────┬────────┬───────────┐  ┌────────┬────────┐
//! │ msg_id │ target │ operation │  │ msg_id │ status │
//! │ u32    │ u32    │ u32       │  │ u32    │ i32    │
//! └────────┴────────┴───────────┘  └────────┴────────┘
//! ```
//!
//! `msg_size` counts everything after the packet header: the command or
//! response header plus its payload. Headers are expected at offset 0 of
//! their buffer, where the encoder's alignment produces exactly these sizes.

use crate::binary::{Decoder, Encoder};
use crate::error::{Result, WireError};
use crate::key::ObjectKey;
use crate::msg_type;

/// Magic bytes: "CX" (0x43 0x58).
pub const MAGIC: [u8; 2] = *b"CX";

pub const PACKET_HEADER_SIZE: usize = 8;
pub const COMMAND_HEADER_SIZE: usize = 12;
pub const RESPONSE_HEADER_SIZE: usize = 8;

/// Byte order announced by the sender.
///
/// Multi-byte values are always little-endian on the wire. The field is
/// carried so that a peer could negotiate later without changing the
/// header layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ByteOrder {
    #[default]
    Little = 0,
    Big = 1,
}

impl TryFrom<u8> for ByteOrder {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Little),
            1 => Ok(Self::Big),
            other => Err(WireError::UnknownByteOrder(other)),
        }
    }
}

/// Message types accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Command = msg_type::COMMAND,
    Response = msg_type::RESPONSE,
}

impl MessageType {
    pub fn name(self) -> &'static str {
        msg_type::name(self as u8)
    }
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            msg_type::COMMAND => Ok(Self::Command),
            msg_type::RESPONSE => Ok(Self::Response),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub byte_order: ByteOrder,
    pub msg_type: MessageType,
    pub msg_size: u32,
}

impl PacketHeader {
    pub fn new(msg_type: MessageType, msg_size: u32) -> Self {
        Self {
            byte_order: ByteOrder::Little,
            msg_type,
            msg_size,
        }
    }

    /// Header for a command whose header and parameters total `msg_size`.
    pub fn command(msg_size: u32) -> Self {
        Self::new(MessageType::Command, msg_size)
    }

    /// Header for a response whose header and payload total `msg_size`.
    pub fn response(msg_size: u32) -> Self {
        Self::new(MessageType::Response, msg_size)
    }

    pub fn encode<S: AsRef<[u8]> + AsMut<[u8]>>(&self, enc: &mut Encoder<'_, S>) -> Result<()> {
        enc.put_bytes(&MAGIC)?;
        enc.put_u8(self.byte_order as u8)?;
        enc.put_u8(self.msg_type as u8)?;
        enc.put_u32(self.msg_size)
    }

    pub fn decode<S: AsRef<[u8]> + AsMut<[u8]>>(dec: &mut Decoder<'_, S>) -> Result<Self> {
        let mut magic = [0u8; 2];
        dec.get_bytes(&mut magic)?;
        if magic != MAGIC {
            return Err(WireError::InvalidMagic(magic));
        }
        let byte_order = ByteOrder::try_from(dec.get_u8()?)?;
        let msg_type = MessageType::try_from(dec.get_u8()?)?;
        let msg_size = dec.get_u32()?;
        Ok(Self {
            byte_order,
            msg_type,
            msg_size,
        })
    }

    pub fn to_bytes(&self) -> [u8; PACKET_HEADER_SIZE] {
        let mut out = [0u8; PACKET_HEADER_SIZE];
        out[0..2].copy_from_slice(&MAGIC);
        out[2] = self.byte_order as u8;
        out[3] = self.msg_type as u8;
        out[4..8].copy_from_slice(&self.msg_size.to_le_bytes());
        out
    }

    pub fn from_bytes(raw: &[u8; PACKET_HEADER_SIZE]) -> Result<Self> {
        let magic = [raw[0], raw[1]];
        if magic != MAGIC {
            return Err(WireError::InvalidMagic(magic));
        }
        Ok(Self {
            byte_order: ByteOrder::try_from(raw[2])?,
            msg_type: MessageType::try_from(raw[3])?,
            msg_size: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        })
    }

    /// Total wire size of the message this header introduces.
    pub fn wire_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.msg_size as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    /// Correlation id echoed in the response.
    pub msg_id: u32,
    pub target: ObjectKey,
    pub operation: u32,
}

impl CommandHeader {
    pub fn new(msg_id: u32, target: ObjectKey, operation: u32) -> Self {
        Self {
            msg_id,
            target,
            operation,
        }
    }

    /// Reject a command message too short to hold its own header.
    pub fn check_message_size(msg_size: usize) -> Result<()> {
        if msg_size < COMMAND_HEADER_SIZE {
            return Err(WireError::MalformedFrame(format!(
                "command message of {msg_size} bytes is shorter than its {COMMAND_HEADER_SIZE}-byte header"
            )));
        }
        Ok(())
    }

    pub fn encode<S: AsRef<[u8]> + AsMut<[u8]>>(&self, enc: &mut Encoder<'_, S>) -> Result<()> {
        enc.put_u32(self.msg_id)?;
        enc.put_u32(self.target.raw())?;
        enc.put_u32(self.operation)
    }

    pub fn decode<S: AsRef<[u8]> + AsMut<[u8]>>(dec: &mut Decoder<'_, S>) -> Result<Self> {
        Ok(Self {
            msg_id: dec.get_u32()?,
            target: ObjectKey::from_raw(dec.get_u32()?),
            operation: dec.get_u32()?,
        })
    }

    pub fn to_bytes(&self) -> [u8; COMMAND_HEADER_SIZE] {
        let mut out = [0u8; COMMAND_HEADER_SIZE];
        out[0..4].copy_from_slice(&self.msg_id.to_le_bytes());
        out[4..8].copy_from_slice(&self.target.raw().to_le_bytes());
        out[8..12].copy_from_slice(&self.operation.to_le_bytes());
        out
    }

    pub fn from_bytes(raw: &[u8; COMMAND_HEADER_SIZE]) -> Self {
        Self {
            msg_id: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            target: ObjectKey::from_raw(u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]])),
            operation: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub msg_id: u32,
    /// See [`crate::status`].
    pub status: i32,
}

impl ResponseHeader {
    pub fn new(msg_id: u32, status: i32) -> Self {
        Self { msg_id, status }
    }

    pub fn is_success(&self) -> bool {
        self.status == crate::status::SUCCESS
    }

    pub fn encode<S: AsRef<[u8]> + AsMut<[u8]>>(&self, enc: &mut Encoder<'_, S>) -> Result<()> {
        enc.put_u32(self.msg_id)?;
        enc.put_i32(self.status)
    }

    pub fn decode<S: AsRef<[u8]> + AsMut<[u8]>>(dec: &mut Decoder<'_, S>) -> Result<Self> {
        Ok(Self {
            msg_id: dec.get_u32()?,
            status: dec.get_i32()?,
        })
    }

    pub fn to_bytes(&self) -> [u8; RESPONSE_HEADER_SIZE] {
        let mut out = [0u8; RESPONSE_HEADER_SIZE];
        out[0..4].copy_from_slice(&self.msg_id.to_le_bytes());
        out[4..8].copy_from_slice(&self.status.to_le_bytes());
        out
    }

    pub fn from_bytes(raw: &[u8; RESPONSE_HEADER_SIZE]) -> Self {
        Self {
            msg_id: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            status: i32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        }
    }
}
