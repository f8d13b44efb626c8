//! Wire format for cxorb remote-object calls.
//!
//! Every message on the stream is a packet:
//! - An 8-byte packet header: magic "CX", byte order, message type, size
//! - A command header (12 bytes) or response header (8 bytes)
//! - Operation parameters or return payload, laid out by [`Encoder`]
//!
//! Payloads use native C struct layout: little-endian values, each aligned
//! to its own width from the start of the buffer. [`SeqBuffer`] is the
//! fixed-capacity cursor both sides encode into and decode from.

pub mod binary;
pub mod buffer;
pub mod error;
pub mod header;
pub mod key;
pub mod msg_type;
pub mod packet;
pub mod reader;
pub mod status;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use binary::{Decoder, Encoder, Primitive};
pub use buffer::{SeqBuffer, DEFAULT_BUFFER_SIZE};
pub use error::{Result, WireError};
pub use header::{
    ByteOrder, CommandHeader, MessageType, PacketHeader, ResponseHeader, COMMAND_HEADER_SIZE,
    MAGIC, PACKET_HEADER_SIZE, RESPONSE_HEADER_SIZE,
};
pub use key::{class, ObjectKey};
pub use packet::{decode_packet, encode_packet, Packet, WireConfig, DEFAULT_MAX_MESSAGE_SIZE};
pub use reader::PacketReader;
pub use writer::PacketWriter;

#[cfg(feature = "async")]
pub use async_codec::PacketCodec;
