use std::io::{ErrorKind, Read};

use cxorb_transport::Stream;
use tracing::{debug, warn};

use crate::buffer::SeqBuffer;
use crate::error::{Result, WireError};
use crate::header::{PacketHeader, MAGIC, PACKET_HEADER_SIZE};
use crate::msg_type;
use crate::packet::WireConfig;

const DISCARD_CHUNK_SIZE: usize = 256;

/// Reads packet headers and exact-length message parts from any `Read` stream.
///
/// Every read requests an exact byte count. Short reads are retried until
/// the count is met or the stream ends.
pub struct PacketReader<T> {
    inner: T,
    config: WireConfig,
}

impl<T: Read> PacketReader<T> {
    /// Create a new packet reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, WireConfig::default())
    }

    /// Create a new packet reader with explicit configuration.
    pub fn with_config(inner: T, config: WireConfig) -> Self {
        Self { inner, config }
    }

    /// Read and decode the next packet header (blocking).
    ///
    /// Returns `Err(WireError::ConnectionClosed)` when the stream ends before
    /// the first byte, and `Err(WireError::Truncated)` when it ends part-way.
    pub fn read_packet_header(&mut self) -> Result<PacketHeader> {
        let mut raw = [0u8; PACKET_HEADER_SIZE];
        let got = self.read_full(&mut raw)?;
        if got == 0 {
            return Err(WireError::ConnectionClosed);
        }
        if got < PACKET_HEADER_SIZE {
            return Err(WireError::Truncated {
                expected: PACKET_HEADER_SIZE,
                got,
            });
        }

        if raw[..2] != MAGIC && self.config.scan_for_magic {
            self.resync(&mut raw)?;
        }

        let header = PacketHeader::from_bytes(&raw).inspect_err(|err| {
            if let WireError::UnknownMessageType(code) = *err {
                if msg_type::is_reserved(code) {
                    warn!(
                        msg_type = msg_type::name(code),
                        "peer sent a reserved message type"
                    );
                }
            }
        })?;
        let msg_size = header.msg_size as usize;
        if msg_size > self.config.max_message_size {
            return Err(WireError::MessageTooLarge {
                size: msg_size,
                max: self.config.max_message_size,
            });
        }
        debug!(
            msg_type = header.msg_type.name(),
            msg_size, "read packet header"
        );
        Ok(header)
    }

    /// Fill `buf` with exactly `len` bytes from the stream, then flip it for
    /// reading.
    ///
    /// Fails with `BufferOverflow` (nothing read) if `len` exceeds the
    /// buffer's capacity.
    pub fn read_exact_into<S>(&mut self, buf: &mut SeqBuffer<S>, len: usize) -> Result<()>
    where
        S: AsRef<[u8]> + AsMut<[u8]>,
    {
        buf.clear_to(len)?;
        let got = self.read_full(buf.remaining_mut())?;
        if got < len {
            return Err(WireError::Truncated { expected: len, got });
        }
        buf.advance(len)?;
        buf.flip();
        Ok(())
    }

    /// Fill `dst` completely from the stream.
    pub fn read_exact(&mut self, dst: &mut [u8]) -> Result<()> {
        let got = self.read_full(dst)?;
        if got < dst.len() {
            return Err(WireError::Truncated {
                expected: dst.len(),
                got,
            });
        }
        Ok(())
    }

    /// Read and drop exactly `len` bytes.
    pub fn discard(&mut self, mut len: usize) -> Result<()> {
        let expected = len;
        let mut scratch = [0u8; DISCARD_CHUNK_SIZE];
        while len > 0 {
            let chunk = len.min(DISCARD_CHUNK_SIZE);
            let got = self.read_full(&mut scratch[..chunk])?;
            if got < chunk {
                return Err(WireError::Truncated {
                    expected,
                    got: expected - len + got,
                });
            }
            len -= chunk;
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum message size for subsequent header reads.
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.config.max_message_size = max_message_size;
    }

    /// Current reader configuration.
    pub fn config(&self) -> &WireConfig {
        &self.config
    }

    /// Slide `window` one byte at a time until it starts with the magic tag.
    fn resync(&mut self, window: &mut [u8; PACKET_HEADER_SIZE]) -> Result<()> {
        let mut skipped = 0usize;
        while window[..2] != MAGIC {
            window.copy_within(1.., 0);
            let got = self.read_full(&mut window[PACKET_HEADER_SIZE - 1..])?;
            if got == 0 {
                warn!(skipped, "stream ended while scanning for packet magic");
                return Err(WireError::ConnectionClosed);
            }
            skipped += 1;
        }
        warn!(skipped, "skipped bytes before packet magic");
        Ok(())
    }

    /// Read until `dst` is full or the stream ends; returns the bytes read.
    fn read_full(&mut self, dst: &mut [u8]) -> Result<usize> {
        let mut filled = 0usize;
        while filled < dst.len() {
            match self.inner.read(&mut dst[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
        Ok(filled)
    }
}

impl PacketReader<Stream> {
    /// Create a packet reader for a transport stream and apply the read
    /// timeout from config.
    pub fn for_stream(inner: Stream, config: WireConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::header::{CommandHeader, MessageType, COMMAND_HEADER_SIZE};
    use crate::key::ObjectKey;
    use crate::packet::{encode_packet, Packet};

    fn command_wire(msg_id: u32, params: &[u8]) -> Vec<u8> {
        let header = CommandHeader::new(msg_id, ObjectKey::new(1, 0), 0);
        let mut wire = BytesMut::new();
        encode_packet(&Packet::command(&header, params).unwrap(), &mut wire).unwrap();
        wire.to_vec()
    }

    #[test]
    fn reads_header_then_exact_parts() {
        let mut reader = PacketReader::new(Cursor::new(command_wire(3, b"abc")));

        let header = reader.read_packet_header().unwrap();
        assert_eq!(header.msg_type, MessageType::Command);
        assert_eq!(header.msg_size, 15);

        let mut buf = SeqBuffer::with_capacity(32);
        reader
            .read_exact_into(&mut buf, COMMAND_HEADER_SIZE)
            .unwrap();
        assert_eq!(buf.remaining(), COMMAND_HEADER_SIZE);
        assert_eq!(&buf.remaining_slice()[..4], &3u32.to_le_bytes());

        let mut params = [0u8; 3];
        reader.read_exact(&mut params).unwrap();
        assert_eq!(&params, b"abc");
    }

    #[test]
    fn byte_by_byte_stream() {
        let mut reader = PacketReader::new(ByteByByteReader {
            bytes: command_wire(1, b"xy"),
            pos: 0,
        });
        let header = reader.read_packet_header().unwrap();
        let mut buf = SeqBuffer::with_capacity(64);
        reader
            .read_exact_into(&mut buf, header.msg_size as usize)
            .unwrap();
        assert_eq!(&buf.remaining_slice()[12..], b"xy");
    }

    #[test]
    fn clean_close_before_header() {
        let mut reader = PacketReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            reader.read_packet_header(),
            Err(WireError::ConnectionClosed)
        ));
    }

    #[test]
    fn close_mid_header_is_truncated() {
        let mut reader = PacketReader::new(Cursor::new(vec![b'C', b'X', 0]));
        assert!(matches!(
            reader.read_packet_header(),
            Err(WireError::Truncated {
                expected: 8,
                got: 3
            })
        ));
    }

    #[test]
    fn close_mid_body_is_truncated() {
        let mut wire = command_wire(1, b"");
        wire.truncate(PACKET_HEADER_SIZE + 5);
        let mut reader = PacketReader::new(Cursor::new(wire));
        reader.read_packet_header().unwrap();

        let mut buf = SeqBuffer::with_capacity(16);
        assert!(matches!(
            reader.read_exact_into(&mut buf, COMMAND_HEADER_SIZE),
            Err(WireError::Truncated { got: 5, .. })
        ));
    }

    #[test]
    fn read_into_undersized_buffer_reads_nothing() {
        let mut reader = PacketReader::new(Cursor::new(vec![0u8; 32]));
        let mut buf = SeqBuffer::with_capacity(8);
        assert!(matches!(
            reader.read_exact_into(&mut buf, 16),
            Err(WireError::BufferOverflow { .. })
        ));
        assert_eq!(reader.get_ref().position(), 0);
    }

    #[test]
    fn invalid_magic_without_scan() {
        let mut wire = vec![0xEE, 0xEE];
        wire.extend(command_wire(1, b""));
        let mut reader = PacketReader::new(Cursor::new(wire));
        assert!(matches!(
            reader.read_packet_header(),
            Err(WireError::InvalidMagic([0xEE, 0xEE]))
        ));
    }

    #[test]
    fn reserved_message_type_is_rejected() {
        let mut wire = command_wire(1, b"");
        wire[3] = msg_type::EVENT;
        let mut reader = PacketReader::new(Cursor::new(wire));
        assert!(matches!(
            reader.read_packet_header(),
            Err(WireError::UnknownMessageType(msg_type::EVENT))
        ));
    }

    #[test]
    fn scan_for_magic_skips_garbage() {
        let mut wire = vec![0x00, b'C', 0x11, 0x22, 0x33];
        wire.extend(command_wire(42, b"p"));
        let config = WireConfig {
            scan_for_magic: true,
            ..WireConfig::default()
        };
        let mut reader = PacketReader::with_config(Cursor::new(wire), config);

        let header = reader.read_packet_header().unwrap();
        assert_eq!(header.msg_size, 13);
        let mut buf = SeqBuffer::with_capacity(16);
        reader.read_exact_into(&mut buf, 13).unwrap();
        assert_eq!(&buf.remaining_slice()[..4], &42u32.to_le_bytes());
    }

    #[test]
    fn scan_for_magic_hits_end_of_stream() {
        let config = WireConfig {
            scan_for_magic: true,
            ..WireConfig::default()
        };
        let mut reader = PacketReader::with_config(Cursor::new(vec![7u8; 20]), config);
        assert!(matches!(
            reader.read_packet_header(),
            Err(WireError::ConnectionClosed)
        ));
    }

    #[test]
    fn oversized_message_rejected() {
        let config = WireConfig {
            max_message_size: 16,
            ..WireConfig::default()
        };
        let mut reader =
            PacketReader::with_config(Cursor::new(command_wire(1, &[0u8; 10])), config);
        assert!(matches!(
            reader.read_packet_header(),
            Err(WireError::MessageTooLarge { size: 22, max: 16 })
        ));
    }

    #[test]
    fn discard_skips_exact_count() {
        let mut data = vec![1u8; 600];
        data.extend_from_slice(&[9, 8]);
        let mut reader = PacketReader::new(Cursor::new(data));
        reader.discard(600).unwrap();
        let mut tail = [0u8; 2];
        reader.read_exact(&mut tail).unwrap();
        assert_eq!(tail, [9, 8]);

        assert!(matches!(
            reader.discard(1),
            Err(WireError::Truncated {
                expected: 1,
                got: 0
            })
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            bytes: command_wire(8, b"ok"),
            pos: 0,
        };
        let mut packets = PacketReader::new(reader);
        assert_eq!(packets.read_packet_header().unwrap().msg_size, 14);
    }

    #[test]
    fn timeout_surfaces_as_io_error() {
        let mut reader = PacketReader::new(AlwaysWouldBlock);
        let err = reader.read_packet_header().unwrap_err();
        assert!(err.is_timeout());
        assert!(err.is_fatal());
    }

    #[test]
    #[cfg(unix)]
    fn applies_read_timeout_for_stream() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let config = WireConfig {
            read_timeout: Some(std::time::Duration::from_millis(20)),
            ..WireConfig::default()
        };
        let mut reader = PacketReader::for_stream(Stream::from(left), config).unwrap();
        assert!(reader.read_packet_header().unwrap_err().is_timeout());
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct AlwaysWouldBlock;

    impl Read for AlwaysWouldBlock {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }
}
