/// Errors that can occur while building, encoding or exchanging packets.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A write would pass the buffer's limit.
    #[error("buffer overflow (needed {needed} bytes, {remaining} remaining)")]
    BufferOverflow { needed: usize, remaining: usize },

    /// A read would pass the buffer's limit.
    #[error("buffer underflow (needed {needed} bytes, {remaining} remaining)")]
    BufferUnderflow { needed: usize, remaining: usize },

    /// A cursor was moved outside the buffer's bounds.
    #[error("buffer position {requested} out of bounds (bound {bound})")]
    OutOfBounds { requested: usize, bound: usize },

    /// The packet header does not start with the "CX" tag.
    #[error("invalid packet magic {0:02X?} (expected \"CX\")")]
    InvalidMagic([u8; 2]),

    /// The message type byte is reserved or unknown.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// The byte order byte is not a known value.
    #[error("unknown byte order {0}")]
    UnknownByteOrder(u8),

    /// Header fields are inconsistent with the data that follows.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The announced message size exceeds the configured maximum.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The stream ended part-way through a frame.
    #[error("stream ended mid-frame ({got} of {expected} bytes)")]
    Truncated { expected: usize, got: usize },

    /// The stream ended cleanly between frames.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred while reading or writing packets.
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport could not be configured.
    #[error("transport error: {0}")]
    Transport(#[from] cxorb_transport::TransportError),
}

impl WireError {
    /// True for buffer bound violations, which leave the buffer untouched.
    pub fn is_buffer_error(&self) -> bool {
        matches!(
            self,
            Self::BufferOverflow { .. } | Self::BufferUnderflow { .. } | Self::OutOfBounds { .. }
        )
    }

    /// True when the error ends the connection.
    pub fn is_fatal(&self) -> bool {
        !self.is_buffer_error()
    }

    /// True when a blocking read or write ran past its timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WireError>;
