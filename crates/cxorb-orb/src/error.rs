use std::time::Duration;

use cxorb_wire::{status, ObjectKey, WireError};

/// Errors that can occur in remote-object operations.
#[derive(Debug, thiserror::Error)]
pub enum OrbError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] cxorb_transport::TransportError),

    /// Buffer, codec or framing error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// No object is registered under the key.
    #[error("no object registered under {0}")]
    UnknownTarget(ObjectKey),

    /// The object has no handler for the operation code.
    #[error("unknown operation {operation}")]
    UnknownOperation { operation: u32 },

    /// The remote side answered with a failure status.
    #[error("remote call failed with status {status} ({})", status::name(*status))]
    Remote { status: i32 },

    /// An object is already registered under the key.
    #[error("object {0} is already registered")]
    DuplicateKey(ObjectKey),

    /// The registry holds its maximum number of objects.
    #[error("registry is full ({0} objects)")]
    RegistryFull(usize),

    /// The peer sent a message of the wrong type.
    #[error("expected {expected} message, got {got}")]
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },

    /// A response answered a different request.
    #[error("response id {got} does not match request id {expected}")]
    MessageIdMismatch { expected: u32, got: u32 },

    /// A blocking read or write ran past its timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// An earlier failure left the connection mid-message.
    #[error("connection is unusable after an earlier failure")]
    Poisoned,
}

impl OrbError {
    /// Status code reported to a remote caller when a handler fails this way.
    pub fn status(&self) -> i32 {
        match self {
            Self::UnknownTarget(_) => status::UNKNOWN_OBJ,
            Self::UnknownOperation { .. } => status::UNKNOWN_CMD,
            Self::Remote { status } => *status,
            Self::Wire(WireError::BufferUnderflow { .. }) => status::PACKET_SIZE,
            Self::Wire(WireError::BufferOverflow { .. }) => status::NO_MEM,
            _ => status::SYSTEM,
        }
    }

    /// Map a failure status from a response back to an error.
    pub fn from_status(status: i32, target: ObjectKey, operation: u32) -> Self {
        match status {
            status::UNKNOWN_OBJ => Self::UnknownTarget(target),
            status::UNKNOWN_CMD => Self::UnknownOperation { operation },
            status => Self::Remote { status },
        }
    }
}

pub type Result<T> = std::result::Result<T, OrbError>;
