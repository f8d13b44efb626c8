//! Status codes carried in the command response header.
//!
//! Zero is success, negative values are protocol-level failures raised by
//! the dispatcher, positive values belong to the application.

pub const SUCCESS: i32 = 0;

/// Unclassified server-side failure.
pub const SYSTEM: i32 = -1;

/// The reply did not fit in the server's reply buffer.
pub const NO_MEM: i32 = -2;

pub const PACKET_WRITE: i32 = -3;

pub const PACKET_READ: i32 = -4;

/// The parameter block was shorter or longer than the operation accepts.
pub const PACKET_SIZE: i32 = -5;

/// No object is registered under the target key.
pub const UNKNOWN_OBJ: i32 = -6;

/// The target object has no handler for the operation code.
pub const UNKNOWN_CMD: i32 = -7;

pub const SERVER_CLOSING: i32 = -8;

/// Returns a human-readable name for a status code.
pub fn name(status: i32) -> &'static str {
    match status {
        SUCCESS => "SUCCESS",
        SYSTEM => "SYSTEM",
        NO_MEM => "NO_MEM",
        PACKET_WRITE => "PACKET_WRITE",
        PACKET_READ => "PACKET_READ",
        PACKET_SIZE => "PACKET_SIZE",
        UNKNOWN_OBJ => "UNKNOWN_OBJ",
        UNKNOWN_CMD => "UNKNOWN_CMD",
        SERVER_CLOSING => "SERVER_CLOSING",
        s if s > 0 => "APPLICATION",
        _ => "UNKNOWN",
    }
}

/// Returns true for the negative, protocol-level codes.
pub fn is_protocol_error(status: i32) -> bool {
    status < 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(name(SUCCESS), "SUCCESS");
        assert_eq!(name(UNKNOWN_OBJ), "UNKNOWN_OBJ");
        assert_eq!(name(SERVER_CLOSING), "SERVER_CLOSING");
        assert_eq!(name(12), "APPLICATION");
        assert_eq!(name(-99), "UNKNOWN");
    }

    #[test]
    fn protocol_errors_are_negative() {
        assert!(!is_protocol_error(SUCCESS));
        assert!(!is_protocol_error(3));
        assert!(is_protocol_error(UNKNOWN_CMD));
    }
}
