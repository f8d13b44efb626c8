//! Message type codes carried in the packet header.
//!
//! Only commands and responses are exchanged today. Event and data packets
//! have codes assigned but are rejected when a header is decoded.

/// A request to invoke an operation on a remote object.
pub const COMMAND: u8 = 0;

/// The answer to a command.
pub const RESPONSE: u8 = 1;

/// Unsolicited notification (reserved).
pub const EVENT: u8 = 2;

/// Bulk data transfer (reserved).
pub const DATA: u8 = 3;

/// Returns a human-readable name for a message type code.
pub fn name(code: u8) -> &'static str {
    match code {
        COMMAND => "COMMAND",
        RESPONSE => "RESPONSE",
        EVENT => "EVENT",
        DATA => "DATA",
        _ => "UNKNOWN",
    }
}

/// Returns true if the code is assigned but not accepted on the wire.
pub fn is_reserved(code: u8) -> bool {
    matches!(code, EVENT | DATA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(name(COMMAND), "COMMAND");
        assert_eq!(name(RESPONSE), "RESPONSE");
        assert_eq!(name(DATA), "DATA");
        assert_eq!(name(200), "UNKNOWN");
    }

    #[test]
    fn reserved_codes() {
        assert!(!is_reserved(COMMAND));
        assert!(!is_reserved(RESPONSE));
        assert!(is_reserved(EVENT));
        assert!(is_reserved(DATA));
        assert!(!is_reserved(4));
    }
}
