use std::fmt;
use std::io;

use cxorb_orb::OrbError;
use cxorb_transport::TransportError;
use cxorb_wire::WireError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    match err {
        WireError::Io(source) => io_error(context, source),
        WireError::Transport(err) => transport_error(context, err),
        WireError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        WireError::BufferOverflow { .. }
        | WireError::BufferUnderflow { .. }
        | WireError::MessageTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn orb_error(context: &str, err: OrbError) -> CliError {
    match err {
        OrbError::Transport(err) => transport_error(context, err),
        OrbError::Wire(err) => wire_error(context, err),
        OrbError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        OrbError::UnknownTarget(_) | OrbError::UnknownOperation { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        OrbError::Remote { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cxorb_wire::ObjectKey;

    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        assert_eq!(
            orb_error("call", OrbError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        let io = io::Error::new(io::ErrorKind::WouldBlock, "slow");
        assert_eq!(orb_error("call", OrbError::Wire(WireError::Io(io))).code, TIMEOUT);
    }

    #[test]
    fn unknown_objects_are_usage_errors() {
        let err = orb_error("read", OrbError::UnknownTarget(ObjectKey::new(1, 4)));
        assert_eq!(err.code, USAGE);
        assert_eq!(err.to_string(), "read: no object registered under 0x00010004");
    }

    #[test]
    fn refused_connection_is_failure() {
        let io = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(io_error("connect", io).code, FAILURE);
    }
}
