use std::fmt;
use std::io;

use impactrelay_acquire::AcquireError;
use impactrelay_relay::RelayError;
use impactrelay_transport::TransportError;

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
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    if err.is_permission_denied() {
        return CliError::new(PERMISSION_DENIED, format!("{context}: {err}"));
    }
    match err {
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn relay_error(context: &str, err: RelayError) -> CliError {
    match err {
        RelayError::Transport(err) => transport_error(context, err),
        RelayError::Io(source) => io_error(context, source),
        RelayError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn acquire_error(context: &str, err: AcquireError) -> CliError {
    match err {
        AcquireError::Transport(err) => transport_error(context, err),
        AcquireError::Io(source) => CliError::new(TRANSPORT_ERROR, format!("{context}: {source}")),
        AcquireError::Relay(err) => relay_error(context, err),
        AcquireError::Frame(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}
