use std::fmt;
use std::io;

use usartkit_channel::ChannelError;
use usartkit_line::LineError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const LINE_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG: i32 = 78;
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
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn line_error(context: &str, err: LineError) -> CliError {
    match err {
        LineError::UnsupportedBaud { .. } | LineError::UnsupportedFormat(_) => {
            CliError::new(CONFIG, format!("{context}: {err}"))
        }
        LineError::Io(source) if source.kind() == io::ErrorKind::TimedOut => {
            io_error(context, source)
        }
        other => CliError::new(LINE_ERROR, format!("{context}: {other}")),
    }
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Line(err) => line_error(context, err),
        ChannelError::Buffer(_)
        | ChannelError::Config(_)
        | ChannelError::Json(_)
        | ChannelError::Io(_) => CliError::new(CONFIG, format!("{context}: {err}")),
        ChannelError::NotActive(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
