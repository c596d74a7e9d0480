use std::path::PathBuf;

/// Errors that can occur while driving a USART line.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    /// The clock/baud combination is not in the divisor table.
    #[error("unsupported baud rate {baud} at {clock_hz} Hz (double speed: {double_speed})")]
    UnsupportedBaud {
        clock_hz: u32,
        baud: u32,
        double_speed: bool,
    },

    /// The frame format cannot be expressed by the line.
    #[error("unsupported frame format: {0}")]
    UnsupportedFormat(String),

    /// Failed to open the device or socket backing the line.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the underlying stream.
    #[error("line I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A transmit was attempted while the transmitter is disabled.
    #[error("transmitter is disabled")]
    TxDisabled,

    /// A blocking receive was attempted while the receiver is disabled.
    #[error("receiver is disabled")]
    RxDisabled,

    /// The far end of the line went away.
    #[error("line closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, LineError>;
