use usartkit_line::PortId;

/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Line driver error.
    #[error("line error: {0}")]
    Line(#[from] usartkit_line::LineError),

    /// Receive buffer error.
    #[error("buffer error: {0}")]
    Buffer(#[from] usartkit_buffer::BufferError),

    /// The channel must be resumed before this operation.
    #[error("channel on {0} is not active")]
    NotActive(PortId),

    /// Invalid channel configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while loading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
