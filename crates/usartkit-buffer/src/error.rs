/// Errors that can occur when building receive buffers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BufferError {
    /// A ring buffer must hold at least one byte.
    #[error("ring buffer capacity must be at least 1 byte")]
    ZeroCapacity,
}

pub type Result<T> = std::result::Result<T, BufferError>;
