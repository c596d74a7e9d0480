//! Receive buffering for usartkit.
//!
//! Bytes arriving from a USART land in a fixed-capacity [`RingBuffer`].
//! A [`FramingState`] tracks a terminator byte and counts the complete
//! messages currently resident, so a consumer can retrieve single bytes,
//! blocks of up to N bytes, or whole terminator-delimited messages.
//!
//! Capacity is fixed at construction; a full buffer rejects new bytes
//! instead of overwriting unread ones.

pub mod error;
pub mod framing;
pub mod ring;

pub use error::{BufferError, Result};
pub use framing::{FramingState, DEFAULT_TERMINATOR};
pub use ring::{RingBuffer, Scan};
