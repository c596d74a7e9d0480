//! USART channels with interrupt-fed ring buffers.
//!
//! usartkit configures a serial transceiver, transmits bytes synchronously,
//! and receives bytes asynchronously into a bounded buffer that understands
//! terminator-delimited messages.
//!
//! # Crate Structure
//!
//! - [`line`] — Line driver abstraction (baud table, registers, simulated and stream-backed lines)
//! - [`buffer`] — Fixed-capacity ring buffer and message framing state
//! - [`channel`] — Channel lifecycle and consumer surface (behind `channel` feature)

/// Re-export line driver types.
pub mod line {
    pub use usartkit_line::*;
}

/// Re-export buffer types.
pub mod buffer {
    pub use usartkit_buffer::*;
}

/// Re-export channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use usartkit_channel::*;
}
