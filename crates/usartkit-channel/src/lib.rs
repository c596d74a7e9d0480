//! Interrupt-fed USART channels.
//!
//! This is the "just works" layer. A [`Channel`] owns one [`LineDriver`],
//! installs a receive handler that feeds a fixed-capacity ring buffer, and
//! hands the consumer single bytes, blocks, or whole terminator-delimited
//! messages.
//!
//! ```
//! use usartkit_channel::{Channel, ChannelConfig};
//! use usartkit_line::{PortId, SimLine};
//!
//! let (line, wire) = SimLine::new(PortId(0));
//! let mut channel = Channel::new(line, ChannelConfig::default())?;
//! channel.resume()?;
//!
//! wire.inject(b"ping\n");
//! let mut buf = [0u8; 16];
//! let n = channel.get_message(&mut buf)?;
//! assert_eq!(&buf[..n], b"ping\n");
//! # Ok::<(), usartkit_channel::ChannelError>(())
//! ```
//!
//! [`LineDriver`]: usartkit_line::LineDriver

pub mod channel;
pub mod config;
pub mod error;
pub mod rx;

pub use channel::Channel;
pub use config::{ChannelConfig, DEFAULT_CAPACITY};
pub use error::{ChannelError, Result};
pub use rx::RxStats;
