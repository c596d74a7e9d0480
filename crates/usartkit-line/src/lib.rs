//! USART line driver abstraction.
//!
//! This is the lowest layer of usartkit. It owns everything that touches the
//! transceiver itself:
//! - the divisor table of supported clock/baud combinations ([`baud`])
//! - the register image of a USART port ([`regs`])
//! - the [`LineDriver`] trait the channel layer drives
//! - a register-level simulated USART ([`SimLine`]) and hosted lines over
//!   byte streams ([`StreamLine`]: Unix domain sockets and POSIX ttys)

pub mod baud;
pub mod error;
pub mod regs;
pub mod sim;
pub mod stream;
pub mod traits;

mod receiver;

#[cfg(unix)]
pub mod tty;
#[cfg(unix)]
pub mod uds;

pub use baud::{
    divisor, BaudEntry, DataBits, FrameFormat, LineConfig, Parity, StopBits, BAUD_TABLE,
};
pub use error::{LineError, Result};
pub use regs::{Enable, Registers};
pub use sim::{SimLine, SimWire};
pub use stream::{LineStream, StreamLine};
pub use traits::{LineDriver, PortId, RxHandler};

#[cfg(unix)]
pub use tty::TtyPort;
#[cfg(unix)]
pub use uds::UdsLine;
