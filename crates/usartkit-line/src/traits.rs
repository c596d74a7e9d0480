use std::fmt;
use std::sync::Arc;

use crate::baud::LineConfig;
use crate::error::Result;
use crate::regs::Enable;

/// Identifies one physical USART port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PortId(pub u8);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "usart{}", self.0)
    }
}

/// Receive-complete handler: the "interrupt vector" of a port.
///
/// Invoked once per received byte while the receiver and its interrupt are
/// enabled. Invocations on one line are serialized, never concurrent with
/// each other. Implementations must not block or call back into the line.
pub trait RxHandler: Send + Sync {
    fn on_receive(&self, byte: u8);
}

/// Hardware access for one USART port.
///
/// The channel layer owns a line exclusively; nothing else touches the same
/// registers while the channel is alive.
pub trait LineDriver: Send {
    /// The port this driver controls.
    fn port(&self) -> PortId;

    /// Program the divisor and frame format.
    ///
    /// Fails with [`LineError::UnsupportedBaud`](crate::LineError::UnsupportedBaud)
    /// for clock/baud combinations outside the divisor table.
    fn configure(&mut self, config: &LineConfig) -> Result<()>;

    /// Set the transmitter, receiver and receive-interrupt enable bits.
    fn enable(&mut self, enable: Enable) -> Result<()>;

    /// Clear every enable bit.
    ///
    /// Returns only after any in-flight [`RxHandler::on_receive`] call has
    /// completed; no further calls start until the interrupt is re-enabled.
    fn disable(&mut self) -> Result<()>;

    /// Install (or remove) the receive-complete handler.
    fn set_rx_handler(&mut self, handler: Option<Arc<dyn RxHandler>>);

    /// Wait for the transmit register to empty, then write one byte.
    fn blocking_send(&mut self, byte: u8) -> Result<()>;

    /// Read the receive register if it holds data.
    fn try_receive(&mut self) -> Result<Option<u8>>;

    /// Wait until the receive register holds data, then read it.
    fn blocking_receive(&mut self) -> Result<u8>;

    /// Whether the far end is still attached. On-chip ports always are.
    fn is_open(&self) -> bool {
        true
    }
}

impl<L: LineDriver + ?Sized> LineDriver for Box<L> {
    fn port(&self) -> PortId {
        (**self).port()
    }

    fn configure(&mut self, config: &LineConfig) -> Result<()> {
        (**self).configure(config)
    }

    fn enable(&mut self, enable: Enable) -> Result<()> {
        (**self).enable(enable)
    }

    fn disable(&mut self) -> Result<()> {
        (**self).disable()
    }

    fn set_rx_handler(&mut self, handler: Option<Arc<dyn RxHandler>>) {
        (**self).set_rx_handler(handler)
    }

    fn blocking_send(&mut self, byte: u8) -> Result<()> {
        (**self).blocking_send(byte)
    }

    fn try_receive(&mut self) -> Result<Option<u8>> {
        (**self).try_receive()
    }

    fn blocking_receive(&mut self) -> Result<u8> {
        (**self).blocking_receive()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
