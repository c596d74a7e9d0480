//! Register-level simulated USART.
//!
//! [`SimLine`] is the driver half, handed to a channel. [`SimWire`] is the
//! far end of the cable: tests and host tools inject received bytes through
//! it and collect what the port transmitted. Injected bytes are delivered on
//! the injecting thread, which plays the part of the interrupt context.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::baud::LineConfig;
use crate::error::{LineError, Result};
use crate::receiver::{lock, Receiver};
use crate::regs::{ucsra, Enable, Registers};
use crate::traits::{LineDriver, PortId, RxHandler};

#[derive(Default)]
struct Control {
    ubrr: u16,
    double_speed: bool,
    ucsrc: u8,
    enable: Enable,
}

struct SimShared {
    receiver: Receiver,
    control: Mutex<Control>,
    transmitted: Mutex<VecDeque<u8>>,
    tx_ready: Condvar,
}

impl SimShared {
    fn registers(&self) -> Registers {
        let control = lock(&self.control);
        let mut status = self.receiver.status_bits() | ucsra::UDRE;
        if control.double_speed {
            status |= ucsra::U2X;
        }
        Registers {
            ucsra: status,
            ucsrb: control.enable.ucsrb(),
            ucsrc: control.ucsrc,
            ubrr: control.ubrr,
        }
    }
}

/// Driver half of a simulated USART port.
pub struct SimLine {
    port: PortId,
    shared: Arc<SimShared>,
}

/// Wire half of a simulated USART port.
#[derive(Clone)]
pub struct SimWire {
    shared: Arc<SimShared>,
}

impl SimLine {
    /// Create a simulated port and the wire attached to it.
    pub fn new(port: PortId) -> (Self, SimWire) {
        let shared = Arc::new(SimShared {
            receiver: Receiver::new(),
            control: Mutex::new(Control::default()),
            transmitted: Mutex::new(VecDeque::new()),
            tx_ready: Condvar::new(),
        });
        let wire = SimWire {
            shared: Arc::clone(&shared),
        };
        (Self { port, shared }, wire)
    }

    /// Current register image.
    pub fn registers(&self) -> Registers {
        self.shared.registers()
    }
}

impl LineDriver for SimLine {
    fn port(&self) -> PortId {
        self.port
    }

    fn configure(&mut self, config: &LineConfig) -> Result<()> {
        let ubrr = config.divisor()?;
        let mut control = lock(&self.shared.control);
        control.ubrr = ubrr;
        control.double_speed = config.double_speed;
        control.ucsrc = config.format.ucsrc();
        debug!(
            port = %self.port,
            baud = config.baud,
            ubrr,
            format = %config.format,
            "configured simulated line"
        );
        Ok(())
    }

    fn enable(&mut self, enable: Enable) -> Result<()> {
        lock(&self.shared.control).enable = enable;
        self.shared.receiver.set_enable(enable);
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.enable(Enable::NONE)
    }

    fn set_rx_handler(&mut self, handler: Option<Arc<dyn RxHandler>>) {
        self.shared.receiver.set_handler(handler);
    }

    fn blocking_send(&mut self, byte: u8) -> Result<()> {
        if !lock(&self.shared.control).enable.tx {
            return Err(LineError::TxDisabled);
        }
        lock(&self.shared.transmitted).push_back(byte);
        self.shared.tx_ready.notify_all();
        Ok(())
    }

    fn try_receive(&mut self) -> Result<Option<u8>> {
        Ok(self.shared.receiver.try_take())
    }

    fn blocking_receive(&mut self) -> Result<u8> {
        self.shared.receiver.take_blocking()
    }
}

impl SimWire {
    /// Feed bytes into the port's receiver, one delivery per byte.
    pub fn inject(&self, bytes: &[u8]) {
        for &byte in bytes {
            self.shared.receiver.deliver(byte);
        }
    }

    /// Drain everything the port has transmitted so far.
    pub fn take_transmitted(&self) -> Vec<u8> {
        lock(&self.shared.transmitted).drain(..).collect()
    }

    /// Wait until at least `len` bytes were transmitted (or `timeout`
    /// elapses), then drain them all.
    pub fn wait_transmitted(&self, len: usize, timeout: Duration) -> Vec<u8> {
        let deadline = Instant::now() + timeout;
        let mut transmitted = lock(&self.shared.transmitted);
        while transmitted.len() < len {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            transmitted = self
                .shared
                .tx_ready
                .wait_timeout(transmitted, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        transmitted.drain(..).collect()
    }

    /// Current register image of the port.
    pub fn registers(&self) -> Registers {
        self.shared.registers()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::baud::FrameFormat;
    use crate::regs::{ucsrb, ucsrc};

    #[test]
    fn configure_programs_divisor_and_format() {
        let (mut line, wire) = SimLine::new(PortId(1));
        let config = LineConfig {
            clock_hz: 8_000_000,
            baud: 9600,
            double_speed: false,
            format: "7E2".parse::<FrameFormat>().unwrap(),
        };
        line.configure(&config).unwrap();

        let regs = wire.registers();
        assert_eq!(regs.ubrr, 51);
        assert!(!regs.double_speed());
        assert_eq!(regs.ucsrc, ucsrc::UCSZ1 | ucsrc::UPM1 | ucsrc::USBS);
        assert_eq!(line.port(), PortId(1));
    }

    #[test]
    fn configure_rejects_unsupported_baud() {
        let (mut line, wire) = SimLine::new(PortId(0));
        let config = LineConfig {
            clock_hz: 1_000_000,
            baud: 115_200,
            ..LineConfig::default()
        };
        assert!(matches!(
            line.configure(&config),
            Err(LineError::UnsupportedBaud { .. })
        ));
        assert_eq!(wire.registers().ubrr, 0);
    }

    #[test]
    fn send_requires_transmitter() {
        let (mut line, wire) = SimLine::new(PortId(0));
        assert!(matches!(line.blocking_send(b'a'), Err(LineError::TxDisabled)));

        line.enable(Enable::POLLED).unwrap();
        line.blocking_send(b'o').unwrap();
        line.blocking_send(b'k').unwrap();
        assert_eq!(wire.take_transmitted(), b"ok");
        assert!(wire.take_transmitted().is_empty());
    }

    #[test]
    fn polled_receive_and_overrun() {
        let (mut line, wire) = SimLine::new(PortId(0));
        line.enable(Enable::POLLED).unwrap();

        assert_eq!(line.try_receive().unwrap(), None);
        wire.inject(b"ab");
        assert!(wire.registers().overrun());
        assert_eq!(line.try_receive().unwrap(), Some(b'a'));
        assert_eq!(line.try_receive().unwrap(), None);
        assert!(!wire.registers().rx_complete());
    }

    #[test]
    fn blocking_receive_waits_for_wire() {
        let (mut line, wire) = SimLine::new(PortId(0));
        line.enable(Enable::POLLED).unwrap();

        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            wire.inject(b"q");
        });

        assert_eq!(line.blocking_receive().unwrap(), b'q');
        sender.join().unwrap();
    }

    struct Collect(Mutex<Vec<u8>>, AtomicUsize);

    impl RxHandler for Collect {
        fn on_receive(&self, byte: u8) {
            lock(&self.0).push(byte);
            self.1.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn interrupt_delivers_each_byte_to_handler() {
        let (mut line, wire) = SimLine::new(PortId(0));
        let collect = Arc::new(Collect(Mutex::new(Vec::new()), AtomicUsize::new(0)));
        let handler: Arc<dyn RxHandler> = collect.clone();
        line.set_rx_handler(Some(handler));
        line.enable(Enable::BUFFERED).unwrap();

        wire.inject(b"hello");
        assert_eq!(collect.1.load(Ordering::SeqCst), 5);
        assert_eq!(lock(&collect.0).as_slice(), b"hello");
        assert_eq!(
            wire.registers().ucsrb,
            ucsrb::RXCIE | ucsrb::RXEN | ucsrb::TXEN
        );

        line.disable().unwrap();
        wire.inject(b"lost");
        assert_eq!(collect.1.load(Ordering::SeqCst), 5);
        assert_eq!(wire.registers().ucsrb, 0);
    }

    #[test]
    fn wait_transmitted_times_out_with_partial_data() {
        let (mut line, wire) = SimLine::new(PortId(0));
        line.enable(Enable::POLLED).unwrap();
        line.blocking_send(b'x').unwrap();

        let got = wire.wait_transmitted(4, Duration::from_millis(20));
        assert_eq!(got, b"x");
    }
}
