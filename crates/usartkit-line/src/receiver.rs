//! Receive side of a USART: the single-byte receive register plus the
//! receive-complete interrupt dispatch. Shared by every line implementation.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{LineError, Result};
use crate::regs::{ucsra, Enable};
use crate::traits::RxHandler;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct RxRegister {
    data: Option<u8>,
    overrun: bool,
    enabled: bool,
    closed: bool,
}

#[derive(Default)]
struct Vector {
    handler: Option<Arc<dyn RxHandler>>,
    rx_enabled: bool,
    interrupt_enabled: bool,
}

#[derive(Default)]
pub(crate) struct Receiver {
    register: Mutex<RxRegister>,
    ready: Condvar,
    // Held for the whole delivery of a byte, which serializes handler calls
    // and lets `set_enable` wait out an in-flight one. Lock order: vector,
    // then register.
    vector: Mutex<Vector>,
}

impl Receiver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A byte finished shifting in.
    pub(crate) fn deliver(&self, byte: u8) {
        let vector = lock(&self.vector);
        if !vector.rx_enabled {
            return;
        }
        if vector.interrupt_enabled {
            if let Some(handler) = &vector.handler {
                handler.on_receive(byte);
                return;
            }
        }

        let mut register = lock(&self.register);
        if register.data.is_some() {
            register.overrun = true;
        } else {
            register.data = Some(byte);
            self.ready.notify_all();
        }
    }

    pub(crate) fn set_enable(&self, enable: Enable) {
        let mut vector = lock(&self.vector);
        vector.rx_enabled = enable.rx;
        vector.interrupt_enabled = enable.rx_interrupt;
        let mut register = lock(&self.register);
        register.enabled = enable.rx;
        if !enable.rx {
            register.data = None;
            register.overrun = false;
        }
        // Wake blocked readers so they can observe a disabled receiver.
        self.ready.notify_all();
    }

    pub(crate) fn set_handler(&self, handler: Option<Arc<dyn RxHandler>>) {
        lock(&self.vector).handler = handler;
    }

    /// The far end went away; blocked readers fail with `Closed`.
    pub(crate) fn close(&self) {
        lock(&self.register).closed = true;
        self.ready.notify_all();
    }

    pub(crate) fn is_closed(&self) -> bool {
        lock(&self.register).closed
    }

    pub(crate) fn try_take(&self) -> Option<u8> {
        let mut register = lock(&self.register);
        let data = register.data.take();
        if data.is_some() {
            register.overrun = false;
        }
        data
    }

    pub(crate) fn take_blocking(&self) -> Result<u8> {
        let mut register = lock(&self.register);
        loop {
            if let Some(byte) = register.data.take() {
                register.overrun = false;
                return Ok(byte);
            }
            if register.closed {
                return Err(LineError::Closed);
            }
            if !register.enabled {
                return Err(LineError::RxDisabled);
            }
            register = self
                .ready
                .wait(register)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// RXC and DOR bits of UCSRA.
    pub(crate) fn status_bits(&self) -> u8 {
        let register = lock(&self.register);
        let mut bits = 0;
        if register.data.is_some() {
            bits |= ucsra::RXC;
        }
        if register.overrun {
            bits |= ucsra::DOR;
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counter(AtomicUsize);

    impl RxHandler for Counter {
        fn on_receive(&self, _byte: u8) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn disabled_receiver_ignores_bytes() {
        let rx = Receiver::new();
        rx.deliver(b'a');
        assert_eq!(rx.try_take(), None);
    }

    #[test]
    fn polled_receive_sets_overrun_on_second_byte() {
        let rx = Receiver::new();
        rx.set_enable(Enable::POLLED);
        rx.deliver(b'a');
        rx.deliver(b'b');

        assert_eq!(rx.status_bits(), ucsra::RXC | ucsra::DOR);
        assert_eq!(rx.try_take(), Some(b'a'));
        assert_eq!(rx.status_bits(), 0);
        assert_eq!(rx.try_take(), None);
    }

    #[test]
    fn interrupt_routes_to_handler() {
        let rx = Receiver::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let handler: Arc<dyn RxHandler> = counter.clone();
        rx.set_handler(Some(handler));
        rx.set_enable(Enable::BUFFERED);

        rx.deliver(b'x');
        rx.deliver(b'y');

        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert_eq!(rx.try_take(), None);
    }

    #[test]
    fn interrupt_without_handler_falls_back_to_register() {
        let rx = Receiver::new();
        rx.set_enable(Enable::BUFFERED);
        rx.deliver(b'z');
        assert_eq!(rx.try_take(), Some(b'z'));
    }

    #[test]
    fn blocking_take_reports_closed_and_disabled() {
        let rx = Receiver::new();
        assert!(matches!(rx.take_blocking(), Err(LineError::RxDisabled)));

        rx.set_enable(Enable::POLLED);
        rx.close();
        assert!(rx.is_closed());
        assert!(matches!(rx.take_blocking(), Err(LineError::Closed)));
    }

    #[test]
    fn blocking_take_wakes_on_delivery() {
        let rx = Arc::new(Receiver::new());
        rx.set_enable(Enable::POLLED);

        let producer = {
            let rx = Arc::clone(&rx);
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(20));
                rx.deliver(b'k');
            })
        };

        assert_eq!(rx.take_blocking().unwrap(), b'k');
        producer.join().unwrap();
    }
}
