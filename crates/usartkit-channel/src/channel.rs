use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};
use usartkit_buffer::{FramingState, RingBuffer, Scan};
use usartkit_line::{Enable, LineDriver, PortId, RxHandler};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::rx::{RxShared, RxSource, RxStats};

/// A USART port with an interrupt-fed receive buffer.
///
/// The channel owns its line exclusively. While active, every received byte
/// is pushed into a fixed-capacity ring buffer by the line's receive
/// handler, and the consumer drains it byte-wise ([`get`](Self::get)) or
/// message-wise ([`get_message`](Self::get_message)). Transmission is
/// synchronous.
///
/// A channel starts suspended; call [`resume`](Self::resume) before use.
pub struct Channel<L: LineDriver> {
    line: L,
    config: ChannelConfig,
    shared: Arc<RxShared>,
    active: bool,
}

impl<L: LineDriver> Channel<L> {
    /// Create a suspended channel over `line`.
    ///
    /// Fails when the configuration is invalid, including clock/baud
    /// combinations outside the divisor table.
    pub fn new(line: L, config: ChannelConfig) -> Result<Self> {
        config.validate()?;
        let ring = RingBuffer::new(config.capacity)?;
        let framing = FramingState::new(config.terminator, config.framing);

        Ok(Self {
            line,
            config,
            shared: Arc::new(RxShared::new(ring, framing)),
            active: false,
        })
    }

    /// Create a suspended channel with the default configuration.
    pub fn with_defaults(line: L) -> Result<Self> {
        Self::new(line, ChannelConfig::default())
    }

    /// Program the line and start receiving into an empty buffer.
    ///
    /// Does nothing if the channel is already active.
    pub fn resume(&mut self) -> Result<()> {
        if self.active {
            debug!(port = %self.port(), "channel already active");
            return Ok(());
        }

        // Mask the receive source while the buffer is reset.
        self.line.disable()?;
        self.shared.lock().clear();

        self.line.configure(&self.config.line)?;
        let handler: Arc<dyn RxHandler> = Arc::new(RxSource::new(&self.shared));
        self.line.set_rx_handler(Some(handler));
        self.line.enable(Enable::BUFFERED)?;
        self.active = true;

        info!(
            port = %self.port(),
            baud = self.config.line.baud,
            format = %self.config.line.format,
            capacity = self.config.capacity,
            "channel resumed"
        );
        Ok(())
    }

    /// Stop the line and discard everything buffered.
    ///
    /// Does nothing if the channel is already suspended.
    pub fn suspend(&mut self) -> Result<()> {
        if !self.active {
            debug!(port = %self.port(), "channel already suspended");
            return Ok(());
        }

        self.line.disable()?;
        self.line.set_rx_handler(None);
        self.active = false;

        let discarded = {
            let mut state = self.shared.lock();
            let discarded = state.ring.len();
            state.clear();
            discarded
        };

        info!(port = %self.port(), discarded, "channel suspended");
        Ok(())
    }

    /// Transmit one byte, waiting for the transmitter.
    pub fn put(&mut self, byte: u8) -> Result<()> {
        self.ensure_active()?;
        self.line.blocking_send(byte)?;
        Ok(())
    }

    /// Transmit every byte of `bytes` in order.
    pub fn put_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_active()?;
        for &byte in bytes {
            self.line.blocking_send(byte)?;
        }
        Ok(())
    }

    /// Read the line's receive register directly, bypassing the buffer.
    ///
    /// While the channel is active the receive handler consumes every byte,
    /// so the register only fills when the receive interrupt is masked (a
    /// suspended channel over a line enabled for polling). A blocking call
    /// on an active channel waits until the line fails or closes.
    pub fn get_one(&mut self, blocking: bool) -> Result<Option<u8>> {
        if blocking {
            Ok(Some(self.line.blocking_receive()?))
        } else {
            Ok(self.line.try_receive()?)
        }
    }

    /// Take the oldest buffered byte, if any.
    pub fn get_byte(&mut self) -> Result<Option<u8>> {
        self.ensure_active()?;

        let (byte, drops) = {
            let mut state = self.shared.lock();
            let byte = state.ring.pop();
            if byte == Some(state.framing.terminator()) && state.framing.is_enabled() {
                state.framing.consume_one_message();
            }
            (byte, state.take_new_drops())
        };

        self.report_drops(drops);
        Ok(byte)
    }

    /// Move up to `buf.len()` of the oldest buffered bytes into `buf`.
    ///
    /// Returns the number of bytes written, 0 when nothing is buffered.
    pub fn get(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_active()?;

        let (n, drops) = {
            let mut state = self.shared.lock();
            let n = state.ring.pop_into(buf);
            if state.framing.is_enabled() {
                let terminator = state.framing.terminator();
                for _ in buf[..n].iter().filter(|&&b| b == terminator) {
                    state.framing.consume_one_message();
                }
            }
            (n, state.take_new_drops())
        };

        self.report_drops(drops);
        Ok(n)
    }

    /// Move the oldest complete message, terminator included, into `buf`.
    ///
    /// Returns 0 when no complete message fits. If the buffer is full and its
    /// oldest message is longer than `buf`, that message is discarded so
    /// later ones can be delivered.
    pub fn get_message(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.take_message(buf).map(|scan| scan.delivered())
    }

    /// Like [`get_message`](Self::get_message), into a fresh buffer of
    /// `max_message_size` bytes.
    pub fn next_message(&mut self) -> Result<Option<Bytes>> {
        let mut buf = vec![0u8; self.config.max_message_size];
        let n = self.get_message(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        let mut state = self.shared.lock();
        let discarded = state.ring.len();
        state.clear();
        drop(state);
        debug!(port = %self.port(), discarded, "receive buffer cleared");
    }

    /// Complete messages waiting in the buffer.
    pub fn pending_messages(&self) -> usize {
        self.shared.lock().framing.pending()
    }

    /// Bytes waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.shared.lock().ring.len()
    }

    pub fn stats(&self) -> RxStats {
        self.shared.lock().stats
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn port(&self) -> PortId {
        self.line.port()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn line(&self) -> &L {
        &self.line
    }

    fn take_message(&mut self, buf: &mut [u8]) -> Result<Scan> {
        self.ensure_active()?;

        let (scan, drops) = {
            let mut state = self.shared.lock();
            let terminator = state.framing.terminator();
            let scan = state.ring.pop_until(terminator, buf);
            if !matches!(scan, Scan::Incomplete) {
                state.framing.consume_one_message();
            }
            (scan, state.take_new_drops())
        };

        self.report_drops(drops);
        if let Scan::Discarded(dropped) = scan {
            warn!(
                port = %self.port(),
                dropped,
                window = buf.len(),
                "discarded message longer than the read buffer"
            );
        }
        Ok(scan)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(ChannelError::NotActive(self.port()))
        }
    }

    fn report_drops(&self, drops: Option<u64>) {
        if let Some(dropped) = drops {
            warn!(
                port = %self.port(),
                dropped,
                capacity = self.config.capacity,
                "receive buffer overflowed, bytes lost"
            );
        }
    }
}

#[cfg(feature = "async")]
impl<L: LineDriver> Channel<L> {
    /// Wait until a complete message is available, then move it into `buf`.
    ///
    /// Resolves with the message length. Fails immediately if the channel is
    /// not active.
    pub async fn wait_message(&mut self, buf: &mut [u8]) -> Result<usize> {
        let shared = Arc::clone(&self.shared);
        loop {
            let notified = shared.notify.notified();
            match self.take_message(buf)? {
                Scan::Message(n) => return Ok(n),
                Scan::Discarded(_) => continue,
                Scan::Incomplete => notified.await,
            }
        }
    }
}

impl<L: LineDriver> Drop for Channel<L> {
    fn drop(&mut self) {
        if self.active {
            if let Err(err) = self.suspend() {
                warn!(port = %self.port(), error = %err, "failed to suspend channel on drop");
            }
        }
    }
}
