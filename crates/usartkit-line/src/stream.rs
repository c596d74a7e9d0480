//! Hosted USART line over a byte stream.
//!
//! A driver-owned receiver thread stands in for the receive shift register:
//! it reads the stream and delivers each byte to the receive register or,
//! when the receive interrupt is enabled, to the installed handler.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use crate::baud::LineConfig;
use crate::error::{LineError, Result};
use crate::receiver::Receiver;
use crate::regs::{ucsra, Enable, Registers};
use crate::traits::{LineDriver, PortId, RxHandler};

/// How long the receiver thread blocks in a read before re-checking for
/// shutdown.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

const READ_CHUNK_SIZE: usize = 64;

/// A byte stream that can back a [`StreamLine`].
pub trait LineStream: Read + Write + Send + Sized + 'static {
    /// A second handle on the same stream, used by the receiver thread.
    fn try_clone(&self) -> std::io::Result<Self>;

    /// Apply speed and frame format where the medium has such a notion.
    fn apply_config(&mut self, config: &LineConfig) -> Result<()>;

    /// Bound how long a read may block.
    fn set_poll_interval(&mut self, interval: Duration) -> std::io::Result<()>;

    /// Whether a zero-length read means the far end closed.
    fn zero_read_is_eof(&self) -> bool {
        true
    }

    /// Stream kind for diagnostics.
    fn kind(&self) -> &'static str;
}

struct ReaderThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// USART line backed by a [`LineStream`].
pub struct StreamLine<S: LineStream> {
    port: PortId,
    stream: S,
    receiver: Arc<Receiver>,
    reader: Option<ReaderThread>,
    enable: Enable,
    programmed: Option<(LineConfig, u16)>,
    poll_interval: Duration,
}

impl<S: LineStream> StreamLine<S> {
    /// Wrap a stream as the line for `port`.
    pub fn new(port: PortId, stream: S) -> Self {
        Self {
            port,
            stream,
            receiver: Arc::new(Receiver::new()),
            reader: None,
            enable: Enable::NONE,
            programmed: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the receiver thread's poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Current register image.
    pub fn registers(&self) -> Registers {
        let mut status = self.receiver.status_bits() | ucsra::UDRE;
        let (ucsrc, ubrr) = match &self.programmed {
            Some((config, ubrr)) => {
                if config.double_speed {
                    status |= ucsra::U2X;
                }
                (config.format.ucsrc(), *ubrr)
            }
            None => (0, 0),
        };
        Registers {
            ucsra: status,
            ucsrb: self.enable.ucsrb(),
            ucsrc,
            ubrr,
        }
    }

    fn start_reader(&mut self) -> Result<()> {
        if self.reader.is_some() {
            return Ok(());
        }

        let mut stream = self.stream.try_clone()?;
        stream.set_poll_interval(self.poll_interval)?;

        let stop = Arc::new(AtomicBool::new(false));
        let receiver = Arc::clone(&self.receiver);
        let port = self.port;
        let handle = std::thread::Builder::new()
            .name(format!("{port}-rx"))
            .spawn({
                let stop = Arc::clone(&stop);
                move || receive_loop(port, stream, &receiver, &stop)
            })?;

        debug!(port = %self.port, kind = self.stream.kind(), "receiver thread started");
        self.reader = Some(ReaderThread { stop, handle });
        Ok(())
    }

    fn stop_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.stop.store(true, Ordering::SeqCst);
            if reader.handle.join().is_err() {
                warn!(port = %self.port, "receiver thread panicked");
            } else {
                debug!(port = %self.port, "receiver thread stopped");
            }
        }
    }
}

fn receive_loop<S: LineStream>(port: PortId, mut stream: S, receiver: &Receiver, stop: &AtomicBool) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    while !stop.load(Ordering::SeqCst) {
        match stream.read(&mut chunk) {
            Ok(0) if stream.zero_read_is_eof() => {
                debug!(%port, "line closed by peer");
                receiver.close();
                return;
            }
            Ok(0) => continue,
            Ok(n) => {
                for &byte in &chunk[..n] {
                    receiver.deliver(byte);
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(err) => {
                warn!(%port, error = %err, "receiver stopped on read error");
                receiver.close();
                return;
            }
        }
    }
}

impl<S: LineStream> LineDriver for StreamLine<S> {
    fn port(&self) -> PortId {
        self.port
    }

    fn configure(&mut self, config: &LineConfig) -> Result<()> {
        let ubrr = config.divisor()?;
        self.stream.apply_config(config)?;
        debug!(
            port = %self.port,
            kind = self.stream.kind(),
            baud = config.baud,
            ubrr,
            format = %config.format,
            "configured stream line"
        );
        self.programmed = Some((config.clone(), ubrr));
        Ok(())
    }

    fn enable(&mut self, enable: Enable) -> Result<()> {
        self.receiver.set_enable(enable);
        self.enable = enable;
        if enable.rx {
            self.start_reader()?;
        }
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.receiver.set_enable(Enable::NONE);
        self.enable = Enable::NONE;
        self.stop_reader();
        Ok(())
    }

    fn set_rx_handler(&mut self, handler: Option<Arc<dyn RxHandler>>) {
        self.receiver.set_handler(handler);
    }

    fn blocking_send(&mut self, byte: u8) -> Result<()> {
        if !self.enable.tx {
            return Err(LineError::TxDisabled);
        }

        loop {
            match self.stream.write(&[byte]) {
                Ok(0) => return Err(LineError::Closed),
                Ok(_) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(LineError::Io(err)),
            }
        }

        loop {
            match self.stream.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(LineError::Io(err)),
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<u8>> {
        Ok(self.receiver.try_take())
    }

    fn blocking_receive(&mut self) -> Result<u8> {
        self.receiver.take_blocking()
    }

    fn is_open(&self) -> bool {
        !self.receiver.is_closed()
    }
}

impl<S: LineStream> Drop for StreamLine<S> {
    fn drop(&mut self) {
        self.receiver.set_enable(Enable::NONE);
        self.stop_reader();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;
    use crate::receiver::lock;

    fn pair() -> (StreamLine<UnixStream>, UnixStream) {
        let (left, right) = UnixStream::pair().unwrap();
        let line = StreamLine::new(PortId(0), left).with_poll_interval(Duration::from_millis(5));
        (line, right)
    }

    struct Collect(Mutex<Vec<u8>>);

    impl RxHandler for Collect {
        fn on_receive(&self, byte: u8) {
            lock(&self.0).push(byte);
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn send_writes_to_peer() {
        let (mut line, mut peer) = pair();
        line.configure(&LineConfig::default()).unwrap();
        line.enable(Enable::POLLED).unwrap();

        for &byte in b"ping" {
            line.blocking_send(byte).unwrap();
        }

        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        assert_eq!(line.registers().ubrr, 207);
    }

    #[test]
    fn send_requires_transmitter() {
        let (mut line, _peer) = pair();
        assert!(matches!(line.blocking_send(b'a'), Err(LineError::TxDisabled)));
    }

    #[test]
    fn polled_receive_from_peer() {
        let (mut line, mut peer) = pair();
        line.enable(Enable::POLLED).unwrap();

        peer.write_all(b"r").unwrap();
        assert_eq!(line.blocking_receive().unwrap(), b'r');
        assert_eq!(line.try_receive().unwrap(), None);
    }

    #[test]
    fn interrupt_receive_feeds_handler() {
        let (mut line, mut peer) = pair();
        let collect = Arc::new(Collect(Mutex::new(Vec::new())));
        let handler: Arc<dyn RxHandler> = collect.clone();
        line.set_rx_handler(Some(handler));
        line.enable(Enable::BUFFERED).unwrap();

        peer.write_all(b"hello\n").unwrap();
        assert!(wait_until(|| lock(&collect.0).len() == 6));
        assert_eq!(lock(&collect.0).as_slice(), b"hello\n");

        line.disable().unwrap();
        assert_eq!(line.registers().ucsrb, 0);
    }

    #[test]
    fn peer_close_fails_blocking_receive() {
        let (mut line, peer) = pair();
        line.enable(Enable::POLLED).unwrap();
        drop(peer);

        assert!(matches!(line.blocking_receive(), Err(LineError::Closed)));
        assert!(!line.is_open());
    }

    #[test]
    fn unsupported_baud_leaves_line_unprogrammed() {
        let (mut line, _peer) = pair();
        let config = LineConfig {
            baud: 57_600,
            ..LineConfig::default()
        };
        assert!(matches!(
            line.configure(&config),
            Err(LineError::UnsupportedBaud { baud: 57_600, .. })
        ));
        assert_eq!(line.registers().ubrr, 0);
    }
}
