use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::baud::{DataBits, LineConfig, Parity, StopBits};
use crate::error::{LineError, Result};
use crate::stream::{LineStream, StreamLine};
use crate::traits::PortId;

/// A POSIX serial device (`/dev/ttyUSB0`, a pty, ...) in raw mode.
#[derive(Debug)]
pub struct TtyPort {
    file: File,
    path: PathBuf,
}

impl TtyPort {
    /// Open a serial device for reading and writing without making it the
    /// controlling terminal.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&path)
            .map_err(|source| LineError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self { file, path })
    }

    /// Device path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn speed_constant(baud: u32) -> Option<libc::speed_t> {
    match baud {
        9600 => Some(libc::B9600),
        19_200 => Some(libc::B19200),
        38_400 => Some(libc::B38400),
        57_600 => Some(libc::B57600),
        115_200 => Some(libc::B115200),
        _ => None,
    }
}

impl Read for TtyPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for TtyPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl LineStream for TtyPort {
    fn try_clone(&self) -> std::io::Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
            path: self.path.clone(),
        })
    }

    fn apply_config(&mut self, config: &LineConfig) -> Result<()> {
        let speed = speed_constant(config.baud).ok_or(LineError::UnsupportedBaud {
            clock_hz: config.clock_hz,
            baud: config.baud,
            double_speed: config.double_speed,
        })?;
        let fd = self.file.as_raw_fd();

        // SAFETY: `termios` is a plain C struct; all-zero is a valid value
        // that `tcgetattr` overwrites before use.
        let mut tio: libc::termios = unsafe { std::mem::zeroed() };
        // SAFETY: `fd` is an open descriptor owned by `self.file` and `tio`
        // is a valid writable termios.
        if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        // SAFETY: `tio` is a valid termios obtained from `tcgetattr`.
        unsafe {
            libc::cfmakeraw(&mut tio);
            libc::cfsetispeed(&mut tio, speed);
            libc::cfsetospeed(&mut tio, speed);
        }

        tio.c_cflag &= !(libc::CSIZE | libc::PARENB | libc::PARODD | libc::CSTOPB);
        tio.c_cflag |= libc::CREAD | libc::CLOCAL;
        tio.c_cflag |= match config.format.data_bits {
            DataBits::Five => libc::CS5,
            DataBits::Six => libc::CS6,
            DataBits::Seven => libc::CS7,
            DataBits::Eight => libc::CS8,
        };
        tio.c_cflag |= match config.format.parity {
            Parity::None => 0,
            Parity::Even => libc::PARENB,
            Parity::Odd => libc::PARENB | libc::PARODD,
        };
        if config.format.stop_bits == StopBits::Two {
            tio.c_cflag |= libc::CSTOPB;
        }

        // Reads return after at most 100 ms so the receiver thread can poll
        // for shutdown.
        tio.c_cc[libc::VMIN] = 0;
        tio.c_cc[libc::VTIME] = 1;

        // SAFETY: same descriptor and termios as above.
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        debug!(path = ?self.path, baud = config.baud, format = %config.format, "applied termios");
        Ok(())
    }

    fn set_poll_interval(&mut self, _interval: Duration) -> std::io::Result<()> {
        // Bounded by VTIME, set in `apply_config`.
        Ok(())
    }

    fn zero_read_is_eof(&self) -> bool {
        false
    }

    fn kind(&self) -> &'static str {
        "tty"
    }
}

impl StreamLine<TtyPort> {
    /// Open a serial device as the line for `port`.
    pub fn open_tty(port: PortId, path: impl AsRef<Path>) -> Result<Self> {
        let tty = TtyPort::open(path)?;
        debug!(%port, path = ?tty.path(), "opened serial device");
        Ok(Self::new(port, tty))
    }
}
