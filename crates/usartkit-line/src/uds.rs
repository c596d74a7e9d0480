use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::baud::LineConfig;
use crate::error::{LineError, Result};
use crate::stream::{LineStream, StreamLine};
use crate::traits::PortId;

/// A line whose far end is a Unix domain socket peer.
///
/// Useful against `socat`-style pty bridges and in tests. Speed and frame
/// format are validated and recorded but have no effect on the socket.
pub type UdsLine = StreamLine<UnixStream>;

impl LineStream for UnixStream {
    fn try_clone(&self) -> std::io::Result<Self> {
        UnixStream::try_clone(self)
    }

    fn apply_config(&mut self, _config: &LineConfig) -> Result<()> {
        Ok(())
    }

    fn set_poll_interval(&mut self, interval: Duration) -> std::io::Result<()> {
        self.set_read_timeout(Some(interval))
    }

    fn kind(&self) -> &'static str {
        "unix-domain-socket"
    }
}

impl StreamLine<UnixStream> {
    /// Connect to a listening Unix domain socket.
    pub fn connect_uds(port: PortId, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| LineError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(%port, ?path, "connected to unix domain socket");
        Ok(Self::new(port, stream))
    }
}
