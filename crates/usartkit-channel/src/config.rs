use std::path::Path;

use serde::{Deserialize, Serialize};
use usartkit_buffer::DEFAULT_TERMINATOR;
use usartkit_line::LineConfig;

use crate::error::{ChannelError, Result};

/// Default receive buffer size in bytes.
pub const DEFAULT_CAPACITY: usize = 64;

/// Channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Receive buffer size in bytes. Fixed for the life of the channel.
    pub capacity: usize,
    /// Byte that ends a message.
    pub terminator: u8,
    /// Count complete messages as they arrive.
    pub framing: bool,
    /// Largest message [`Channel::next_message`](crate::Channel::next_message)
    /// will return, terminator included.
    pub max_message_size: usize,
    /// Speed and frame format programmed on resume.
    pub line: LineConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            terminator: DEFAULT_TERMINATOR,
            framing: true,
            max_message_size: DEFAULT_CAPACITY,
            line: LineConfig::default(),
        }
    }
}

impl ChannelConfig {
    /// Load a configuration from a JSON file. Missing fields take their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration without touching any hardware.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(usartkit_buffer::BufferError::ZeroCapacity.into());
        }
        if self.max_message_size == 0 {
            return Err(ChannelError::Config(
                "max_message_size must be at least 1".into(),
            ));
        }
        self.line.validate()?;
        Ok(())
    }
}
