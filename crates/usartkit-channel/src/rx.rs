//! Receive source: the per-byte interrupt handler feeding a channel's buffer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use usartkit_buffer::{FramingState, RingBuffer};
use usartkit_line::RxHandler;

/// Receive counters for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RxStats {
    /// Bytes delivered by the line.
    pub received: u64,
    /// Bytes lost because the buffer was full.
    pub dropped: u64,
}

pub(crate) struct RxState {
    pub(crate) ring: RingBuffer,
    pub(crate) framing: FramingState,
    pub(crate) stats: RxStats,
    /// `stats.dropped` as of the last overflow warning.
    pub(crate) reported_dropped: u64,
}

impl RxState {
    pub(crate) fn clear(&mut self) {
        self.ring.clear();
        self.framing.reset();
    }

    /// Bytes dropped since the last call, if any.
    pub(crate) fn take_new_drops(&mut self) -> Option<u64> {
        let new = self.stats.dropped - self.reported_dropped;
        self.reported_dropped = self.stats.dropped;
        (new > 0).then_some(new)
    }
}

/// State shared between a channel and its receive source.
pub(crate) struct RxShared {
    state: Mutex<RxState>,
    #[cfg(feature = "async")]
    pub(crate) notify: tokio::sync::Notify,
}

impl RxShared {
    pub(crate) fn new(ring: RingBuffer, framing: FramingState) -> Self {
        Self {
            state: Mutex::new(RxState {
                ring,
                framing,
                stats: RxStats::default(),
                reported_dropped: 0,
            }),
            #[cfg(feature = "async")]
            notify: tokio::sync::Notify::new(),
        }
    }

    /// The critical section shared by the receive source and the consumer.
    pub(crate) fn lock(&self) -> MutexGuard<'_, RxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Installed as the line's receive handler. Holds only a weak reference, so
/// a byte arriving after the channel is gone is discarded.
pub(crate) struct RxSource {
    shared: Weak<RxShared>,
}

impl RxSource {
    pub(crate) fn new(shared: &Arc<RxShared>) -> Self {
        Self {
            shared: Arc::downgrade(shared),
        }
    }
}

impl RxHandler for RxSource {
    fn on_receive(&self, byte: u8) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        #[cfg_attr(not(feature = "async"), allow(unused_variables))]
        let wake = {
            let mut state = shared.lock();
            state.stats.received += 1;
            if state.ring.push(byte) {
                // Unframed channels still deliver terminator-delimited messages.
                state.framing.note_byte(byte);
                byte == state.framing.terminator() || state.ring.is_full()
            } else {
                state.stats.dropped += 1;
                true
            }
        };

        #[cfg(feature = "async")]
        if wake {
            shared.notify.notify_one();
        }
    }
}
