/// Byte that ends a message unless configured otherwise.
pub const DEFAULT_TERMINATOR: u8 = b'\n';

/// Counts complete messages resident in a receive buffer.
///
/// The producer calls [`note_byte`](Self::note_byte) for every byte it
/// stores; the consumer calls [`consume_one_message`](Self::consume_one_message)
/// for every terminated message it removes. Changing the terminator or the
/// enable flag resets the count, so it never exceeds the number of resident
/// terminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramingState {
    terminator: u8,
    enabled: bool,
    pending: usize,
}

impl Default for FramingState {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINATOR, true)
    }
}

impl FramingState {
    pub fn new(terminator: u8, enabled: bool) -> Self {
        Self {
            terminator,
            enabled,
            pending: 0,
        }
    }

    /// Record a byte that was stored in the buffer. Returns `true` when it
    /// completed a message.
    pub fn note_byte(&mut self, byte: u8) -> bool {
        if self.enabled && byte == self.terminator {
            self.pending += 1;
            true
        } else {
            false
        }
    }

    /// Record that one terminated message left the buffer.
    pub fn consume_one_message(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    pub fn reset(&mut self) {
        self.pending = 0;
    }

    /// Complete messages currently buffered.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn terminator(&self) -> u8 {
        self.terminator
    }

    pub fn set_terminator(&mut self, terminator: u8) {
        self.terminator = terminator;
        self.pending = 0;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.pending = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_terminators() {
        let mut framing = FramingState::default();
        let completed: Vec<bool> = b"ab\nc\n".iter().map(|&b| framing.note_byte(b)).collect();
        assert_eq!(completed, [false, false, true, false, true]);
        assert_eq!(framing.pending(), 2);

        framing.consume_one_message();
        assert_eq!(framing.pending(), 1);
    }

    #[test]
    fn consume_never_underflows() {
        let mut framing = FramingState::default();
        framing.consume_one_message();
        assert_eq!(framing.pending(), 0);
    }

    #[test]
    fn disabled_framing_counts_nothing() {
        let mut framing = FramingState::new(b';', false);
        assert!(!framing.note_byte(b';'));
        assert_eq!(framing.pending(), 0);

        framing.set_enabled(true);
        assert!(framing.note_byte(b';'));
        assert!(!framing.note_byte(b'\n'));
        assert_eq!(framing.pending(), 1);
    }

    #[test]
    fn reconfiguring_resets_count() {
        let mut framing = FramingState::default();
        framing.note_byte(b'\n');
        framing.set_terminator(b'\r');
        assert_eq!(framing.pending(), 0);
        assert_eq!(framing.terminator(), b'\r');

        framing.note_byte(b'\r');
        framing.reset();
        assert_eq!(framing.pending(), 0);
        assert!(framing.is_enabled());
    }
}
