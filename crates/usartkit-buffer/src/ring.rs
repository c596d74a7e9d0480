use std::fmt;

use tracing::debug;

use crate::error::{BufferError, Result};

/// Outcome of [`RingBuffer::pop_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A complete message of this many bytes (terminator included) was
    /// removed and copied out.
    Message(usize),
    /// No terminator within the window; nothing was removed.
    Incomplete,
    /// The buffer was full and its oldest message was longer than the
    /// window. That many bytes (through its terminator) were dropped and
    /// nothing was copied out.
    Discarded(usize),
}

impl Scan {
    /// Whether a message was delivered.
    pub fn found(&self) -> bool {
        matches!(self, Scan::Message(_))
    }

    /// Number of bytes copied to the caller.
    pub fn delivered(&self) -> usize {
        match self {
            Scan::Message(n) => *n,
            Scan::Incomplete | Scan::Discarded(_) => 0,
        }
    }
}

/// Fixed-capacity circular byte FIFO.
///
/// A full buffer rejects pushes and keeps its oldest bytes, so unread
/// terminators are never overwritten. The buffer itself is not synchronized;
/// the owner serializes the producer against the consumer.
pub struct RingBuffer {
    storage: Box<[u8]>,
    /// Index of the oldest byte.
    head: usize,
    /// Index the next push writes to.
    tail: usize,
    len: usize,
}

impl RingBuffer {
    /// Create an empty buffer holding up to `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        Ok(Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append one byte. Returns `false`, leaving the buffer untouched, when
    /// it is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.storage[self.tail] = byte;
        self.tail = self.wrap(self.tail + 1);
        self.len += 1;
        true
    }

    /// Remove the oldest byte.
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.storage[self.head];
        self.advance(1);
        Some(byte)
    }

    /// Remove up to `out.len()` of the oldest bytes into `out`, in order.
    /// Returns how many were moved.
    pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len);
        let first = n.min(self.capacity() - self.head);
        out[..first].copy_from_slice(&self.storage[self.head..self.head + first]);
        out[first..n].copy_from_slice(&self.storage[..n - first]);
        self.advance(n);
        n
    }

    /// Remove one complete message ending in `terminator`, if the oldest one
    /// fits in `out`.
    ///
    /// Bytes of a message that is still arriving stay buffered. The one
    /// exception is a full buffer whose oldest message is longer than `out`:
    /// that message can never be delivered through this window and would
    /// block the buffer forever, so it is dropped through its terminator
    /// ([`Scan::Discarded`]). A full buffer without any terminator is left
    /// alone.
    pub fn pop_until(&mut self, terminator: u8, out: &mut [u8]) -> Scan {
        if out.is_empty() {
            return Scan::Incomplete;
        }

        let window = out.len().min(self.len);
        let found = self.iter().take(window).position(|b| b == terminator);
        if let Some(pos) = found {
            let n = self.pop_into(&mut out[..pos + 1]);
            return Scan::Message(n);
        }

        if self.is_full() {
            if let Some(pos) = self.position(terminator) {
                let dropped = pos + 1;
                self.advance(dropped);
                debug!(
                    dropped,
                    window = out.len(),
                    "discarded message longer than the read window"
                );
                return Scan::Discarded(dropped);
            }
        }

        Scan::Incomplete
    }

    /// Offset (from the oldest byte) of the first occurrence of `byte`.
    pub fn position(&self, byte: u8) -> Option<usize> {
        self.iter().position(|b| b == byte)
    }

    /// How many resident bytes equal `byte`.
    pub fn count(&self, byte: u8) -> usize {
        self.iter().filter(|&b| b == byte).count()
    }

    /// Resident bytes, oldest first, without removing them.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len).map(move |i| self.storage[self.wrap(self.head + i)])
    }

    /// Drop every resident byte.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }

    fn advance(&mut self, n: usize) {
        self.head = self.wrap(self.head + n);
        self.len -= n;
    }

    fn wrap(&self, index: usize) -> usize {
        index % self.capacity()
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use proptest::prelude::*;

    use super::*;

    fn filled(capacity: usize, bytes: &[u8]) -> RingBuffer {
        let mut ring = RingBuffer::new(capacity).unwrap();
        for &b in bytes {
            assert!(ring.push(b));
        }
        ring
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(RingBuffer::new(0).unwrap_err(), BufferError::ZeroCapacity);
    }

    #[test]
    fn push_on_full_fails_and_keeps_contents() {
        let mut ring = filled(4, b"abcd");
        assert!(ring.is_full());
        assert!(!ring.push(b'e'));

        let mut out = [0u8; 4];
        assert_eq!(ring.pop_into(&mut out), 4);
        assert_eq!(&out, b"abcd");
        assert!(ring.is_empty());
    }

    #[test]
    fn pop_reports_empty() {
        let mut ring = filled(2, b"z");
        assert_eq!(ring.pop(), Some(b'z'));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn pop_into_wraps_around_the_end() {
        let mut ring = filled(5, b"abcd");
        let mut out = [0u8; 3];
        assert_eq!(ring.pop_into(&mut out), 3);
        assert_eq!(&out, b"abc");

        for &b in b"efgh" {
            assert!(ring.push(b));
        }
        assert!(ring.is_full());

        let mut out = [0u8; 8];
        assert_eq!(ring.pop_into(&mut out), 5);
        assert_eq!(&out[..5], b"defgh");
    }

    #[test]
    fn pop_into_zero_length() {
        let mut ring = filled(3, b"ab");
        assert_eq!(ring.pop_into(&mut []), 0);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn pop_until_returns_one_message() {
        let mut ring = filled(8, b"hello\n");
        let mut out = [0u8; 16];
        assert_eq!(ring.pop_until(b'\n', &mut out), Scan::Message(6));
        assert_eq!(&out[..6], b"hello\n");
        assert!(ring.is_empty());
    }

    #[test]
    fn pop_until_never_joins_two_messages() {
        let mut ring = filled(16, b"one\ntwo\nth");
        let mut out = [0u8; 16];

        assert_eq!(ring.pop_until(b'\n', &mut out), Scan::Message(4));
        assert_eq!(&out[..4], b"one\n");
        assert_eq!(ring.pop_until(b'\n', &mut out), Scan::Message(4));
        assert_eq!(&out[..4], b"two\n");
        assert_eq!(ring.pop_until(b'\n', &mut out), Scan::Incomplete);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn pop_until_without_terminator_removes_nothing() {
        let mut ring = filled(8, b"xy");
        let mut out = [0u8; 10];
        assert_eq!(ring.pop_until(b'\n', &mut out), Scan::Incomplete);

        let mut out = [0u8; 2];
        assert_eq!(ring.pop_into(&mut out), 2);
        assert_eq!(&out, b"xy");
    }

    #[test]
    fn pop_until_terminator_beyond_window_removes_nothing() {
        let mut ring = filled(16, b"abcdef\n");
        let mut out = [0u8; 4];
        assert_eq!(ring.pop_until(b'\n', &mut out), Scan::Incomplete);
        assert_eq!(ring.len(), 7);
    }

    #[test]
    fn full_buffer_discards_oversized_message() {
        let mut ring = filled(8, b"abcdef\nx");
        assert!(ring.is_full());

        let mut out = [0u8; 4];
        assert_eq!(ring.pop_until(b'\n', &mut out), Scan::Discarded(7));
        assert_eq!(ring.iter().collect::<Vec<_>>(), b"x");
        assert!(!Scan::Discarded(7).found());
        assert_eq!(Scan::Discarded(7).delivered(), 0);
    }

    #[test]
    fn full_buffer_without_terminator_is_left_alone() {
        let mut ring = filled(4, b"abcd");
        let mut out = [0u8; 2];
        assert_eq!(ring.pop_until(b'\n', &mut out), Scan::Incomplete);
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn empty_window_never_discards() {
        let mut ring = filled(3, b"a\nb");
        assert_eq!(ring.pop_until(b'\n', &mut []), Scan::Incomplete);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn message_exactly_fills_window() {
        let mut ring = filled(4, b"abc\n");
        let mut out = [0u8; 4];
        assert_eq!(ring.pop_until(b'\n', &mut out), Scan::Message(4));
        assert_eq!(&out, b"abc\n");
    }

    #[test]
    fn clear_empties_buffer() {
        let mut ring = filled(4, b"ab\n");
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.pop(), None);
        assert_eq!(ring.pop_into(&mut [0u8; 4]), 0);
        assert_eq!(ring.count(b'\n'), 0);
        assert!(ring.push(b'q'));
        assert_eq!(ring.pop(), Some(b'q'));
    }

    #[test]
    fn inspection_helpers() {
        let mut ring = filled(4, b"xx\n");
        ring.pop();
        ring.push(b'\n');
        ring.push(b'y');
        assert_eq!(ring.iter().collect::<Vec<_>>(), b"x\n\ny");
        assert_eq!(ring.position(b'\n'), Some(1));
        assert_eq!(ring.count(b'\n'), 2);
        assert_eq!(ring.position(b'q'), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(u8),
        Pop,
        PopInto(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Push),
            Just(Op::Pop),
            (0usize..12).prop_map(Op::PopInto),
        ]
    }

    proptest! {
        #[test]
        fn behaves_like_a_bounded_fifo(capacity in 1usize..16, ops in prop::collection::vec(op(), 0..200)) {
            let mut ring = RingBuffer::new(capacity).unwrap();
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    Op::Push(b) => {
                        let accepted = model.len() < capacity;
                        prop_assert_eq!(ring.push(b), accepted);
                        if accepted {
                            model.push_back(b);
                        }
                    }
                    Op::Pop => prop_assert_eq!(ring.pop(), model.pop_front()),
                    Op::PopInto(n) => {
                        let mut out = vec![0u8; n];
                        let got = ring.pop_into(&mut out);
                        let expected: Vec<u8> = model.drain(..n.min(model.len())).collect();
                        prop_assert_eq!(&out[..got], expected.as_slice());
                    }
                }
                prop_assert_eq!(ring.len(), model.len());
                prop_assert!(ring.iter().eq(model.iter().copied()));
            }
        }

        #[test]
        fn pop_until_delivers_whole_messages_only(
            data in prop::collection::vec(prop_oneof![Just(b'\n'), b'a'..=b'e'], 0..64),
            window in 1usize..12,
        ) {
            let mut ring = RingBuffer::new(64).unwrap();
            for &b in &data {
                prop_assert!(ring.push(b));
            }

            let mut out = vec![0u8; window];
            let before: Vec<u8> = ring.iter().collect();
            match ring.pop_until(b'\n', &mut out) {
                Scan::Message(n) => {
                    prop_assert_eq!(out[n - 1], b'\n');
                    prop_assert!(!out[..n - 1].contains(&b'\n'));
                    prop_assert_eq!(&out[..n], &before[..n]);
                }
                Scan::Incomplete => prop_assert_eq!(ring.len(), before.len()),
                Scan::Discarded(_) => prop_assert!(before.len() == 64),
            }
        }
    }
}
