use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-size single-producer/single-consumer byte queue.
///
/// The keyboard interrupt is the only producer and the `read` path the only
/// consumer. `head` is written by the producer alone and `tail` by the
/// consumer alone, so neither side needs a lock. One slot stays empty to
/// tell a full queue from an empty one; bytes that do not fit are dropped.
pub struct KeyBuffer<const N: usize> {
    slots: UnsafeCell<[u8; N]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: a slot is written only while the producer owns it (between the
// consumer's `tail` release and the producer's `head` release) and read only
// after that `head` release has been observed.
unsafe impl<const N: usize> Sync for KeyBuffer<N> {}

impl<const N: usize> Default for KeyBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> KeyBuffer<N> {
    const CAPACITY_OK: () = assert!(N >= 2, "KeyBuffer needs at least two slots");

    #[must_use]
    pub const fn new() -> Self {
        let () = Self::CAPACITY_OK;
        Self {
            slots: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Producer side. Returns `false` if the byte was dropped.
    pub fn push(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) % N;
        if next == self.tail.load(Ordering::Acquire) {
            return false;
        }
        // SAFETY: slot `head` is outside the consumer's readable window.
        unsafe { (*self.slots.get())[head] = byte };
        self.head.store(next, Ordering::Release);
        true
    }

    /// Consumer side.
    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: slot `tail` was published by the producer's release store.
        let byte = unsafe { (*self.slots.get())[tail] };
        self.tail.store((tail + 1) % N, Ordering::Release);
        Some(byte)
    }

    /// Spin until a byte is available.
    pub fn pop_blocking(&self) -> u8 {
        loop {
            if let Some(byte) = self.pop() {
                return byte;
            }
            core::hint::spin_loop();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head + N - tail) % N
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes the queue can hold at once.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fifo_order() {
        let buf = KeyBuffer::<8>::new();
        for b in b"abc" {
            assert!(buf.push(*b));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.pop(), Some(b'a'));
        assert_eq!(buf.pop(), Some(b'b'));
        assert_eq!(buf.pop(), Some(b'c'));
        assert_eq!(buf.pop(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_drops_newest() {
        let buf = KeyBuffer::<4>::new();
        assert_eq!(buf.capacity(), 3);
        assert!(buf.push(1));
        assert!(buf.push(2));
        assert!(buf.push(3));
        assert!(!buf.push(4));
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.pop(), Some(1));
        assert!(buf.push(5));
        assert_eq!([buf.pop(), buf.pop(), buf.pop()], [Some(2), Some(3), Some(5)]);
    }

    #[test]
    fn wraps_around_many_times() {
        let buf = KeyBuffer::<3>::new();
        for i in 0..=255u8 {
            assert!(buf.push(i));
            assert_eq!(buf.pop(), Some(i));
        }
    }

    #[test]
    fn producer_and_consumer_threads() {
        let buf = Arc::new(KeyBuffer::<16>::new());
        let producer = {
            let buf = Arc::clone(&buf);
            std::thread::spawn(move || {
                for i in 0..1000u32 {
                    #[allow(clippy::cast_possible_truncation)]
                    let byte = (i % 251) as u8;
                    while !buf.push(byte) {
                        std::thread::yield_now();
                    }
                }
            })
        };

        for i in 0..1000u32 {
            assert_eq!(u32::from(buf.pop_blocking()), i % 251);
        }
        producer.join().expect("producer");
    }
}
