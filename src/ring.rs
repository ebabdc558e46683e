//! The byte-oriented SPSC ring queue core.
//!
//! All correctness lives here: two monotonically increasing counters, one
//! borrowed buffer, and the acquire/release pairing between them. Everything
//! else in the crate (safe handles, typed wrapper) is a thin layer that
//! forwards to this module.
//!
//! # Protocol
//!
//! `head` counts elements ever enqueued and is written only by the producer;
//! `tail` counts elements ever dequeued and is written only by the consumer.
//! The counters never reset, so `head - tail` (wrapping) is always the exact
//! occupancy and "empty" (`head == tail`) never collides with "full"
//! (`head - tail == capacity`). Capacity is a power of two, so the physical
//! slot for logical index `i` is derived with a mask instead of a division.
//!
//! Each side reads its own counter relaxed (nobody else writes it) and the
//! other side's counter with `Acquire`. A successful operation copies the
//! payload first and then publishes the advanced counter with `Release`, so
//! an observer that sees the new counter value also sees the completed copy.
//! A stale read of the opposite counter can only make the queue look more
//! occupied (producer side) or more empty (consumer side) than it really is,
//! which yields a spurious `false` and never a corrupted slot.
//!
//! # Safety
//!
//! `push` and `pop` are unsafe because the type system cannot see which
//! thread calls them: the caller must guarantee a single producer and a
//! single consumer. [`RawQueue::split`] wraps that contract in safe handles.

use std::marker::PhantomData;
use std::ptr;

use crossbeam_utils::CachePadded;

#[cfg(loom)]
use loom::sync::atomic::{AtomicUsize, Ordering};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{Consumer, Producer};

/// A bounded SPSC queue of fixed-size byte elements over borrowed storage.
///
/// The queue borrows a caller-owned buffer for its whole lifetime and never
/// allocates, locks, or frees anything itself. Construction validates the
/// element size, the power-of-two capacity, and the buffer length; after
/// that, [`push`](Self::push) and [`pop`](Self::pop) are wait-free: a
/// bounded amount of work with no retry loop inside, reporting transient
/// full/empty conditions through their return value.
///
/// `capacity` is always a count of *elements*, not bytes; the buffer must
/// hold at least `capacity * elem_size` bytes and any excess is ignored.
///
/// # Example
///
/// ```
/// use bytering::RawQueue;
///
/// let mut storage = vec![0u8; 8 * 4];
/// let queue = RawQueue::new(4, 8, &mut storage);
///
/// // Safety: this thread is both the only producer and the only consumer.
/// unsafe {
///     assert!(queue.push(&7u32.to_ne_bytes()));
///     let mut out = [0u8; 4];
///     assert!(queue.pop(&mut out));
///     assert_eq!(u32::from_ne_bytes(out), 7);
/// }
/// ```
pub struct RawQueue<'buf> {
    /// Total elements ever enqueued. Written only by the producer.
    head: CachePadded<AtomicUsize>,

    /// Total elements ever dequeued. Written only by the consumer.
    tail: CachePadded<AtomicUsize>,

    buffer: *mut u8,
    elem_size: usize,
    mask: usize,

    _buffer: PhantomData<&'buf mut [u8]>,
}

// Safety: the buffer holds plain bytes and all concurrent access goes through
// the head/tail protocol above. The raw pointer is the only reason these
// impls aren't automatic.
unsafe impl Send for RawQueue<'_> {}
unsafe impl Sync for RawQueue<'_> {}

impl<'buf> RawQueue<'buf> {
    /// Creates a queue of `capacity` elements of `elem_size` bytes each,
    /// backed by `buffer`.
    ///
    /// Both counters start at zero, so a fresh queue is empty.
    ///
    /// # Panics
    ///
    /// Panics if `elem_size` is zero, if `capacity` is zero or not a power
    /// of two, or if `buffer` is shorter than `capacity * elem_size` bytes.
    /// These are construction contract violations, not runtime conditions.
    #[must_use]
    pub fn new(elem_size: usize, capacity: usize, buffer: &'buf mut [u8]) -> Self {
        assert!(elem_size > 0, "element size must be non-zero");
        assert!(
            capacity.is_power_of_two(),
            "capacity must be a non-zero power of two"
        );
        let required = capacity
            .checked_mul(elem_size)
            .expect("capacity * elem_size overflows usize");
        assert!(
            buffer.len() >= required,
            "buffer holds {} bytes but {} elements of {} bytes need {}",
            buffer.len(),
            capacity,
            elem_size,
            required,
        );

        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            buffer: buffer.as_mut_ptr(),
            elem_size,
            mask: capacity - 1,
            _buffer: PhantomData,
        }
    }

    /// Attempts to enqueue one element, copying `elem_size` bytes from `src`.
    ///
    /// Returns `false` without touching the buffer or either counter if the
    /// queue is full.
    ///
    /// # Safety
    ///
    /// The caller must be the only thread pushing to this queue for the
    /// duration of the call, and `src` must be exactly `elem_size` bytes.
    #[inline]
    #[must_use = "a false return means the element was not enqueued"]
    pub unsafe fn push(&self, src: &[u8]) -> bool {
        debug_assert_eq!(src.len(), self.elem_size);

        // Our own counter: only we advance it, so a relaxed read is current.
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head.wrapping_sub(tail) == self.capacity() {
            return false;
        }

        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), self.slot_ptr(head), self.elem_size);
        }

        // Publish after the copy: the consumer's acquire load of head sees
        // the payload write.
        self.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Attempts to dequeue one element, copying `elem_size` bytes into `dst`.
    ///
    /// Returns `false` and leaves `dst` untouched if the queue is empty.
    ///
    /// # Safety
    ///
    /// The caller must be the only thread popping from this queue for the
    /// duration of the call, and `dst` must be exactly `elem_size` bytes.
    #[inline]
    #[must_use = "a false return means no element was dequeued"]
    pub unsafe fn pop(&self, dst: &mut [u8]) -> bool {
        debug_assert_eq!(dst.len(), self.elem_size);

        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        if tail == head {
            return false;
        }

        unsafe {
            ptr::copy_nonoverlapping(self.slot_ptr(tail), dst.as_mut_ptr(), self.elem_size);
        }

        // Release the slot for reuse only after the copy out is complete.
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Splits the queue into a producer and a consumer handle.
    ///
    /// The exclusive borrow guarantees at most one producer and one consumer
    /// exist at a time, which is what makes the handles' `push`/`pop` safe.
    /// Once both handles are dropped the queue can be split again.
    pub fn split(&mut self) -> (Producer<'_>, Consumer<'_>) {
        // Quiescent: &mut self means no handle is live, so relaxed is enough.
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let queue = &*self;

        (
            Producer {
                queue,
                local_head: head,
                cached_tail: tail,
            },
            Consumer {
                queue,
                local_tail: tail,
                cached_head: head,
            },
        )
    }

    /// Returns the number of element slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Returns the fixed per-element size in bytes.
    #[inline]
    #[must_use]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Returns the current number of queued elements.
    ///
    /// A snapshot; it may be stale as soon as it is returned when the other
    /// side is running.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail)
    }

    /// Returns `true` if no elements are queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if every slot is occupied.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Returns a pointer to the slot for logical index `index`.
    #[inline(always)]
    fn slot_ptr(&self, index: usize) -> *mut u8 {
        // In bounds: (index & mask) < capacity and the buffer holds at least
        // capacity * elem_size bytes, checked at construction.
        unsafe { self.buffer.add((index & self.mask) * self.elem_size) }
    }

    // Primitives for the handle layer, which keeps its own local/cached
    // counters and only falls back to the atomics when it has to.

    #[inline(always)]
    pub(crate) fn load_head(&self) -> usize {
        self.head.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub(crate) fn load_tail(&self) -> usize {
        self.tail.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub(crate) fn publish_head(&self, head: usize) {
        self.head.store(head, Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn publish_tail(&self, tail: usize) {
        self.tail.store(tail, Ordering::Release);
    }

    /// Copies `elem_size` bytes from `src` into the slot for `index`.
    ///
    /// # Safety
    ///
    /// `src` must be valid for `elem_size` bytes and the producer must own
    /// the slot (`index - tail < capacity`).
    #[inline(always)]
    pub(crate) unsafe fn write_slot(&self, index: usize, src: *const u8) {
        unsafe { ptr::copy_nonoverlapping(src, self.slot_ptr(index), self.elem_size) }
    }

    /// Copies `elem_size` bytes from the slot for `index` into `dst`.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for `elem_size` bytes and the consumer must own
    /// the slot (`index < head`).
    #[inline(always)]
    pub(crate) unsafe fn read_slot(&self, index: usize, dst: *mut u8) {
        unsafe { ptr::copy_nonoverlapping(self.slot_ptr(index), dst, self.elem_size) }
    }
}

impl std::fmt::Debug for RawQueue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawQueue")
            .field("capacity", &self.capacity())
            .field("elem_size", &self.elem_size)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn fresh_queue_is_empty() {
        let mut storage = vec![0u8; 8 * 8];
        let queue = RawQueue::new(8, 8, &mut storage);

        assert_eq!(queue.capacity(), 8);
        assert_eq!(queue.elem_size(), 8);
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
        assert!(!queue.is_full());

        let mut out = [0u8; 8];
        assert!(!unsafe { queue.pop(&mut out) });
    }

    #[test]
    fn fills_to_capacity_then_rejects() {
        let mut storage = vec![0u8; 4 * 4];
        let queue = RawQueue::new(4, 4, &mut storage);

        unsafe {
            for i in 0u32..4 {
                assert!(queue.push(&i.to_ne_bytes()));
            }
            assert!(queue.is_full());
            assert!(!queue.push(&99u32.to_ne_bytes()));
            assert_eq!(queue.len(), 4);

            // Everything queued before the failed push comes out intact.
            let mut out = [0u8; 4];
            for i in 0u32..4 {
                assert!(queue.pop(&mut out));
                assert_eq!(u32::from_ne_bytes(out), i);
            }
            assert!(!queue.pop(&mut out));
        }
    }

    #[test]
    fn failed_push_is_idempotent() {
        let mut storage = vec![0u8; 2 * 2];
        let queue = RawQueue::new(2, 2, &mut storage);

        unsafe {
            assert!(queue.push(&[1, 1]));
            assert!(queue.push(&[2, 2]));
            for _ in 0..10 {
                assert!(!queue.push(&[3, 3]));
                assert_eq!(queue.len(), 2);
            }
            let mut out = [0u8; 2];
            assert!(queue.pop(&mut out));
            assert_eq!(out, [1, 1]);
        }
    }

    #[test]
    fn failed_pop_leaves_out_buffer_untouched() {
        let mut storage = vec![0u8; 4 * 8];
        let queue = RawQueue::new(8, 4, &mut storage);

        let mut out = [0xAB; 8];
        for _ in 0..10 {
            assert!(!unsafe { queue.pop(&mut out) });
            assert_eq!(out, [0xAB; 8]);
        }
    }

    #[test]
    fn wraparound_keeps_slot_derivation_stable() {
        let mut storage = vec![0u8; 4 * 8];
        let queue = RawQueue::new(8, 4, &mut storage);

        // Thousands of full laps around a 4-slot ring.
        let mut out = [0u8; 8];
        unsafe {
            for i in 0u64..4_000 {
                assert!(queue.push(&i.to_ne_bytes()));
                assert!(queue.push(&(i + 1).to_ne_bytes()));
                assert!(queue.pop(&mut out));
                assert_eq!(u64::from_ne_bytes(out), i);
                assert!(queue.pop(&mut out));
                assert_eq!(u64::from_ne_bytes(out), i + 1);
                assert!(queue.len() <= queue.capacity());
            }
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn oversized_buffer_is_allowed() {
        let mut storage = vec![0u8; 1024];
        let queue = RawQueue::new(4, 8, &mut storage);
        assert_eq!(queue.capacity(), 8);
    }

    #[test]
    #[should_panic(expected = "element size must be non-zero")]
    fn zero_element_size_panics() {
        let mut storage = vec![0u8; 64];
        let _ = RawQueue::new(0, 8, &mut storage);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn non_power_of_two_capacity_panics() {
        let mut storage = vec![0u8; 64];
        let _ = RawQueue::new(4, 6, &mut storage);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn zero_capacity_panics() {
        let mut storage = vec![0u8; 64];
        let _ = RawQueue::new(4, 0, &mut storage);
    }

    #[test]
    #[should_panic(expected = "buffer holds")]
    fn undersized_buffer_panics() {
        let mut storage = vec![0u8; 31];
        let _ = RawQueue::new(4, 8, &mut storage);
    }
}
