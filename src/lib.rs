//! # bytering
//!
//! A bounded, wait-free single-producer single-consumer queue for fixed-size
//! byte elements, designed for low-latency handoff between exactly two
//! threads.
//!
//! ## Design goals
//!
//! - No locks, syscalls, or allocation on the hot path
//! - Caller-owned storage: the queue borrows a buffer, it never allocates
//! - Values move by copy, never by handing out references into the ring
//! - Cache-line separated counters to avoid false sharing between cores
//! - Strict FIFO: the Nth successful pop returns the Nth successful push
//!
//! ## Layers
//!
//! - [`RawQueue`] is the core: byte-oriented, with `unsafe` push/pop whose
//!   contract is "one producer, one consumer".
//! - [`RawQueue::split`] turns that contract into types: one [`Producer`]
//!   and one [`Consumer`] borrow the queue exclusively, so the single-writer
//!   rule is enforced at compile time.
//! - [`typed::Queue`] binds an element type `T: Copy`, fixing the element
//!   size to `size_of::<T>()` and forwarding everything to the byte core.
//!
//! ## Example
//!
//! ```
//! use bytering::RawQueue;
//!
//! // 1024 slots of 8 bytes each; the storage outlives the queue.
//! let mut storage = vec![0u8; 1024 * 8];
//! let mut queue = RawQueue::new(8, 1024, &mut storage);
//! let (mut tx, mut rx) = queue.split();
//!
//! std::thread::scope(|s| {
//!     s.spawn(move || {
//!         for i in 0..10_000u64 {
//!             // Full is a transient condition; retry policy is ours, not
//!             // the queue's.
//!             while !tx.push(&i.to_ne_bytes()) {
//!                 std::hint::spin_loop();
//!             }
//!         }
//!     });
//!
//!     let mut out = [0u8; 8];
//!     for expected in 0..10_000u64 {
//!         while !rx.pop(&mut out) {
//!             std::hint::spin_loop();
//!         }
//!         assert_eq!(u64::from_ne_bytes(out), expected);
//!     }
//! });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod ring;
pub mod typed;

use std::fmt;

pub use ring::RawQueue;

/// The producing half of a split queue.
///
/// Exactly one `Producer` exists per [`RawQueue::split`] borrow, which is
/// what makes [`push`](Self::push) safe to call. Keeps a local copy of its
/// own counter and a cached snapshot of the consumer's counter, so the hot
/// path touches the shared cache line only to publish.
#[derive(Debug)]
pub struct Producer<'q> {
    pub(crate) queue: &'q RawQueue<'q>,

    /// Our write counter. Authoritative: only we advance it.
    pub(crate) local_head: usize,

    /// Snapshot of the consumer's counter, refreshed only when the queue
    /// appears full. Staleness can cause a spurious "full", never an
    /// overwrite of an unread slot.
    pub(crate) cached_tail: usize,
}

impl Producer<'_> {
    /// Attempts to enqueue one element, copying the bytes of `src`.
    ///
    /// Returns `false` and changes nothing if the queue is full.
    ///
    /// # Panics
    ///
    /// Panics if `src.len()` differs from the queue's element size.
    #[inline]
    #[must_use = "a false return means the element was not enqueued"]
    pub fn push(&mut self, src: &[u8]) -> bool {
        assert_eq!(
            src.len(),
            self.queue.elem_size(),
            "source length must equal the queue's element size"
        );
        // Safety: length checked above; split() guarantees we are the only
        // producer.
        unsafe { self.push_raw(src.as_ptr()) }
    }

    /// Protocol body shared with the typed wrapper.
    ///
    /// # Safety
    ///
    /// `src` must be valid for `elem_size` bytes.
    #[inline]
    pub(crate) unsafe fn push_raw(&mut self, src: *const u8) -> bool {
        let head = self.local_head;

        if head.wrapping_sub(self.cached_tail) == self.queue.capacity() {
            self.cached_tail = self.queue.load_tail();
            if head.wrapping_sub(self.cached_tail) == self.queue.capacity() {
                return false;
            }
        }

        // Safety: the full check above proves the consumer is not reading
        // this slot; the producer owns it until head is published.
        unsafe { self.queue.write_slot(head, src) };

        self.local_head = head.wrapping_add(1);
        self.queue.publish_head(self.local_head);
        true
    }

    /// Returns the number of element slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Returns the fixed per-element size in bytes.
    #[inline]
    #[must_use]
    pub fn elem_size(&self) -> usize {
        self.queue.elem_size()
    }

    /// Returns a snapshot of the number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if the queue currently appears empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The consuming half of a split queue.
///
/// Mirror of [`Producer`]: one per split, with a local read counter and a
/// cached snapshot of the producer's counter refreshed only when the queue
/// appears empty.
#[derive(Debug)]
pub struct Consumer<'q> {
    pub(crate) queue: &'q RawQueue<'q>,

    /// Our read counter. Authoritative: only we advance it.
    pub(crate) local_tail: usize,

    /// Snapshot of the producer's counter, refreshed only when the queue
    /// appears empty.
    pub(crate) cached_head: usize,
}

impl Consumer<'_> {
    /// Attempts to dequeue one element into `dst`.
    ///
    /// Returns `false` and leaves `dst` untouched if the queue is empty.
    ///
    /// # Panics
    ///
    /// Panics if `dst.len()` differs from the queue's element size.
    #[inline]
    #[must_use = "a false return means no element was dequeued"]
    pub fn pop(&mut self, dst: &mut [u8]) -> bool {
        assert_eq!(
            dst.len(),
            self.queue.elem_size(),
            "destination length must equal the queue's element size"
        );
        // Safety: length checked above; split() guarantees we are the only
        // consumer.
        unsafe { self.pop_raw(dst.as_mut_ptr()) }
    }

    /// Protocol body shared with the typed wrapper.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for `elem_size` bytes.
    #[inline]
    pub(crate) unsafe fn pop_raw(&mut self, dst: *mut u8) -> bool {
        let tail = self.local_tail;

        if tail == self.cached_head {
            self.cached_head = self.queue.load_head();
            if tail == self.cached_head {
                return false;
            }
        }

        // Safety: the emptiness check above proves the producer has
        // published this slot; it will not reuse it until tail advances.
        unsafe { self.queue.read_slot(tail, dst) };

        self.local_tail = tail.wrapping_add(1);
        self.queue.publish_tail(self.local_tail);
        true
    }

    /// Returns the number of element slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Returns the fixed per-element size in bytes.
    #[inline]
    #[must_use]
    pub fn elem_size(&self) -> usize {
        self.queue.elem_size()
    }

    /// Returns a snapshot of the number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if the queue currently appears empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error returned by [`typed::Producer::push`] when the queue is full.
///
/// Carries the rejected value back to the caller so nothing is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(
    /// The value that could not be enqueued.
    pub T,
);

impl<T> Full<T> {
    /// Returns the value that could not be enqueued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue is full")
    }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}
