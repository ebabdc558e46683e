//! Typed convenience layer over the byte-oriented core.
//!
//! [`Queue<T>`](Queue) binds an element type to a [`RawQueue`](crate::RawQueue)
//! by fixing the element size to `size_of::<T>()`. It adds no protocol of its
//! own: push and pop forward to the byte core's slot copies, so values still
//! move by copy and neither side ever holds a reference into the ring. The
//! `T: Copy` bound is what licenses that — no drop obligations, no interior
//! pointers worth preserving.
//!
//! # Example
//!
//! ```
//! use bytering::typed;
//!
//! let mut storage = vec![0u8; 16 * std::mem::size_of::<u64>()];
//! let mut queue = typed::Queue::<u64>::new(16, &mut storage);
//! let (mut tx, mut rx) = queue.split();
//!
//! tx.push(42).unwrap();
//! assert_eq!(rx.pop(), Some(42));
//! assert_eq!(rx.pop(), None);
//! ```

use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};

use crate::{Full, RawQueue};

/// A bounded SPSC queue of `T` values over borrowed storage.
///
/// Thin adapter: construction derives the element size from `T` and all
/// operations delegate to the byte core unchanged.
#[derive(Debug)]
pub struct Queue<'buf, T> {
    raw: RawQueue<'buf>,
    _elem: PhantomData<T>,
}

impl<'buf, T: Copy> Queue<'buf, T> {
    /// Creates a queue of `capacity` slots of `T`, backed by `buffer`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized, if `capacity` is zero or not a power of
    /// two, or if `buffer` is shorter than `capacity * size_of::<T>()`
    /// bytes.
    #[must_use]
    pub fn new(capacity: usize, buffer: &'buf mut [u8]) -> Self {
        Self {
            raw: RawQueue::new(mem::size_of::<T>(), capacity, buffer),
            _elem: PhantomData,
        }
    }

    /// Splits the queue into a producer and a consumer handle.
    ///
    /// Same exclusivity rule as [`RawQueue::split`]: one of each, borrowing
    /// the queue until both are dropped.
    pub fn split(&mut self) -> (Producer<'_, T>, Consumer<'_, T>) {
        let (tx, rx) = self.raw.split();
        (
            Producer {
                inner: tx,
                _elem: PhantomData,
            },
            Consumer {
                inner: rx,
                _elem: PhantomData,
            },
        )
    }

    /// Returns the number of element slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Returns a snapshot of the number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if no elements are queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// The producing half of a typed queue.
#[derive(Debug)]
pub struct Producer<'q, T> {
    inner: crate::Producer<'q>,
    _elem: PhantomData<T>,
}

impl<T: Copy> Producer<'_, T> {
    /// Attempts to enqueue `value`.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(value))` if the queue is full, handing the value
    /// back untouched.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), Full<T>> {
        // Raw pointer copy rather than a byte slice over `value`: padding
        // bytes of T may be uninitialized and must not be read through a
        // reference.
        let src = (&value as *const T).cast::<u8>();
        // Safety: size_of::<T>() bytes are readable at src, and the element
        // size was fixed to size_of::<T>() at construction.
        if unsafe { self.inner.push_raw(src) } {
            Ok(())
        } else {
            Err(Full(value))
        }
    }

    /// Returns the number of element slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Returns a snapshot of the number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the queue currently appears empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// The consuming half of a typed queue.
#[derive(Debug)]
pub struct Consumer<'q, T> {
    inner: crate::Consumer<'q>,
    _elem: PhantomData<T>,
}

impl<T: Copy> Consumer<'_, T> {
    /// Attempts to dequeue a value.
    ///
    /// Returns `None` if the queue is empty.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let mut slot = MaybeUninit::<T>::uninit();
        // Safety: size_of::<T>() bytes are writable at the slot, and on a
        // true return the core copied in the bytes of a T the producer
        // wrote, so assume_init yields that value.
        if unsafe { self.inner.pop_raw(slot.as_mut_ptr().cast::<u8>()) } {
            Some(unsafe { slot.assume_init() })
        } else {
            None
        }
    }

    /// Returns the number of element slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Returns a snapshot of the number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the queue currently appears empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
