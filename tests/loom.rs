//! Loom interleaving models for the acquire/release protocol.
//!
//! Run with:
//!   RUSTFLAGS="--cfg loom" cargo test --test loom --release
//!
//! Loom checks every ordering the counters' atomics allow; the slot copies
//! themselves go through raw pointers and are outside its tracking, so these
//! models assert on the values that come out the other side.

#![cfg(loom)]

use bytering::RawQueue;
use loom::sync::Arc;
use loom::thread;

/// Builds a leaked 'static buffer so handles can cross loom's 'static thread
/// boundary; the caller frees it after the model iteration.
fn leaked_buffer(len: usize) -> *mut [u8] {
    Box::into_raw(vec![0u8; len].into_boxed_slice())
}

#[test]
fn handoff_preserves_order() {
    loom::model(|| {
        let buf = leaked_buffer(2 * 8);
        let queue = Arc::new(RawQueue::new(8, 2, unsafe { &mut *buf }));
        let producer = Arc::clone(&queue);

        let handle = thread::spawn(move || {
            for i in 0..2u64 {
                // Safety: this thread is the only producer.
                while !unsafe { producer.push(&i.to_ne_bytes()) } {
                    thread::yield_now();
                }
            }
        });

        let mut out = [0u8; 8];
        for expected in 0..2u64 {
            // Safety: this thread is the only consumer.
            while !unsafe { queue.pop(&mut out) } {
                thread::yield_now();
            }
            assert_eq!(u64::from_ne_bytes(out), expected);
        }

        handle.join().unwrap();
        drop(queue);
        unsafe { drop(Box::from_raw(buf)) };
    });
}

#[test]
fn full_boundary_single_slot() {
    loom::model(|| {
        let buf = leaked_buffer(1);
        let queue = Arc::new(RawQueue::new(1, 1, unsafe { &mut *buf }));
        let producer = Arc::clone(&queue);

        let handle = thread::spawn(move || {
            for v in [10u8, 20u8] {
                // Safety: this thread is the only producer. The second push
                // must wait for the single slot to be released.
                while !unsafe { producer.push(&[v]) } {
                    thread::yield_now();
                }
            }
        });

        let mut out = [0u8];
        for expected in [10u8, 20u8] {
            // Safety: this thread is the only consumer.
            while !unsafe { queue.pop(&mut out) } {
                thread::yield_now();
            }
            assert_eq!(out[0], expected);
        }
        handle.join().unwrap();

        // Exactly two pushes happened, so the queue is empty again.
        assert!(!unsafe { queue.pop(&mut out) });

        drop(queue);
        unsafe { drop(Box::from_raw(buf)) };
    });
}
