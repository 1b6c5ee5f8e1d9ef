//! Bounded drop-oldest sample FIFO.

use crate::Sample;
use parking_lot::Mutex;
use ringbuf::{
    traits::{Consumer, Observer, Producer},
    HeapRb,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed-capacity FIFO of samples shared between one producer thread and one
/// consumer thread.
///
/// Pushing past capacity discards the oldest samples so the ring always holds
/// the most recent audio. This is the backpressure policy, not an error; the
/// number of discarded samples is available from [`dropped`](Self::dropped).
///
/// Every critical section is a single slice copy, so the hardware callback
/// never waits on the worker for longer than one block copy.
pub struct SampleRing {
    inner: Mutex<HeapRb<Sample>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(HeapRb::new(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Ring holding `seconds` of audio at `sample_rate`.
    pub fn with_duration(sample_rate: f64, seconds: f64) -> Self {
        Self::new((sample_rate * seconds).ceil() as usize)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Append samples, discarding the oldest ones on overflow.
    ///
    /// Returns how many samples were discarded (already-queued or incoming).
    pub fn push_slice(&self, samples: &[Sample]) -> usize {
        // Only the newest `capacity` incoming samples can survive anyway.
        let incoming = &samples[samples.len().saturating_sub(self.capacity)..];
        let truncated = samples.len() - incoming.len();

        let mut rb = self.inner.lock();
        let overflow = incoming.len().saturating_sub(rb.vacant_len());
        let evicted = if overflow > 0 { rb.skip(overflow) } else { 0 };
        rb.push_slice(incoming);
        drop(rb);

        let discarded = truncated + evicted;
        if discarded > 0 {
            self.dropped.fetch_add(discarded as u64, Ordering::Relaxed);
        }
        discarded
    }

    /// Pop exactly `len` samples, or nothing if fewer are queued.
    ///
    /// The block is allocated before the lock is taken.
    pub fn pop_block(&self, len: usize) -> Option<Vec<Sample>> {
        if self.len() < len {
            return None;
        }
        let mut block = vec![0.0; len];

        let mut rb = self.inner.lock();
        if rb.occupied_len() < len {
            return None;
        }
        rb.pop_slice(&mut block);
        Some(block)
    }

    /// Pop up to `out.len()` samples into `out`. Returns the count written.
    pub fn pop_into(&self, out: &mut [Sample]) -> usize {
        self.inner.lock().pop_slice(out)
    }

    /// Copy of the queued samples, oldest first, without consuming them.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.inner.lock().iter().copied().collect()
    }

    /// Total samples discarded by overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fifo_order() {
        let ring = SampleRing::new(8);
        ring.push_slice(&[1.0, 2.0, 3.0]);
        ring.push_slice(&[4.0]);

        assert_eq!(ring.len(), 4);
        assert_eq!(ring.pop_block(3), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(ring.pop_block(2), None);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let ring = SampleRing::new(4);
        ring.push_slice(&[1.0, 2.0, 3.0]);
        let dropped = ring.push_slice(&[4.0, 5.0, 6.0]);

        assert_eq!(dropped, 2);
        assert_eq!(ring.dropped(), 2);
        assert_eq!(ring.snapshot(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_oversized_push_keeps_tail() {
        let ring = SampleRing::new(3);
        ring.push_slice(&[9.0]);
        let dropped = ring.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(dropped, 3);
        assert_eq!(ring.snapshot(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_pop_into_partial() {
        let ring = SampleRing::new(8);
        ring.push_slice(&[0.1, 0.2]);
        let mut out = [0.0f32; 4];

        assert_eq!(ring.pop_into(&mut out), 2);
        assert_eq!(&out[..2], &[0.1, 0.2]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_pop_block_with_concurrent_producer() {
        let ring = std::sync::Arc::new(SampleRing::new(4096));
        let producer = {
            let ring = ring.clone();
            std::thread::spawn(move || {
                for chunk in 0..64 {
                    let samples: Vec<f32> = (0..16).map(|i| (chunk * 16 + i) as f32).collect();
                    ring.push_slice(&samples);
                }
            })
        };

        let mut popped = Vec::new();
        while popped.len() < 1024 {
            match ring.pop_block(32) {
                Some(block) => {
                    assert_eq!(block.len(), 32);
                    popped.extend(block);
                }
                None => std::thread::yield_now(),
            }
        }
        producer.join().unwrap();

        let expected: Vec<f32> = (0..1024).map(|i| i as f32).collect();
        assert_eq!(popped, expected);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_with_duration() {
        let ring = SampleRing::with_duration(48000.0, 2.0);
        assert_eq!(ring.capacity(), 96000);
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity_and_keeps_newest(
            capacity in 1usize..64,
            pushes in proptest::collection::vec(
                proptest::collection::vec(-1.0f32..1.0, 0..40),
                0..20,
            ),
        ) {
            let ring = SampleRing::new(capacity);
            let mut history: Vec<f32> = Vec::new();

            for chunk in &pushes {
                ring.push_slice(chunk);
                history.extend_from_slice(chunk);
                prop_assert!(ring.len() <= capacity);
            }

            let expected = &history[history.len().saturating_sub(capacity)..];
            prop_assert_eq!(ring.snapshot(), expected.to_vec());
            prop_assert_eq!(
                ring.dropped() as usize,
                history.len() - expected.len()
            );
        }
    }
}
