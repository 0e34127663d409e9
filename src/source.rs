//! # Sample Source Module
//!
//! The seam between the detector and whatever transports the audio. The
//! detector only needs three operations: how many samples are ready, a
//! contiguous view of them, and a way to release them once analyzed.
//!
//! [`RingSource`] adapts the consumer half of a wait-free SPSC ring buffer,
//! which is how a live audio callback hands samples over. [`BufferSource`]
//! serves samples from memory, for offline analysis and tests.

use ringbuf::{
    traits::{Consumer, Observer, Split},
    HeapCons, HeapProd, HeapRb,
};

/// A pull-based supplier of mono `f32` samples.
pub trait SampleSource {
    /// The number of samples that can be read right now.
    fn available(&self) -> usize;

    /// A contiguous view of the first `len` available samples.
    ///
    /// Viewing does not consume: until [`SampleSource::advance`] is called,
    /// subsequent views return the same samples.
    ///
    /// # Panics
    /// * If `len` exceeds [`SampleSource::available`]
    fn view(&mut self, len: usize) -> &[f32];

    /// Releases the first `len` samples back to the producer.
    fn advance(&mut self, len: usize);
}

/// A sample source over the consumer half of an SPSC ring buffer.
///
/// The producer half stays with the audio callback, which writes into the
/// ring without blocking, allocating or taking locks. The adapter drains the
/// ring into a staging buffer so that views are contiguous even when the
/// data wraps around the ring's physical end.
pub struct RingSource {
    consumer: HeapCons<f32>,
    staged: Vec<f32>,
}

impl RingSource {
    pub fn new(consumer: HeapCons<f32>) -> Self {
        RingSource {
            consumer,
            staged: Vec::new(),
        }
    }

    /// Creates a ring of `capacity` samples and returns the producer half
    /// alongside the source wrapping the consumer half.
    pub fn with_capacity(capacity: usize) -> (HeapProd<f32>, RingSource) {
        let (producer, consumer) = HeapRb::new(capacity).split();
        (producer, RingSource::new(consumer))
    }

    /// Moves everything currently in the ring into the staging buffer,
    /// freeing the ring for the producer.
    fn stage(&mut self) {
        let incoming = self.consumer.occupied_len();
        if incoming == 0 {
            return;
        }

        let old_len = self.staged.len();
        self.staged.resize(old_len + incoming, 0.0);
        let read = self.consumer.pop_slice(&mut self.staged[old_len..]);
        self.staged.truncate(old_len + read);
    }
}

impl SampleSource for RingSource {
    fn available(&self) -> usize {
        self.staged.len() + self.consumer.occupied_len()
    }

    fn view(&mut self, len: usize) -> &[f32] {
        if self.staged.len() < len {
            self.stage();
        }
        &self.staged[..len]
    }

    fn advance(&mut self, len: usize) {
        if self.staged.len() < len {
            self.stage();
        }
        let len = len.min(self.staged.len());
        self.staged.drain(..len);
    }
}

/// An in-memory sample source with a read cursor.
#[derive(Debug, Clone, Default)]
pub struct BufferSource {
    samples: Vec<f32>,
    position: usize,
}

impl BufferSource {
    pub fn new(samples: Vec<f32>) -> Self {
        BufferSource {
            samples,
            position: 0,
        }
    }

    /// Appends samples behind whatever is still unread.
    pub fn push(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }
}

impl SampleSource for BufferSource {
    fn available(&self) -> usize {
        self.samples.len() - self.position
    }

    fn view(&mut self, len: usize) -> &[f32] {
        &self.samples[self.position..self.position + len]
    }

    fn advance(&mut self, len: usize) {
        self.position = (self.position + len).min(self.samples.len());
    }
}
