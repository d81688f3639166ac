//! Lock-free SPSC ring buffer of audio frames.
//!
//! Backed by `ringbuf::HeapRb<S>`, whose `push_slice` / `pop_slice` are
//! wait-free and allocation-free, so both halves may be driven from the
//! real-time audio callback.
//!
//! An *element* of the ring is one frame: `frame_len` interleaved samples.
//! Capacities, availabilities and transfer counts are all expressed in
//! frames. Every transfer moves whole frames, so the underlying sample
//! occupancy is always a multiple of `frame_len`.
//!
//! ```text
//! RingBuffer::new(capacity, frame_len)
//!     └─► split() → (RingProducer, RingConsumer)
//! ```
//!
//! Each half is `Send` and transfers through `&mut self`, which makes
//! multi-producer or multi-consumer use impossible without an outer lock.

pub mod sample;

use std::mem;

use ringbuf::{
    traits::{Consumer as _, Observer as _, Producer as _, Split as _},
    HeapCons, HeapProd, HeapRb,
};

use crate::error::{Result, ShimError};

pub use sample::Sample;

/// Owned ring storage before it is split into its two halves.
pub struct RingBuffer<S> {
    inner: HeapRb<S>,
    capacity: usize,
    frame_len: usize,
}

impl<S: Copy> RingBuffer<S> {
    /// Allocate a ring of `capacity` frames, each `frame_len` samples wide.
    ///
    /// This is the only allocation a ring ever performs. Call it from setup
    /// code, never from the audio callback.
    ///
    /// # Errors
    /// `ZeroCapacity` / `ZeroFrameLength` for empty geometry and
    /// `CapacityOverflow` when `capacity * frame_len` does not fit a `usize`.
    pub fn new(capacity: usize, frame_len: usize) -> Result<Self> {
        Self::named("audio", capacity, frame_len)
    }

    /// Like [`RingBuffer::new`], with a buffer name used in error messages.
    pub(crate) fn named(buffer: &'static str, capacity: usize, frame_len: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ShimError::ZeroCapacity { buffer });
        }
        if frame_len == 0 {
            return Err(ShimError::ZeroFrameLength { buffer });
        }
        let samples = capacity
            .checked_mul(frame_len)
            .ok_or(ShimError::CapacityOverflow {
                buffer,
                capacity,
                frame_len,
            })?;

        Ok(Self {
            inner: HeapRb::new(samples),
            capacity,
            frame_len,
        })
    }

    /// Capacity in frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples per frame.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Split into the producer (writer) and consumer (reader) halves.
    pub fn split(self) -> (RingProducer<S>, RingConsumer<S>) {
        let (prod, cons) = self.inner.split();
        (
            RingProducer {
                inner: prod,
                capacity: self.capacity,
                frame_len: self.frame_len,
            },
            RingConsumer {
                inner: cons,
                capacity: self.capacity,
                frame_len: self.frame_len,
            },
        )
    }
}

/// Writing half of a [`RingBuffer`].
pub struct RingProducer<S> {
    inner: HeapProd<S>,
    capacity: usize,
    frame_len: usize,
}

impl<S: Copy> RingProducer<S> {
    /// Frames that can be written without overwriting unread data.
    #[inline]
    pub fn write_available(&self) -> usize {
        self.inner.vacant_len() / self.frame_len
    }

    /// Frames ready to be read by the consumer half.
    #[inline]
    pub fn read_available(&self) -> usize {
        self.inner.occupied_len() / self.frame_len
    }

    /// Copy up to `n` frames from `source` into the ring.
    ///
    /// Moves `min(n, write_available(), source.len() / frame_len)` frames and
    /// returns that count. Never blocks, never allocates.
    #[inline]
    pub fn write(&mut self, source: &[S], n: usize) -> usize {
        let frames = n
            .min(self.write_available())
            .min(source.len() / self.frame_len);
        if frames == 0 {
            return 0;
        }
        let written = self.inner.push_slice(&source[..frames * self.frame_len]);
        written / self.frame_len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Size of one element (frame) in bytes.
    pub fn element_size(&self) -> usize {
        self.frame_len * mem::size_of::<S>()
    }
}

/// Reading half of a [`RingBuffer`].
pub struct RingConsumer<S> {
    inner: HeapCons<S>,
    capacity: usize,
    frame_len: usize,
}

impl<S: Copy> RingConsumer<S> {
    /// Frames ready to be read.
    #[inline]
    pub fn read_available(&self) -> usize {
        self.inner.occupied_len() / self.frame_len
    }

    /// Frames the producer half can still write.
    #[inline]
    pub fn write_available(&self) -> usize {
        self.inner.vacant_len() / self.frame_len
    }

    /// Copy up to `n` frames out of the ring into `dest`.
    ///
    /// Moves `min(n, read_available(), dest.len() / frame_len)` frames and
    /// returns that count. Never blocks, never allocates.
    #[inline]
    pub fn read(&mut self, dest: &mut [S], n: usize) -> usize {
        let frames = n
            .min(self.read_available())
            .min(dest.len() / self.frame_len);
        if frames == 0 {
            return 0;
        }
        let read = self.inner.pop_slice(&mut dest[..frames * self.frame_len]);
        read / self.frame_len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Size of one element (frame) in bytes.
    pub fn element_size(&self) -> usize {
        self.frame_len * mem::size_of::<S>()
    }
}
