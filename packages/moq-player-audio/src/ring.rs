//! Lock-free single-producer/single-consumer audio ring.
//!
//! Planar float32 channels share one atomic state block; the decode
//! callback thread is the sole producer (`write_idx`), the real-time audio
//! thread is the sole consumer (`read_idx`, the PTS fields, the level
//! fields). One slot of capacity is always held back so a full ring is
//! distinguishable from an empty one using only the two indices.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

/// Upper bound on simultaneously metered channels (stereo plus headroom for
/// unusual layouts); `peak`/`rms` slots beyond `num_channels` are unused.
pub const MAX_CHANNELS: usize = 8;

/// The atomic state block shared by producer and consumer.
///
/// `pts_hi`/`pts_lo` are the published playback clock, recomputed by the
/// consumer every quantum (`pts_hi * 1_000_000 + pts_lo` reconstructs
/// microseconds); `base_pts`/`sample_offset`/`generation` are the staging
/// fields a `set_pts` reset writes, which the consumer adopts at the start
/// of its next quantum by noticing `generation` changed — this indirection
/// is what lets a reset cross the producer/consumer boundary without the
/// audio thread ever blocking or taking a lock.
#[derive(Debug)]
pub struct AudioRingState {
    pub read_idx: AtomicU32,
    pub write_idx: AtomicU32,
    pub inserted_silence_us: AtomicU32,
    pub is_playing: AtomicU32,
    pub pts_hi: AtomicI32,
    pub pts_lo: AtomicI32,
    pub num_channels: AtomicU32,
    pub sample_rate: AtomicU32,
    pub peak: [AtomicU32; MAX_CHANNELS],
    pub rms: [AtomicU32; MAX_CHANNELS],
    base_pts_us: AtomicI64,
    sample_offset: AtomicI64,
    generation: AtomicU32,
}

impl AudioRingState {
    fn new(num_channels: u32, sample_rate: u32) -> Self {
        Self {
            read_idx: AtomicU32::new(0),
            write_idx: AtomicU32::new(0),
            inserted_silence_us: AtomicU32::new(0),
            is_playing: AtomicU32::new(0),
            pts_hi: AtomicI32::new(0),
            pts_lo: AtomicI32::new(0),
            num_channels: AtomicU32::new(num_channels),
            sample_rate: AtomicU32::new(sample_rate),
            peak: Default::default(),
            rms: Default::default(),
            base_pts_us: AtomicI64::new(0),
            sample_offset: AtomicI64::new(0),
            generation: AtomicU32::new(0),
        }
    }

    /// Reconstructs the currently published PTS in microseconds.
    #[must_use]
    pub fn published_pts_us(&self) -> i64 {
        let hi = i64::from(self.pts_hi.load(Ordering::Acquire));
        let lo = i64::from(self.pts_lo.load(Ordering::Acquire));
        hi * 1_000_000 + lo
    }

    fn publish_pts_us(&self, pts_us: i64) {
        self.pts_hi.store((pts_us / 1_000_000) as i32, Ordering::Relaxed);
        self.pts_lo.store((pts_us % 1_000_000) as i32, Ordering::Release);
    }
}

type ChannelBuf = Box<[UnsafeCell<f32>]>;

struct RingInner {
    state: AudioRingState,
    channels: Box<[ChannelBuf]>,
    capacity: usize,
}

// SAFETY: exactly one producer ever touches the write side and exactly one
// consumer ever touches the read side (enforced by construction: only
// `RingProducer`/`RingConsumer` hold a reference to a channel cell, and
// each is created once by `audio_ring`), with the atomic indices providing
// the happens-before edges between the two.
unsafe impl Sync for RingInner {}

/// The decode-thread side of an audio ring.
pub struct RingProducer {
    inner: Arc<RingInner>,
}

/// The real-time audio thread's side of an audio ring.
pub struct RingConsumer {
    inner: Arc<RingInner>,
}

/// Creates a ring with `channels` planar lanes of `capacity` samples each,
/// split into its producer and consumer halves. `capacity` is rounded up to
/// the next power of two: `read_idx`/`write_idx` wrap naturally at `u32::MAX`,
/// and `% capacity` is only position-consistent across that wrap when
/// `capacity` divides `2^32`, which only a power of two is guaranteed to do.
#[must_use]
pub fn audio_ring(channels: u32, capacity: usize, sample_rate: u32) -> (RingProducer, RingConsumer) {
    let capacity = capacity.max(2).next_power_of_two();
    let bufs = (0..channels.max(1))
        .map(|_| {
            (0..capacity)
                .map(|_| UnsafeCell::new(0.0f32))
                .collect::<Vec<_>>()
                .into_boxed_slice()
        })
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let inner = Arc::new(RingInner {
        state: AudioRingState::new(channels, sample_rate),
        channels: bufs,
        capacity,
    });

    (
        RingProducer {
            inner: inner.clone(),
        },
        RingConsumer { inner },
    )
}

fn used_slots(read: u32, write: u32, capacity: usize) -> usize {
    (write.wrapping_sub(read) as usize) % capacity
}

impl RingProducer {
    #[must_use]
    pub fn state(&self) -> &AudioRingState {
        &self.inner.state
    }

    /// Writes `planar_frame` (one `&[f32]` per channel, all the same
    /// length) into the ring. Returns the number of samples actually
    /// written per channel; the caller drops the remainder of the frame
    /// and counts it upstream.
    pub fn write(&self, planar_frame: &[Vec<f32>]) -> usize {
        let frame_count = planar_frame.iter().map(Vec::len).min().unwrap_or(0);
        if frame_count == 0 {
            return 0;
        }

        let capacity = self.inner.capacity;
        let read = self.inner.state.read_idx.load(Ordering::Acquire);
        let write = self.inner.state.write_idx.load(Ordering::Relaxed);
        let used = used_slots(read, write, capacity);
        let free = capacity - 1 - used;
        let n = frame_count.min(free);
        if n == 0 {
            return 0;
        }

        let start = write as usize % capacity;
        for (ch_idx, channel) in self.inner.channels.iter().enumerate() {
            let samples = &planar_frame[ch_idx][..n];
            let first_len = n.min(capacity - start);
            for (i, &sample) in samples[..first_len].iter().enumerate() {
                // SAFETY: indices [write, write+n) modulo capacity are not
                // yet visible to the consumer (bounded by `free` above), so
                // only the producer touches them here.
                unsafe { *channel[start + i].get() = sample }
            }
            for (i, &sample) in samples[first_len..].iter().enumerate() {
                unsafe { *channel[i].get() = sample }
            }
        }

        self.inner
            .state
            .write_idx
            .store(write.wrapping_add(n as u32), Ordering::Release);
        n
    }

    /// Clears the ring (`read := write := 0`).
    pub fn clear(&self) {
        self.inner.state.read_idx.store(0, Ordering::Release);
        self.inner.state.write_idx.store(0, Ordering::Release);
    }

    pub fn set_playing(&self, playing: bool) {
        self.inner
            .state
            .is_playing
            .store(u32::from(playing), Ordering::Release);
    }

    /// Re-anchors the playback clock and clears the ring, per an upstream
    /// epoch reset. Sequenced (via `Release`) before the consumer's next
    /// quantum, which adopts the new base by observing `generation` change.
    pub fn set_pts(&self, new_base_us: i64, sample_offset: i64) {
        self.clear();
        self.inner.state.base_pts_us.store(new_base_us, Ordering::Relaxed);
        self.inner.state.sample_offset.store(sample_offset, Ordering::Relaxed);
        self.inner.state.generation.fetch_add(1, Ordering::Release);
    }
}

impl RingConsumer {
    #[must_use]
    pub fn state(&self) -> &AudioRingState {
        &self.inner.state
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    #[must_use]
    pub fn used(&self) -> usize {
        let read = self.inner.state.read_idx.load(Ordering::Relaxed);
        let write = self.inner.state.write_idx.load(Ordering::Acquire);
        used_slots(read, write, self.inner.capacity)
    }

    /// Copies up to `advance` samples per channel out of the ring starting
    /// at the current read index, into `out` (one `&mut [f32]` per
    /// channel, zero-filled past what was copied). Advances `read_idx`.
    /// Returns the number of samples actually copied.
    pub fn copy_out(&self, out: &mut [Vec<f32>], advance: usize) -> usize {
        let capacity = self.inner.capacity;
        let read = self.inner.state.read_idx.load(Ordering::Relaxed);
        let write = self.inner.state.write_idx.load(Ordering::Acquire);
        let used = used_slots(read, write, capacity);
        let n = advance.min(used).min(out.iter().map(Vec::len).min().unwrap_or(0));

        let start = read as usize % capacity;
        for (ch_idx, channel) in self.inner.channels.iter().enumerate() {
            let dest = &mut out[ch_idx];
            let first_len = n.min(capacity - start);
            for i in 0..first_len {
                // SAFETY: indices [read, read+n) modulo capacity were
                // published by the producer (bounded by `used` above), and
                // the consumer is the sole reader of them.
                dest[i] = unsafe { *channel[start + i].get() };
            }
            for i in first_len..n {
                dest[i] = unsafe { *channel[i - first_len].get() };
            }
            for slot in dest.iter_mut().skip(n) {
                *slot = 0.0;
            }
        }

        self.inner
            .state
            .read_idx
            .store(read.wrapping_add(n as u32), Ordering::Release);
        n
    }

    /// Polls for a pending `set_pts` reset, returning `(base_pts_us,
    /// sample_offset)` and clearing the pending marker if the generation
    /// changed since `last_generation`. Non-blocking; safe for the
    /// real-time thread.
    pub fn poll_pts_reset(&self, last_generation: &mut u32) -> Option<(i64, i64)> {
        let generation = self.inner.state.generation.load(Ordering::Acquire);
        if generation == *last_generation {
            return None;
        }
        *last_generation = generation;
        Some((
            self.inner.state.base_pts_us.load(Ordering::Relaxed),
            self.inner.state.sample_offset.load(Ordering::Relaxed),
        ))
    }

    pub fn publish_pts_us(&self, pts_us: i64) {
        self.inner.state.publish_pts_us(pts_us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips_samples() {
        let (producer, consumer) = audio_ring(1, 8, 48_000);
        let frame = vec![vec![1.0, 2.0, 3.0]];
        assert_eq!(producer.write(&frame), 3);
        assert_eq!(consumer.used(), 3);

        let mut out = vec![vec![0.0; 4]];
        let n = consumer.copy_out(&mut out, 4);
        assert_eq!(n, 3);
        assert_eq!(out[0], vec![1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn write_across_wrap_seam() {
        let (producer, consumer) = audio_ring(1, 4, 48_000);
        assert_eq!(producer.write(&[vec![1.0, 2.0, 3.0]]), 3);
        let mut out = vec![vec![0.0; 2]];
        assert_eq!(consumer.copy_out(&mut out, 2), 2);
        assert_eq!(out[0], vec![1.0, 2.0]);

        // write_idx is now at 3, read_idx at 2; writing 2 more samples must
        // wrap across the end of the 4-slot buffer.
        assert_eq!(producer.write(&[vec![4.0, 5.0]]), 2);
        let mut out2 = vec![vec![0.0; 3]];
        assert_eq!(consumer.copy_out(&mut out2, 3), 3);
        assert_eq!(out2[0], vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn write_never_exceeds_capacity_minus_one() {
        let (producer, consumer) = audio_ring(1, 4, 48_000);
        let n = producer.write(&[vec![1.0, 2.0, 3.0, 4.0, 5.0]]);
        assert_eq!(n, 3); // capacity - 1
        assert_eq!(consumer.used(), 3);
    }

    #[test]
    fn clear_resets_both_indices() {
        let (producer, consumer) = audio_ring(1, 8, 48_000);
        producer.write(&[vec![1.0, 2.0]]);
        producer.clear();
        assert_eq!(consumer.used(), 0);
    }

    #[test]
    fn set_pts_clears_ring_and_bumps_generation() {
        let (producer, consumer) = audio_ring(1, 8, 48_000);
        producer.write(&[vec![1.0, 2.0]]);
        producer.set_pts(42_000, 0);
        assert_eq!(consumer.used(), 0);

        let mut generation = 0;
        let reset = consumer.poll_pts_reset(&mut generation);
        assert_eq!(reset, Some((42_000, 0)));
        assert_eq!(consumer.poll_pts_reset(&mut generation), None);
    }

    #[test]
    fn non_power_of_two_capacity_is_rounded_up() {
        let (_producer, consumer) = audio_ring(1, 192_000, 48_000);
        assert_eq!(consumer.capacity(), 262_144);
    }

    #[test]
    fn published_pts_reconstructs_from_hi_lo() {
        let (_producer, consumer) = audio_ring(1, 8, 48_000);
        consumer.publish_pts_us(5_500_123);
        assert_eq!(consumer.state().published_pts_us(), 5_500_123);
    }
}
