//! Real-time audio consumer.
//!
//! [`AudioConsumer::process_quantum`] is the single entry point the owning
//! real-time thread calls once per audio callback. It must not allocate,
//! block, or take a lock — every cross-thread interaction goes through the
//! ring's atomic state block.

use std::sync::atomic::Ordering;

use crate::ring::RingConsumer;

/// Below this buffered-audio depth the consumer slows down playback
/// slightly so the ring can refill before it runs dry.
const DRIFT_LOW_MS: f64 = 600.0;
/// Above this depth the consumer speeds up slightly to avoid an unbounded
/// backlog; the ramp to the fast-forward rate completes over the following
/// second.
const DRIFT_HIGH_MS: f64 = 1500.0;
/// How long the slow-down ramp above [`DRIFT_HIGH_MS`] takes to reach its
/// full rate.
const DRIFT_HIGH_RAMP_MS: f64 = 1000.0;
const DRIFT_SLOW_RATE: f64 = 0.98;
const DRIFT_FAST_RATE: f64 = 1.02;

/// One channel's just-produced peak/RMS levels, fixed-point scaled by 1e6
/// to fit the ring's `AtomicU32` level slots.
fn level_bits(samples: &[f32]) -> (u32, u32) {
    if samples.is_empty() {
        return (0, 0);
    }
    let mut peak = 0.0f32;
    let mut sum_sq = 0.0f64;
    for &s in samples {
        let abs = s.abs();
        if abs > peak {
            peak = abs;
        }
        sum_sq += f64::from(s) * f64::from(s);
    }
    let rms = (sum_sq / samples.len() as f64).sqrt();
    let scale = 1_000_000.0;
    (
        (peak.clamp(0.0, 1.0) as f64 * scale) as u32,
        (rms.clamp(0.0, 1.0) * scale) as u32,
    )
}

/// Drives one audio track's ring on the real-time thread.
pub struct AudioConsumer {
    ring: RingConsumer,
    samples_consumed: u64,
    base_pts_us: i64,
    sample_offset: i64,
    fractional_advance: f64,
    last_generation: u32,
}

impl AudioConsumer {
    #[must_use]
    pub fn new(ring: RingConsumer) -> Self {
        Self {
            ring,
            samples_consumed: 0,
            base_pts_us: 0,
            sample_offset: 0,
            fractional_advance: 0.0,
            last_generation: 0,
        }
    }

    /// Runs one quantum, filling `out` (one `&mut [f32]` per channel, all
    /// `frames_to_fill` samples long) and returning whether real audio (as
    /// opposed to inserted silence) was produced.
    pub fn process_quantum(&mut self, out: &mut [Vec<f32>], frames_to_fill: usize) -> bool {
        if let Some((base_pts_us, sample_offset)) = self.ring.poll_pts_reset(&mut self.last_generation) {
            self.base_pts_us = base_pts_us;
            self.sample_offset = sample_offset;
            self.samples_consumed = 0;
            self.fractional_advance = 0.0;
        }

        let state = self.ring.state();
        let sample_rate = state.sample_rate.load(Ordering::Relaxed).max(1);

        if state.is_playing.load(Ordering::Acquire) == 0 {
            silence(out, frames_to_fill);
            return false;
        }

        let used = self.ring.used();
        if used == 0 {
            silence(out, frames_to_fill);
            let added_us = (frames_to_fill as u64 * 1_000_000) / u64::from(sample_rate);
            state.inserted_silence_us.fetch_add(added_us as u32, Ordering::Relaxed);
            return false;
        }

        let speed = drift_speed(used, sample_rate);
        let exact_advance = frames_to_fill as f64 * speed + self.fractional_advance;
        let mut advance = exact_advance.floor() as usize;
        self.fractional_advance = exact_advance - exact_advance.floor();
        if advance > used {
            advance = used;
        }

        let copied = self.ring.copy_out(out, advance);
        silence_tail(out, copied, frames_to_fill);

        self.samples_consumed += copied as u64;
        let pts_us = self.base_pts_us
            + ((self.sample_offset + self.samples_consumed as i64) * 1_000_000) / i64::from(sample_rate);
        self.ring.publish_pts_us(pts_us);

        for (idx, channel) in out.iter().enumerate() {
            if idx >= crate::ring::MAX_CHANNELS {
                break;
            }
            let (peak, rms) = level_bits(&channel[..copied.min(channel.len())]);
            state.peak[idx].store(peak, Ordering::Relaxed);
            state.rms[idx].store(rms, Ordering::Relaxed);
        }

        true
    }
}

fn silence(out: &mut [Vec<f32>], frames: usize) {
    for channel in out.iter_mut() {
        for slot in channel.iter_mut().take(frames) {
            *slot = 0.0;
        }
    }
}

fn silence_tail(out: &mut [Vec<f32>], from: usize, frames: usize) {
    for channel in out.iter_mut() {
        for slot in channel.iter_mut().take(frames).skip(from) {
            *slot = 0.0;
        }
    }
}

/// Proportional drift compensation: speeds up below a low-water buffer
/// depth, holds unity in the comfortable middle band, and ramps down to a
/// slow rate above a high-water depth (over the following second of
/// buffered audio) to bound backlog growth.
fn drift_speed(used: usize, sample_rate: u32) -> f64 {
    let buffer_ms = (used as f64 * 1000.0) / f64::from(sample_rate);
    if buffer_ms < DRIFT_LOW_MS {
        let t = (buffer_ms / DRIFT_LOW_MS).clamp(0.0, 1.0);
        DRIFT_SLOW_RATE + t * (1.0 - DRIFT_SLOW_RATE)
    } else if buffer_ms <= DRIFT_HIGH_MS {
        1.0
    } else {
        let t = ((buffer_ms - DRIFT_HIGH_MS) / DRIFT_HIGH_RAMP_MS).clamp(0.0, 1.0);
        1.0 + t * (DRIFT_FAST_RATE - 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::audio_ring;

    fn out_buf(channels: usize, frames: usize) -> Vec<Vec<f32>> {
        vec![vec![0.0; frames]; channels]
    }

    #[test]
    fn not_playing_outputs_silence_without_touching_counters() {
        let (_producer, ring) = audio_ring(1, 256, 48_000);
        let mut consumer = AudioConsumer::new(ring);
        let mut out = out_buf(1, 128);
        let produced = consumer.process_quantum(&mut out, 128);
        assert!(!produced);
        assert_eq!(out[0], vec![0.0; 128]);
    }

    #[test]
    fn empty_ring_inserts_silence_and_advances_silence_counter() {
        let (producer, ring) = audio_ring(1, 256, 48_000);
        producer.set_playing(true);
        let mut consumer = AudioConsumer::new(ring);
        let mut out = out_buf(1, 128);
        let produced = consumer.process_quantum(&mut out, 128);
        assert!(!produced);
        let us = consumer.ring.state().inserted_silence_us.load(Ordering::Relaxed);
        assert_eq!(us, (128 * 1_000_000) / 48_000);
    }

    #[test]
    fn buffered_audio_is_copied_and_pts_advances() {
        // 48,000 buffered samples at 48kHz is a 1000ms buffer depth, inside
        // the 600-1500ms dead zone where drift speed is exactly 1.0, so one
        // small quantum's worth of samples copies through unscaled.
        let (producer, ring) = audio_ring(1, 65_536, 48_000);
        producer.set_playing(true);
        let samples: Vec<f32> = (0..48_000).map(|i| (i as f32) / 48_000.0).collect();
        producer.write(&[samples.clone()]);

        let mut consumer = AudioConsumer::new(ring);
        let mut out = out_buf(1, 128);
        let produced = consumer.process_quantum(&mut out, 128);
        assert!(produced);
        assert_eq!(&out[0][..128], &samples[..128]);

        let pts = consumer.ring.state().published_pts_us();
        assert!(pts > 0);
    }

    #[test]
    fn set_pts_reset_is_observed_on_next_quantum() {
        let (producer, ring) = audio_ring(1, 65_536, 48_000);
        producer.set_playing(true);
        producer.write(&[vec![1.0; 48_000]]);
        let mut consumer = AudioConsumer::new(ring);
        let mut out = out_buf(1, 32);
        consumer.process_quantum(&mut out, 32);

        producer.set_pts(100_000, 0);
        producer.write(&[vec![0.5; 48_000]]);
        let produced = consumer.process_quantum(&mut out, 32);
        assert!(produced);
        assert_eq!(consumer.samples_consumed, 32);
        let pts = consumer.ring.state().published_pts_us();
        assert_eq!(pts, 100_000 + (32 * 1_000_000) / 48_000);
    }

    #[test]
    fn drift_speed_is_unity_in_middle_band() {
        assert_eq!(drift_speed(48_000, 48_000), 1.0); // 1000ms buffered
    }

    #[test]
    fn drift_speed_slows_below_low_water_mark() {
        let speed = drift_speed(4_800, 48_000); // 100ms buffered
        assert!(speed < 1.0 && speed >= DRIFT_SLOW_RATE);
    }

    #[test]
    fn drift_speed_speeds_up_above_high_water_mark() {
        let speed = drift_speed(96_000, 48_000); // 2000ms buffered
        assert!(speed > 1.0 && speed <= DRIFT_FAST_RATE);
    }
}
