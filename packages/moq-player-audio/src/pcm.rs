//! Raw interleaved PCM helpers.
//!
//! Platform audio decoders commonly hand back interleaved `i16` samples as
//! a raw byte buffer rather than the planar `f32` shape
//! [`moq_player_core::decoder::AudioDecoderService::take_output`] expects.
//! These helpers bridge that gap without an unsafe pointer cast.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PcmError {
    #[error("pcm buffer length {len} is not a multiple of {channels} channels")]
    Misaligned { len: usize, channels: u32 },
}

/// Reinterprets `bytes` as interleaved `i16` samples and de-interleaves them
/// into `channels` planar `f32` lanes, scaled to `[-1.0, 1.0]`.
///
/// # Errors
///
/// Returns [`PcmError::Misaligned`] if the sample count doesn't split
/// evenly across `channels`.
pub fn interleaved_i16_to_planar_f32(bytes: &[u8], channels: u32) -> Result<Vec<Vec<f32>>, PcmError> {
    let samples: &[i16] = bytemuck::cast_slice(bytes);
    let channels = channels.max(1) as usize;
    if samples.len() % channels != 0 {
        return Err(PcmError::Misaligned {
            len: samples.len(),
            channels: channels as u32,
        });
    }

    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for (i, &sample) in samples.iter().enumerate() {
        planar[i % channels].push(f32::from(sample) / f32::from(i16::MAX));
    }
    Ok(planar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deinterleaves_stereo_samples() {
        let samples: Vec<i16> = vec![100, -200, 300, -400];
        let bytes: &[u8] = bytemuck::cast_slice(&samples);
        let planar = interleaved_i16_to_planar_f32(bytes, 2).unwrap();
        assert_eq!(planar.len(), 2);
        assert_eq!(planar[0].len(), 2);
        assert!((planar[0][0] - 100.0 / i16::MAX as f32).abs() < 1e-6);
        assert!((planar[1][0] - (-200.0) / i16::MAX as f32).abs() < 1e-6);
    }

    #[test]
    fn rejects_lengths_not_divisible_by_channel_count() {
        let samples: Vec<i16> = vec![1, 2, 3];
        let bytes: &[u8] = bytemuck::cast_slice(&samples);
        assert_eq!(
            interleaved_i16_to_planar_f32(bytes, 2),
            Err(PcmError::Misaligned { len: 3, channels: 2 })
        );
    }
}
