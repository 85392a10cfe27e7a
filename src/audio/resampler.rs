//! Sample processing: downmix, resample, chunk
//!
//! Turns raw interleaved device samples into fixed-size mono PCM16
//! chunks at the target rate, sent over a bounded channel. Runs inside
//! the audio callback, so chunks are dropped rather than blocking when
//! the consumer falls behind.

use super::types::{AudioChunk, AudioCaptureError};
use super::SAMPLE_RATE;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Chunk size in samples (0.1 seconds of audio at 16kHz)
pub(crate) const CHUNK_SIZE: usize = 1600;

/// Accumulates device samples into recognizer-ready chunks
pub(crate) struct ChunkAssembler {
    channels: usize,
    /// Device-rate samples waiting for the resampler
    input: Vec<i16>,
    /// Target-rate samples waiting to fill a chunk
    output: Vec<i16>,
    /// Input samples consumed per resampler pass
    input_chunk_size: usize,
    resampler: Option<SincFixedIn<f32>>,
    tx: mpsc::Sender<AudioChunk>,
}

impl ChunkAssembler {
    /// Create an assembler for a device delivering `channels`-interleaved
    /// samples at `device_rate` Hz. A resampler is built only when the
    /// device rate differs from the target.
    pub(crate) fn new(
        channels: usize,
        device_rate: u32,
        tx: mpsc::Sender<AudioChunk>,
    ) -> Result<Self, AudioCaptureError> {
        let (resampler, input_chunk_size) = if device_rate != SAMPLE_RATE {
            info!("Creating resampler: {} Hz -> {} Hz", device_rate, SAMPLE_RATE);
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            // Input chunk sized so each pass yields one output chunk
            let input_frames =
                (CHUNK_SIZE as f64 * device_rate as f64 / SAMPLE_RATE as f64).ceil() as usize;
            let resampler = SincFixedIn::<f32>::new(
                SAMPLE_RATE as f64 / device_rate as f64,
                2.0,
                params,
                input_frames,
                1, // mono
            )
            .map_err(|e| AudioCaptureError::Resampler(e.to_string()))?;
            (Some(resampler), input_frames)
        } else {
            (None, CHUNK_SIZE)
        };

        Ok(Self {
            channels,
            input: Vec::with_capacity(CHUNK_SIZE * 2),
            output: Vec::with_capacity(CHUNK_SIZE * 2),
            input_chunk_size,
            resampler,
            tx,
        })
    }

    /// Feed one callback's worth of interleaved device samples
    pub(crate) fn push(&mut self, data: &[i16]) {
        let mono = downmix(data, self.channels);

        if self.resampler.is_none() {
            self.output.extend(mono);
        } else {
            self.input.extend(mono);
            while self.input.len() >= self.input_chunk_size {
                let device_chunk: Vec<i16> = self.input.drain(..self.input_chunk_size).collect();
                let input_f32: Vec<f32> =
                    device_chunk.iter().map(|&s| s as f32 / 32768.0).collect();
                let Some(resampler) = self.resampler.as_mut() else {
                    break;
                };
                match resampler.process(&[input_f32], None) {
                    Ok(resampled) => {
                        self.output.extend(
                            resampled[0]
                                .iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16),
                        );
                    }
                    Err(e) => {
                        error!("Resampling error: {}", e);
                    }
                }
            }
        }

        self.send_chunks();
    }

    /// Drain complete chunks to the consumer, dropping on overflow
    fn send_chunks(&mut self) {
        while self.output.len() >= CHUNK_SIZE {
            let chunk: Vec<i16> = self.output.drain(..CHUNK_SIZE).collect();
            let audio_chunk = AudioChunk {
                samples: chunk,
                sample_rate: SAMPLE_RATE,
            };
            // try_send keeps the audio callback from blocking
            if let Err(e) = self.tx.try_send(audio_chunk) {
                warn!("Audio buffer overflow - chunk dropped: {}", e);
                return;
            }
        }
    }
}

/// Average interleaved frames down to mono
fn downmix(data: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_averages_channels() {
        assert_eq!(downmix(&[100, 200, 300, 500], 2), vec![150, 400]);
        assert_eq!(downmix(&[1, 2, 3], 1), vec![1, 2, 3]);
    }

    #[test]
    fn test_assembler_emits_fixed_size_chunks_without_resampling() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut assembler = ChunkAssembler::new(1, SAMPLE_RATE, tx).unwrap();

        // Just under one chunk: nothing emitted yet
        assembler.push(&vec![7i16; CHUNK_SIZE - 1]);
        assert!(rx.try_recv().is_err());

        // Crossing the boundary emits exactly one chunk
        assembler.push(&[7i16; 2]);
        let chunk = rx.try_recv().unwrap();
        assert_eq!(chunk.samples.len(), CHUNK_SIZE);
        assert_eq!(chunk.sample_rate, SAMPLE_RATE);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_assembler_downmixes_stereo_input() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut assembler = ChunkAssembler::new(2, SAMPLE_RATE, tx).unwrap();

        // Stereo frames halve into mono samples
        assembler.push(&vec![1000i16; CHUNK_SIZE * 2]);
        let chunk = rx.try_recv().unwrap();
        assert_eq!(chunk.samples.len(), CHUNK_SIZE);
        assert!(chunk.samples.iter().all(|&s| s == 1000));
    }

    #[test]
    fn test_assembler_builds_resampler_for_other_rates() {
        let (tx, _rx) = mpsc::channel(8);
        let assembler = ChunkAssembler::new(1, 48000, tx).unwrap();
        assert!(assembler.resampler.is_some());
        assert_eq!(assembler.input_chunk_size, CHUNK_SIZE * 3);
    }
}
