//! Audio capture module using cpal for cross-platform microphone access
//!
//! Captures audio from the default input device, downmixed to mono PCM16
//! at 16kHz, the format the Live recognition session expects.

mod resampler;
mod types;

pub use types::{AudioCaptureError, AudioCaptureHandle, AudioChunk};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use resampler::ChunkAssembler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Target sample rate for the Live recognition session (16kHz)
pub const SAMPLE_RATE: u32 = 16000;

/// Start audio capture on a dedicated thread
///
/// Initializes the default audio input device and begins capturing
/// microphone audio, resampled to 16kHz mono PCM16.
///
/// # Returns
/// A tuple containing:
/// - `AudioCaptureHandle` - Used to stop capture and check status
/// - `mpsc::Receiver<AudioChunk>` - Receives audio chunks for streaming
///
/// # Errors
/// Returns `AudioCaptureError` if:
/// - No audio input device is available
/// - The audio device configuration is not supported
/// - The audio stream cannot be started
pub(crate) fn start_capture(
) -> Result<(AudioCaptureHandle, mpsc::Receiver<AudioChunk>), AudioCaptureError> {
    // Probe up front so a host without a microphone is reported
    // synchronously, before any session state changes.
    probe_input_device()?;

    let is_capturing = Arc::new(AtomicBool::new(true));
    let is_capturing_clone = is_capturing.clone();

    let (chunk_tx, chunk_rx) = mpsc::channel(600);

    let thread_handle = thread::spawn(move || {
        if let Err(e) = run_capture(is_capturing_clone, chunk_tx) {
            error!("Audio capture error: {}", e);
        }
    });

    let handle = AudioCaptureHandle {
        is_capturing,
        thread_handle: Some(thread_handle),
    };

    Ok((handle, chunk_rx))
}

/// Check that a usable input device exists
fn probe_input_device() -> Result<(), AudioCaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(AudioCaptureError::NoInputDevice)?;
    let mut configs = device
        .supported_input_configs()
        .map_err(|e| AudioCaptureError::ConfigError(e.to_string()))?;
    if !configs.any(|config| config.channels() > 0) {
        return Err(AudioCaptureError::NoSupportedConfig);
    }
    Ok(())
}

/// Run audio capture on the current thread (blocking)
fn run_capture(
    is_capturing: Arc<AtomicBool>,
    chunk_tx: mpsc::Sender<AudioChunk>,
) -> Result<(), AudioCaptureError> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or(AudioCaptureError::NoInputDevice)?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("Using audio input device: {}", device_name);

    // Prefer a config that can run at the target rate natively
    let supported_configs = device
        .supported_input_configs()
        .map_err(|e| AudioCaptureError::ConfigError(e.to_string()))?;

    let mut best_config = None;
    let mut found_target_rate = false;

    for config in supported_configs {
        if config.channels() == 0 {
            continue;
        }
        if config.min_sample_rate().0 <= SAMPLE_RATE && config.max_sample_rate().0 >= SAMPLE_RATE {
            best_config = Some(config.with_sample_rate(cpal::SampleRate(SAMPLE_RATE)));
            found_target_rate = true;
            break;
        } else if best_config.is_none() {
            best_config = Some(config.with_max_sample_rate());
        }
    }

    let supported_config = best_config.ok_or(AudioCaptureError::NoSupportedConfig)?;

    if !found_target_rate {
        warn!(
            "{}Hz not supported, capturing at {}Hz and resampling",
            SAMPLE_RATE,
            supported_config.sample_rate().0
        );
    }

    let config: cpal::StreamConfig = supported_config.into();
    let device_rate = config.sample_rate.0;
    let channels = config.channels as usize;

    info!("Audio config: {} channels, {} Hz", channels, device_rate);

    let assembler = ChunkAssembler::new(channels, device_rate, chunk_tx)?;

    let is_capturing_stream = is_capturing.clone();

    let err_callback = |err| {
        error!("Audio stream error: {}", err);
    };

    // Build the input stream based on sample format
    let stream = match device.default_input_config()?.sample_format() {
        SampleFormat::I16 => {
            let mut assembler = assembler;
            device.build_input_stream(
                &config,
                move |data: &[i16], _| {
                    if !is_capturing_stream.load(Ordering::SeqCst) {
                        return;
                    }
                    assembler.push(data);
                },
                err_callback,
                None,
            )?
        }
        SampleFormat::F32 => {
            let mut assembler = assembler;
            device.build_input_stream(
                &config,
                move |data: &[f32], _| {
                    if !is_capturing_stream.load(Ordering::SeqCst) {
                        return;
                    }
                    // Convert f32 to i16
                    let samples: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();
                    assembler.push(&samples);
                },
                err_callback,
                None,
            )?
        }
        sample_format => {
            return Err(AudioCaptureError::UnsupportedFormat(format!(
                "{:?}",
                sample_format
            )));
        }
    };

    stream.play()?;
    info!("Audio capture started");

    // Keep the stream alive until capture is stopped
    while is_capturing.load(Ordering::SeqCst) {
        thread::sleep(std::time::Duration::from_millis(100));
    }

    drop(stream);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_capture_creation() {
        // This test will only pass fully on machines with audio input
        match start_capture() {
            Ok((mut handle, _rx)) => {
                assert!(handle.is_capturing());
                handle.stop();
                assert!(!handle.is_capturing());
            }
            Err(AudioCaptureError::NoInputDevice)
            | Err(AudioCaptureError::NoSupportedConfig)
            | Err(AudioCaptureError::ConfigError(_)) => {
                println!("No usable audio input device (expected in CI)");
            }
            Err(e) => {
                panic!("Unexpected error: {}", e);
            }
        }
    }
}
