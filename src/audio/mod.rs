//! Microphone capture using cpal
//!
//! Captures audio from the default input device, downmixed to mono and
//! resampled to 16kHz PCM16 for the realtime transcription service.

mod resampler;
mod types;

pub use types::{AudioCaptureError, AudioCaptureHandle, AudioChunk};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use resampler::SamplePipeline;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Target sample rate for the transcription service (16kHz)
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Start microphone capture on a dedicated thread.
///
/// Device and configuration are resolved before the thread spawns, so
/// an absent or unopenable input device surfaces here - the native
/// analog of a denied microphone permission.
///
/// # Returns
/// - `AudioCaptureHandle` to stop capture
/// - `mpsc::Receiver<AudioChunk>` delivering 16kHz mono PCM16 chunks
pub fn start_capture(
) -> Result<(AudioCaptureHandle, mpsc::Receiver<AudioChunk>), AudioCaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(AudioCaptureError::NoInputDevice)?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("Using audio input device: {}", device_name);

    let supported_config = pick_input_config(&device)?;
    let sample_format = device.default_input_config()?.sample_format();

    let config: cpal::StreamConfig = supported_config.into();
    info!(
        "Audio config: {} channels, {} Hz",
        config.channels, config.sample_rate.0
    );

    let is_capturing = Arc::new(AtomicBool::new(true));
    let is_capturing_thread = is_capturing.clone();

    let (chunk_tx, chunk_rx) = mpsc::channel(600);

    let thread_handle = thread::spawn(move || {
        if let Err(e) = run_capture(&device, &config, sample_format, is_capturing_thread, chunk_tx)
        {
            error!("Microphone capture error: {}", e);
        }
    });

    Ok((
        AudioCaptureHandle {
            is_capturing,
            thread_handle: Some(thread_handle),
        },
        chunk_rx,
    ))
}

/// Pick an input config supporting the target rate, or the closest one
fn pick_input_config(
    device: &cpal::Device,
) -> Result<cpal::SupportedStreamConfig, AudioCaptureError> {
    let supported_configs = device
        .supported_input_configs()
        .map_err(|e| AudioCaptureError::ConfigError(e.to_string()))?;

    let mut best_config = None;
    let mut found_target_rate = false;

    for config in supported_configs {
        if config.channels() == 0 {
            continue;
        }
        if config.min_sample_rate().0 <= TARGET_SAMPLE_RATE
            && config.max_sample_rate().0 >= TARGET_SAMPLE_RATE
        {
            best_config = Some(config.with_sample_rate(cpal::SampleRate(TARGET_SAMPLE_RATE)));
            found_target_rate = true;
            break;
        } else if best_config.is_none() {
            best_config = Some(config.with_max_sample_rate());
        }
    }

    let config = best_config.ok_or(AudioCaptureError::NoSupportedConfig)?;
    if !found_target_rate {
        warn!(
            "{}Hz not supported, capturing at {}Hz and resampling",
            TARGET_SAMPLE_RATE,
            config.sample_rate().0
        );
    }
    Ok(config)
}

/// Run the input stream on the capture thread until stopped
fn run_capture(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: SampleFormat,
    is_capturing: Arc<AtomicBool>,
    chunk_tx: mpsc::Sender<AudioChunk>,
) -> Result<(), AudioCaptureError> {
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    let err_callback = |err| {
        error!("Audio stream error: {}", err);
    };

    let stream = match sample_format {
        SampleFormat::I16 => {
            let mut pipeline = SamplePipeline::new(channels, sample_rate, chunk_tx);
            let gate = is_capturing.clone();
            device.build_input_stream(
                config,
                move |data: &[i16], _| {
                    if gate.load(Ordering::SeqCst) {
                        pipeline.push(data);
                    }
                },
                err_callback,
                None,
            )?
        }
        SampleFormat::F32 => {
            let mut pipeline = SamplePipeline::new(channels, sample_rate, chunk_tx);
            let gate = is_capturing.clone();
            device.build_input_stream(
                config,
                move |data: &[f32], _| {
                    if !gate.load(Ordering::SeqCst) {
                        return;
                    }
                    let samples: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();
                    pipeline.push(&samples);
                },
                err_callback,
                None,
            )?
        }
        other => {
            return Err(AudioCaptureError::UnsupportedFormat(format!("{:?}", other)));
        }
    };

    stream.play()?;
    info!("Microphone capture started");

    while is_capturing.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    drop(stream);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_capture_without_device_is_clean_error() {
        // On machines without an input device this must fail cleanly;
        // with one, the handle must report capturing until stopped.
        match start_capture() {
            Ok((mut handle, _rx)) => {
                assert!(handle.is_capturing());
                handle.stop();
                assert!(!handle.is_capturing());
            }
            Err(AudioCaptureError::NoInputDevice) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}
