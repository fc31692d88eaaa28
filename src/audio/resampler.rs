//! Sample pipeline: mono downmix, optional resampling, fixed-size chunking

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tokio::sync::mpsc;
use tracing::{error, warn};

use super::types::AudioChunk;
use super::TARGET_SAMPLE_RATE;

/// Chunk size in samples (0.1 seconds of audio at 16kHz)
pub(crate) const CHUNK_SIZE: usize = 1600;

/// Turns interleaved device samples into mono chunks at the target rate.
///
/// Owned by the device callback, so all buffering is internal; chunks
/// are pushed out with `try_send` to keep the audio callback
/// non-blocking.
pub(crate) struct SamplePipeline {
    channels: usize,
    input_chunk_size: usize,
    resampler: Option<SincFixedIn<f32>>,
    input_buffer: Vec<i16>,
    output_buffer: Vec<i16>,
    sender: mpsc::Sender<AudioChunk>,
}

impl SamplePipeline {
    pub(crate) fn new(
        channels: usize,
        source_sample_rate: u32,
        sender: mpsc::Sender<AudioChunk>,
    ) -> Self {
        let (resampler, input_chunk_size) = if source_sample_rate != TARGET_SAMPLE_RATE {
            build_resampler(source_sample_rate)
        } else {
            (None, CHUNK_SIZE)
        };

        Self {
            channels,
            input_chunk_size,
            resampler,
            input_buffer: Vec::with_capacity(CHUNK_SIZE * 2),
            output_buffer: Vec::with_capacity(CHUNK_SIZE * 2),
            sender,
        }
    }

    /// Feed interleaved i16 samples from the device callback
    pub(crate) fn push(&mut self, data: &[i16]) {
        let mono = downmix(data, self.channels);

        match self.resampler {
            Some(_) => {
                self.input_buffer.extend(mono);
                self.drain_through_resampler();
            }
            None => self.output_buffer.extend(mono),
        }

        self.flush_chunks();
    }

    fn drain_through_resampler(&mut self) {
        while self.input_buffer.len() >= self.input_chunk_size {
            let input: Vec<f32> = self
                .input_buffer
                .drain(..self.input_chunk_size)
                .map(|s| s as f32 / 32768.0)
                .collect();

            let resampler = match self.resampler.as_mut() {
                Some(r) => r,
                None => return,
            };

            match resampler.process(&[input], None) {
                Ok(resampled) => {
                    self.output_buffer.extend(
                        resampled[0]
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16),
                    );
                }
                Err(e) => error!("Resampling error: {}", e),
            }
        }
    }

    fn flush_chunks(&mut self) {
        while self.output_buffer.len() >= CHUNK_SIZE {
            let chunk = AudioChunk {
                samples: self.output_buffer.drain(..CHUNK_SIZE).collect(),
                sample_rate: TARGET_SAMPLE_RATE,
            };
            // try_send keeps the device callback non-blocking
            if let Err(e) = self.sender.try_send(chunk) {
                warn!("Audio buffer overflow - chunk dropped: {}", e);
                return;
            }
        }
    }
}

/// Average interleaved channels down to mono
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

fn build_resampler(source_sample_rate: u32) -> (Option<SincFixedIn<f32>>, usize) {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    // Input chunk size that yields CHUNK_SIZE samples at the target rate
    let input_frames = (CHUNK_SIZE as f64 * source_sample_rate as f64
        / TARGET_SAMPLE_RATE as f64)
        .ceil() as usize;

    match SincFixedIn::<f32>::new(
        TARGET_SAMPLE_RATE as f64 / source_sample_rate as f64,
        2.0,
        params,
        input_frames,
        1, // mono
    ) {
        Ok(resampler) => (Some(resampler), input_frames),
        Err(e) => {
            error!("Failed to create resampler: {}", e);
            (None, CHUNK_SIZE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = [100i16, 200, -100, -200];
        assert_eq!(downmix(&stereo, 2), vec![150, -150]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let mono = [1i16, 2, 3];
        assert_eq!(downmix(&mono, 1), vec![1, 2, 3]);
    }

    #[test]
    fn test_pipeline_emits_fixed_size_chunks_without_resampling() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut pipeline = SamplePipeline::new(1, TARGET_SAMPLE_RATE, tx);

        pipeline.push(&vec![0i16; CHUNK_SIZE + CHUNK_SIZE / 2]);

        let chunk = rx.try_recv().unwrap();
        assert_eq!(chunk.samples.len(), CHUNK_SIZE);
        assert_eq!(chunk.sample_rate, TARGET_SAMPLE_RATE);
        // The remainder stays buffered until the next push
        assert!(rx.try_recv().is_err());

        pipeline.push(&vec![0i16; CHUNK_SIZE / 2]);
        assert_eq!(rx.try_recv().unwrap().samples.len(), CHUNK_SIZE);
    }

    #[test]
    fn test_pipeline_resamples_to_target_rate() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut pipeline = SamplePipeline::new(1, 48000, tx);

        // Enough 48kHz input for several 16kHz chunks
        pipeline.push(&vec![0i16; 48000]);

        let chunk = rx.try_recv().unwrap();
        assert_eq!(chunk.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(chunk.samples.len(), CHUNK_SIZE);
    }
}
