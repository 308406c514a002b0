//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Requested input frames per resampler call
const RESAMPLE_CHUNK: usize = 1024;

const RESAMPLE_SUB_CHUNKS: usize = 2;

/// Plays mono audio to the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        // Prefer mono, fall back to stereo (samples are duplicated per channel)
        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(|c| {
                c.channels() <= 2
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .min_by_key(cpal::SupportedStreamConfigRange::channels)
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Play mono samples recorded at the playback sample rate
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    pub fn play(&self, samples: Vec<f32>) -> Result<()> {
        self.play_samples_blocking(samples)
    }

    /// Play audio from MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<()> {
        let (samples, source_rate) = decode_mp3(mp3_data)?;
        self.play_samples_blocking(resample(&samples, source_rate, PLAYBACK_SAMPLE_RATE)?)
    }

    /// Play samples, blocking until the stream drains
    fn play_samples_blocking(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels);
        let sample_count = samples.len();

        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            self.device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);

                        for frame in data.chunks_mut(channels) {
                            let sample = samples.get(pos).copied().unwrap_or_else(|| {
                                finished.store(true, Ordering::Release);
                                0.0
                            });
                            frame.fill(sample);
                            pos = (pos + 1).min(samples.len());
                        }

                        position.store(pos, Ordering::Relaxed);
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        while !finished.load(Ordering::Acquire) && start.elapsed() < timeout {
            std::thread::sleep(Duration::from_millis(50));
        }

        // Let the device flush its last buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
#[allow(clippy::cast_precision_loss)]
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = PLAYBACK_SAMPLE_RATE;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or(PLAYBACK_SAMPLE_RATE);
                let channels = frame.channels.max(1);

                samples.extend(frame.data.chunks(channels).map(|chunk| {
                    let sum: f32 = chunk.iter().map(|&s| f32::from(s) / 32768.0).sum();
                    sum / chunk.len() as f32
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok((samples, sample_rate))
}

/// Resample mono audio with rubato's FFT resampler
///
/// The resampler's output delay is skipped and the tail flushed with silence,
/// so the result lines up with the input and has `len * to / from` samples.
#[allow(clippy::cast_possible_truncation)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f64>::new(
        from_rate as usize,
        to_rate as usize,
        RESAMPLE_CHUNK,
        RESAMPLE_SUB_CHUNKS,
        1,
    )
    .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let expected =
        usize::try_from(samples.len() as u64 * u64::from(to_rate) / u64::from(from_rate))
            .map_err(|e| Error::Audio(e.to_string()))?;
    let delay = resampler.output_delay();

    // Rounded to a whole number of FFT frames for this rate pair
    let chunk_in = resampler.input_frames_next();

    let mut output: Vec<f64> =
        Vec::with_capacity(expected + delay + resampler.output_frames_max());
    let mut block = vec![0.0_f64; chunk_in];

    let mut process = |frames: &[f64], output: &mut Vec<f64>| -> Result<()> {
        let result = resampler
            .process(&[frames], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
        Ok(())
    };

    for chunk in samples.chunks(chunk_in) {
        block.fill(0.0);
        for (dst, &src) in block.iter_mut().zip(chunk) {
            *dst = f64::from(src);
        }
        process(&block, &mut output)?;
    }

    // Flush the delay line
    block.fill(0.0);
    while output.len() < expected + delay {
        process(&block, &mut output)?;
    }

    Ok(output
        .into_iter()
        .skip(delay)
        .take(expected)
        .map(|s| s as f32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 24000, 24000).unwrap(), samples);
    }

    #[test]
    fn test_resample_upsample_doubles_length() {
        let samples = vec![0.25; 3000];
        let out = resample(&samples, 12000, 24000).unwrap();
        assert_eq!(out.len(), 6000);
    }

    #[test]
    fn test_resample_downsample_keeps_level() {
        let samples = vec![0.5; 4800];
        let out = resample(&samples, 48000, 24000).unwrap();
        assert_eq!(out.len(), 2400);

        // Away from the edges a constant signal stays constant
        let mid = out[1200];
        assert!((mid - 0.5).abs() < 0.05, "mid sample was {mid}");
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_resample_mp3_rate_to_playback_rate() {
        let samples: Vec<f32> = (0..22050)
            .map(|i| (i as f32 * 0.05).sin() * 0.3)
            .collect();
        let out = resample(&samples, 22050, PLAYBACK_SAMPLE_RATE).unwrap();
        assert_eq!(out.len(), 24000);
        assert!(out.iter().all(|s| s.abs() < 0.5));
    }

    #[test]
    fn test_decode_garbage_is_empty_or_error() {
        // minimp3 skips non-MP3 bytes until EOF
        match decode_mp3(b"definitely not audio") {
            Ok((samples, _)) => assert!(samples.is_empty()),
            Err(e) => assert!(matches!(e, Error::Audio(_))),
        }
    }
}
