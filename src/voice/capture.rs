//! Microphone input
//!
//! The device is chosen once; each utterance gets its own [`Recording`], and
//! dropping the recording closes the stream so playback is never captured.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig, SupportedStreamConfigRange};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// The default input device, configured for 16 kHz capture
pub struct InputDevice {
    device: Device,
    config: StreamConfig,
}

impl InputDevice {
    /// Open the default input device
    ///
    /// Mono is preferred; stereo devices are downmixed while recording.
    ///
    /// # Errors
    ///
    /// Returns error if there is no input device or none supports 16 kHz
    pub fn open_default() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let rate = SampleRate(SAMPLE_RATE);
        let usable = |c: &SupportedStreamConfigRange| {
            c.channels() <= 2 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
        };

        let config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(usable)
            .min_by_key(SupportedStreamConfigRange::channels)
            .ok_or_else(|| Error::Audio("microphone does not support 16 kHz capture".to_string()))?
            .with_sample_rate(rate)
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "input device ready"
        );

        Ok(Self { device, config })
    }

    /// Start a recording into a fresh buffer
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be started
    pub fn record(&self) -> Result<Recording> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let channels = usize::from(self.config.channels);

        let sink = Arc::clone(&buffer);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = sink.lock() {
                        downmix_into(&mut buf, data, channels);
                    }
                },
                |err| tracing::error!(error = %err, "audio capture error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        Ok(Recording {
            _stream: stream,
            buffer,
        })
    }
}

/// A live microphone stream; stops when dropped
pub struct Recording {
    _stream: Stream,
    buffer: Arc<Mutex<Vec<f32>>>,
}

impl Recording {
    /// Take the mono samples captured since the last call
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }
}

/// Append interleaved `data` to `out` as mono samples
fn downmix_into(out: &mut Vec<f32>, data: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(data);
        return;
    }

    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / channels as f32;
    out.extend(
        data.chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}
