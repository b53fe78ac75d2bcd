//! Microphone capture.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::error::{Error, Result};

/// Sample rate for capture (16 kHz mono, what speech models expect).
pub const SAMPLE_RATE: u32 = 16000;

/// One block of captured audio with its peak level.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub volume: f32,
}

/// Captures audio from the default input device and hands each block to
/// a caller-supplied hook. The hook runs on the audio thread and must
/// never block.
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioCapture {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable input config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    /// Start capturing. Device errors are reported and capture continues.
    pub fn start<F>(&mut self, mut on_frame: F) -> Result<()>
    where
        F: FnMut(AudioFrame) + Send + 'static,
    {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    on_frame(AudioFrame {
                        samples: data.to_vec(),
                        volume: peak_volume(data),
                    });
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing and tear down the stream.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

/// Peak absolute amplitude of a block of samples.
pub fn peak_volume(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |max, s| max.max(s.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_volume_of_silence_is_zero() {
        assert_eq!(peak_volume(&[0.0; 160]), 0.0);
        assert_eq!(peak_volume(&[]), 0.0);
    }

    #[test]
    fn peak_volume_picks_largest_magnitude() {
        assert_eq!(peak_volume(&[0.1, -0.7, 0.3]), 0.7);
    }
}
