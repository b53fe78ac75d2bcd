//! Audio playback to the default output device.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::error::{Error, Result};
use crate::tts::SYNTH_SAMPLE_RATE;

struct PlaybackCursor {
    samples: Vec<f32>,
    position: Mutex<usize>,
    finished: AtomicBool,
}

/// Plays synthesized audio to completion before returning.
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SYNTH_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SYNTH_SAMPLE_RATE)
            })
            .or_else(|| {
                // Some devices only expose stereo configs.
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(SYNTH_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(SYNTH_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SYNTH_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SYNTH_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Play samples and block until the stream has drained them.
    #[allow(clippy::unused_async)]
    pub async fn play(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = self.config.channels as usize;
        let sample_count = samples.len();
        let cursor = Arc::new(PlaybackCursor {
            samples,
            position: Mutex::new(0),
            finished: AtomicBool::new(false),
        });
        let stream_cursor = Arc::clone(&cursor);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut position) = stream_cursor.position.lock() else {
                        return;
                    };
                    for frame in data.chunks_mut(channels) {
                        let sample = if *position < stream_cursor.samples.len() {
                            let sample = stream_cursor.samples[*position];
                            *position += 1;
                            sample
                        } else {
                            stream_cursor.finished.store(true, Ordering::Relaxed);
                            0.0
                        };
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Wait for the stream to report completion, with a deadline
        // derived from the sample count in case the device stalls.
        let duration_ms = sample_count as u64 * 1000 / u64::from(SYNTH_SAMPLE_RATE);
        let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);
        while !cursor.finished.load(Ordering::Relaxed) {
            if Instant::now() > deadline {
                tracing::warn!("playback deadline reached before stream finished");
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");
        Ok(())
    }
}
