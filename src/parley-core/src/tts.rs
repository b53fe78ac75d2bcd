//! Speech synthesis using kokoro-tiny.

use kokoro_tiny::TtsEngine;

use crate::error::{Error, Result};

/// Sample rate of the synthesized audio.
pub const SYNTH_SAMPLE_RATE: u32 = 24000;

/// Kokoro has a strict limit on input length, so text is synthesized in
/// sentence-bounded chunks.
const MAX_CHUNK_CHARS: usize = 200;
/// 0.3 s pause between chunks so sentence boundaries are not clipped.
const CHUNK_GAP_SAMPLES: usize = 7200;
/// 0.5 s trailing padding so the final word is not cut off.
const TRAILING_PAD_SAMPLES: usize = 12000;

/// Synthesizes replies into raw f32 samples.
pub struct SpeechSynthesizer {
    engine: TtsEngine,
    available_voices: Vec<String>,
    rate: f32,
}

impl SpeechSynthesizer {
    /// Initialize the engine (downloads the model on first run).
    ///
    /// `rate` adjusts playback speed: 1.0 is natural, lower is slower.
    pub async fn new(rate: f32) -> Result<Self> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| Error::Tts(format!("failed to initialize engine: {e}")))?;
        let available_voices = engine.voices();

        Ok(Self {
            engine,
            available_voices,
            rate,
        })
    }

    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    pub fn validate_voice(&self, voice_id: &str) -> Result<()> {
        if voice_id.is_empty() || !self.available_voices.contains(&voice_id.to_string()) {
            return Err(Error::Tts(format!(
                "unknown voice '{}'; available: {}",
                voice_id,
                self.available_voices.join(", ")
            )));
        }
        Ok(())
    }

    /// Synthesize text with the given voice, chunking long input.
    pub fn synthesize(&mut self, text: &str, voice_id: &str) -> Result<Vec<f32>> {
        self.validate_voice(voice_id)?;

        let mut all_samples = Vec::new();
        for chunk in split_into_chunks(text, MAX_CHUNK_CHARS) {
            if chunk.trim().is_empty() {
                continue;
            }

            let samples = self
                .engine
                .synthesize(&chunk, Some(voice_id))
                .map_err(|e| Error::Tts(format!("synthesis failed: {e}")))?;
            all_samples.extend(samples);
            all_samples.extend(vec![0.0; CHUNK_GAP_SAMPLES]);
        }
        all_samples.extend(vec![0.0; TRAILING_PAD_SAMPLES]);

        Ok(adjust_speed(all_samples, self.rate))
    }
}

/// Split text into synthesis-safe chunks at sentence boundaries, falling
/// back to comma boundaries for oversized sentences.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.is_empty() {
                chunks.push(current_chunk.trim().to_string());
                current_chunk = String::new();
            }

            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars
                        && !current_chunk.is_empty()
                    {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk = String::new();
                    }
                    current_chunk.push_str(part);
                    current_chunk.push(' ');
                }
            } else {
                current_chunk.push_str(sentence);
                current_chunk.push(' ');
            }
        } else {
            current_chunk.push_str(sentence);
            current_chunk.push(' ');
        }
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}

/// Adjust playback speed using linear interpolation.
/// Rate < 1.0 is slower, rate > 1.0 is faster.
fn adjust_speed(samples: Vec<f32>, rate: f32) -> Vec<f32> {
    if (rate - 1.0).abs() < 0.001 {
        return samples;
    }

    let new_len = (samples.len() as f32 / rate) as usize;
    let mut result = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f32 * rate;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f32;

        if src_idx + 1 < samples.len() {
            let sample = samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac;
            result.push(sample);
        } else if src_idx < samples.len() {
            result.push(samples[src_idx]);
        }
    }

    result
}
