//! Volume-gated speech segmentation.
//!
//! Decides when a complete utterance has been spoken by comparing each
//! frame's peak volume against a silence threshold and tracking how much
//! speech and trailing silence have accumulated. The utterance ends only
//! after a sustained pause, so natural mid-sentence pauses do not cut a
//! segment short.

use serde::Deserialize;

use crate::capture::{AudioFrame, SAMPLE_RATE};

/// Tunables for the segmenter. Durations are in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Volume floor below which a frame counts as silence.
    pub silence_threshold: f32,
    /// Minimum voiced duration before a segment may flush.
    pub min_speech_secs: f32,
    /// Trailing silence required to end an utterance.
    pub min_silence_secs: f32,
    /// Accumulated time required before speech counts as started, so
    /// leading noise does not flag speech prematurely.
    pub pre_speech_buffer_secs: f32,
    /// Upper bound on buffered duration. Without it a segment that never
    /// crosses the threshold would grow until recording stops.
    pub max_segment_secs: f32,
    pub sample_rate: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.015,
            min_speech_secs: 0.3,
            min_silence_secs: 0.8,
            pre_speech_buffer_secs: 0.5,
            max_segment_secs: 30.0,
            sample_rate: SAMPLE_RATE,
        }
    }
}

/// Accumulates frames into one speech segment at a time.
pub struct SpeechSegmenter {
    config: SegmenterConfig,
    samples: Vec<f32>,
    total_secs: f32,
    speech_secs: f32,
    silence_secs: f32,
    speech_started: bool,
}

impl SpeechSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            samples: Vec::new(),
            total_secs: 0.0,
            speech_secs: 0.0,
            silence_secs: 0.0,
            speech_started: false,
        }
    }

    /// Feed one frame. Returns the buffered samples when the segment is
    /// complete; all counters are reset afterwards.
    pub fn push(&mut self, frame: &AudioFrame) -> Option<Vec<f32>> {
        let frame_secs = frame.samples.len() as f32 / self.config.sample_rate as f32;
        self.total_secs += frame_secs;

        if frame.volume > self.config.silence_threshold {
            if !self.speech_started && self.total_secs >= self.config.pre_speech_buffer_secs {
                self.speech_started = true;
                tracing::trace!(total_secs = self.total_secs, "speech started");
            }
            if self.speech_started {
                self.speech_secs += frame_secs;
                self.silence_secs = 0.0;
            }
        } else if self.speech_started {
            self.silence_secs += frame_secs;
        }

        self.samples.extend_from_slice(&frame.samples);

        if self.speech_started
            && self.speech_secs >= self.config.min_speech_secs
            && self.silence_secs >= self.config.min_silence_secs
        {
            tracing::debug!(
                speech_secs = self.speech_secs,
                total_secs = self.total_secs,
                "utterance complete"
            );
            return Some(self.take());
        }

        if self.total_secs >= self.config.max_segment_secs {
            if self.speech_started {
                tracing::debug!(total_secs = self.total_secs, "length bound reached, flushing");
                return Some(self.take());
            }
            tracing::trace!(total_secs = self.total_secs, "discarding sub-threshold buffer");
            self.reset();
        }

        None
    }

    /// Discard the buffer and zero all counters.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.total_secs = 0.0;
        self.speech_secs = 0.0;
        self.silence_secs = 0.0;
        self.speech_started = false;
    }

    pub fn speech_started(&self) -> bool {
        self.speech_started
    }

    fn take(&mut self) -> Vec<f32> {
        let samples = std::mem::take(&mut self.samples);
        self.reset();
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_SECS: f32 = 0.1;

    fn config() -> SegmenterConfig {
        SegmenterConfig::default()
    }

    fn frame(volume: f32) -> AudioFrame {
        let n = (FRAME_SECS * SAMPLE_RATE as f32) as usize;
        AudioFrame {
            samples: vec![volume; n],
            volume,
        }
    }

    fn quiet() -> AudioFrame {
        frame(0.001)
    }

    fn voiced() -> AudioFrame {
        frame(0.2)
    }

    #[test]
    fn sub_threshold_audio_never_flushes() {
        let mut segmenter = SpeechSegmenter::new(config());
        // One minute of near-silence: no flush, buffer stays bounded.
        for _ in 0..600 {
            assert!(segmenter.push(&quiet()).is_none());
        }
        assert!(!segmenter.speech_started());
        assert!(segmenter.samples.len() as f32 <= 30.0 * SAMPLE_RATE as f32);
    }

    #[test]
    fn speech_does_not_start_before_pre_buffer() {
        let mut segmenter = SpeechSegmenter::new(config());
        // Voiced from the very first frame: with 0.1s frames, the pre-speech
        // buffer (0.5s) is reached on the fifth frame.
        for _ in 0..4 {
            segmenter.push(&voiced());
            assert!(!segmenter.speech_started());
        }
        segmenter.push(&voiced());
        assert!(segmenter.speech_started());
    }

    #[test]
    fn flush_happens_exactly_when_trailing_silence_crosses_threshold() {
        let mut segmenter = SpeechSegmenter::new(config());
        // 0.5s of leading quiet satisfies the pre-speech buffer.
        for _ in 0..5 {
            assert!(segmenter.push(&quiet()).is_none());
        }
        // 0.4s of speech, above the 0.3s minimum.
        for _ in 0..4 {
            assert!(segmenter.push(&voiced()).is_none());
        }
        // Silence: no flush until the cumulative pause reaches 0.8s.
        for _ in 0..7 {
            assert!(segmenter.push(&quiet()).is_none());
        }
        let flushed = segmenter.push(&quiet()).expect("segment should flush");

        // The flush carries everything buffered: 0.5 + 0.4 + 0.8 seconds.
        let expected = (1.7 * SAMPLE_RATE as f32) as usize;
        assert_eq!(flushed.len(), expected);

        // Counters are exactly zero afterwards.
        assert!(segmenter.samples.is_empty());
        assert_eq!(segmenter.total_secs, 0.0);
        assert_eq!(segmenter.speech_secs, 0.0);
        assert_eq!(segmenter.silence_secs, 0.0);
        assert!(!segmenter.speech_started());

        // And only one flush occurs: further silence does nothing.
        for _ in 0..20 {
            assert!(segmenter.push(&quiet()).is_none());
        }
    }

    #[test]
    fn mid_utterance_pause_does_not_cut_segment() {
        let mut segmenter = SpeechSegmenter::new(config());
        for _ in 0..5 {
            segmenter.push(&quiet());
        }
        for _ in 0..4 {
            segmenter.push(&voiced());
        }
        // 0.5s pause, under the 0.8s minimum: speech resumes, silence resets.
        for _ in 0..5 {
            assert!(segmenter.push(&quiet()).is_none());
        }
        assert!(segmenter.push(&voiced()).is_none());
        assert_eq!(segmenter.silence_secs, 0.0);
    }

    #[test]
    fn short_blip_followed_by_silence_still_flushes() {
        // No minimum-segment-drop policy: a blip that satisfies the speech
        // minimum flushes whatever transcription it will yield.
        let mut segmenter = SpeechSegmenter::new(config());
        for _ in 0..5 {
            segmenter.push(&quiet());
        }
        for _ in 0..3 {
            segmenter.push(&voiced());
        }
        let mut flushed = None;
        for _ in 0..10 {
            flushed = segmenter.push(&quiet());
            if flushed.is_some() {
                break;
            }
        }
        assert!(flushed.is_some());
    }

    #[test]
    fn length_bound_discards_sub_threshold_buffer() {
        let mut config = config();
        config.max_segment_secs = 1.0;
        let mut segmenter = SpeechSegmenter::new(config);
        for _ in 0..10 {
            assert!(segmenter.push(&quiet()).is_none());
        }
        assert!(segmenter.samples.is_empty());
        assert_eq!(segmenter.total_secs, 0.0);
    }

    #[test]
    fn length_bound_flushes_started_speech() {
        let mut config = config();
        config.max_segment_secs = 1.0;
        config.min_silence_secs = 5.0; // never reached
        let mut segmenter = SpeechSegmenter::new(config);
        let mut flushed = None;
        for _ in 0..10 {
            flushed = segmenter.push(&voiced());
            if flushed.is_some() {
                break;
            }
        }
        let flushed = flushed.expect("bound should force a flush");
        assert_eq!(flushed.len(), SAMPLE_RATE as usize);
    }
}
