//! Configuration module for loading TOML config files.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::language::{self, Language};
use crate::segment::SegmenterConfig;

/// Root configuration for the voice assistant.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default)]
    pub transcription: TranscriptionSettings,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub voice: VoiceSettings,
    #[serde(default = "language::builtin")]
    pub languages: HashMap<String, Language>,
}

/// Local chat completion endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub url: String,
    pub model: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/chat".to_string(),
            model: "llama3.1".to_string(),
        }
    }
}

/// Transcription endpoint (OpenAI-compatible `audio/transcriptions`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/v1/audio/transcriptions".to_string(),
            model: "whisper-1".to_string(),
            api_key: None,
        }
    }
}

/// Pipeline-level settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub default_language: String,
    /// Pause after playback before capture resumes, so the tail of the
    /// synthesized reply is not recorded.
    pub settle_delay_ms: u64,
    /// Playback speed for synthesized replies (1.0 = natural).
    pub speech_rate: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            settle_delay_ms: 500,
            speech_rate: 1.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chat: ChatSettings::default(),
            transcription: TranscriptionSettings::default(),
            segmenter: SegmenterConfig::default(),
            voice: VoiceSettings::default(),
            languages: language::builtin(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML content.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.chat.url, "http://localhost:11434/api/chat");
        assert_eq!(config.chat.model, "llama3.1");
        assert_eq!(config.segmenter.silence_threshold, 0.015);
        assert_eq!(config.segmenter.min_speech_secs, 0.3);
        assert_eq!(config.segmenter.min_silence_secs, 0.8);
        assert_eq!(config.segmenter.pre_speech_buffer_secs, 0.5);
        assert_eq!(config.voice.default_language, "en");
        assert_eq!(config.voice.settle_delay_ms, 500);
        assert_eq!(config.languages.len(), 3);
    }

    #[test]
    fn sections_override_defaults() {
        let toml = r#"
            [chat]
            model = "deepseek-r1"

            [segmenter]
            silence_threshold = 0.02
            min_silence_secs = 1.2

            [voice]
            default_language = "de"
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.chat.model, "deepseek-r1");
        assert_eq!(config.chat.url, "http://localhost:11434/api/chat");
        assert_eq!(config.segmenter.silence_threshold, 0.02);
        assert_eq!(config.segmenter.min_silence_secs, 1.2);
        assert_eq!(config.segmenter.min_speech_secs, 0.3);
        assert_eq!(config.voice.default_language, "de");
    }

    #[test]
    fn custom_language_section_parses() {
        let toml = r#"
            [languages.fr]
            name = "Français"
            system_prompt = "Tu es un professeur de français."
            voice = "af_sky"
        "#;
        let config = Config::from_toml(toml).unwrap();
        // An explicit languages table replaces the built-in set.
        assert_eq!(config.languages.len(), 1);
        assert_eq!(config.languages["fr"].name, "Français");
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let result = Config::from_toml("not valid = = toml");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
