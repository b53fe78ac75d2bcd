//! Speech-to-text over an HTTP transcription endpoint.
//!
//! The hand-off is file based: the captured segment is written to a
//! temporary WAV file whose lifetime covers the request, then posted as
//! multipart form data to an OpenAI-compatible `audio/transcriptions`
//! endpoint (a local whisper server works the same way).

use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Client for the transcription endpoint.
pub struct Transcriber {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl Transcriber {
    pub fn new(url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            model: model.into(),
            api_key,
        }
    }

    /// Transcribe a WAV file in the given language.
    pub async fn transcribe(&self, wav_path: &Path, language: &str) -> Result<String> {
        let audio = tokio::fs::read(wav_path).await?;
        tracing::debug!(bytes = audio.len(), language, "transcribing segment");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("segment.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", language.to_string());

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!(
                "transcription endpoint error {status}: {body}"
            )));
        }

        let result: TranscriptionResponse = response.json().await?;
        tracing::debug!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

/// Write a captured segment to a temporary 16-bit mono WAV file.
///
/// The file is deleted when the returned handle drops, which scopes the
/// temp file to the transcription call.
pub fn write_segment_wav(samples: &[f32], sample_rate: u32) -> Result<NamedTempFile> {
    let file = NamedTempFile::new()?;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(file.path(), spec).map_err(|e| Error::Audio(e.to_string()))?;
    for &sample in samples {
        let sample = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(sample)
            .map_err(|e| Error::Audio(e.to_string()))?;
    }
    writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;

    Ok(file)
}
