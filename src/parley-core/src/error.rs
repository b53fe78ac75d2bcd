//! Error types shared by the debate and voice flows.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid round count: expected {min}-{max}, got {actual}")]
    InvalidRounds { min: u32, max: u32, actual: u32 },

    #[error("chat API error: {0}")]
    OpenAi(#[from] async_openai::error::OpenAIError),

    #[error("chat endpoint error: {0}")]
    Chat(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("transcription error: {0}")]
    Stt(String),

    #[error("speech synthesis error: {0}")]
    Tts(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
