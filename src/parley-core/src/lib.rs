//! Parley Core Library
//!
//! Provides the two conversation flows: a turn-based debate orchestrator
//! relaying between two hosted chat endpoints, and a voice chat pipeline
//! that listens, transcribes, asks a local model and speaks the reply.

pub mod capture;
pub mod chat;
pub mod config;
pub mod context;
pub mod debate;
pub mod error;
pub mod language;
pub mod pipeline;
pub mod playback;
pub mod segment;
pub mod stt;
pub mod tts;

pub use chat::{ChatBackend, OllamaBackend, OpenAiBackend};
pub use config::Config;
pub use context::{ChatContext, ChatMessage, Role};
pub use debate::{
    DebateConfig, DebateEvent, DebateOrchestrator, Debater, FailurePolicy, TranscriptEntry,
};
pub use error::{Error, Result};
pub use pipeline::{PipelineHandle, PipelineState, VoiceEvent, VoicePipeline};
