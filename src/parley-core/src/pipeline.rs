//! Voice chat pipeline coordinator.
//!
//! Wires capture, segmentation, transcription, the local chat endpoint,
//! synthesis and playback into one strictly serialized loop: exactly one
//! of listening, transcribing, awaiting-response or speaking is active at
//! a time. Frames arriving while the pipeline is not listening are never
//! enqueued, so the assistant's own speech is not fed back into the
//! recognizer.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::capture::{AudioCapture, AudioFrame, SAMPLE_RATE};
use crate::chat::{ChatBackend, OllamaBackend, sanitize_response};
use crate::config::Config;
use crate::context::ChatContext;
use crate::error::{Error, Result};
use crate::language::{Language, LanguageRegistry};
use crate::playback::AudioPlayback;
use crate::segment::SpeechSegmenter;
use crate::stt::{Transcriber, write_segment_wav};
use crate::tts::SpeechSynthesizer;

/// How long the worker waits on the frame queue before re-checking the
/// run flag and pending commands.
const QUEUE_POLL: Duration = Duration::from_millis(500);

/// Pipeline stages. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Listening,
    Transcribing,
    AwaitingResponse,
    Speaking,
}

/// Shared view of the pipeline for capture gating and display surfaces.
///
/// State is mutated only by the coordinator's transitions; everyone else
/// reads through the accessors.
pub struct PipelineStatus {
    state: Mutex<PipelineState>,
    level: AtomicU32,
    running: AtomicBool,
}

impl PipelineStatus {
    fn new() -> Self {
        Self {
            state: Mutex::new(PipelineState::Idle),
            level: AtomicU32::new(0.0_f32.to_bits()),
            running: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current input level (peak amplitude of the latest frame).
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Whether captured frames should be enqueued right now.
    pub fn accepts_input(&self) -> bool {
        self.is_running() && self.state() == PipelineState::Listening
    }

    fn set_state(&self, next: PipelineState) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tracing::debug!(from = ?*state, to = ?next, "state transition");
        *state = next;
    }

    fn set_level(&self, level: f32) {
        self.level.store(level.to_bits(), Ordering::Relaxed);
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }
}

enum PipelineCommand {
    SetLanguage(String),
    SetModel(String),
}

/// Control handle usable from other tasks while the pipeline runs.
#[derive(Clone)]
pub struct PipelineHandle {
    status: Arc<PipelineStatus>,
    commands: mpsc::UnboundedSender<PipelineCommand>,
}

impl PipelineHandle {
    pub fn state(&self) -> PipelineState {
        self.status.state()
    }

    pub fn level(&self) -> f32 {
        self.status.level()
    }

    /// Ask the worker to stop after its current stage.
    pub fn stop(&self) {
        self.status.set_running(false);
    }

    /// Switch the tutoring language. Applied between turns; resets the
    /// chat context to the new language's system prompt.
    pub fn set_language(&self, code: impl Into<String>) {
        let _ = self.commands.send(PipelineCommand::SetLanguage(code.into()));
    }

    /// Switch the local chat model. Applied between turns; rebuilds the
    /// backend and resets the chat context.
    pub fn set_model(&self, model: impl Into<String>) {
        let _ = self.commands.send(PipelineCommand::SetModel(model.into()));
    }
}

/// Events emitted as the pipeline advances.
#[derive(Debug, Clone)]
pub enum VoiceEvent {
    StateChanged(PipelineState),
    UserUtterance(String),
    AssistantReply(String),
    LanguageChanged(String),
    ModelChanged(String),
}

pub type VoiceCallback = Box<dyn Fn(VoiceEvent) + Send + Sync>;

/// The voice assistant: microphone in, spoken reply out.
pub struct VoicePipeline {
    languages: LanguageRegistry,
    language: Language,
    context: ChatContext,
    chat: Box<dyn ChatBackend>,
    chat_url: String,
    transcriber: Transcriber,
    synthesizer: SpeechSynthesizer,
    playback: AudioPlayback,
    segmenter: SpeechSegmenter,
    settle_delay: Duration,
    status: Arc<PipelineStatus>,
    command_tx: mpsc::UnboundedSender<PipelineCommand>,
    command_rx: mpsc::UnboundedReceiver<PipelineCommand>,
    callback: Option<VoiceCallback>,
}

impl VoicePipeline {
    /// Build the pipeline from configuration. Initializes the synthesis
    /// engine and opens no audio device yet; capture starts in [`run`].
    ///
    /// [`run`]: VoicePipeline::run
    pub async fn new(config: &Config) -> Result<Self> {
        let languages = LanguageRegistry::new(config.languages.clone());
        let language = languages
            .get(&config.voice.default_language)
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown language '{}'",
                    config.voice.default_language
                ))
            })?
            .clone();

        let context = ChatContext::new(language.system_prompt.clone());
        let chat: Box<dyn ChatBackend> = Box::new(OllamaBackend::new(
            config.chat.url.clone(),
            config.chat.model.clone(),
        ));
        let transcriber = Transcriber::new(
            config.transcription.url.clone(),
            config.transcription.model.clone(),
            config.transcription.api_key.clone(),
        );
        let synthesizer = SpeechSynthesizer::new(config.voice.speech_rate).await?;
        synthesizer.validate_voice(&language.voice)?;
        let playback = AudioPlayback::new()?;
        let segmenter = SpeechSegmenter::new(config.segmenter.clone());

        let (command_tx, command_rx) = mpsc::unbounded_channel();

        Ok(Self {
            languages,
            language,
            context,
            chat,
            chat_url: config.chat.url.clone(),
            transcriber,
            synthesizer,
            playback,
            segmenter,
            settle_delay: Duration::from_millis(config.voice.settle_delay_ms),
            status: Arc::new(PipelineStatus::new()),
            command_tx,
            command_rx,
            callback: None,
        })
    }

    /// Set a callback for pipeline events.
    pub fn with_callback(mut self, callback: VoiceCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            status: Arc::clone(&self.status),
            commands: self.command_tx.clone(),
        }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Run until stopped via [`PipelineHandle::stop`].
    pub async fn run(&mut self) -> Result<()> {
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<AudioFrame>();
        let gate = Arc::clone(&self.status);

        let mut capture = AudioCapture::new()?;
        self.status.set_running(true);
        capture.start(move |frame| {
            gate.set_level(frame.volume);
            if gate.accepts_input() {
                // The receiver outliving this send is not interesting;
                // frames after shutdown are dropped either way.
                let _ = frame_tx.send(frame);
            }
        })?;
        self.transition(PipelineState::Listening);
        tracing::info!(language = %self.language.name, "voice pipeline listening");

        while self.status.is_running() {
            self.apply_pending_commands();

            let received = tokio::time::timeout(QUEUE_POLL, frame_rx.recv()).await;
            match received {
                Ok(Some(frame)) => {
                    if let Some(samples) = self.segmenter.push(&frame) {
                        self.run_turn(samples, &mut frame_rx).await;
                    }
                }
                Ok(None) => break,
                Err(_) => continue, // queue empty, poll again
            }
        }

        capture.stop();
        self.status.set_level(0.0);
        self.status.set_running(false);
        self.transition(PipelineState::Idle);
        tracing::info!("voice pipeline stopped");
        Ok(())
    }

    /// One full turn: transcribe the segment, ask the model, speak the
    /// reply. Any stage failing returns the pipeline to listening with
    /// the turn skipped.
    async fn run_turn(
        &mut self,
        samples: Vec<f32>,
        frames: &mut mpsc::UnboundedReceiver<AudioFrame>,
    ) {
        self.transition(PipelineState::Transcribing);
        drain_frames(frames);

        let transcript = match self.transcribe(samples).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "transcription failed, skipping turn");
                self.back_to_listening(frames);
                return;
            }
        };
        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            tracing::debug!("empty transcript, skipping turn");
            self.back_to_listening(frames);
            return;
        }

        tracing::info!(user = %transcript, "utterance transcribed");
        self.emit(VoiceEvent::UserUtterance(transcript.clone()));
        self.context.push_user(transcript);

        self.transition(PipelineState::AwaitingResponse);
        let reply = match self.chat.complete(self.context.messages()).await {
            Ok(text) => sanitize_response(&text),
            Err(err) => {
                tracing::warn!(error = %err, "chat endpoint returned no usable reply");
                self.context.rollback_user();
                self.back_to_listening(frames);
                return;
            }
        };
        if reply.is_empty() {
            tracing::warn!("chat endpoint returned an empty reply");
            self.context.rollback_user();
            self.back_to_listening(frames);
            return;
        }

        self.context.push_assistant(reply.clone());
        tracing::info!(assistant = %reply, "reply received");
        self.emit(VoiceEvent::AssistantReply(reply.clone()));

        self.transition(PipelineState::Speaking);
        if let Err(err) = self.speak(&reply).await {
            tracing::warn!(error = %err, "failed to speak reply");
        }
        // Settle before capture resumes so the reply's tail is not
        // picked up as a new utterance.
        tokio::time::sleep(self.settle_delay).await;

        self.back_to_listening(frames);
    }

    async fn transcribe(&self, samples: Vec<f32>) -> Result<String> {
        let wav = write_segment_wav(&samples, SAMPLE_RATE)?;
        self.transcriber
            .transcribe(wav.path(), &self.language.code)
            .await
        // wav drops here, removing the temp file
    }

    async fn speak(&mut self, text: &str) -> Result<()> {
        let samples = self.synthesizer.synthesize(text, &self.language.voice)?;
        self.playback.play(samples).await
    }

    fn back_to_listening(&mut self, frames: &mut mpsc::UnboundedReceiver<AudioFrame>) {
        drain_frames(frames);
        self.segmenter.reset();
        self.transition(PipelineState::Listening);
    }

    /// Apply queued language/model switches. Only called while
    /// listening, between turns, so a switch can never land between a
    /// user entry and its reply.
    fn apply_pending_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                PipelineCommand::SetLanguage(code) => match self.languages.get(&code) {
                    Some(language) => {
                        self.language = language.clone();
                        self.context.reset(self.language.system_prompt.clone());
                        tracing::info!(language = %self.language.name, "language changed");
                        self.emit(VoiceEvent::LanguageChanged(code));
                    }
                    None => tracing::warn!(code, "ignoring switch to unknown language"),
                },
                PipelineCommand::SetModel(model) => {
                    self.chat = Box::new(OllamaBackend::new(self.chat_url.clone(), model.clone()));
                    self.context.reset(self.language.system_prompt.clone());
                    tracing::info!(model, "model changed");
                    self.emit(VoiceEvent::ModelChanged(model));
                }
            }
        }
    }

    fn transition(&self, next: PipelineState) {
        self.status.set_state(next);
        self.emit(VoiceEvent::StateChanged(next));
    }

    fn emit(&self, event: VoiceEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

fn drain_frames(frames: &mut mpsc::UnboundedReceiver<AudioFrame>) {
    while frames.try_recv().is_ok() {}
}
