//! Parley CLI
//!
//! Two independent conversational tools behind one binary: `parley
//! debate` relays a turn-based argument between two hosted chat
//! endpoints, and `parley voice` runs the local voice chat assistant.

use std::env;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use parley_core::{
    Config, DebateConfig, DebateEvent, DebateOrchestrator, Debater, FailurePolicy, OpenAiBackend,
    VoiceEvent, VoicePipeline,
};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a sharp debater. You disagree with your opponent's \
    position, question their claims directly, and bring new concrete arguments every turn. Stay \
    in character and keep each reply under 150 words.";

#[derive(Parser)]
#[command(
    name = "parley",
    version,
    about = "AI debates between hosted models, and a local voice chat assistant"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a turn-based debate between two chat endpoints
    Debate(DebateArgs),
    /// Run the voice chat assistant against a local model
    Voice(VoiceArgs),
}

#[derive(Args)]
struct DebateArgs {
    /// Opening statement for the first speaker
    #[arg(long, value_name = "TEXT")]
    first_opening: String,

    /// Opening statement for the second speaker
    #[arg(long, value_name = "TEXT")]
    second_opening: String,

    /// Display name for the first speaker
    #[arg(long, default_value = "GPT")]
    first_name: String,

    /// Display name for the second speaker
    #[arg(long, default_value = "DeepSeek")]
    second_name: String,

    /// Model for the first speaker
    #[arg(long, default_value = "gpt-4o-mini")]
    first_model: String,

    /// Model for the second speaker
    #[arg(long, default_value = "deepseek-chat")]
    second_model: String,

    /// API base URL for the first speaker
    #[arg(long, default_value = "https://api.openai.com/v1")]
    first_api_base: String,

    /// API base URL for the second speaker
    #[arg(long, default_value = "https://api.deepseek.com/v1")]
    second_api_base: String,

    /// System prompt for the first speaker
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    first_system: String,

    /// System prompt for the second speaker
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    second_system: String,

    /// Number of rounds after the opening statements (1-20)
    #[arg(short, long, default_value = "5")]
    rounds: u32,

    /// What to do when an endpoint call fails
    #[arg(long, value_enum, default_value = "abort")]
    on_error: OnError,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum OnError {
    /// Stop the debate with an error
    Abort,
    /// Record the failure as the turn's text and keep going
    Continue,
}

#[derive(Args)]
struct VoiceArgs {
    /// Path to a TOML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Language code (en, de, zh, or one defined in the config)
    #[arg(short, long)]
    language: Option<String>,

    /// Model served by the local chat endpoint
    #[arg(short, long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Debate(args) => run_debate(args).await,
        Command::Voice(args) => run_voice(args).await,
    }
}

async fn run_debate(args: DebateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let first_key = api_key_from_env("PARLEY_FIRST_API_KEY", "OPENAI_API_KEY", &args.first_name);
    let second_key =
        api_key_from_env("PARLEY_SECOND_API_KEY", "DEEPSEEK_API_KEY", &args.second_name);

    let first = Debater::new(
        &args.first_name,
        &args.first_system,
        Box::new(OpenAiBackend::new(
            &args.first_api_base,
            first_key,
            &args.first_model,
        )),
    );
    let second = Debater::new(
        &args.second_name,
        &args.second_system,
        Box::new(OpenAiBackend::new(
            &args.second_api_base,
            second_key,
            &args.second_model,
        )),
    );

    let config = DebateConfig {
        rounds: args.rounds,
        on_failure: match args.on_error {
            OnError::Abort => FailurePolicy::Abort,
            OnError::Continue => FailurePolicy::Continue,
        },
    };

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Parley - AI Debate".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{}", "Participants:".bold());
    println!(
        "  1. {} - using {}",
        args.first_name.bright_cyan(),
        args.first_model.dimmed()
    );
    println!(
        "  2. {} - using {}",
        args.second_name.bright_cyan(),
        args.second_model.dimmed()
    );
    println!();
    println!("{}", "─".repeat(70).dimmed());
    println!();

    let mut orchestrator = DebateOrchestrator::new(
        first,
        second,
        args.first_opening,
        args.second_opening,
        config,
    )?
    .with_callback(create_console_callback());

    orchestrator.run().await?;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Debate concluded.".bright_green().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    Ok(())
}

async fn run_voice(args: VoiceArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("parley_core=info")),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(language) = args.language {
        config.voice.default_language = language;
    }
    if let Some(model) = args.model {
        config.chat.model = model;
    }

    let mut pipeline = VoicePipeline::new(&config)
        .await?
        .with_callback(create_voice_callback());
    let handle = pipeline.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    println!();
    println!(
        "{} {}",
        "Voice chat assistant ready.".bright_green().bold(),
        format!(
            "(language: {}, model: {})",
            pipeline.language().name,
            config.chat.model
        )
        .dimmed()
    );
    println!("{}", "Speak into the microphone; Ctrl-C stops.".dimmed());
    println!();

    pipeline.run().await?;
    Ok(())
}

fn api_key_from_env(primary: &str, fallback: &str, speaker: &str) -> String {
    env::var(primary)
        .or_else(|_| env::var(fallback))
        .unwrap_or_else(|_| {
            eprintln!(
                "{}",
                format!(
                    "Warning: neither {primary} nor {fallback} is set; calls for {speaker} may fail."
                )
                .yellow()
            );
            String::new()
        })
}

/// Create a callback that prints debate events to the console.
fn create_console_callback() -> Box<dyn Fn(DebateEvent) + Send + Sync> {
    Box::new(move |event| match event {
        DebateEvent::RoundStart { round } => {
            println!();
            println!(
                "{}",
                format!("  ── Round {round} ──").bright_magenta().bold()
            );
            println!();
        }
        DebateEvent::Statement { speaker, content } => {
            println!("{} {}", "▶".bright_cyan(), speaker.bright_cyan().bold());
            for line in textwrap(&content, 66).lines() {
                println!("  {line}");
            }
            println!();
        }
        DebateEvent::Finished => {
            // Closing banner is printed in run_debate
        }
    })
}

/// Create a callback that prints the voice conversation to the console.
fn create_voice_callback() -> Box<dyn Fn(VoiceEvent) + Send + Sync> {
    Box::new(move |event| match event {
        VoiceEvent::UserUtterance(text) => {
            println!("{} {}", "You:".bright_cyan().bold(), text);
        }
        VoiceEvent::AssistantReply(text) => {
            println!("{} {}", "Assistant:".bright_yellow().bold(), text);
        }
        VoiceEvent::LanguageChanged(code) => {
            println!("{}", format!("[language: {code}]").dimmed());
        }
        VoiceEvent::ModelChanged(model) => {
            println!("{}", format!("[model: {model}]").dimmed());
        }
        VoiceEvent::StateChanged(_) => {
            // State is surfaced via logging; the transcript stays clean.
        }
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
