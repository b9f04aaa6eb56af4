//! Quill - Terminal Client
//!
//! Sends one prompt to a quill daemon and prints the reply as it streams.
//!
//! # Usage
//!
//! ```bash
//! quill "What is ownership in Rust?"
//! quill --mode draft "Async Rust for web services"
//! quill --mode summarize --context-file notes.md "Summarize these notes"
//! ```
//!
//! Ctrl+C stops the generation; whatever arrived so far stays on screen.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use quill_client::{
    HttpTransport, NoticeLevel, SessionController, SessionOutcome, SessionUpdate,
};
use quill_core::{ContentMode, Sender};

/// Quill - Streaming content generation from the terminal
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the quill daemon
    #[arg(short = 's', long, env = "QUILL_SERVER", default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Content mode (chat, draft, seo, polish, summarize)
    #[arg(short = 'm', long, default_value = "chat")]
    mode: ContentMode,

    /// File whose text is sent as supporting context
    #[arg(short = 'f', long, value_name = "PATH")]
    context_file: Option<PathBuf>,

    /// Log level for stderr diagnostics
    #[arg(short = 'l', long, env = "QUILL_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// The prompt
    #[arg(required = true, num_args = 1..)]
    prompt: Vec<String>,
}

/// Initialize logging on stderr so stdout carries only generated text
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("quill={level},quill_client={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn render(update: SessionUpdate, out: &mut impl Write) -> Result<()> {
    match update {
        SessionUpdate::MessageAppended { text, .. } => {
            write!(out, "{text}")?;
            out.flush()?;
        }
        SessionUpdate::MessageAdded(message)
            if message.sender == Sender::Assistant && message.is_error =>
        {
            writeln!(out)?;
            eprintln!("{}", message.text);
        }
        SessionUpdate::Notice { level, message } => {
            let tag = match level {
                NoticeLevel::Info => "info",
                NoticeLevel::Error => "error",
            };
            eprintln!("[{tag}] {message}");
        }
        SessionUpdate::MessageAdded(_)
        | SessionUpdate::Progress { .. }
        | SessionUpdate::StateChanged { .. }
        | SessionUpdate::Cleared => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let context = match &args.context_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read context file: {}", path.display()))?,
        ),
        None => None,
    };

    let (controller, mut updates) = SessionController::new(HttpTransport::new(&args.server));
    let mut run = controller.send(args.prompt.join(" "), args.mode, context);

    let mut stdout = std::io::stdout().lock();
    let outcome = loop {
        tokio::select! {
            outcome = &mut run => break outcome.context("Read loop panicked")?,
            Some(update) = updates.recv() => render(update, &mut stdout)?,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                controller.stop();
            }
        }
    };

    while let Ok(update) = updates.try_recv() {
        render(update, &mut stdout)?;
    }
    writeln!(stdout)?;

    Ok(match outcome {
        SessionOutcome::Completed | SessionOutcome::Cancelled => ExitCode::SUCCESS,
        SessionOutcome::Failed(_) | SessionOutcome::TransportFailed(_) => ExitCode::FAILURE,
    })
}
