//! Speech output demo CLI.
//!
//! Drives a synthetic engine into a logging playout so the speech output
//! lifecycle (play, stream, barge-in) can be watched from the terminal.

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use giztoy_speechout::{OutputConfig, SpeechOutput, SpeechSource};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod engine;
mod playout;

use engine::SilentEngine;
use playout::LogPlayout;

/// Speech output demo.
///
/// Every word becomes one frame of silence, 10ms per character. Run with
/// `-v` to see each frame as it is synthesized and played.
#[derive(Parser)]
#[command(name = "speechout")]
#[command(about = "Speech output demo CLI")]
#[command(version)]
pub struct Cli {
    /// Config file (YAML)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Synthesis latency per word, in milliseconds
    #[arg(long, global = true, default_value_t = 5)]
    pub frame_delay_ms: u64,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize and play a whole string
    Say {
        text: String,
    },
    /// Feed the text word by word, as an LLM would
    Stream {
        text: String,
        /// Delay between chunks, in milliseconds
        #[arg(long, default_value_t = 50)]
        chunk_delay_ms: u64,
    },
    /// Start one utterance, then interrupt it with another
    Barge {
        first: String,
        second: String,
        /// Time before the second utterance cuts in, in milliseconds
        #[arg(long, default_value_t = 100)]
        after_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => OutputConfig::load(path).with_context(|| format!("load config {path}"))?,
        None => OutputConfig::default(),
    };

    let engine = Arc::new(SilentEngine {
        frame_delay: Duration::from_millis(cli.frame_delay_ms),
    });
    let playout = Arc::new(LogPlayout::default());
    let output = SpeechOutput::with_config(engine, playout.clone(), config);

    match &cli.command {
        Commands::Say { text } => {
            let handle = output.synthesize("say", text.as_str())?;
            handle.play()?;
            handle.wait().await?;
        }
        Commands::Stream {
            text,
            chunk_delay_ms,
        } => {
            let delay = Duration::from_millis(*chunk_delay_ms);
            let words: Vec<String> = text.split_whitespace().map(String::from).collect();
            let chunks = futures::stream::iter(words).then(move |word| async move {
                tokio::time::sleep(delay).await;
                word
            });
            let handle = output.synthesize("stream", SpeechSource::stream(chunks))?;
            handle.play()?;
            handle.wait().await?;
        }
        Commands::Barge {
            first,
            second,
            after_ms,
        } => {
            let handle = output.synthesize("first", first.as_str())?;
            handle.play()?;
            tokio::time::sleep(Duration::from_millis(*after_ms)).await;

            info!(speech_id = "first", done = handle.is_done(), "barge-in");
            handle.interrupt();
            let next = output.synthesize("second", second.as_str())?;
            next.play()?;

            // The interrupted utterance resolves as a clean unwind.
            handle.wait().await?;
            next.wait().await?;
        }
    }

    output.close().await;
    playout.wait_idle().await;
    Ok(())
}
