//! Speech output for voice agents.
//!
//! This crate turns text into played-out speech:
//! - [`SpeechOutput`]: starts synthesis for each utterance and tracks it
//! - [`SynthesisHandle`]: plays or interrupts (barge-in) one utterance
//! - [`SpeechSource`]: complete, deferred, or streamed text
//! - [`TtsEngine`] and [`Playout`]: the engine and playout interfaces
//! - [`QueueEntry`]: audio frames and flush markers handed to the playout
//!
//! # Example
//!
//! ```rust,ignore
//! use giztoy_speechout::{SpeechOutput, SpeechSource};
//!
//! let output = SpeechOutput::new(engine, playout);
//!
//! let handle = output.synthesize("greeting", "Hello there!")?;
//! handle.play()?;
//!
//! // The user starts talking: cut the greeting off.
//! handle.interrupt();
//!
//! let reply = output.synthesize("reply", SpeechSource::stream(llm_tokens))?;
//! reply.play()?;
//! reply.wait().await?;
//!
//! output.close().await;
//! ```

mod config;
mod engine;
mod error;
mod handle;
mod output;
mod playout;
mod queue;
mod source;
mod task;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use handle::*;
pub use output::*;
pub use playout::*;
pub use queue::{AudioFrame, MIN_QUEUE_CAPACITY, QueueEntry, SynthesisReceiver};
pub use source::SpeechSource;
pub use tokio::sync::mpsc::error::TryRecvError;

#[cfg(test)]
mod testing;
