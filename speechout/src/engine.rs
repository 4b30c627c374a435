//! TTS engine interface.
//!
//! An engine opens a [`SynthesisStream`] per utterance. The stream is split
//! into an input half, which accepts text and control signals, and an output
//! half, which yields audio events until [`SynthesisEvent::Finished`]. The
//! halves are driven concurrently by the incremental synthesis task.

use crate::error::TtsError;
use crate::queue::AudioFrame;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// An event produced by a synthesis stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    /// One frame of synthesized audio.
    Audio(AudioFrame),
    /// End of stream. Engines emit it only after input has ended.
    Finished,
}

/// Input half of a synthesis stream.
#[async_trait]
pub trait SynthesisInput: Send {
    /// Pushes a chunk of text to synthesize.
    async fn push_text(&mut self, text: &str) -> Result<(), TtsError>;

    /// Asks the engine to finalize audio for all text pushed so far.
    async fn flush(&mut self) -> Result<(), TtsError>;

    /// Signals that no more text will be pushed.
    async fn end_input(&mut self) -> Result<(), TtsError>;
}

/// Output half of a synthesis stream.
#[async_trait]
pub trait SynthesisOutput: Send {
    /// Returns the next event.
    async fn next(&mut self) -> Result<SynthesisEvent, TtsError>;
}

/// A synthesis stream opened against a TTS engine.
pub struct SynthesisStream {
    pub input: Box<dyn SynthesisInput>,
    pub output: Box<dyn SynthesisOutput>,
}

impl SynthesisStream {
    /// Creates a stream from its two halves.
    pub fn new(input: Box<dyn SynthesisInput>, output: Box<dyn SynthesisOutput>) -> Self {
        Self { input, output }
    }
}

/// Interface for a text-to-speech engine.
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Opens a new synthesis stream.
    async fn stream(&self) -> Result<SynthesisStream, TtsError>;
}

/// A text request received by the engine side of a [`channel_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextRequest {
    Push(String),
    Flush,
    EndInput,
}

/// Engine side of a [`channel_stream`].
pub struct EngineSide {
    /// Text requests in the order the stream input issued them.
    /// Closes after [`TextRequest::EndInput`] or when the input is dropped.
    pub requests: mpsc::Receiver<TextRequest>,
    /// Audio events for the stream output. Dropping the sender ends the
    /// stream as if [`SynthesisEvent::Finished`] had been sent.
    pub events: mpsc::Sender<Result<SynthesisEvent, TtsError>>,
}

/// Creates a channel-backed synthesis stream.
///
/// Engines that run their own worker (a websocket session, a local model
/// loop) can hand the returned [`SynthesisStream`] to callers and serve the
/// [`EngineSide`] from a spawned task.
pub fn channel_stream(capacity: usize) -> (SynthesisStream, EngineSide) {
    let (req_tx, req_rx) = mpsc::channel(capacity.max(1));
    let (ev_tx, ev_rx) = mpsc::channel(capacity.max(1));
    let stream = SynthesisStream::new(
        Box::new(ChannelInput { tx: Some(req_tx) }),
        Box::new(ChannelOutput {
            rx: ev_rx,
            finished: false,
        }),
    );
    (
        stream,
        EngineSide {
            requests: req_rx,
            events: ev_tx,
        },
    )
}

struct ChannelInput {
    tx: Option<mpsc::Sender<TextRequest>>,
}

impl ChannelInput {
    async fn send(&mut self, req: TextRequest) -> Result<(), TtsError> {
        let tx = self.tx.as_ref().ok_or(TtsError::Closed)?;
        tx.send(req).await.map_err(|_| TtsError::Closed)
    }
}

#[async_trait]
impl SynthesisInput for ChannelInput {
    async fn push_text(&mut self, text: &str) -> Result<(), TtsError> {
        self.send(TextRequest::Push(text.to_string())).await
    }

    async fn flush(&mut self) -> Result<(), TtsError> {
        self.send(TextRequest::Flush).await
    }

    async fn end_input(&mut self) -> Result<(), TtsError> {
        let result = self.send(TextRequest::EndInput).await;
        self.tx = None;
        result
    }
}

struct ChannelOutput {
    rx: mpsc::Receiver<Result<SynthesisEvent, TtsError>>,
    finished: bool,
}

#[async_trait]
impl SynthesisOutput for ChannelOutput {
    async fn next(&mut self) -> Result<SynthesisEvent, TtsError> {
        if self.finished {
            return Ok(SynthesisEvent::Finished);
        }
        match self.rx.recv().await {
            Some(Ok(SynthesisEvent::Finished)) | None => {
                self.finished = true;
                self.rx.close();
                Ok(SynthesisEvent::Finished)
            }
            Some(event) => event,
        }
    }
}
