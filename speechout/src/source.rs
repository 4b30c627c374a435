//! Text sources for synthesis.

use crate::error::OutputError;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;
use std::future::Future;

/// The text of one utterance, fixed when the handle is created.
pub enum SpeechSource {
    /// A complete string.
    Text(String),
    /// Text that becomes available later, e.g. a pending LLM completion.
    Deferred(BoxFuture<'static, Result<String, OutputError>>),
    /// Text chunks produced incrementally, e.g. streamed LLM tokens.
    Stream(BoxStream<'static, String>),
}

/// A source with any deferred text already resolved.
pub(crate) enum ResolvedSource {
    Text(String),
    Stream(BoxStream<'static, String>),
}

impl SpeechSource {
    /// Creates a source from a complete string.
    pub fn text(text: impl Into<String>) -> Self {
        SpeechSource::Text(text.into())
    }

    /// Creates a source from a future resolving to the full text.
    pub fn deferred<F, E>(fut: F) -> Self
    where
        F: Future<Output = Result<String, E>> + Send + 'static,
        E: fmt::Display,
    {
        SpeechSource::Deferred(Box::pin(async move {
            fut.await.map_err(|e| OutputError::Source(e.to_string()))
        }))
    }

    /// Creates a source from a stream of text chunks.
    pub fn stream<S>(chunks: S) -> Self
    where
        S: Stream<Item = String> + Send + 'static,
    {
        SpeechSource::Stream(chunks.boxed())
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            SpeechSource::Text(_) => "text",
            SpeechSource::Deferred(_) => "deferred",
            SpeechSource::Stream(_) => "stream",
        }
    }

    pub(crate) async fn resolve(self) -> Result<ResolvedSource, OutputError> {
        match self {
            SpeechSource::Text(text) => Ok(ResolvedSource::Text(text)),
            SpeechSource::Deferred(fut) => fut.await.map(ResolvedSource::Text),
            SpeechSource::Stream(chunks) => Ok(ResolvedSource::Stream(chunks)),
        }
    }
}

impl fmt::Debug for SpeechSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechSource::Text(text) => f.debug_tuple("Text").field(text).finish(),
            other => write!(f, "{}", other.kind()),
        }
    }
}

impl From<String> for SpeechSource {
    fn from(text: String) -> Self {
        SpeechSource::Text(text)
    }
}

impl From<&str> for SpeechSource {
    fn from(text: &str) -> Self {
        SpeechSource::Text(text.to_string())
    }
}
