//! Error types for speech output.

/// Error type for TTS engine streams.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TtsError {
    #[error("synthesis stream closed")]
    Closed,
    #[error("synthesis failed: {0}")]
    Synthesis(String),
    #[error("other error: {0}")]
    Other(String),
}

/// Error type for playout registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayoutError {
    #[error("playout closed")]
    Closed,
    #[error("playout rejected: {0}")]
    Rejected(String),
    #[error("other error: {0}")]
    Other(String),
}

/// Error type for speech output operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    /// `play()` was called on a handle that has already been interrupted.
    #[error("speech {0} was interrupted")]
    Interrupted(String),
    /// `play()` was called twice on the same handle.
    #[error("speech {0} is already playing")]
    AlreadyPlaying(String),
    /// The output has been closed and accepts no more speech.
    #[error("speech output closed")]
    Closed,
    /// A deferred text source failed to resolve.
    #[error("text source failed: {0}")]
    Source(String),
    #[error("tts error: {0}")]
    Tts(#[from] TtsError),
    #[error("playout error: {0}")]
    Playout(#[from] PlayoutError),
    /// The synthesis task panicked or was aborted.
    #[error("synthesis task failed: {0}")]
    Task(String),
}

/// Error type for loading an [`OutputConfig`](crate::OutputConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
