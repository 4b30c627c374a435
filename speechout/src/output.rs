//! Speech output: creates synthesis handles and tracks their tasks.

use crate::config::OutputConfig;
use crate::engine::TtsEngine;
use crate::error::OutputError;
use crate::handle::SynthesisHandle;
use crate::playout::Playout;
use crate::queue;
use crate::source::SpeechSource;
use crate::task;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Drives a TTS engine into a playout subsystem, one utterance at a time.
///
/// Every [`synthesize`](Self::synthesize) call starts synthesis in the
/// background and returns a [`SynthesisHandle`] immediately. The caller
/// decides when to [`play`](SynthesisHandle::play) and when to
/// [`interrupt`](SynthesisHandle::interrupt); interrupting the previous
/// handle before starting a new one is the caller's job.
pub struct SpeechOutput {
    engine: Arc<dyn TtsEngine>,
    playout: Arc<dyn Playout>,
    config: OutputConfig,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl SpeechOutput {
    /// Creates a speech output with the default configuration.
    pub fn new(engine: Arc<dyn TtsEngine>, playout: Arc<dyn Playout>) -> Self {
        Self::with_config(engine, playout, OutputConfig::default())
    }

    /// Creates a speech output with the given configuration.
    pub fn with_config(
        engine: Arc<dyn TtsEngine>,
        playout: Arc<dyn Playout>,
        config: OutputConfig,
    ) -> Self {
        Self {
            engine,
            playout,
            config,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Starts synthesizing `source` and returns its handle.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// [`OutputError::Closed`] after [`close`](Self::close).
    pub fn synthesize(
        &self,
        speech_id: impl Into<String>,
        source: impl Into<SpeechSource>,
    ) -> Result<SynthesisHandle, OutputError> {
        if self.shutdown.is_cancelled() {
            return Err(OutputError::Closed);
        }
        let speech_id = speech_id.into();
        let (tx, rx) = queue::channel(self.config.queue_capacity());
        let handle = SynthesisHandle::new(speech_id, rx, Arc::clone(&self.playout));

        self.tasks.spawn(task::supervise(
            handle.clone(),
            source.into(),
            tx,
            Arc::clone(&self.engine),
            self.shutdown.child_token(),
        ));
        debug!(speech_id = %handle.speech_id(), live = self.tasks.len(), "speechout: synthesize");
        Ok(handle)
    }

    /// Number of synthesis tasks still running.
    pub fn live_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancels all running synthesis and waits for every task to unwind.
    ///
    /// Handles are not marked interrupted. Safe to call more than once.
    pub async fn close(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        debug!(live = self.tasks.len(), "speechout: closing");
        self.tasks.wait().await;
    }
}
