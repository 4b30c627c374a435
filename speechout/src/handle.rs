//! Synthesis handle: the caller-facing side of one queued utterance.

use crate::error::{OutputError, PlayoutError};
use crate::playout::{Playout, PlayoutHandle};
use crate::queue::SynthesisReceiver;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle state of a [`SynthesisHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeechState {
    /// Synthesis may be running; playback has not been requested.
    Created,
    /// `play()` succeeded and the queue belongs to the playout.
    Validated,
    /// Interrupted. Terminal.
    Interrupted,
}

/// Handle for one utterance passed to
/// [`SpeechOutput::synthesize`](crate::SpeechOutput::synthesize).
///
/// Cloning is cheap; all clones refer to the same utterance.
#[derive(Clone)]
pub struct SynthesisHandle {
    inner: Arc<Inner>,
}

struct Inner {
    speech_id: String,
    playout: Arc<dyn Playout>,
    play: Mutex<PlayState>,
    interrupt: CancellationToken,
    done: CancellationToken,
    outcome: OnceLock<Result<(), OutputError>>,
}

struct PlayState {
    queue: Option<SynthesisReceiver>,
    playout: Option<Arc<dyn PlayoutHandle>>,
    registering: bool,
}

impl SynthesisHandle {
    pub(crate) fn new(
        speech_id: String,
        queue: SynthesisReceiver,
        playout: Arc<dyn Playout>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                speech_id,
                playout,
                play: Mutex::new(PlayState {
                    queue: Some(queue),
                    playout: None,
                    registering: false,
                }),
                interrupt: CancellationToken::new(),
                done: CancellationToken::new(),
                outcome: OnceLock::new(),
            }),
        }
    }

    /// Returns the caller-supplied speech ID.
    pub fn speech_id(&self) -> &str {
        &self.inner.speech_id
    }

    /// Hands the synthesis queue to the playout subsystem.
    ///
    /// Fails with [`OutputError::Interrupted`] if the handle was interrupted,
    /// and with [`OutputError::AlreadyPlaying`] on a second call. An
    /// interrupt that lands while the playout is registering the queue is
    /// forwarded to the new playout handle before this returns.
    pub fn play(&self) -> Result<Arc<dyn PlayoutHandle>, OutputError> {
        let queue = {
            let mut state = self.inner.play.lock();
            if self.inner.interrupt.is_cancelled() {
                return Err(OutputError::Interrupted(self.inner.speech_id.clone()));
            }
            if state.registering || state.playout.is_some() {
                return Err(OutputError::AlreadyPlaying(self.inner.speech_id.clone()));
            }
            // A failed registration consumes the queue.
            let queue = state.queue.take().ok_or(PlayoutError::Closed)?;
            state.registering = true;
            queue
        };

        // The lock is not held across playout calls, which may call back
        // into this handle.
        let registered = self.inner.playout.play(&self.inner.speech_id, queue);

        let (handle, interrupted) = {
            let mut state = self.inner.play.lock();
            state.registering = false;
            let handle = registered?;
            state.playout = Some(Arc::clone(&handle));
            (handle, self.inner.interrupt.is_cancelled())
        };
        if interrupted {
            // The interrupt found no playout handle to stop.
            handle.interrupt();
        }
        debug!(speech_id = %self.inner.speech_id, interrupted, "speechout: playing");
        Ok(handle)
    }

    /// Interrupts the utterance. Idempotent.
    ///
    /// Stops playback if `play()` was called, and asks the synthesis task to
    /// shut down. Never fails.
    pub fn interrupt(&self) {
        let playout = {
            let state = self.inner.play.lock();
            if self.inner.interrupt.is_cancelled() {
                return;
            }
            self.inner.interrupt.cancel();
            state.playout.clone()
        };
        if let Some(playout) = playout {
            playout.interrupt();
        }
        debug!(speech_id = %self.inner.speech_id, "speechout: interrupted");
    }

    /// Returns true if `play()` has succeeded.
    pub fn is_validated(&self) -> bool {
        self.inner.play.lock().playout.is_some()
    }

    /// Returns true if the handle has been interrupted.
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupt.is_cancelled()
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SpeechState {
        if self.is_interrupted() {
            SpeechState::Interrupted
        } else if self.is_validated() {
            SpeechState::Validated
        } else {
            SpeechState::Created
        }
    }

    /// Returns the playout handle, once `play()` has succeeded.
    pub fn playout_handle(&self) -> Option<Arc<dyn PlayoutHandle>> {
        self.inner.play.lock().playout.clone()
    }

    /// Waits until the handle is interrupted.
    pub async fn interrupted(&self) {
        self.inner.interrupt.cancelled().await
    }

    /// Returns true once synthesis has finished, by completion or cancellation.
    pub fn is_done(&self) -> bool {
        self.inner.done.is_cancelled()
    }

    /// Waits for synthesis to finish and returns its outcome.
    ///
    /// Graceful cancellation yields `Ok(())`; engine and source failures
    /// are returned as errors.
    pub async fn wait(&self) -> Result<(), OutputError> {
        self.inner.done.cancelled().await;
        self.inner.outcome.get().cloned().unwrap_or(Ok(()))
    }

    pub(crate) fn interrupt_signal(&self) -> CancellationToken {
        self.inner.interrupt.clone()
    }

    pub(crate) fn complete(&self, outcome: Result<(), OutputError>) {
        let _ = self.inner.outcome.set(outcome);
        self.inner.done.cancel();
    }
}

impl fmt::Debug for SynthesisHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisHandle")
            .field("speech_id", &self.inner.speech_id)
            .field("state", &self.state())
            .field("done", &self.is_done())
            .finish()
    }
}
