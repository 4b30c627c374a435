//! Draining playout: consumes each queue in real time and logs what it plays.

use giztoy_speechout::{Playout, PlayoutError, PlayoutHandle, QueueEntry, SynthesisReceiver};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

#[derive(Default)]
pub struct LogPlayout {
    tasks: TaskTracker,
}

impl LogPlayout {
    /// Waits until every registered queue has been drained or interrupted.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}

struct LogPlayoutHandle {
    speech_id: String,
    cancel: CancellationToken,
}

impl PlayoutHandle for LogPlayoutHandle {
    fn speech_id(&self) -> &str {
        &self.speech_id
    }

    fn interrupt(&self) {
        self.cancel.cancel();
    }
}

impl Playout for LogPlayout {
    fn play(
        &self,
        speech_id: &str,
        queue: SynthesisReceiver,
    ) -> Result<Arc<dyn PlayoutHandle>, PlayoutError> {
        if self.tasks.is_closed() {
            return Err(PlayoutError::Closed);
        }
        let handle = Arc::new(LogPlayoutHandle {
            speech_id: speech_id.to_string(),
            cancel: CancellationToken::new(),
        });
        self.tasks.spawn(drain(
            speech_id.to_string(),
            queue,
            handle.cancel.clone(),
        ));
        Ok(handle)
    }
}

async fn drain(speech_id: String, mut queue: SynthesisReceiver, cancel: CancellationToken) {
    let mut played = Duration::ZERO;
    loop {
        let entry = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let played_ms = played.as_millis() as u64;
                info!(speech_id = %speech_id, played_ms, "playout: interrupted");
                return;
            }
            entry = queue.recv() => entry,
        };
        match entry {
            Some(QueueEntry::Frame(frame)) => {
                let duration = frame.duration();
                let bytes = frame.data.len();
                debug!(speech_id = %speech_id, bytes, ?duration, "playout: frame");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(duration) => played += duration,
                }
            }
            Some(QueueEntry::Flush) => {
                let played_ms = played.as_millis() as u64;
                info!(speech_id = %speech_id, played_ms, "playout: flush");
            }
            None => return,
        }
    }
}
