//! Synthesis tasks.
//!
//! A supervising task runs per handle. It spawns one synthesis task, whole
//! string or incremental stream depending on the source, and races it
//! against the handle's interrupt signal and the output's shutdown signal.
//! Cancellation is cooperative: the synthesis task observes its token at
//! every suspension point and always unwinds through its cleanup, writing
//! the queue's flush marker and ending engine input.

use crate::engine::{SynthesisEvent, SynthesisInput, SynthesisOutput, SynthesisStream, TtsEngine};
use crate::error::{OutputError, TtsError};
use crate::handle::SynthesisHandle;
use crate::queue::{SynthesisSender, SynthesisWriter, WriteOutcome};
use crate::source::{ResolvedSource, SpeechSource};
use futures::stream::{BoxStream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A spawned unit of work that can be asked to stop and then joined.
struct CancellableTask {
    cancel: CancellationToken,
    join: JoinHandle<Result<(), OutputError>>,
}

impl CancellableTask {
    fn spawn<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), OutputError>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(f(cancel.clone()));
        Self { cancel, join }
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the task. Must not be called again once it has resolved.
    async fn wait(&mut self) -> Result<(), OutputError> {
        match (&mut self.join).await {
            Ok(result) => result,
            Err(e) => Err(OutputError::Task(e.to_string())),
        }
    }
}

/// Supervises synthesis for one handle until it completes or is cancelled,
/// then records the outcome on the handle.
pub(crate) async fn supervise(
    handle: SynthesisHandle,
    source: SpeechSource,
    queue: SynthesisSender,
    engine: Arc<dyn TtsEngine>,
    shutdown: CancellationToken,
) {
    let speech_id = handle.speech_id().to_string();
    let interrupt = handle.interrupt_signal();
    debug!(speech_id = %speech_id, source = source.kind(), "speechout: synthesis started");

    let mut task = {
        let speech_id = speech_id.clone();
        CancellableTask::spawn(move |cancel| run(engine, speech_id, source, queue, cancel))
    };

    let finished = tokio::select! {
        biased;
        _ = interrupt.cancelled() => None,
        _ = shutdown.cancelled() => None,
        result = task.wait() => Some(result),
    };
    let result = match finished {
        Some(result) => result,
        None => {
            debug!(speech_id = %speech_id, "speechout: cancelling synthesis");
            task.cancel();
            task.wait().await
        }
    };

    match &result {
        Ok(()) => debug!(
            speech_id = %speech_id,
            interrupted = handle.is_interrupted(),
            "speechout: synthesis finished"
        ),
        Err(e) => warn!(speech_id = %speech_id, error = %e, "speechout: synthesis failed"),
    }
    handle.complete(result);
}

/// Resolves the source and dispatches to the matching synthesis variant.
async fn run(
    engine: Arc<dyn TtsEngine>,
    speech_id: String,
    source: SpeechSource,
    queue: SynthesisSender,
    cancel: CancellationToken,
) -> Result<(), OutputError> {
    let writer = queue.open().await;
    let resolved = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            writer.finish();
            return Ok(());
        }
        resolved = source.resolve() => resolved,
    };
    // On error the writer drops here, which still writes the marker.
    match resolved? {
        ResolvedSource::Text(text) => {
            synthesize_text(engine.as_ref(), &speech_id, text, writer, cancel).await
        }
        ResolvedSource::Stream(chunks) => {
            synthesize_stream(engine.as_ref(), &speech_id, chunks, writer, cancel).await
        }
    }
}

/// Opens an engine stream unless `cancel` fires first.
async fn open_stream(
    engine: &dyn TtsEngine,
    cancel: &CancellationToken,
) -> Result<Option<SynthesisStream>, OutputError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        stream = engine.stream() => Ok(Some(stream?)),
    }
}

/// Whole-string synthesis: push all text at once, then relay audio.
pub(crate) async fn synthesize_text(
    engine: &dyn TtsEngine,
    speech_id: &str,
    text: String,
    mut writer: SynthesisWriter,
    cancel: CancellationToken,
) -> Result<(), OutputError> {
    let Some(SynthesisStream { mut input, mut output }) = open_stream(engine, &cancel).await?
    else {
        writer.finish();
        return Ok(());
    };
    let pushed = if cancel.is_cancelled() {
        Ok(())
    } else {
        input.push_text(&text).await
    };
    end_input(input.as_mut(), pushed, speech_id, &cancel).await?;

    let relayed = relay_audio(output.as_mut(), &mut writer, speech_id, &cancel).await;
    let frames = writer.finish();
    debug!(
        speech_id = %speech_id,
        frames,
        cancelled = cancel.is_cancelled(),
        "speechout: text relayed"
    );
    relayed
}

/// Incremental synthesis: feed text chunks to the engine while relaying
/// audio concurrently.
pub(crate) async fn synthesize_stream(
    engine: &dyn TtsEngine,
    speech_id: &str,
    chunks: BoxStream<'static, String>,
    mut writer: SynthesisWriter,
    cancel: CancellationToken,
) -> Result<(), OutputError> {
    let Some(SynthesisStream { input, mut output }) = open_stream(engine, &cancel).await? else {
        writer.finish();
        return Ok(());
    };
    // Each half stops the other when it fails.
    let relay_cancel = cancel.child_token();
    let feed_cancel = cancel.child_token();
    let fed_done = CancellationToken::new();

    let feed = async {
        let fed = feed_text(input, chunks, speech_id, &feed_cancel).await;
        if fed.is_err() {
            relay_cancel.cancel();
        }
        fed_done.cancel();
        fed
    };
    let relay = {
        let output = output.as_mut();
        let (relay_cancel, feed_cancel, fed_done) = (&relay_cancel, &feed_cancel, &fed_done);
        async move {
            let relayed = relay_audio(output, &mut writer, speech_id, relay_cancel).await;
            if relayed.is_err() {
                feed_cancel.cancel();
            }
            let frames = writer.finish();
            debug!(
                speech_id = %speech_id,
                frames,
                cancelled = relay_cancel.is_cancelled(),
                "speechout: stream relayed"
            );
            // The engine is still read until input has ended: sessions may
            // reject input once output is gone, or stall on unread audio.
            discard_audio(output, fed_done).await;
            relayed
        }
    };

    // The relay error, if any, is the engine's own report and comes first.
    let (fed, relayed) = tokio::join!(feed, relay);
    drop(output);
    relayed.and(fed)
}

/// Reads and drops engine events until `done` fires or the engine stops.
async fn discard_audio(output: &mut dyn SynthesisOutput, done: &CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = done.cancelled() => return,
            event = output.next() => match event {
                Ok(SynthesisEvent::Audio(_)) => {}
                Ok(SynthesisEvent::Finished) | Err(_) => return,
            },
        }
    }
}

/// Relays engine audio into the queue until the engine finishes, `cancel`
/// fires, or the reader goes away.
async fn relay_audio(
    output: &mut dyn SynthesisOutput,
    writer: &mut SynthesisWriter,
    speech_id: &str,
    cancel: &CancellationToken,
) -> Result<(), OutputError> {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            event = output.next() => event?,
        };
        let frame = match event {
            SynthesisEvent::Audio(frame) => frame,
            SynthesisEvent::Finished => return Ok(()),
        };
        match writer.write(frame, cancel).await {
            WriteOutcome::Written => {}
            WriteOutcome::Cancelled => return Ok(()),
            WriteOutcome::Closed => {
                debug!(speech_id = %speech_id, "speechout: queue reader gone, stopping relay");
                return Ok(());
            }
        }
    }
}

/// Pushes text chunks to the engine as they arrive. Flush and end of input
/// are sent once the loop exits, whether it ended or was cancelled.
async fn feed_text(
    mut input: Box<dyn SynthesisInput>,
    mut chunks: BoxStream<'static, String>,
    speech_id: &str,
    cancel: &CancellationToken,
) -> Result<(), OutputError> {
    let mut pushed = Ok(());
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            chunk = chunks.next() => chunk,
        };
        let Some(chunk) = chunk else {
            break;
        };
        if cancel.is_cancelled() {
            break;
        }
        if let Err(e) = input.push_text(&chunk).await {
            pushed = Err(e);
            break;
        }
    }
    end_input(input.as_mut(), pushed, speech_id, cancel).await
}

/// Sends flush and end of input, then reports the first failure among the
/// push result and both signals. Once `cancel` has fired, failures are only
/// logged: the engine side may already be tearing the session down.
async fn end_input(
    input: &mut dyn SynthesisInput,
    pushed: Result<(), TtsError>,
    speech_id: &str,
    cancel: &CancellationToken,
) -> Result<(), OutputError> {
    let flushed = input.flush().await;
    let ended = input.end_input().await;
    match pushed.and(flushed).and(ended) {
        Err(e) if cancel.is_cancelled() => {
            debug!(
                speech_id = %speech_id,
                error = %e,
                "speechout: end of input after cancel failed"
            );
            Ok(())
        }
        result => Ok(result?),
    }
}
