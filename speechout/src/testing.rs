//! Mock engine and playout shared by the unit tests.

use crate::engine::{
    EngineSide, SynthesisEvent, SynthesisInput, SynthesisOutput, SynthesisStream, TextRequest,
    TtsEngine, channel_stream,
};
use crate::error::{PlayoutError, TtsError};
use crate::playout::{Playout, PlayoutHandle};
use crate::queue::{AudioFrame, QueueEntry, SynthesisReceiver};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) fn word_frame(word: &str) -> AudioFrame {
    AudioFrame::new(word.as_bytes().to_vec(), 16_000, 1)
}

/// Drains a receiver until the writer is gone.
pub(crate) async fn drain(rx: &mut SynthesisReceiver) -> Vec<QueueEntry> {
    let mut entries = Vec::new();
    while let Some(entry) = rx.recv().await {
        entries.push(entry);
    }
    entries
}

pub(crate) fn flush_count(entries: &[QueueEntry]) -> usize {
    entries.iter().filter(|e| e.is_flush()).count()
}

/// Engine that emits one frame per pushed word on each flush, and records
/// every request it receives.
#[derive(Default)]
pub(crate) struct MockEngine {
    requests: Arc<Mutex<Vec<TextRequest>>>,
    open_error: Option<TtsError>,
    flush_error: Option<TtsError>,
    stalled: bool,
    opened: AtomicUsize,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails to open any stream.
    pub(crate) fn failing_open(err: TtsError) -> Self {
        Self {
            open_error: Some(err),
            ..Default::default()
        }
    }

    /// Emits an error instead of audio on flush.
    pub(crate) fn failing_flush(err: TtsError) -> Self {
        Self {
            flush_error: Some(err),
            ..Default::default()
        }
    }

    /// Accepts input but never produces output.
    pub(crate) fn stalled() -> Self {
        Self {
            stalled: true,
            ..Default::default()
        }
    }

    pub(crate) fn requests(&self) -> Vec<TextRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Waits until at least `n` requests have been recorded.
    pub(crate) async fn wait_for_requests(&self, n: usize) {
        wait_for_len(&self.requests, n).await;
    }
}

async fn wait_for_len(log: &Mutex<Vec<TextRequest>>, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while log.lock().len() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("engine requests timed out");
}

#[async_trait]
impl TtsEngine for MockEngine {
    async fn stream(&self) -> Result<SynthesisStream, TtsError> {
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let (stream, side) = channel_stream(16);
        tokio::spawn(serve(
            side,
            self.requests.clone(),
            self.flush_error.clone(),
            self.stalled,
        ));
        Ok(stream)
    }
}

async fn serve(
    mut side: EngineSide,
    log: Arc<Mutex<Vec<TextRequest>>>,
    flush_error: Option<TtsError>,
    stalled: bool,
) {
    let mut pending = String::new();
    while let Some(req) = side.requests.recv().await {
        log.lock().push(req.clone());
        match req {
            TextRequest::Push(text) => {
                pending.push_str(&text);
                pending.push(' ');
            }
            TextRequest::Flush => {
                if stalled {
                    continue;
                }
                if let Some(err) = &flush_error {
                    let _ = side.events.send(Err(err.clone())).await;
                    return;
                }
                for word in pending.split_whitespace() {
                    let event = SynthesisEvent::Audio(word_frame(word));
                    if side.events.send(Ok(event)).await.is_err() {
                        return;
                    }
                }
                pending.clear();
            }
            TextRequest::EndInput => break,
        }
    }
    if stalled {
        side.events.closed().await;
        return;
    }
    let _ = side.events.send(Ok(SynthesisEvent::Finished)).await;
}

/// Playout that keeps registered queues for inspection.
#[derive(Default)]
pub(crate) struct MockPlayout {
    reject: bool,
    handles: Mutex<Vec<Arc<MockPlayoutHandle>>>,
    queues: Mutex<HashMap<String, SynthesisReceiver>>,
}

impl MockPlayout {
    pub(crate) fn rejecting() -> Self {
        Self {
            reject: true,
            ..Default::default()
        }
    }

    pub(crate) fn registrations(&self) -> usize {
        self.handles.lock().len()
    }

    pub(crate) fn interrupts(&self, speech_id: &str) -> usize {
        self.handles
            .lock()
            .iter()
            .filter(|h| h.speech_id == speech_id)
            .map(|h| h.interrupts.load(Ordering::SeqCst))
            .sum()
    }

    pub(crate) fn take_queue(&self, speech_id: &str) -> Option<SynthesisReceiver> {
        self.queues.lock().remove(speech_id)
    }
}

impl Playout for MockPlayout {
    fn play(
        &self,
        speech_id: &str,
        queue: SynthesisReceiver,
    ) -> Result<Arc<dyn PlayoutHandle>, PlayoutError> {
        if self.reject {
            return Err(PlayoutError::Rejected("mock".to_string()));
        }
        let handle = Arc::new(MockPlayoutHandle {
            speech_id: speech_id.to_string(),
            interrupts: AtomicUsize::new(0),
        });
        self.handles.lock().push(handle.clone());
        self.queues.lock().insert(speech_id.to_string(), queue);
        Ok(handle)
    }
}

pub(crate) struct MockPlayoutHandle {
    speech_id: String,
    interrupts: AtomicUsize,
}

impl PlayoutHandle for MockPlayoutHandle {
    fn speech_id(&self) -> &str {
        &self.speech_id
    }

    fn interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Engine modelled on a duplex session: it never produces audio, and its
/// input rejects flush and end of input once the output half is dropped.
#[derive(Default)]
pub(crate) struct SessionEngine {
    requests: Arc<Mutex<Vec<TextRequest>>>,
}

impl SessionEngine {
    pub(crate) fn requests(&self) -> Vec<TextRequest> {
        self.requests.lock().clone()
    }

    pub(crate) async fn wait_for_requests(&self, n: usize) {
        wait_for_len(&self.requests, n).await;
    }
}

#[async_trait]
impl TtsEngine for SessionEngine {
    async fn stream(&self) -> Result<SynthesisStream, TtsError> {
        let output_gone = Arc::new(AtomicBool::new(false));
        Ok(SynthesisStream::new(
            Box::new(SessionInput {
                log: self.requests.clone(),
                output_gone: output_gone.clone(),
            }),
            Box::new(SessionOutput { output_gone }),
        ))
    }
}

struct SessionInput {
    log: Arc<Mutex<Vec<TextRequest>>>,
    output_gone: Arc<AtomicBool>,
}

impl SessionInput {
    async fn control(&mut self, req: TextRequest) -> Result<(), TtsError> {
        // Round trip to the remote end.
        tokio::task::yield_now().await;
        if self.output_gone.load(Ordering::SeqCst) {
            return Err(TtsError::Closed);
        }
        self.log.lock().push(req);
        Ok(())
    }
}

#[async_trait]
impl SynthesisInput for SessionInput {
    async fn push_text(&mut self, text: &str) -> Result<(), TtsError> {
        self.log.lock().push(TextRequest::Push(text.to_string()));
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), TtsError> {
        self.control(TextRequest::Flush).await
    }

    async fn end_input(&mut self) -> Result<(), TtsError> {
        self.control(TextRequest::EndInput).await
    }
}

struct SessionOutput {
    output_gone: Arc<AtomicBool>,
}

#[async_trait]
impl SynthesisOutput for SessionOutput {
    async fn next(&mut self) -> Result<SynthesisEvent, TtsError> {
        std::future::pending().await
    }
}

impl Drop for SessionOutput {
    fn drop(&mut self) {
        self.output_gone.store(true, Ordering::SeqCst);
    }
}
