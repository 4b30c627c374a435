//! Synthesis queue: an ordered, backpressured channel of audio frames and
//! flush markers.
//!
//! Each queue has a single writer (the synthesis task of one handle) and a
//! single reader (the playout subsystem, once `play()` hands it over).

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Smallest usable queue capacity: one slot for frames, one reserved for
/// the terminal flush marker.
pub const MIN_QUEUE_CAPACITY: usize = 2;

/// A single frame of synthesized audio.
///
/// The payload is opaque to this crate; its layout and pacing are owned by
/// the TTS engine that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub data: Bytes,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(data: impl Into<Bytes>, sample_rate: u32, channels: u16) -> Self {
        Self {
            data: data.into(),
            sample_rate,
            channels,
        }
    }

    /// Returns true if the frame carries no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Playback duration, assuming 16-bit interleaved PCM.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let samples = self.data.len() as u64 / 2 / self.channels as u64;
        Duration::from_micros(samples * 1_000_000 / self.sample_rate as u64)
    }
}

/// An entry of the synthesis queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEntry {
    /// A synthesized audio frame.
    Frame(AudioFrame),
    /// End of one speech segment: all its audio has been delivered and
    /// downstream buffers should be flushed.
    Flush,
}

impl QueueEntry {
    /// Returns true if this entry is the flush marker.
    pub fn is_flush(&self) -> bool {
        matches!(self, QueueEntry::Flush)
    }

    /// Returns the audio frame, if this entry carries one.
    pub fn as_frame(&self) -> Option<&AudioFrame> {
        match self {
            QueueEntry::Frame(frame) => Some(frame),
            QueueEntry::Flush => None,
        }
    }
}

/// Creates a synthesis queue with the given capacity.
pub(crate) fn channel(capacity: usize) -> (SynthesisSender, SynthesisReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(MIN_QUEUE_CAPACITY));
    (SynthesisSender { tx }, SynthesisReceiver { rx })
}

/// Write side of a synthesis queue. Not cloneable: exactly one task writes.
pub(crate) struct SynthesisSender {
    tx: mpsc::Sender<QueueEntry>,
}

impl SynthesisSender {
    /// Takes exclusive write access, reserving the slot for the flush marker.
    pub(crate) async fn open(self) -> SynthesisWriter {
        // Fails only when the reader is already gone, in which case no one
        // is left to observe the marker.
        let flush = self.tx.clone().reserve_owned().await.ok();
        SynthesisWriter {
            tx: self.tx,
            flush,
            frames: 0,
        }
    }
}

/// Outcome of a single frame write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    Written,
    Cancelled,
    /// The reader dropped its side of the queue.
    Closed,
}

/// Exclusive write access to a synthesis queue.
///
/// The flush marker is written exactly once: by [`finish`](Self::finish), or
/// on drop if the owning task unwinds early.
pub(crate) struct SynthesisWriter {
    tx: mpsc::Sender<QueueEntry>,
    flush: Option<mpsc::OwnedPermit<QueueEntry>>,
    frames: usize,
}

impl SynthesisWriter {
    /// Writes a frame, suspending under backpressure until the reader frees
    /// capacity or `cancel` fires.
    pub(crate) async fn write(
        &mut self,
        frame: AudioFrame,
        cancel: &CancellationToken,
    ) -> WriteOutcome {
        if self.flush.is_none() {
            return WriteOutcome::Closed;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => WriteOutcome::Cancelled,
            sent = self.tx.send(QueueEntry::Frame(frame)) => match sent {
                Ok(()) => {
                    self.frames += 1;
                    WriteOutcome::Written
                }
                Err(_) => WriteOutcome::Closed,
            },
        }
    }

    /// Writes the flush marker and releases write access.
    /// Returns the number of frames written before it.
    pub(crate) fn finish(mut self) -> usize {
        self.write_flush();
        self.frames
    }

    fn write_flush(&mut self) {
        if let Some(permit) = self.flush.take() {
            permit.send(QueueEntry::Flush);
        }
    }
}

impl Drop for SynthesisWriter {
    fn drop(&mut self) {
        self.write_flush();
    }
}

/// Read side of a synthesis queue, handed to the playout subsystem.
#[derive(Debug)]
pub struct SynthesisReceiver {
    rx: mpsc::Receiver<QueueEntry>,
}

impl SynthesisReceiver {
    /// Receives the next entry.
    /// Returns `None` once the writer has finished and the queue is drained.
    pub async fn recv(&mut self) -> Option<QueueEntry> {
        self.rx.recv().await
    }

    /// Receives the next entry without waiting.
    ///
    /// Fails with [`TryRecvError::Empty`] while synthesis is still running
    /// and with [`TryRecvError::Disconnected`] once the writer is gone and
    /// the queue is drained.
    pub fn try_recv(&mut self) -> Result<QueueEntry, TryRecvError> {
        self.rx.try_recv()
    }

    /// Stops accepting new entries. Buffered entries can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Converts the receiver into a [`Stream`](futures::Stream).
    pub fn into_stream(self) -> ReceiverStream<QueueEntry> {
        ReceiverStream::new(self.rx)
    }
}

#[cfg(test)]
mod queue_tests {
    use super::*;

    fn frame(byte: u8) -> AudioFrame {
        AudioFrame::new(vec![byte; 4], 16_000, 1)
    }

    async fn drain(rx: &mut SynthesisReceiver) -> Vec<QueueEntry> {
        let mut entries = Vec::new();
        while let Some(entry) = rx.recv().await {
            entries.push(entry);
        }
        entries
    }

    #[test]
    fn test_frame_duration() {
        // 320 bytes of mono 16-bit PCM at 16kHz = 160 samples = 10ms
        let frame = AudioFrame::new(vec![0u8; 320], 16_000, 1);
        assert_eq!(frame.duration(), Duration::from_millis(10));
        assert_eq!(AudioFrame::new(vec![0u8; 4], 0, 1).duration(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_finish_writes_single_flush_last() {
        let (tx, mut rx) = channel(8);
        let cancel = CancellationToken::new();
        let mut writer = tx.open().await;

        assert_eq!(writer.write(frame(1), &cancel).await, WriteOutcome::Written);
        assert_eq!(writer.write(frame(2), &cancel).await, WriteOutcome::Written);
        assert_eq!(writer.finish(), 2);

        let entries = drain(&mut rx).await;
        assert_eq!(
            entries,
            vec![
                QueueEntry::Frame(frame(1)),
                QueueEntry::Frame(frame(2)),
                QueueEntry::Flush
            ]
        );
    }

    #[tokio::test]
    async fn test_drop_writes_flush() {
        let (tx, mut rx) = channel(4);
        let writer = tx.open().await;
        drop(writer);

        assert_eq!(drain(&mut rx).await, vec![QueueEntry::Flush]);
    }

    #[tokio::test]
    async fn test_flush_fits_when_frames_fill_queue() {
        // Capacity 2: one frame slot plus the reserved marker slot.
        let (tx, mut rx) = channel(0);
        let cancel = CancellationToken::new();
        let mut writer = tx.open().await;

        assert_eq!(writer.write(frame(1), &cancel).await, WriteOutcome::Written);

        let blocked = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let outcome = writer.write(frame(2), &cancel).await;
                (outcome, writer.finish())
            })
        };
        tokio::task::yield_now().await;
        cancel.cancel();

        let (outcome, frames) = blocked.await.unwrap();
        assert_eq!(outcome, WriteOutcome::Cancelled);
        assert_eq!(frames, 1);
        assert_eq!(
            drain(&mut rx).await,
            vec![QueueEntry::Frame(frame(1)), QueueEntry::Flush]
        );
    }

    #[tokio::test]
    async fn test_try_recv_tells_empty_from_finished() {
        let (tx, mut rx) = channel(4);
        let cancel = CancellationToken::new();
        let mut writer = tx.open().await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        assert_eq!(writer.write(frame(1), &cancel).await, WriteOutcome::Written);
        assert_eq!(rx.try_recv(), Ok(QueueEntry::Frame(frame(1))));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        writer.finish();
        assert_eq!(rx.try_recv(), Ok(QueueEntry::Flush));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[tokio::test]
    async fn test_write_after_reader_dropped() {
        let (tx, rx) = channel(4);
        let cancel = CancellationToken::new();
        let mut writer = tx.open().await;
        drop(rx);

        assert_eq!(writer.write(frame(1), &cancel).await, WriteOutcome::Closed);
        assert_eq!(writer.finish(), 0);
    }
}
