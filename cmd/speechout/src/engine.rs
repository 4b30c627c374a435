//! Synthetic TTS engine: one silent PCM frame per word.

use async_trait::async_trait;
use giztoy_speechout::{
    AudioFrame, EngineSide, SynthesisEvent, SynthesisStream, TextRequest, TtsEngine, TtsError,
    channel_stream,
};
use std::time::Duration;

const SAMPLE_RATE: u32 = 16_000;

/// 10ms of 16-bit mono silence per character.
const BYTES_PER_CHAR: usize = (SAMPLE_RATE as usize / 100) * 2;

pub struct SilentEngine {
    /// Delay before each emitted frame, standing in for synthesis latency.
    pub frame_delay: Duration,
}

#[async_trait]
impl TtsEngine for SilentEngine {
    async fn stream(&self) -> Result<SynthesisStream, TtsError> {
        let (stream, side) = channel_stream(16);
        tokio::spawn(serve(side, self.frame_delay));
        Ok(stream)
    }
}

async fn serve(mut side: EngineSide, frame_delay: Duration) {
    let mut pending = String::new();
    while let Some(req) = side.requests.recv().await {
        match req {
            TextRequest::Push(text) => {
                pending.push_str(&text);
                pending.push(' ');
            }
            TextRequest::Flush => {
                for word in pending.split_whitespace() {
                    tokio::time::sleep(frame_delay).await;
                    let frame = AudioFrame::new(
                        vec![0u8; word.chars().count() * BYTES_PER_CHAR],
                        SAMPLE_RATE,
                        1,
                    );
                    tracing::debug!(word, "engine: frame");
                    if side.events.send(Ok(SynthesisEvent::Audio(frame))).await.is_err() {
                        return;
                    }
                }
                pending.clear();
            }
            TextRequest::EndInput => break,
        }
    }
    let _ = side.events.send(Ok(SynthesisEvent::Finished)).await;
}
