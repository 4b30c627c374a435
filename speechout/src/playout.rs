//! Playout subsystem interface.

use crate::error::PlayoutError;
use crate::queue::SynthesisReceiver;
use std::sync::Arc;

/// Handle for one speech segment's active or pending playback.
pub trait PlayoutHandle: Send + Sync {
    /// Returns the speech ID this playback belongs to.
    fn speech_id(&self) -> &str;

    /// Stops playback of this segment immediately.
    fn interrupt(&self);
}

/// Interface for the subsystem that renders synthesized audio.
///
/// The playout owns the queue's read side after [`play`](Self::play) and is
/// responsible for interpreting [`QueueEntry::Flush`](crate::QueueEntry::Flush).
/// Neither `play` nor [`PlayoutHandle::interrupt`] is called with the
/// handle's lock held, so implementations may call back into the
/// [`SynthesisHandle`](crate::SynthesisHandle).
pub trait Playout: Send + Sync {
    /// Registers a queue for playback under the given speech ID.
    fn play(
        &self,
        speech_id: &str,
        queue: SynthesisReceiver,
    ) -> Result<Arc<dyn PlayoutHandle>, PlayoutError>;
}
