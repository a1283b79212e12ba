//! Speech collaborator seam. Concrete backends live in `waypoint-voice`.

use crate::error::CoreResult;
use crate::speaker::Speaker;
use async_trait::async_trait;

/// Synthesizes and plays text for a speaker.
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Resolves when playback ends. An error still means the utterance is over.
    async fn speak(&self, text: &str, speaker: Speaker) -> CoreResult<()>;

    /// Pause audio output and drop anything queued but not yet playing.
    fn suspend(&self) {}

    /// Continue audio output after [`suspend`](Self::suspend).
    fn resume(&self) {}
}
