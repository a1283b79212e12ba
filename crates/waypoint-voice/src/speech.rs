//! [`SpeechService`] implementations: real playback and a silent stand-in.

use crate::error::{VoiceError, VoiceResult};
use crate::tts::{backend_for_mode, TtsBackend};
use crate::voice_output::VoiceOutput;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use waypoint_core::{CoreResult, Speaker, SpeechService};

/// Synthesizes with a [`TtsBackend`] and plays through [`VoiceOutput`].
/// `speak` resolves once the utterance has finished playing.
pub struct VoiceSpeech {
    tts: Arc<dyn TtsBackend>,
    output: VoiceOutput,
}

impl VoiceSpeech {
    pub fn new(tts: Arc<dyn TtsBackend>, output: VoiceOutput) -> Self {
        Self { tts, output }
    }

    pub fn output(&self) -> &VoiceOutput {
        &self.output
    }
}

#[async_trait]
impl SpeechService for VoiceSpeech {
    async fn speak(&self, text: &str, speaker: Speaker) -> CoreResult<()> {
        let tts = Arc::clone(&self.tts);
        let text = text.to_string();
        // Backends use blocking HTTP.
        let audio = tokio::task::spawn_blocking(move || tts.synthesize(&text, speaker))
            .await
            .map_err(|e| VoiceError::Tts(format!("synthesis task failed: {}", e)))??;
        debug!(speaker = %speaker, bytes = audio.len(), "Synthesized utterance");

        let done = self.output.play(audio)?;
        done.await
            .map_err(|_| VoiceError::ChannelReceive("playback thread dropped the utterance".to_string()))??;
        Ok(())
    }

    fn suspend(&self) {
        self.output.suspend();
    }

    fn resume(&self) {
        self.output.resume();
    }
}

const SILENT_STEP: Duration = Duration::from_millis(50);

/// No audio device: waits roughly as long as the text would take to say.
/// Suspending holds the wait until resumed.
pub struct SilentSpeech {
    per_word: Duration,
    suspended: watch::Sender<bool>,
}

impl SilentSpeech {
    pub fn new(per_word: Duration) -> Self {
        let (suspended, _) = watch::channel(false);
        Self { per_word, suspended }
    }

    /// Time `text` would take at this pace.
    pub fn duration_for(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u32;
        self.per_word * words
    }

    pub fn is_suspended(&self) -> bool {
        *self.suspended.borrow()
    }
}

impl Default for SilentSpeech {
    /// About 150 words per minute.
    fn default() -> Self {
        Self::new(Duration::from_millis(400))
    }
}

#[async_trait]
impl SpeechService for SilentSpeech {
    async fn speak(&self, text: &str, speaker: Speaker) -> CoreResult<()> {
        let mut remaining = self.duration_for(text);
        debug!(speaker = %speaker, millis = remaining.as_millis() as u64, "Silent utterance");
        let mut suspended = self.suspended.subscribe();
        while !remaining.is_zero() {
            if *suspended.borrow_and_update() {
                if suspended.changed().await.is_err() {
                    break;
                }
                continue;
            }
            let step = remaining.min(SILENT_STEP);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
        Ok(())
    }

    fn suspend(&self) {
        self.suspended.send_replace(true);
    }

    fn resume(&self) {
        self.suspended.send_replace(false);
    }
}

/// Speech output for a `tts_mode` setting. "silent" needs no device; any
/// other mode opens the default output and synthesizes with that backend.
pub fn speech_for_mode(mode: &str) -> VoiceResult<Arc<dyn SpeechService>> {
    if mode.eq_ignore_ascii_case("silent") {
        info!("Speech: silent mode");
        return Ok(Arc::new(SilentSpeech::default()));
    }
    let tts: Arc<dyn TtsBackend> = Arc::from(backend_for_mode(mode)?);
    let output = VoiceOutput::new()?;
    info!(mode, "Speech: audio playback enabled");
    Ok(Arc::new(VoiceSpeech::new(tts, output)))
}

/// Like [`speech_for_mode`], falling back to silent speech when the backend
/// or the audio device is unavailable.
pub fn speech_or_silent(mode: &str) -> Arc<dyn SpeechService> {
    speech_for_mode(mode).unwrap_or_else(|e| {
        warn!(mode, error = %e, "Speech backend unavailable; continuing silently");
        Arc::new(SilentSpeech::default())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_scales_with_words() {
        let speech = SilentSpeech::new(Duration::from_millis(100));
        assert_eq!(speech.duration_for("next stop  Bryant Park"), Duration::from_millis(400));
        assert_eq!(speech.duration_for("   "), Duration::ZERO);
    }

    #[test]
    fn empty_text_returns_at_once() {
        let speech = SilentSpeech::default();
        tokio_test::block_on(speech.speak("", Speaker::AgentA)).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn suspend_holds_until_resume() {
        let speech = Arc::new(SilentSpeech::new(Duration::from_millis(100)));
        speech.suspend();
        assert!(speech.is_suspended());

        let task = tokio::spawn({
            let speech = Arc::clone(&speech);
            async move { speech.speak("one two", Speaker::AgentB).await }
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!task.is_finished());

        speech.resume();
        task.await.unwrap().unwrap();
    }

    #[test]
    fn silent_mode_needs_no_device() {
        assert!(speech_for_mode("Silent").is_ok());
    }

    #[test]
    fn bad_mode_falls_back_to_silent() {
        let speech = speech_or_silent("morse");
        tokio_test::block_on(speech.speak("", Speaker::AgentA)).unwrap();
    }
}
