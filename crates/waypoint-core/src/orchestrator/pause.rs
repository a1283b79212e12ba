//! Pause/resume for the conversation and the audio output together.

use super::session::{SessionHandle, TurnRequest};
use crate::conversation::Sender;
use crate::speaker::Speaker;
use crate::speech::SpeechService;
use std::sync::Arc;
use tracing::info;

/// Suspends the conversation loop and the speech output as one unit.
#[derive(Clone)]
pub struct PauseResumeController {
    session: SessionHandle,
    speech: Arc<dyn SpeechService>,
}

impl PauseResumeController {
    pub fn new(session: SessionHandle, speech: Arc<dyn SpeechService>) -> Self {
        Self { session, speech }
    }

    /// Pause. In-flight generation or playback is not aborted; its result just
    /// no longer starts another turn. Returns `false` when already paused.
    pub fn pause(&self) -> bool {
        {
            let mut state = self.session.lock();
            if state.paused {
                return false;
            }
            state.paused = true;
            state.current_speaker = None;
            state.requested = None;
            state.gate.clear_pending();
        }
        self.speech.suspend();
        info!("Agent interaction paused");
        self.session.show(Sender::System, "Agent interaction paused.");
        true
    }

    /// Resume with the alternate of the last logged speaker (AgentA when
    /// nobody has spoken). Returns `None` when the session was not paused.
    pub fn resume(&self) -> Option<(Speaker, TurnRequest)> {
        let next = {
            let mut state = self.session.lock();
            if !state.paused {
                return None;
            }
            state.paused = false;
            let next = state
                .log
                .last_speaker()
                .map(Speaker::other)
                .unwrap_or(Speaker::AgentA);
            state.next_speaker = next;
            next
        };
        self.speech.resume();
        info!(next = %next, "Agent interaction resumed");
        self.session.show(Sender::System, "Agent interaction resumed.");
        let request = self.session.request_turn(next);
        Some((next, request))
    }

    pub fn is_paused(&self) -> bool {
        self.session.is_paused()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::TracingDisplay;
    use crate::error::CoreResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingAudio {
        suspends: AtomicUsize,
        resumes: AtomicUsize,
    }

    #[async_trait]
    impl SpeechService for CountingAudio {
        async fn speak(&self, _text: &str, _speaker: Speaker) -> CoreResult<()> {
            Ok(())
        }

        fn suspend(&self) {
            self.suspends.fetch_add(1, Ordering::SeqCst);
        }

        fn resume(&self) {
            self.resumes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup() -> (SessionHandle, Arc<CountingAudio>, PauseResumeController) {
        let session = SessionHandle::new(Arc::new(TracingDisplay));
        let audio = Arc::new(CountingAudio::default());
        let controller = PauseResumeController::new(session.clone(), audio.clone());
        (session, audio, controller)
    }

    #[test]
    fn test_pause_twice_equals_once() {
        let (session, audio, controller) = setup();
        assert!(controller.pause());
        let first = session.snapshot();
        assert!(!controller.pause());
        let second = session.snapshot();

        assert!(second.paused);
        assert_eq!(first.pending, second.pending);
        assert_eq!(first.current_speaker, second.current_speaker);
        assert_eq!(first.log, second.log);
        assert_eq!(audio.suspends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resume_when_not_paused_is_noop() {
        let (session, audio, controller) = setup();
        assert!(controller.resume().is_none());
        assert_eq!(session.lock().requested, None);
        assert_eq!(audio.resumes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resume_picks_alternate_of_last_speaker() {
        let (session, _audio, controller) = setup();
        session.lock().log.push_assistant(Speaker::AgentA, "hello");
        controller.pause();
        let (next, request) = controller.resume().expect("was paused");
        assert_eq!(next, Speaker::AgentB);
        assert_eq!(request, TurnRequest::Queued);
        assert_eq!(session.lock().requested, Some(Speaker::AgentB));
    }

    #[test]
    fn test_resume_defaults_to_agent_a() {
        let (session, _audio, controller) = setup();
        session.lock().log.push_system("journey details");
        controller.pause();
        let (next, _) = controller.resume().expect("was paused");
        assert_eq!(next, Speaker::AgentA);
    }

    #[test]
    fn test_resume_while_speech_playing_defers() {
        let (session, _audio, controller) = setup();
        session.lock().log.push_assistant(Speaker::AgentB, "analysis");
        controller.pause();
        session.lock().gate.close();
        let (next, request) = controller.resume().expect("was paused");
        assert_eq!(next, Speaker::AgentA);
        assert_eq!(request, TurnRequest::Deferred);
        assert_eq!(session.snapshot().pending, Some(Speaker::AgentA));
    }
}
