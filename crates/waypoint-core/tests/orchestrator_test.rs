//! Integration tests for the conversation orchestrator.
//!
//! Collaborators are scripted fakes and every pause is zero-length, so turns
//! run as fast as the executor allows.
//!
//! Run with: `cargo test -p waypoint-core --test orchestrator_test`

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;
use waypoint_core::{
    ConversationOrchestrator, CoreError, CoreResult, DialogueGenerator, DisplaySink, JourneyPhase,
    JourneyProgressTracker, LogRole, OrchestratorConfig, ReasoningRecord, ReasoningStore, RouteTable,
    Sender, Speaker, SpeechService, TimingConfig, TurnOutcome, TurnRequest,
};

const ROUTES: &str = "Times Square,Bryant Park,Grand Central,Central Park\n\
                      Times Square,Herald Square,Union Square,Wall Street\n";

#[derive(Default)]
struct FakeGenerator {
    fail: AtomicBool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl DialogueGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> CoreResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::Generation("service unreachable".to_string()));
        }
        Ok(format!("reply {}", n))
    }
}

type Hook = Box<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct FakeSpeech {
    spoken: Mutex<Vec<(Speaker, String)>>,
    fail: AtomicBool,
    hold: AtomicBool,
    started: Notify,
    release: Notify,
    hook: Mutex<Option<Hook>>,
    suspends: AtomicUsize,
}

impl FakeSpeech {
    fn set_hook(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    fn speakers(&self) -> Vec<Speaker> {
        self.spoken.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }

    fn texts(&self) -> Vec<String> {
        self.spoken.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl SpeechService for FakeSpeech {
    async fn speak(&self, text: &str, speaker: Speaker) -> CoreResult<()> {
        let n = {
            let mut spoken = self.spoken.lock().unwrap();
            spoken.push((speaker, text.to_string()));
            spoken.len()
        };
        {
            let hook = self.hook.lock().unwrap();
            if let Some(hook) = hook.as_ref() {
                hook(n);
            }
        }
        if self.hold.load(Ordering::SeqCst) {
            self.started.notify_one();
            self.release.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::Speech("audio device lost".to_string()));
        }
        Ok(())
    }

    fn suspend(&self) {
        self.suspends.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeDisplay {
    lines: Mutex<Vec<(String, String)>>,
    reject_agents: AtomicBool,
}

impl FakeDisplay {
    fn lines(&self) -> Vec<(String, String)> {
        self.lines.lock().unwrap().clone()
    }
}

impl DisplaySink for FakeDisplay {
    fn show(&self, sender: Sender, text: &str) -> CoreResult<()> {
        if matches!(sender, Sender::Agent(_)) && self.reject_agents.load(Ordering::SeqCst) {
            return Err(CoreError::Display("chat panel detached".to_string()));
        }
        self.lines
            .lock()
            .unwrap()
            .push((sender.label().to_string(), text.to_string()));
        Ok(())
    }
}

struct Harness {
    orchestrator: Arc<ConversationOrchestrator>,
    tracker: JourneyProgressTracker,
    table: RouteTable,
    generator: Arc<FakeGenerator>,
    speech: Arc<FakeSpeech>,
    display: Arc<FakeDisplay>,
}

impl Harness {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let display = Arc::new(FakeDisplay::default());
        let session = waypoint_core::SessionHandle::new(display.clone());
        let tracker = JourneyProgressTracker::new().with_listener(Arc::new(session.clone()));
        let generator = Arc::new(FakeGenerator::default());
        let speech = Arc::new(FakeSpeech::default());
        let reasoning = Arc::new(ReasoningStore::new(vec![ReasoningRecord {
            reasoning: "From Times Square walk north past Bryant Park and Grand Central to Central Park."
                .to_string(),
            next_place: "Bryant Park".to_string(),
            prior_response: "The 1 train would be quicker.".to_string(),
        }]));
        let config = OrchestratorConfig {
            city: "New York City".to_string(),
            timing: TimingConfig::immediate(),
        };
        let orchestrator = Arc::new(ConversationOrchestrator::new(
            config,
            session,
            generator.clone(),
            speech.clone(),
            reasoning,
            tracker.subscribe(),
        ));
        Self {
            orchestrator,
            tracker,
            table: RouteTable::parse(ROUTES).expect("route table"),
            generator,
            speech,
            display,
        }
    }

    fn select(&mut self, origin: &str, destination: &str) {
        self.orchestrator
            .select_journey(&mut self.tracker, &self.table, origin, destination)
            .expect("route exists");
    }
}

fn assistant_speakers(orchestrator: &ConversationOrchestrator) -> Vec<Speaker> {
    orchestrator
        .session()
        .snapshot()
        .log
        .iter()
        .filter(|t| t.role == LogRole::Assistant)
        .filter_map(|t| t.speaker)
        .collect()
}

#[tokio::test]
async fn test_alternation_is_strictly_two_periodic() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    h.orchestrator.start();

    let mut speaker = Speaker::AgentB;
    for _ in 0..6 {
        match h.orchestrator.run_turn(speaker).await {
            TurnOutcome::Continue(next) => speaker = next,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    let expected = vec![
        Speaker::AgentB,
        Speaker::AgentA,
        Speaker::AgentB,
        Speaker::AgentA,
        Speaker::AgentB,
        Speaker::AgentA,
    ];
    assert_eq!(h.speech.speakers(), expected);
    assert_eq!(assistant_speakers(&h.orchestrator), expected);
}

#[tokio::test]
async fn test_persona_turn_is_logged_and_prompt_carries_context() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    h.orchestrator.start();

    let outcome = h.orchestrator.run_turn(Speaker::AgentA).await;
    assert_eq!(outcome, TurnOutcome::Continue(Speaker::AgentB));

    let snapshot = h.orchestrator.session().snapshot();
    let last = snapshot.log.last().expect("log entry");
    assert_eq!(last.role, LogRole::Assistant);
    assert_eq!(last.speaker, Some(Speaker::AgentA));
    assert_eq!(last.text, "reply 1");

    let prompt = h.generator.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("You are Agent1"));
    assert!(prompt.contains("- Next planned stop: Bryant Park"));
    assert!(prompt.contains("- Current Location: Times Square"));
    assert!(prompt.contains("Current Segment: Times Square → Bryant Park"));
    assert!(prompt.contains("Instructions: Current Journey Details:"));

    assert!(h
        .display
        .lines()
        .contains(&("Agent1".to_string(), "reply 1".to_string())));
}

#[tokio::test]
async fn test_unmatched_journey_uses_fallback_without_logging() {
    let mut h = Harness::new();
    h.select("Times Square", "Wall Street");
    h.orchestrator.start();
    let log_before = h.orchestrator.session().snapshot().log.len();

    let outcome = h.orchestrator.run_turn(Speaker::AgentA).await;
    assert_eq!(outcome, TurnOutcome::Continue(Speaker::AgentB));

    assert_eq!(h.orchestrator.session().snapshot().log.len(), log_before);
    assert_eq!(h.speech.texts(), vec!["reply 1".to_string()]);
    let prompt = h.generator.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("being analyzed"));
    assert!(prompt.contains("\"next_place\": \"Bryant Park\""));
}

#[tokio::test]
async fn test_no_journey_stalls_without_alternating() {
    let h = Harness::new();
    assert_eq!(h.orchestrator.start(), TurnRequest::Queued);

    let outcome = h.orchestrator.run_turn(Speaker::AgentA).await;
    assert_eq!(outcome, TurnOutcome::Stalled { replay: None });
    assert_eq!(h.speech.speakers(), vec![Speaker::AgentA]);
    assert!(h.orchestrator.session().snapshot().log.is_empty());

    let prompt = h.generator.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("No origin or destination has been selected yet"));
    assert!(h
        .display
        .lines()
        .contains(&("System".to_string(), "Waiting for journey details to begin...".to_string())));
}

#[tokio::test]
async fn test_speech_failure_opens_gate_and_replays_pending() {
    let h = Harness::new();
    h.orchestrator.start();
    h.speech.fail.store(true, Ordering::SeqCst);

    let session = h.orchestrator.session().clone();
    let deferred = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&deferred);
    h.speech.set_hook(move |_| {
        *seen.lock().unwrap() = Some(session.request_turn(Speaker::AgentB));
    });

    let outcome = h.orchestrator.run_turn(Speaker::AgentA).await;

    assert_eq!(*deferred.lock().unwrap(), Some(TurnRequest::Deferred));
    assert_eq!(
        outcome,
        TurnOutcome::Stalled {
            replay: Some(Speaker::AgentB)
        }
    );
    let snapshot = h.orchestrator.session().snapshot();
    assert!(snapshot.gate_open);
    assert_eq!(snapshot.pending, None);
    assert!(!snapshot.halted);
}

#[tokio::test]
async fn test_speech_failure_in_journey_turn_still_continues() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    h.orchestrator.start();
    h.speech.fail.store(true, Ordering::SeqCst);

    let outcome = h.orchestrator.run_turn(Speaker::AgentA).await;
    assert_eq!(outcome, TurnOutcome::Continue(Speaker::AgentB));
    assert!(h.orchestrator.session().snapshot().gate_open);
}

#[tokio::test]
async fn test_generation_failure_skips_persona_utterance() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    h.orchestrator.start();
    h.generator.fail.store(true, Ordering::SeqCst);
    let log_before = h.orchestrator.session().snapshot().log.len();

    let outcome = h.orchestrator.run_turn(Speaker::AgentA).await;
    assert_eq!(outcome, TurnOutcome::Continue(Speaker::AgentB));
    assert!(h.speech.spoken.lock().unwrap().is_empty());
    assert_eq!(h.orchestrator.session().snapshot().log.len(), log_before);
}

#[tokio::test]
async fn test_generation_failure_in_fallback_speaks_canned_line() {
    let mut h = Harness::new();
    h.select("Times Square", "Wall Street");
    h.orchestrator.start();
    h.generator.fail.store(true, Ordering::SeqCst);

    h.orchestrator.run_turn(Speaker::AgentB).await;
    assert_eq!(
        h.speech.texts(),
        vec!["Agent2 is analyzing the journey from Times Square to the next stop.".to_string()]
    );
}

#[tokio::test]
async fn test_paused_turn_is_a_noop() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    h.orchestrator.start();
    let controller = h.orchestrator.controller();
    assert!(controller.pause());
    let before = h.orchestrator.session().snapshot();

    assert_eq!(h.orchestrator.run_turn(Speaker::AgentA).await, TurnOutcome::Paused);
    let after = h.orchestrator.session().snapshot();
    assert_eq!(before.log, after.log);
    assert!(h.speech.spoken.lock().unwrap().is_empty());
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pause_mid_turn_prevents_continuation_without_mutation() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    h.orchestrator.start();

    let controller = h.orchestrator.controller();
    let session = h.orchestrator.session().clone();
    let at_pause = Arc::new(Mutex::new(None));
    let captured = Arc::clone(&at_pause);
    h.speech.set_hook(move |_| {
        controller.pause();
        *captured.lock().unwrap() = Some(session.snapshot().log);
    });
    let journey_before = h.tracker.state();

    let outcome = h.orchestrator.run_turn(Speaker::AgentA).await;
    assert_eq!(outcome, TurnOutcome::Paused);

    let snapshot = h.orchestrator.session().snapshot();
    assert!(snapshot.paused);
    assert!(snapshot.gate_open);
    assert_eq!(Some(snapshot.log), at_pause.lock().unwrap().clone());
    assert_eq!(h.tracker.state(), journey_before);
    assert_eq!(h.speech.suspends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_turn_requested_while_speaking_is_deferred_then_replayed() {
    let h = Harness::new();
    h.orchestrator.start();
    h.speech.hold.store(true, Ordering::SeqCst);

    let orchestrator = Arc::clone(&h.orchestrator);
    let first = tokio::spawn(async move { orchestrator.run_turn(Speaker::AgentA).await });
    timeout(Duration::from_secs(5), h.speech.started.notified())
        .await
        .expect("speech started");

    assert_eq!(h.orchestrator.run_turn(Speaker::AgentB).await, TurnOutcome::Deferred);
    assert_eq!(h.orchestrator.run_turn(Speaker::AgentA).await, TurnOutcome::Deferred);
    let snapshot = h.orchestrator.session().snapshot();
    assert!(!snapshot.gate_open);
    assert_eq!(snapshot.pending, Some(Speaker::AgentB));

    h.speech.release.notify_one();
    let outcome = timeout(Duration::from_secs(5), first)
        .await
        .expect("turn finished")
        .expect("task joined");
    assert_eq!(
        outcome,
        TurnOutcome::Stalled {
            replay: Some(Speaker::AgentB)
        }
    );
}

#[tokio::test]
async fn test_segment_advance_during_speech_sets_pending_for_agent_a() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    h.orchestrator.start();

    let tracker = Arc::new(Mutex::new(std::mem::take(&mut h.tracker)));
    let session = h.orchestrator.session().clone();
    let pending_during_speech = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&pending_during_speech);
    let advancing = Arc::clone(&tracker);
    h.speech.set_hook(move |n| {
        if n == 1 {
            advancing.lock().unwrap().advance();
            *seen.lock().unwrap() = Some(session.snapshot().pending);
        }
    });

    let outcome = h.orchestrator.run_turn(Speaker::AgentB).await;
    assert_eq!(outcome, TurnOutcome::Continue(Speaker::AgentA));
    assert_eq!(*pending_during_speech.lock().unwrap(), Some(Some(Speaker::AgentA)));

    let snapshot = h.orchestrator.session().snapshot();
    assert_eq!(snapshot.last_location.as_deref(), Some("Bryant Park"));
    assert!(h.display.lines().contains(&(
        "System".to_string(),
        "Progressing to next segment: Times Square → Bryant Park".to_string()
    )));

    // The next turn speaks from the newly reached location.
    h.orchestrator.run_turn(Speaker::AgentA).await;
    let prompt = h.generator.prompts.lock().unwrap()[1].clone();
    assert!(prompt.contains("- Current Location: Bryant Park"));
    assert_eq!(tracker.lock().unwrap().state().current_index(), 1);
}

#[tokio::test]
async fn test_display_failure_halts_loop() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    h.orchestrator.start();
    h.display.reject_agents.store(true, Ordering::SeqCst);

    let outcome = h.orchestrator.run_turn(Speaker::AgentA).await;
    assert_eq!(outcome, TurnOutcome::Halted);

    let snapshot = h.orchestrator.session().snapshot();
    assert!(snapshot.halted);
    assert!(snapshot.gate_open);
    assert_eq!(snapshot.current_speaker, None);
    assert!(h
        .display
        .lines()
        .iter()
        .any(|(sender, text)| sender == "System" && text.starts_with("Error: Display error")));

    // An external restart runs turns again.
    h.display.reject_agents.store(false, Ordering::SeqCst);
    assert_eq!(
        h.orchestrator.run_turn(Speaker::AgentA).await,
        TurnOutcome::Continue(Speaker::AgentB)
    );
    assert!(!h.orchestrator.session().snapshot().halted);
}

#[tokio::test]
async fn test_unknown_route_is_reported_and_journey_not_started() {
    let mut h = Harness::new();
    let err = h
        .orchestrator
        .select_journey(&mut h.tracker, &h.table, "Central Park", "Times Square")
        .unwrap_err();
    assert!(matches!(err, CoreError::RouteNotFound { .. }));
    assert_eq!(h.tracker.state().phase(), JourneyPhase::Idle);
    assert!(h.orchestrator.session().snapshot().log.is_empty());
}

#[tokio::test]
async fn test_driver_runs_until_paused_and_resume_picks_alternate() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");

    let controller = h.orchestrator.controller();
    let paused = Arc::new(Notify::new());
    let signal = Arc::clone(&paused);
    let pauser = controller.clone();
    h.speech.set_hook(move |n| {
        if n == 4 {
            pauser.pause();
            signal.notify_one();
        }
    });

    let orchestrator = Arc::clone(&h.orchestrator);
    let driver = tokio::spawn(async move { orchestrator.run().await });
    assert_eq!(h.orchestrator.start(), TurnRequest::Queued);

    timeout(Duration::from_secs(5), paused.notified())
        .await
        .expect("paused after four turns");
    // Let the interrupted turn unwind.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        h.speech.speakers(),
        vec![Speaker::AgentA, Speaker::AgentB, Speaker::AgentA, Speaker::AgentB]
    );
    let snapshot = h.orchestrator.session().snapshot();
    assert!(snapshot.paused);
    assert_eq!(snapshot.log.iter().rev().find_map(|t| t.speaker), Some(Speaker::AgentB));

    h.speech.set_hook(|_| {});
    let (next, _) = controller.resume().expect("was paused");
    assert_eq!(next, Speaker::AgentA);

    timeout(Duration::from_secs(5), async {
        while h.speech.speakers().len() < 5 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("conversation resumed");
    assert_eq!(h.speech.speakers()[4], Speaker::AgentA);

    controller.pause();
    h.orchestrator.session().stop();
    timeout(Duration::from_secs(5), driver)
        .await
        .expect("driver exits")
        .expect("driver joined");
}

#[tokio::test]
async fn test_completed_journey_ends_the_chain() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    for _ in 0..3 {
        h.tracker.advance();
    }
    assert_eq!(h.tracker.state().phase(), JourneyPhase::Complete);
    h.orchestrator.start();

    assert_eq!(h.orchestrator.run_turn(Speaker::AgentA).await, TurnOutcome::Completed);
    assert_eq!(h.speech.speakers(), vec![Speaker::AgentA]);
    assert!(h
        .display
        .lines()
        .contains(&("System".to_string(), "Journey completed!".to_string())));

    // The driver speaks the closing turn once and then waits.
    let orchestrator = Arc::clone(&h.orchestrator);
    let driver = tokio::spawn(async move { orchestrator.run().await });
    h.orchestrator.start();
    timeout(Duration::from_secs(5), async {
        while h.speech.speakers().len() < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("closing turn spoken");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.speech.speakers().len(), 2);

    h.orchestrator.session().stop();
    timeout(Duration::from_secs(5), driver)
        .await
        .expect("driver exits")
        .expect("driver joined");
}

#[tokio::test]
async fn test_change_journey_after_completion_starts_again() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    for _ in 0..3 {
        h.tracker.advance();
    }
    h.orchestrator.start();
    assert_eq!(h.orchestrator.run_turn(Speaker::AgentA).await, TurnOutcome::Completed);

    let request = h
        .orchestrator
        .change_journey(&mut h.tracker, &h.table, "Times Square", "Wall Street")
        .expect("route exists");
    assert_eq!(request, TurnRequest::Queued);
    assert_eq!(h.tracker.state().phase(), JourneyPhase::Active);
    assert!(h.display.lines().contains(&(
        "System".to_string(),
        "Starting new journey from Times Square to Wall Street.".to_string()
    )));

    assert_eq!(
        h.orchestrator.run_turn(Speaker::AgentA).await,
        TurnOutcome::Continue(Speaker::AgentB)
    );
}

#[tokio::test]
async fn test_change_journey_from_waiting_resumes_alternation() {
    let mut h = Harness::new();
    h.orchestrator.start();
    assert_eq!(
        h.orchestrator.run_turn(Speaker::AgentA).await,
        TurnOutcome::Stalled { replay: None }
    );

    h.orchestrator
        .change_journey(&mut h.tracker, &h.table, "Times Square", "Central Park")
        .expect("route exists");
    let snapshot = h.orchestrator.session().snapshot();
    assert!(snapshot
        .log
        .iter()
        .any(|t| t.role == LogRole::System && t.text.starts_with("User has selected a new journey")));

    assert_eq!(
        h.orchestrator.run_turn(Speaker::AgentA).await,
        TurnOutcome::Continue(Speaker::AgentB)
    );
}

#[tokio::test]
async fn test_change_journey_to_unknown_route_keeps_current() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    h.orchestrator.start();
    let before = h.tracker.state();

    let err = h
        .orchestrator
        .change_journey(&mut h.tracker, &h.table, "Wall Street", "Times Square")
        .unwrap_err();
    assert!(matches!(err, CoreError::RouteNotFound { .. }));
    assert_eq!(h.tracker.state(), before);
}

#[tokio::test]
async fn test_chat_failure_shows_apology_without_touching_conversation() {
    let mut h = Harness::new();
    h.select("Times Square", "Central Park");
    h.orchestrator.start();
    h.generator.fail.store(true, Ordering::SeqCst);
    let before = h.orchestrator.session().snapshot();

    let reply = h.orchestrator.chat("Is the park open?").await;
    assert_eq!(reply, "Sorry, something went wrong with Gemini...");

    let lines = h.display.lines();
    assert!(lines.contains(&("User".to_string(), "Is the park open?".to_string())));
    assert!(lines.contains(&("Agent".to_string(), reply.clone())));
    assert_eq!(
        h.generator.prompts.lock().unwrap().as_slice(),
        &["user: Is the park open?".to_string()]
    );

    let after = h.orchestrator.session().snapshot();
    assert_eq!(before.log, after.log);
    assert!(after.gate_open);
    assert_eq!(after.pending, None);
    assert!(h.speech.spoken.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_reply_is_shown_as_agent() {
    let h = Harness::new();
    let reply = h.orchestrator.chat("hello").await;
    assert_eq!(reply, "reply 1");
    assert!(h
        .display
        .lines()
        .contains(&("Agent".to_string(), "reply 1".to_string())));
    assert!(h.orchestrator.session().snapshot().log.is_empty());
}
