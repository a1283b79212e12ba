//! Conversation orchestrator: the two-agent turn-taking state machine.
//!
//! One driver task executes turns; the journey tracker, the pause controller
//! and the speech completion path only record requests on the shared session.
//!
//! ```text
//! request_turn ──▶ [requested] ──wake──▶ run() ──▶ run_turn(S) ──Continue(¬S)──▶ run_turn(¬S) ...
//!                                                     │
//!          paused ─────────────▶ Paused (no state change)
//!          gate closed ────────▶ Deferred (pending, replayed when the gate opens)
//!          no journey ─────────▶ Stalled (waiting utterance, no alternation)
//!          journey complete ───▶ Completed (last turn spoken, chain ends)
//!          unexpected error ───▶ Halted (system message, loop stops)
//! ```

mod gate;
mod pause;
mod session;

pub use gate::TurnGate;
pub use pause::PauseResumeController;
pub use session::{SessionHandle, SessionSnapshot, TurnRequest};

use crate::config::{TimingConfig, WaypointConfig};
use crate::context::{
    canned_analyzing, canned_waiting, fallback_prompt, persona_prompt, user_prompt, waiting_prompt,
    TurnContext, CHAT_FAILURE_REPLY,
};
use crate::conversation::Sender;
use crate::dialogue::DialogueGenerator;
use crate::error::CoreResult;
use crate::journey::{JourneyPhase, JourneyProgressTracker, JourneyState};
use crate::reasoning::ReasoningStore;
use crate::route::{Route, RouteTable};
use crate::speaker::Speaker;
use crate::speech::SpeechService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// City named in prompts.
    pub city: String,
    pub timing: TimingConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            city: "New York City".to_string(),
            timing: TimingConfig::default(),
        }
    }
}

impl From<&WaypointConfig> for OrchestratorConfig {
    fn from(config: &WaypointConfig) -> Self {
        Self {
            city: config.city.clone(),
            timing: config.timing.clone(),
        }
    }
}

/// How a single [`ConversationOrchestrator::run_turn`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Paused before or during the turn; no further turn follows.
    Paused,
    /// Gate was closed; the request is now the pending continuation.
    Deferred,
    /// No journey yet. `replay` carries a request that arrived while speaking.
    Stalled { replay: Option<Speaker> },
    /// Turn finished; this speaker goes next.
    Continue(Speaker),
    /// Turn finished and the journey has reached its destination.
    Completed,
    /// Unexpected failure; the loop stops until restarted.
    Halted,
    /// Session stopped.
    Stopped,
}

/// Sequences agent turns for one session.
pub struct ConversationOrchestrator {
    config: OrchestratorConfig,
    session: SessionHandle,
    generator: Arc<dyn DialogueGenerator>,
    speech: Arc<dyn SpeechService>,
    reasoning: Arc<ReasoningStore>,
    journey: watch::Receiver<JourneyState>,
}

impl ConversationOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        session: SessionHandle,
        generator: Arc<dyn DialogueGenerator>,
        speech: Arc<dyn SpeechService>,
        reasoning: Arc<ReasoningStore>,
        journey: watch::Receiver<JourneyState>,
    ) -> Self {
        Self {
            config,
            session,
            generator,
            speech,
            reasoning,
            journey,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Controller sharing this orchestrator's session and speech output.
    pub fn controller(&self) -> PauseResumeController {
        PauseResumeController::new(self.session.clone(), Arc::clone(&self.speech))
    }

    /// Select a journey on `tracker` (which must be the tracker this
    /// orchestrator's journey view was subscribed from) and note it in the log.
    pub fn select_journey(
        &self,
        tracker: &mut JourneyProgressTracker,
        table: &RouteTable,
        origin: &str,
        destination: &str,
    ) -> CoreResult<Route> {
        let route = tracker.select(table, origin, destination).map_err(|e| {
            warn!(origin, destination, error = %e, "Journey selection failed");
            e
        })?;
        self.session.journey_selected(&route);
        Ok(route)
    }

    /// Replace the journey while the conversation is running and ask AgentA to
    /// pick it up. A completed journey becomes active again. On `RouteNotFound`
    /// nothing changes.
    pub fn change_journey(
        &self,
        tracker: &mut JourneyProgressTracker,
        table: &RouteTable,
        origin: &str,
        destination: &str,
    ) -> CoreResult<TurnRequest> {
        let route = self.select_journey(tracker, table, origin, destination)?;
        self.session.show(
            Sender::System,
            &format!(
                "Starting new journey from {} to {}.",
                route.origin(),
                route.destination()
            ),
        );
        info!(origin, destination, "Journey changed");
        Ok(self.session.request_turn(Speaker::AgentA))
    }

    /// Answer a line typed by the user, outside the agent conversation.
    /// Neither the log nor the turn gate is touched.
    pub async fn chat(&self, text: &str) -> String {
        self.session.show(Sender::User, text);
        let reply = match self.generator.generate(&user_prompt(text).to_text()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Chat reply failed");
                CHAT_FAILURE_REPLY.to_string()
            }
        };
        self.session.show(Sender::Assistant, &reply);
        reply
    }

    /// Reset the history and start the conversation with AgentA.
    pub fn start(&self) -> TurnRequest {
        let route = self.journey.borrow().route().cloned();
        {
            let mut state = self.session.lock();
            state.log.clear();
            state.active = true;
            state.paused = false;
            state.halted = false;
            state.stopped = false;
            state.current_speaker = None;
            state.next_speaker = Speaker::AgentA;
            if let Some(route) = &route {
                state.log.push_system(format!(
                    "Current Journey Details:\n- Starting from: {}\n- Final Destination: {}\n- Complete Route: {}",
                    route.origin(),
                    route.destination(),
                    route.joined()
                ));
            }
        }
        match &route {
            Some(route) => self.session.show(
                Sender::System,
                &format!(
                    "Starting new journey from {} to {}.",
                    route.origin(),
                    route.destination()
                ),
            ),
            None => self
                .session
                .show(Sender::System, "Waiting for journey details to begin..."),
        }
        info!("Conversation started");
        self.session.request_turn(Speaker::AgentA)
    }

    /// Driver loop: executes queued turn requests until the session is stopped.
    pub async fn run(&self) {
        info!("Conversation driver running");
        loop {
            let request = {
                let mut state = self.session.lock();
                if state.stopped {
                    break;
                }
                state.requested.take()
            };
            match request {
                Some(speaker) => self.run_chain(speaker).await,
                None => self.session.wait_for_request().await,
            }
        }
        info!("Conversation driver stopped");
    }

    async fn run_chain(&self, first: Speaker) {
        let mut next = Some(first);
        while let Some(speaker) = next {
            next = match self.run_turn(speaker).await {
                TurnOutcome::Continue(speaker) => Some(speaker),
                TurnOutcome::Stalled { replay } => replay,
                outcome => {
                    debug!(?outcome, "Conversation chain ended");
                    None
                }
            };
            // Zero-length pauses would otherwise never hand control back to the executor.
            tokio::task::yield_now().await;
        }
    }

    /// Advance the conversation by exactly one turn for `speaker`, or defer/skip.
    pub async fn run_turn(&self, speaker: Speaker) -> TurnOutcome {
        {
            let mut state = self.session.lock();
            if state.stopped {
                return TurnOutcome::Stopped;
            }
            if state.paused {
                debug!(speaker = %speaker, "Turn skipped while paused");
                return TurnOutcome::Paused;
            }
            if !state.gate.is_open() {
                state.gate.defer(speaker);
                debug!(speaker = %speaker, "Turn deferred until speech ends");
                return TurnOutcome::Deferred;
            }
            state.gate.clear_pending();
            state.requested = None;
            state.halted = false;
            state.current_speaker = Some(speaker);
        }

        match self.execute_turn(speaker).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(speaker = %speaker, error = %e, "Conversation turn failed");
                {
                    let mut state = self.session.lock();
                    state.current_speaker = None;
                    state.halted = true;
                    state.gate.force_open();
                }
                self.session.show(Sender::System, &format!("Error: {}", e));
                TurnOutcome::Halted
            }
        }
    }

    async fn execute_turn(&self, speaker: Speaker) -> CoreResult<TurnOutcome> {
        let journey = self.journey.borrow().clone();
        let Some(route) = journey.route() else {
            return self.waiting_turn(speaker).await;
        };

        let (last_location, history) = {
            let state = self.session.lock();
            (state.last_location.clone(), state.log.entries().to_vec())
        };
        let record = self.reasoning.lookup(route.origin(), route.destination()).cloned();
        let ctx = TurnContext::new(
            &self.config.city,
            route,
            last_location.as_deref(),
            journey.progress_text(),
        )
        .with_reasoning(record)
        .with_history(history);

        let utterance = match ctx.reasoning.as_ref() {
            Some(record) => {
                let prompt = persona_prompt(speaker, &ctx, record).to_text();
                match self.generator.generate(&prompt).await {
                    Ok(text) => {
                        let mut state = self.session.lock();
                        if state.paused {
                            return Ok(TurnOutcome::Paused);
                        }
                        state.log.push_assistant(speaker, text.clone());
                        Some(text)
                    }
                    Err(e) => {
                        warn!(speaker = %speaker, error = %e, "Persona generation failed; skipping utterance");
                        None
                    }
                }
            }
            None => {
                let prompt =
                    fallback_prompt(speaker, &ctx, &self.reasoning.to_pretty_json()).to_text();
                match self.generator.generate(&prompt).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!(speaker = %speaker, error = %e, "Fallback generation failed; using canned line");
                        Some(canned_analyzing(speaker, &ctx.current_location))
                    }
                }
            }
        };

        if self.session.is_paused() {
            return Ok(TurnOutcome::Paused);
        }

        if let Some(text) = utterance {
            self.session.display().show(Sender::Agent(speaker), &text)?;
            self.speak(speaker, &text).await;
            self.pause_for(self.config.timing.post_speech_pause()).await;
        }
        self.pause_for(self.config.timing.inter_turn_pause()).await;

        let next = speaker.other();
        let complete = self.journey.borrow().phase() == JourneyPhase::Complete;
        let mut state = self.session.lock();
        if state.stopped {
            return Ok(TurnOutcome::Stopped);
        }
        if state.paused {
            return Ok(TurnOutcome::Paused);
        }
        state.next_speaker = next;
        if complete {
            info!(speaker = %speaker, "Journey complete; conversation rests");
            return Ok(TurnOutcome::Completed);
        }
        Ok(TurnOutcome::Continue(next))
    }

    /// No journey yet: ask the user to pick one, then stall.
    async fn waiting_turn(&self, speaker: Speaker) -> CoreResult<TurnOutcome> {
        let prompt = waiting_prompt(speaker, &self.config.city).to_text();
        let text = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(speaker = %speaker, error = %e, "Waiting prompt generation failed; using canned line");
                canned_waiting(speaker)
            }
        };
        if self.session.is_paused() {
            return Ok(TurnOutcome::Paused);
        }

        self.session.display().show(Sender::Agent(speaker), &text)?;
        let replay = self.speak(speaker, &text).await;
        self.pause_for(self.config.timing.waiting_pause()).await;

        let state = self.session.lock();
        if state.stopped {
            return Ok(TurnOutcome::Stopped);
        }
        if state.paused {
            return Ok(TurnOutcome::Paused);
        }
        Ok(TurnOutcome::Stalled { replay })
    }

    /// Close the gate, play, reopen. Speech errors count as completion.
    /// Returns the deferred request consumed when the gate reopened.
    async fn speak(&self, speaker: Speaker, text: &str) -> Option<Speaker> {
        {
            let mut state = self.session.lock();
            state.gate.close();
            state.current_speaker = Some(speaker);
        }
        debug!(speaker = %speaker, "Speaking");
        if let Err(e) = self.speech.speak(text, speaker).await {
            warn!(speaker = %speaker, error = %e, "Speech failed; treating as finished");
        }
        let mut state = self.session.lock();
        state.current_speaker = None;
        let paused = state.paused;
        let replay = state.gate.open(paused);
        if let Some(pending) = replay {
            debug!(pending = %pending, "Gate reopened with a pending turn");
        }
        replay
    }

    async fn pause_for(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
