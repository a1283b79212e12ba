//! Session state shared by the driver, the journey tracker and the pause controller.
//!
//! All turn-related fields live in one [`SessionState`] behind a mutex. The lock
//! is never held across an await point; the single driver task is the only one
//! that executes turns, everybody else only records requests and wakes it.

use super::gate::TurnGate;
use crate::context::journey_selected_note;
use crate::conversation::{ConversationLog, ConversationTurn, DisplaySink, Sender};
use crate::journey::SegmentListener;
use crate::route::Route;
use crate::speaker::Speaker;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub(crate) struct SessionState {
    /// Conversation started (view open).
    pub active: bool,
    pub paused: bool,
    pub stopped: bool,
    /// Last turn ended with an unexpected error.
    pub halted: bool,
    pub gate: TurnGate,
    /// Turn request waiting for the idle driver.
    pub requested: Option<Speaker>,
    pub log: ConversationLog,
    pub last_location: Option<String>,
    pub current_speaker: Option<Speaker>,
    pub next_speaker: Speaker,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            active: false,
            paused: false,
            stopped: false,
            halted: false,
            gate: TurnGate::default(),
            requested: None,
            log: ConversationLog::new(),
            last_location: None,
            current_speaker: None,
            next_speaker: Speaker::AgentA,
        }
    }
}

/// What happened to a turn request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRequest {
    /// Paused or stopped; nothing recorded.
    Ignored,
    /// Speech in progress; remembered as the pending continuation.
    Deferred,
    /// Handed to the driver.
    Queued,
}

/// Point-in-time copy of the session for display and tests.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub active: bool,
    pub paused: bool,
    pub halted: bool,
    pub gate_open: bool,
    pub pending: Option<Speaker>,
    pub current_speaker: Option<Speaker>,
    pub next_speaker: Speaker,
    pub last_location: Option<String>,
    pub log: Vec<ConversationTurn>,
}

/// Cloneable handle on one conversation session.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<Mutex<SessionState>>,
    wake: Arc<Notify>,
    display: Arc<dyn DisplaySink>,
}

impl SessionHandle {
    pub fn new(display: Arc<dyn DisplaySink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            wake: Arc::new(Notify::new()),
            display,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn display(&self) -> &Arc<dyn DisplaySink> {
        &self.display
    }

    pub(crate) async fn wait_for_request(&self) {
        self.wake.notified().await;
    }

    /// Show a line, logging instead of failing when the sink rejects it.
    pub(crate) fn show(&self, sender: Sender, text: &str) {
        if let Err(e) = self.display.show(sender, text) {
            warn!(sender = sender.label(), error = %e, "Display sink rejected message");
        }
    }

    /// Ask for `speaker` to take a turn. Requests collapse: while one is
    /// pending or queued, later ones are dropped.
    pub fn request_turn(&self, speaker: Speaker) -> TurnRequest {
        {
            let mut state = self.lock();
            if state.stopped || state.paused {
                debug!(speaker = %speaker, "Turn request ignored while paused");
                return TurnRequest::Ignored;
            }
            if !state.gate.is_open() {
                state.gate.defer(speaker);
                debug!(speaker = %speaker, "Speech in progress, turn deferred");
                return TurnRequest::Deferred;
            }
            if state.requested.is_none() {
                state.requested = Some(speaker);
            }
        }
        self.wake.notify_one();
        TurnRequest::Queued
    }

    /// Record a newly selected journey in the shared history.
    pub fn journey_selected(&self, route: &Route) {
        let mut state = self.lock();
        state.last_location = None;
        state.log.push_system(journey_selected_note(route));
    }

    /// Ask the driver to exit once the current turn finishes.
    pub fn stop(&self) {
        self.lock().stopped = true;
        self.wake.notify_one();
        info!("Conversation stop requested");
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            active: state.active,
            paused: state.paused,
            halted: state.halted,
            gate_open: state.gate.is_open(),
            pending: state.gate.pending(),
            current_speaker: state.current_speaker,
            next_speaker: state.next_speaker,
            last_location: state.last_location.clone(),
            log: state.log.entries().to_vec(),
        }
    }
}

impl SegmentListener for SessionHandle {
    fn segment_started(&self, from: &str, to: &str) {
        let wants_turn = {
            let mut state = self.lock();
            state.last_location = Some(to.to_string());
            state.active && !state.paused
        };
        self.show(Sender::System, &format!("Progressing to next segment: {} → {}", from, to));
        if wants_turn {
            self.request_turn(Speaker::AgentA);
        }
    }

    fn journey_completed(&self) {
        self.show(Sender::System, "Journey completed!");
    }
}
