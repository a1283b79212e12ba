//! Turn gate: blocks new turns while speech is playing and remembers one
//! deferred request.

use crate::speaker::Speaker;

/// Open means the last utterance finished and a new turn may start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnGate {
    open: bool,
    pending: Option<Speaker>,
}

impl Default for TurnGate {
    fn default() -> Self {
        Self {
            open: true,
            pending: None,
        }
    }
}

impl TurnGate {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn pending(&self) -> Option<Speaker> {
        self.pending
    }

    /// Called right before speech starts.
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Called when speech ends, successfully or not. Returns the deferred
    /// speaker to replay, consuming it, unless the conversation is paused.
    pub fn open(&mut self, paused: bool) -> Option<Speaker> {
        self.open = true;
        if paused {
            None
        } else {
            self.pending.take()
        }
    }

    /// Open without replaying anything; the pending request stays remembered.
    pub fn force_open(&mut self) {
        self.open = true;
    }

    /// Remember a turn requested while closed. Only the first request is
    /// kept; returns `false` when one was already pending.
    pub fn defer(&mut self, speaker: Speaker) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(speaker);
        true
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }
}
