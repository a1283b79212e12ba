//! Append-only conversation log and the display sink that renders it.

use crate::error::CoreResult;
use crate::speaker::Speaker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a log entry inside prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRole {
    /// Journey details and other framing.
    System,
    /// A generated agent turn.
    Assistant,
}

impl LogRole {
    pub fn as_str(self) -> &'static str {
        match self {
            LogRole::System => "system",
            LogRole::Assistant => "assistant",
        }
    }
}

/// One immutable entry of the shared conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: LogRole,
    /// Set for assistant turns.
    pub speaker: Option<Speaker>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered history read by the dialogue generator. Entries are only ever appended.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    entries: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_system(&mut self, text: impl Into<String>) {
        self.entries.push(ConversationTurn {
            role: LogRole::System,
            speaker: None,
            text: text.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn push_assistant(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.entries.push(ConversationTurn {
            role: LogRole::Assistant,
            speaker: Some(speaker),
            text: text.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[ConversationTurn] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Speaker of the most recent attributed entry.
    pub fn last_speaker(&self) -> Option<Speaker> {
        self.entries.iter().rev().find_map(|e| e.speaker)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Who a displayed line is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    System,
    Agent(Speaker),
    /// A line typed by the user.
    User,
    /// Reply to a user line, outside the two-agent conversation.
    Assistant,
}

impl Sender {
    pub fn label(self) -> &'static str {
        match self {
            Sender::System => "System",
            Sender::Agent(speaker) => speaker.label(),
            Sender::User => "User",
            Sender::Assistant => "Agent",
        }
    }
}

/// Consumer of displayed lines (chat panel, console, test recorder).
pub trait DisplaySink: Send + Sync {
    fn show(&self, sender: Sender, text: &str) -> CoreResult<()>;
}

/// Display sink that writes each line to the tracing log.
#[derive(Debug, Default)]
pub struct TracingDisplay;

impl DisplaySink for TracingDisplay {
    fn show(&self, sender: Sender, text: &str) -> CoreResult<()> {
        tracing::info!(sender = sender.label(), "{}", text);
        Ok(())
    }
}
