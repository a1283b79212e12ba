//! The two simulated agents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two conversation agents. Turns alternate strictly between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    /// Enthusiastic, narrative navigator. Opens every conversation.
    AgentA,
    /// Serious, analytical transportation expert.
    AgentB,
}

impl Speaker {
    /// The agent who speaks after this one.
    pub fn other(self) -> Speaker {
        match self {
            Speaker::AgentA => Speaker::AgentB,
            Speaker::AgentB => Speaker::AgentA,
        }
    }

    /// Label shown in the display and used inside prompts.
    pub fn label(self) -> &'static str {
        match self {
            Speaker::AgentA => "Agent1",
            Speaker::AgentB => "Agent2",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
