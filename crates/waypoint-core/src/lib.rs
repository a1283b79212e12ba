//! # Waypoint Core - Journey Conversation Engine
//!
//! Two simulated agents talk about a journey while it is travelled. This crate
//! owns the turn-taking: who speaks when, what context each agent gets, and how
//! speech or generation failures and pauses are absorbed without deadlocking.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  JourneyProgressTracker ──segment──▶ SessionHandle            │
//! │        (Ticker)                        │  requested / gate    │
//! │                                        ▼                      │
//! │  DialogueGenerator ◀── ConversationOrchestrator ──▶ Speech    │
//! │   (Gemini / mock)        (driver loop, TurnGate)   Service    │
//! │                                        ▲                      │
//! │                          PauseResumeController                │
//! └───────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod conversation;
pub mod dialogue;
pub mod error;
pub mod journey;
pub mod orchestrator;
pub mod reasoning;
pub mod route;
pub mod speaker;
pub mod speech;

pub use config::{TimingConfig, WaypointConfig};
pub use context::{Prompt, PromptMessage, PromptRole, TurnContext};
pub use conversation::{ConversationLog, ConversationTurn, DisplaySink, LogRole, Sender, TracingDisplay};
pub use dialogue::{DialogueGenerator, GeminiGenerator, MockGenerator};
pub use error::{CoreError, CoreResult};
pub use journey::{
    AdvanceOutcome, ChannelTicker, IntervalTicker, JourneyPhase, JourneyProgressTracker, JourneyState,
    SegmentListener, Ticker,
};
pub use orchestrator::{
    ConversationOrchestrator, OrchestratorConfig, PauseResumeController, SessionHandle, SessionSnapshot,
    TurnGate, TurnOutcome, TurnRequest,
};
pub use reasoning::{ReasoningRecord, ReasoningStore};
pub use route::{Route, RouteTable};
pub use speaker::Speaker;
pub use speech::SpeechService;
