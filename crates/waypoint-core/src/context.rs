//! Typed turn context and the single function that turns it into prompt text.
//!
//! Context assembly (what an agent knows) is kept apart from prompt formatting
//! (how it is told): the orchestrator fills a [`TurnContext`], and
//! [`Prompt::to_text`] is the only place that produces the string sent to the
//! dialogue service.

use crate::conversation::{ConversationTurn, LogRole};
use crate::reasoning::ReasoningRecord;
use crate::route::Route;
use crate::speaker::Speaker;

/// Everything an agent may refer to when a journey is selected.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub city: String,
    pub origin: String,
    pub destination: String,
    /// Last location reached; the origin until the first segment is travelled.
    pub current_location: String,
    pub route: Vec<String>,
    pub intermediate_stops: Vec<String>,
    pub progress: String,
    pub reasoning: Option<ReasoningRecord>,
    pub history: Vec<ConversationTurn>,
}

impl TurnContext {
    pub fn new(city: &str, route: &Route, last_location: Option<&str>, progress: String) -> Self {
        Self {
            city: city.to_string(),
            origin: route.origin().to_string(),
            destination: route.destination().to_string(),
            current_location: last_location.unwrap_or(route.origin()).to_string(),
            route: route.stops().to_vec(),
            intermediate_stops: route.intermediate().to_vec(),
            progress,
            reasoning: None,
            history: Vec::new(),
        }
    }

    pub fn with_reasoning(mut self, reasoning: Option<ReasoningRecord>) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    fn journey_block(&self) -> String {
        format!(
            "- Origin: {}\n- Destination: {}\n- Current Location: {}\n- Complete Route: {}\n- Intermediate Locations: {}",
            self.origin,
            self.destination,
            self.current_location,
            self.route.join(" → "),
            self.intermediate_stops.join(", "),
        )
    }
}

const NO_REPEAT: &str = "IMPORTANT: Do NOT repeat or rephrase any previous responses. \
Each message must be unique and build on the conversation history instead of restating it.";

/// Persona prompt for a speaker, built on the matched reasoning record.
pub fn persona_prompt(speaker: Speaker, ctx: &TurnContext, record: &ReasoningRecord) -> Prompt {
    let (identity, reasoning_heading, prior_heading, duties, question) = match speaker {
        Speaker::AgentA => (
            "a witty and friendly urban navigation expert",
            "Your Chain of Thought",
            "Previous Agent Response",
            "1. Acknowledge the current location and the next planned stop\n\
             2. Explain your route choice using your chain of thought\n\
             3. Point out landmarks and points of interest along the way\n\
             4. Show enthusiasm and keep a friendly, conversational tone\n\
             5. Mention specific intermediate locations",
            "Based on your chain of thought and the previous agent's response, what are your thoughts \
             about this journey segment and why did you choose this route?",
        ),
        Speaker::AgentB => (
            "a serious and analytical urban transportation expert",
            "Chain of Thought Analysis",
            "Your Previous Response",
            "1. Acknowledge the current location and the next planned stop\n\
             2. Evaluate the route choice against the chain of thought\n\
             3. Weigh potential challenges or delays and suggest optimizations\n\
             4. Be specific about subway lines, bus routes and other options\n\
             5. Keep a professional, analytical tone and mention intermediate locations",
            "Based on the chain of thought and your previous response, what is your analysis of this \
             journey segment and which transportation options would you consider?",
        ),
    };

    let system = format!(
        "You are {label}, {identity} in {city}.\n\
         User's Selected Journey:\n{journey}\n- Next planned stop: {next}\n\n\
         Current Journey Progress:\n{progress}\n\n\
         {reasoning_heading}:\n{reasoning}\n\n\
         {prior_heading}:\n{prior}\n\n\
         Your Response Should:\n{duties}\n\n\
         {no_repeat}\n\
         Build directly on the chain of thought, focus on the current location and the next planned stop, \
         and reference the current journey progress.",
        label = speaker.label(),
        identity = identity,
        city = ctx.city,
        journey = ctx.journey_block(),
        next = record.next_place,
        progress = ctx.progress,
        reasoning_heading = reasoning_heading,
        reasoning = record.reasoning,
        prior_heading = prior_heading,
        prior = record.prior_response,
        duties = duties,
        no_repeat = NO_REPEAT,
    );

    let mut prompt = Prompt::system(system);
    prompt.extend_history(&ctx.history);
    prompt.push(PromptRole::User, question);
    prompt
}

/// Neutral "journey is being analyzed" prompt used when no reasoning record matches.
pub fn fallback_prompt(speaker: Speaker, ctx: &TurnContext, candidates_json: &str) -> Prompt {
    let system = format!(
        "You are {label}, a helpful assistant providing journey updates in {city}.\n\
         User's Selected Journey:\n{journey}\n\n\
         Current Journey Progress:\n{progress}\n\n\
         Available Chain of Thought Data:\n{candidates}\n\n\
         Provide a brief message saying the journey is being analyzed. Use the available data to give \
         context about possible routes. Keep it concise, reference the complete route and intermediate \
         locations, and focus on the current location and the next stop.\n\n{no_repeat}",
        label = speaker.label(),
        city = ctx.city,
        journey = ctx.journey_block(),
        progress = ctx.progress,
        candidates = candidates_json,
        no_repeat = NO_REPEAT,
    );
    let mut prompt = Prompt::system(system);
    prompt.push(
        PromptRole::User,
        "What's the current status of our journey and what possible routes are being considered?",
    );
    prompt
}

/// Prompt asking the user to pick a journey. Carries no journey context.
pub fn waiting_prompt(speaker: Speaker, city: &str) -> Prompt {
    let system = format!(
        "You are {label}, a helpful assistant providing journey updates in {city}.\n\
         Current Situation:\n- Waiting for the user to select journey details\n\
         - No origin or destination has been selected yet\n\n\
         Provide a brief, friendly message asking the user to select their journey details. \
         Do not mention any specific locations.\n\n{no_repeat}",
        label = speaker.label(),
        city = city,
        no_repeat = NO_REPEAT,
    );
    let mut prompt = Prompt::system(system);
    prompt.push(PromptRole::User, "What should I do to start my journey?");
    prompt
}

/// Spoken when the waiting prompt cannot be generated.
pub fn canned_waiting(speaker: Speaker) -> String {
    format!(
        "{} is waiting for you to select your journey details. Please choose your start location and destination to begin.",
        speaker.label()
    )
}

/// Spoken when the fallback prompt cannot be generated.
pub fn canned_analyzing(speaker: Speaker, current_location: &str) -> String {
    format!(
        "{} is analyzing the journey from {} to the next stop.",
        speaker.label(),
        current_location
    )
}

/// System entry appended to the log when a journey is selected.
pub fn journey_selected_note(route: &Route) -> String {
    format!(
        "User has selected a new journey:\n- Origin: {}\n- Destination: {}\n- Complete Route: {}\n- Intermediate Locations: {}",
        route.origin(),
        route.destination(),
        route.joined(),
        route.intermediate().join(", "),
    )
}

/// Prompt for a line typed directly by the user: no persona, no journey.
pub fn user_prompt(text: &str) -> Prompt {
    let mut prompt = Prompt::default();
    prompt.push(PromptRole::User, text);
    prompt
}

/// Reply shown when a direct user message cannot be answered.
pub const CHAT_FAILURE_REPLY: &str = "Sorry, something went wrong with Gemini...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

/// Ordered prompt messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    messages: Vec<PromptMessage>,
}

impl Prompt {
    pub fn system(content: impl Into<String>) -> Self {
        let mut prompt = Self::default();
        prompt.push(PromptRole::System, content);
        prompt
    }

    pub fn push(&mut self, role: PromptRole, content: impl Into<String>) {
        self.messages.push(PromptMessage {
            role,
            content: content.into(),
        });
    }

    fn extend_history(&mut self, history: &[ConversationTurn]) {
        for turn in history {
            let role = match turn.role {
                LogRole::System => PromptRole::System,
                LogRole::Assistant => PromptRole::Assistant,
            };
            self.push(role, turn.text.clone());
        }
    }

    pub fn messages(&self) -> &[PromptMessage] {
        &self.messages
    }

    /// Flatten into the single text block the dialogue service receives.
    /// System messages become `Instructions: ...`, others `role: ...`, separated by blank lines.
    pub fn to_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| match m.role {
                PromptRole::System => format!("Instructions: {}", m.content),
                PromptRole::User => format!("user: {}", m.content),
                PromptRole::Assistant => format!("assistant: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
