//! Error types for the Waypoint core

use thiserror::Error;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the journey and conversation subsystems.
///
/// Only [`CoreError::RouteNotFound`] is surfaced to the caller of journey selection.
/// Generation and speech failures are absorbed inside a turn; anything else that
/// escapes a turn halts the conversation loop until it is restarted.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("No route found from {origin} to {destination}")]
    RouteNotFound { origin: String, destination: String },

    #[error("Dialogue generation failed: {0}")]
    Generation(String),

    #[error("Dialogue service returned no usable content")]
    NoContent,

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Display error: {0}")]
    Display(String),

    #[error("Invalid journey: {0}")]
    InvalidJourney(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
