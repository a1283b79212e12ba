//! Waypoint configuration loaded from TOML and environment.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | city | New York City | City named in every agent prompt. |
//! | route_table_path | data/routes.csv | One multi-stop path per line. |
//! | reasoning_path | data/reasoning.jsonl | One reasoning record (JSON) per line. |
//! | llm_mode | mock | "mock" (offline) or "gemini". |
//! | tts_mode | silent | "silent", "google" or "openai". |
//! | timing.* | see [`TimingConfig`] | Pauses between turns and segment interval. |
//!
//! Env overrides use the `WAYPOINT` prefix with `__` as separator, e.g.
//! `WAYPOINT__TIMING__INTER_TURN_PAUSE_MS=500`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/waypoint";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

fn default_post_speech_pause_ms() -> u64 {
    2000
}

fn default_inter_turn_pause_ms() -> u64 {
    3000
}

fn default_waiting_pause_ms() -> u64 {
    2000
}

fn default_segment_interval_ms() -> u64 {
    10_000
}

/// Fixed delays of the conversation loop and the journey ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingConfig {
    /// Pause after an agent finishes speaking.
    #[serde(default = "default_post_speech_pause_ms")]
    pub post_speech_pause_ms: u64,
    /// Additional pause before the other agent takes its turn.
    #[serde(default = "default_inter_turn_pause_ms")]
    pub inter_turn_pause_ms: u64,
    /// Pause after a "waiting for journey" utterance.
    #[serde(default = "default_waiting_pause_ms")]
    pub waiting_pause_ms: u64,
    /// Time spent on each route segment before the tracker advances.
    #[serde(default = "default_segment_interval_ms")]
    pub segment_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            post_speech_pause_ms: default_post_speech_pause_ms(),
            inter_turn_pause_ms: default_inter_turn_pause_ms(),
            waiting_pause_ms: default_waiting_pause_ms(),
            segment_interval_ms: default_segment_interval_ms(),
        }
    }
}

impl TimingConfig {
    /// All delays zero; used by tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            post_speech_pause_ms: 0,
            inter_turn_pause_ms: 0,
            waiting_pause_ms: 0,
            segment_interval_ms: 0,
        }
    }

    pub fn post_speech_pause(&self) -> Duration {
        Duration::from_millis(self.post_speech_pause_ms)
    }

    pub fn inter_turn_pause(&self) -> Duration {
        Duration::from_millis(self.inter_turn_pause_ms)
    }

    pub fn waiting_pause(&self) -> Duration {
        Duration::from_millis(self.waiting_pause_ms)
    }

    pub fn segment_interval(&self) -> Duration {
        Duration::from_millis(self.segment_interval_ms)
    }
}

/// Global demo configuration. Load with [`WaypointConfig::load`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaypointConfig {
    pub city: String,
    pub route_table_path: String,
    pub reasoning_path: String,
    pub llm_mode: String,
    #[serde(default)]
    pub gemini_model: Option<String>,
    pub tts_mode: String,
    /// Journey origin when none is given on the command line.
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Default for WaypointConfig {
    fn default() -> Self {
        Self {
            city: "New York City".to_string(),
            route_table_path: "data/routes.csv".to_string(),
            reasoning_path: "data/reasoning.jsonl".to_string(),
            llm_mode: "mock".to_string(),
            gemini_model: None,
            tts_mode: "silent".to_string(),
            origin: None,
            destination: None,
            timing: TimingConfig::default(),
        }
    }
}

impl WaypointConfig {
    /// Load config from file and environment. Precedence: env `WAYPOINT__*` >
    /// file at `WAYPOINT_CONFIG` (default `config/waypoint.toml`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("WAYPOINT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path)
    }

    /// Load with an explicit file stem or path; a missing file falls back to defaults.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let builder = config::Config::builder()
            .set_default("city", defaults.city)?
            .set_default("route_table_path", defaults.route_table_path)?
            .set_default("reasoning_path", defaults.reasoning_path)?
            .set_default("llm_mode", defaults.llm_mode)?
            .set_default("tts_mode", defaults.tts_mode)?;

        let path = Path::new(config_path);
        let with_ext = path.with_extension("toml");
        let builder = if path.is_file() {
            builder.add_source(config::File::from(path))
        } else if with_ext.is_file() {
            builder.add_source(config::File::from(with_ext.as_path()))
        } else {
            builder
        };

        builder
            .add_source(config::Environment::with_prefix("WAYPOINT").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn gemini_model(&self) -> &str {
        self.gemini_model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL)
    }

    /// True when dialogue should come from the offline generator.
    pub fn llm_is_mock(&self) -> bool {
        self.llm_mode.trim().eq_ignore_ascii_case("mock")
    }
}
