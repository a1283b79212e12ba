//! Reasoning records ("chain of thought" entries) attached to journeys.
//!
//! Records are matched by case-insensitive substring containment of both the
//! origin and the destination in the reasoning text. When several records match,
//! the first one in collection order wins.

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// One precomputed reasoning entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningRecord {
    #[serde(rename = "CoT")]
    pub reasoning: String,
    #[serde(rename = "next_place")]
    pub next_place: String,
    #[serde(rename = "response_to_other_agent")]
    pub prior_response: String,
}

impl ReasoningRecord {
    fn mentions(&self, origin: &str, destination: &str) -> bool {
        let text = self.reasoning.to_lowercase();
        text.contains(&origin.to_lowercase()) && text.contains(&destination.to_lowercase())
    }
}

/// The fixed collection loaded at startup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReasoningStore {
    records: Vec<ReasoningRecord>,
}

impl ReasoningStore {
    pub fn new(records: Vec<ReasoningRecord>) -> Self {
        Self { records }
    }

    /// Parse JSON-lines text. A leading BOM is stripped; malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let records = text
            .lines()
            .enumerate()
            .filter_map(|(index, line)| {
                let clean = line.trim().trim_start_matches('\u{feff}');
                if clean.is_empty() {
                    return None;
                }
                match serde_json::from_str::<ReasoningRecord>(clean) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(line = index + 1, error = %e, "Skipping malformed reasoning record");
                        None
                    }
                }
            })
            .collect();
        Self { records }
    }

    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let store = Self::parse(&text);
        info!(path = %path.display(), records = store.len(), "Loaded reasoning records");
        Ok(store)
    }

    /// First record whose reasoning mentions both places.
    pub fn lookup(&self, origin: &str, destination: &str) -> Option<&ReasoningRecord> {
        self.records.iter().find(|r| r.mentions(origin, destination))
    }

    pub fn records(&self) -> &[ReasoningRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pretty JSON of the whole collection, for the fallback prompt.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.records).unwrap_or_else(|_| "[]".to_string())
    }
}
