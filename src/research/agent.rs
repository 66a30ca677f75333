//! Agent state: identity, active configuration, configuration history and memory.
//!
//! All state changes go through the methods on [`AgentRecord`]; the fields are
//! private so memory and history can only ever grow.

use crate::types::{AgentId, ConfigurationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lowest accepted satisfaction rating.
pub const MIN_RATING: i64 = 1;
/// Highest accepted satisfaction rating.
pub const MAX_RATING: i64 = 10;

/// What an agent remembers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MemoryEntry {
    Utterance(String),
    ResearchNote(String),
    SatisfactionRating(u8),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub recorded_at: DateTime<Utc>,
    pub entry: MemoryEntry,
}

/// Structural difference between the two most recent configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDelta {
    pub previous_chars: usize,
    pub current_chars: usize,
    /// `current_chars - previous_chars`
    pub length_change: i64,
    /// Jaccard similarity of the lowercase word sets, in [0, 1].
    pub lexical_overlap: f64,
}

/// Activity counters for status displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: AgentId,
    pub display_name: String,
    pub specialty: String,
    pub model: String,
    pub utterances: usize,
    pub research_notes: usize,
    pub ratings: usize,
    pub improvements: usize,
    pub configuration_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    id: AgentId,
    display_name: String,
    specialty: String,
    model: String,
    configuration: String,
    configuration_history: Vec<String>,
    memory: Vec<MemoryRecord>,
}

impl AgentRecord {
    pub fn new(
        id: AgentId,
        display_name: impl Into<String>,
        specialty: impl Into<String>,
        model: impl Into<String>,
        configuration: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let configuration = configuration.into();
        if configuration.trim().is_empty() {
            return Err(ConfigurationError::InvalidConfiguration(
                "an agent cannot start with an empty configuration".to_string(),
            ));
        }
        if id.as_str().is_empty() {
            return Err(ConfigurationError::InvalidArgument(
                "agent id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            id,
            display_name: display_name.into(),
            specialty: specialty.into(),
            model: model.into(),
            configuration,
            configuration_history: Vec::new(),
            memory: Vec::new(),
        })
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn specialty(&self) -> &str {
        &self.specialty
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    /// Retired configurations, oldest first.
    pub fn configuration_history(&self) -> &[String] {
        &self.configuration_history
    }

    pub fn memory(&self) -> &[MemoryRecord] {
        &self.memory
    }

    /// The last `n` memory records, oldest first.
    pub fn recent_memory(&self, n: usize) -> &[MemoryRecord] {
        let start = self.memory.len().saturating_sub(n);
        &self.memory[start..]
    }

    pub fn record_utterance(&mut self, text: impl Into<String>) {
        self.remember(MemoryEntry::Utterance(text.into()));
    }

    pub fn record_note(&mut self, text: impl Into<String>) {
        self.remember(MemoryEntry::ResearchNote(text.into()));
    }

    /// Append a satisfaction rating. Values outside [1, 10] leave memory untouched.
    pub fn record_rating(&mut self, value: i64) -> Result<(), ConfigurationError> {
        if !(MIN_RATING..=MAX_RATING).contains(&value) {
            return Err(ConfigurationError::InvalidRating(value));
        }
        self.remember(MemoryEntry::SatisfactionRating(value as u8));
        Ok(())
    }

    /// Retire the active configuration into history and activate `new_text`.
    ///
    /// Both changes land together or not at all; an empty `new_text` is refused.
    pub fn apply_configuration(&mut self, new_text: impl Into<String>) -> Result<(), ConfigurationError> {
        let new_text = new_text.into();
        if new_text.trim().is_empty() {
            return Err(ConfigurationError::InvalidConfiguration(
                "refusing to activate an empty configuration".to_string(),
            ));
        }

        let retired = std::mem::replace(&mut self.configuration, new_text);
        self.configuration_history.push(retired);
        Ok(())
    }

    /// Re-activate the most recently retired configuration.
    ///
    /// The active one is retired first, so history still only grows.
    pub fn rollback(&mut self) -> Result<(), ConfigurationError> {
        let previous = self.configuration_history.last().cloned().ok_or_else(|| {
            ConfigurationError::InvalidArgument(format!(
                "agent '{}' has no previous configuration",
                self.id
            ))
        })?;
        self.apply_configuration(previous)
    }

    /// Number of configurations activated after the initial one.
    pub fn improvements(&self) -> usize {
        self.configuration_history.len()
    }

    /// Compare the active configuration with the one it replaced.
    ///
    /// `None` until the first configuration change.
    pub fn history_delta(&self) -> Option<ConfigurationDelta> {
        let previous = self.configuration_history.last()?;
        let previous_chars = previous.chars().count();
        let current_chars = self.configuration.chars().count();

        Some(ConfigurationDelta {
            previous_chars,
            current_chars,
            length_change: current_chars as i64 - previous_chars as i64,
            lexical_overlap: lexical_overlap(previous, &self.configuration),
        })
    }

    pub fn summary(&self) -> AgentSummary {
        let mut summary = AgentSummary {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            specialty: self.specialty.clone(),
            model: self.model.clone(),
            utterances: 0,
            research_notes: 0,
            ratings: 0,
            improvements: self.improvements(),
            configuration_chars: self.configuration.chars().count(),
        };
        for record in &self.memory {
            match record.entry {
                MemoryEntry::Utterance(_) => summary.utterances += 1,
                MemoryEntry::ResearchNote(_) => summary.research_notes += 1,
                MemoryEntry::SatisfactionRating(_) => summary.ratings += 1,
            }
        }
        summary
    }

    fn remember(&mut self, entry: MemoryEntry) {
        self.memory.push(MemoryRecord {
            recorded_at: Utc::now(),
            entry,
        });
    }
}

fn word_set(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn lexical_overlap(a: &str, b: &str) -> f64 {
    let left = word_set(a);
    let right = word_set(b);
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let shared = left.intersection(&right).count();
    let total = left.union(&right).count();
    shared as f64 / total as f64
}
