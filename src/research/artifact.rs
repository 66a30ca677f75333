//! The accumulated research record.
//!
//! Entries are appended by rounds and never edited; a correction is a new entry.
//! Outside the crate the artifact is read-only.

use crate::tools::SearchHit;
use crate::types::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Idea,
    Evidence,
    Discussion,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryKind::Idea => "idea",
            EntryKind::Evidence => "evidence",
            EntryKind::Discussion => "discussion",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryBody {
    Idea {
        text: String,
    },
    Evidence {
        query: String,
        text: String,
        #[serde(default)]
        sources: Vec<SearchHit>,
    },
    Discussion {
        sub_topic: String,
        text: String,
    },
}

impl EntryBody {
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryBody::Idea { .. } => EntryKind::Idea,
            EntryBody::Evidence { .. } => EntryKind::Evidence,
            EntryBody::Discussion { .. } => EntryKind::Discussion,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            EntryBody::Idea { text }
            | EntryBody::Evidence { text, .. }
            | EntryBody::Discussion { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Position in the artifact, starting at 0.
    pub index: usize,
    /// Round sequence number that produced the entry.
    pub round: u64,
    pub agent_id: AgentId,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: EntryBody,
}

impl ArtifactEntry {
    pub fn kind(&self) -> EntryKind {
        self.body.kind()
    }

    pub fn text(&self) -> &str {
        self.body.text()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    entries: Vec<ArtifactEntry>,
}

impl Artifact {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, round: u64, agent_id: AgentId, body: EntryBody) -> usize {
        let index = self.entries.len();
        self.entries.push(ArtifactEntry {
            index,
            round,
            agent_id,
            recorded_at: Utc::now(),
            body,
        });
        index
    }

    pub fn entries(&self) -> &[ArtifactEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ArtifactEntry> {
        self.entries.get(index)
    }

    pub fn of_kind(&self, kind: EntryKind) -> impl Iterator<Item = &ArtifactEntry> {
        self.entries.iter().filter(move |e| e.kind() == kind)
    }

    pub fn ideas(&self) -> impl Iterator<Item = &ArtifactEntry> {
        self.of_kind(EntryKind::Idea)
    }

    pub fn evidence(&self) -> impl Iterator<Item = &ArtifactEntry> {
        self.of_kind(EntryKind::Evidence)
    }

    pub fn discussion(&self) -> impl Iterator<Item = &ArtifactEntry> {
        self.of_kind(EntryKind::Discussion)
    }

    pub fn in_round(&self, round: u64) -> impl Iterator<Item = &ArtifactEntry> {
        self.entries.iter().filter(move |e| e.round == round)
    }

    pub fn by_agent<'a>(&'a self, agent_id: &'a AgentId) -> impl Iterator<Item = &'a ArtifactEntry> {
        self.entries.iter().filter(move |e| &e.agent_id == agent_id)
    }

    /// Each agent's latest discussion text on `sub_topic` within `round`, in speaking order.
    pub fn discussion_in_round(&self, round: u64, sub_topic: &str) -> Vec<(AgentId, String)> {
        let mut latest: Vec<(AgentId, String)> = Vec::new();
        for entry in self.in_round(round) {
            if let EntryBody::Discussion { sub_topic: s, text } = &entry.body {
                if s != sub_topic {
                    continue;
                }
                match latest.iter_mut().find(|(id, _)| id == &entry.agent_id) {
                    Some(slot) => slot.1 = text.clone(),
                    None => latest.push((entry.agent_id.clone(), text.clone())),
                }
            }
        }
        latest
    }

    /// Highest round tag present, if any.
    pub fn last_round(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.round).max()
    }

    /// Check the invariants a restored artifact must satisfy.
    pub(crate) fn validate(&self, round_counter: u64) -> Result<(), String> {
        let mut previous_round = 0;
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.index != position {
                return Err(format!(
                    "artifact entry at position {} carries index {}",
                    position, entry.index
                ));
            }
            if entry.round == 0 || entry.round > round_counter {
                return Err(format!(
                    "artifact entry {} is tagged with round {} but the round counter is {}",
                    position, entry.round, round_counter
                ));
            }
            if entry.round < previous_round {
                return Err(format!(
                    "artifact entry {} goes back from round {} to round {}",
                    position, previous_round, entry.round
                ));
            }
            previous_round = entry.round;
        }
        Ok(())
    }
}

/// A finished research cycle kept after the topic was reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedCycle {
    pub topic: String,
    pub closed_at: DateTime<Utc>,
    /// Round counter when the cycle was closed.
    pub last_round: u64,
    pub artifact: Artifact,
}

/// A rostered agent as credited in an exported artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: AgentId,
    pub display_name: String,
    pub specialty: String,
}

/// Everything a document renderer consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactExport {
    pub topic: Option<String>,
    pub authors: Vec<Author>,
    pub round_counter: u64,
    pub exported_at: DateTime<Utc>,
    pub artifact: Artifact,
}

impl ArtifactExport {
    /// Display name for `id`, falling back to the id itself.
    pub fn display_name(&self, id: &AgentId) -> String {
        self.authors
            .iter()
            .find(|author| &author.id == id)
            .map(|author| author.display_name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Distinct evidence sources in first-cited order.
    pub fn sources(&self) -> Vec<&SearchHit> {
        let mut seen: Vec<&SearchHit> = Vec::new();
        for entry in self.artifact.evidence() {
            if let EntryBody::Evidence { sources, .. } = &entry.body {
                for hit in sources {
                    if !seen.iter().any(|known| known.source == hit.source) {
                        seen.push(hit);
                    }
                }
            }
        }
        seen
    }
}
