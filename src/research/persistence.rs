//! Session state on disk.
//!
//! The whole session is written as pretty JSON: roster in turn order (each
//! agent with configuration, history and memory), the artifact, archived
//! cycles and snapshots. Writes go to a temporary sibling file which is then
//! renamed over the target, so a failed save never leaves a truncated file.

use crate::llm::LLMClient;
use crate::research::agent::{AgentRecord, MemoryEntry, MAX_RATING, MIN_RATING};
use crate::research::artifact::{ArchivedCycle, Artifact};
use crate::research::gate::SatisfactionSnapshot;
use crate::research::session::{ResearchSession, SessionSettings};
use crate::tools::SearchTool;
use crate::types::{ResearchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Version written into every saved state.
pub const STATE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub format_version: u32,
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    pub topic: Option<String>,
    pub round_counter: u64,
    pub agents: Vec<AgentRecord>,
    pub artifact: Artifact,
    #[serde(default)]
    pub cycles: Vec<ArchivedCycle>,
    #[serde(default)]
    pub snapshots: Vec<SatisfactionSnapshot>,
}

impl SessionState {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check that the state describes a session that could have existed.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.format_version != STATE_FORMAT_VERSION {
            return Err(format!(
                "unsupported session format version {} (expected {})",
                self.format_version, STATE_FORMAT_VERSION
            ));
        }

        let mut ids = HashSet::new();
        for agent in &self.agents {
            if !ids.insert(agent.id().clone()) {
                return Err(format!("agent '{}' appears twice in the roster", agent.id()));
            }
            if agent.configuration().trim().is_empty() {
                return Err(format!("agent '{}' has an empty configuration", agent.id()));
            }
            if agent.configuration_history().iter().any(|c| c.trim().is_empty()) {
                return Err(format!("agent '{}' has an empty configuration in its history", agent.id()));
            }
            let bad_rating = agent.memory().iter().find_map(|m| match m.entry {
                MemoryEntry::SatisfactionRating(value) if !rating_in_range(value) => Some(value),
                _ => None,
            });
            if let Some(value) = bad_rating {
                return Err(format!(
                    "agent '{}' remembers rating {} outside [{}, {}]",
                    agent.id(),
                    value,
                    MIN_RATING,
                    MAX_RATING
                ));
            }
        }

        self.artifact.validate(self.round_counter)?;
        if let Some(entry) = self.artifact.entries().iter().find(|e| !ids.contains(&e.agent_id)) {
            return Err(format!(
                "artifact entry {} names unknown agent '{}'",
                entry.index, entry.agent_id
            ));
        }

        for cycle in &self.cycles {
            cycle
                .artifact
                .validate(self.round_counter)
                .map_err(|e| format!("archived cycle '{}': {}", cycle.topic, e))?;
        }

        if let Some(snapshot) = self.snapshots.iter().find(|s| s.after_round > self.round_counter) {
            return Err(format!(
                "snapshot taken after round {} is ahead of the round counter {}",
                snapshot.after_round, self.round_counter
            ));
        }
        for snapshot in &self.snapshots {
            if let Some((agent_id, value)) = snapshot.ratings.iter().find(|(_, v)| !rating_in_range(*v)) {
                return Err(format!(
                    "snapshot after round {} holds rating {} for '{}' outside [{}, {}]",
                    snapshot.after_round, value, agent_id, MIN_RATING, MAX_RATING
                ));
            }
        }
        Ok(())
    }
}

fn rating_in_range(value: u8) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&i64::from(value))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write the session to `path`.
pub async fn save_session(session: &ResearchSession, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = session.export_state().to_json()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            ResearchError::Persistence(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }

    let temp = temp_path(path);
    tokio::fs::write(&temp, json)
        .await
        .map_err(|e| ResearchError::Persistence(format!("cannot write {}: {}", temp.display(), e)))?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| ResearchError::Persistence(format!("cannot replace {}: {}", path.display(), e)))?;

    tracing::debug!(path = %path.display(), "Session saved");
    Ok(())
}

/// Read and validate a session saved with [`save_session`].
pub async fn load_session(
    path: impl AsRef<Path>,
    llm: Arc<dyn LLMClient>,
    search: Arc<dyn SearchTool>,
    settings: SessionSettings,
) -> Result<ResearchSession> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ResearchError::Persistence(format!("cannot read {}: {}", path.display(), e)))?;
    let state = SessionState::from_json(&json)?;
    let session = ResearchSession::from_state(state, llm, search, settings)?;

    tracing::debug!(
        path = %path.display(),
        agents = session.agent_ids().len(),
        rounds = session.round_counter(),
        "Session loaded"
    );
    Ok(session)
}
