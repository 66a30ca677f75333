use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============= Identity Types =============

/// Stable identifier of an agent within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an id from a display name: lowercase ascii alphanumerics joined by `-`.
    ///
    /// "Dr. Neural" becomes `dr-neural`.
    pub fn slugify(display_name: &str) -> Self {
        let slug = display_name
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(|part| part.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("-");
        Self(slug)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============= Warnings & Reports =============

/// Kind of per-agent degradation recorded during a batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Inference failed, timed out, or returned nothing usable; no artifact entry.
    SkippedContribution,
    /// The satisfaction reply did not contain a rating in range.
    SkippedRating,
    /// The retrieval tool failed for this agent.
    RetrievalFailed,
    /// A self-improvement attempt left the agent unchanged.
    ImprovementRejected,
}

/// A warning scoped to a single agent's contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentWarning {
    pub agent_id: AgentId,
    pub kind: WarningKind,
    pub message: String,
}

impl AgentWarning {
    pub fn new(agent_id: AgentId, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            agent_id,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for AgentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.agent_id, self.message)
    }
}

/// Result of a session operation together with every per-agent warning it produced.
#[derive(Debug, Clone)]
pub struct OperationReport<T> {
    pub value: T,
    pub warnings: Vec<AgentWarning>,
}

impl<T> OperationReport<T> {
    pub fn new(value: T, warnings: Vec<AgentWarning>) -> Self {
        Self { value, warnings }
    }

    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationReport<U> {
        OperationReport {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

// ============= Error Types =============

/// Failure of a call to an external collaborator (inference backend or retrieval tool).
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ExternalCallError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Local precondition or argument failures. Never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no research topic set")]
    NoTopicSet,

    #[error("a research topic is already set; reset it to start a new cycle")]
    TopicAlreadySet,

    #[error("invalid rating {0}: ratings must lie in [1, 10]")]
    InvalidRating(i64),

    #[error("the roster is empty")]
    EmptyRoster,

    #[error("agent '{0}' is already on the roster")]
    DuplicateAgent(AgentId),

    #[error("agent '{0}' is not on the roster")]
    UnknownAgent(AgentId),

    #[error("no artifact entries yet; run a round before checking convergence")]
    NoArtifactEntries,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration text: {0}")]
    InvalidConfiguration(String),
}

/// Why a proposed configuration was not applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectionReason {
    #[error("the proposed configuration is empty")]
    EmptyCandidate,

    #[error("the proposed configuration differs only in whitespace")]
    TrivialChange,

    #[error("the inference call failed: {0}")]
    Backend(ExternalCallError),
}

/// Session-level error returned by every orchestration operation.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("External call error: {0}")]
    ExternalCall(#[from] ExternalCallError),

    #[error("No improvement proposed for agent '{agent_id}': {reason}")]
    NoImprovementProposed {
        agent_id: AgentId,
        reason: RejectionReason,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<serde_json::Error> for ResearchError {
    fn from(err: serde_json::Error) -> Self {
        ResearchError::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for ResearchError {
    fn from(err: std::io::Error) -> Self {
        ResearchError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ResearchError>;

/// Result of a single external call.
pub type ExternalResult<T> = std::result::Result<T, ExternalCallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(AgentId::slugify("Dr. Neural").as_str(), "dr-neural");
        assert_eq!(AgentId::slugify("  NLP  expert ").as_str(), "nlp-expert");
        assert_eq!(AgentId::slugify("RL").as_str(), "rl");
    }

    #[test]
    fn test_report_map_keeps_warnings() {
        let report = OperationReport::new(
            2,
            vec![AgentWarning::new(
                "a".into(),
                WarningKind::SkippedRating,
                "no number",
            )],
        );
        let mapped = report.map(|v| v * 10);
        assert_eq!(mapped.value, 20);
        assert_eq!(mapped.warnings.len(), 1);
        assert!(mapped.has_warnings());
    }

    #[test]
    fn test_error_messages() {
        let err = ResearchError::from(ConfigurationError::InvalidRating(11));
        assert!(err.to_string().contains("[1, 10]"));

        let err = ResearchError::NoImprovementProposed {
            agent_id: "dr-neural".into(),
            reason: RejectionReason::TrivialChange,
        };
        assert!(err.to_string().contains("dr-neural"));
        assert!(err.to_string().contains("whitespace"));
    }
}
