//! Self-improvement: an agent's configuration revised from its own history.
//!
//! The mutator only ever touches the agent it was given. Attempts on the same
//! agent are serialized through the slot's mutation lock; different agents
//! can be improved concurrently.

use crate::llm::{complete_with_timeout, LLMClient};
use crate::research::agent::ConfigurationDelta;
use crate::research::prompts::{self, MutationFeedback, MUTATOR_SYSTEM_PROMPT};
use crate::research::session::AgentSlot;
use crate::types::{AgentId, RejectionReason, ResearchError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An accepted configuration change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub agent_id: AgentId,
    pub delta: Option<ConfigurationDelta>,
    /// Configuration changes applied to this agent so far, this one included.
    pub improvements: usize,
}

pub struct PromptMutator<'a> {
    llm: &'a dyn LLMClient,
    memory_window: usize,
    timeout: Duration,
}

impl<'a> PromptMutator<'a> {
    pub fn new(llm: &'a dyn LLMClient, memory_window: usize, timeout: Duration) -> Self {
        Self {
            llm,
            memory_window,
            timeout,
        }
    }

    /// Propose a revised configuration and apply it if it passes vetting.
    ///
    /// Any rejection leaves the agent exactly as it was.
    pub async fn improve(&self, slot: &AgentSlot, feedback: &MutationFeedback) -> Result<MutationOutcome> {
        let _guard = slot.mutation.lock().await;

        let (agent_id, current, specialty, model, memory, improvements) = {
            let record = slot.record.read();
            (
                record.id().clone(),
                record.configuration().to_string(),
                record.specialty().to_string(),
                record.model().to_string(),
                record.recent_memory(self.memory_window).to_vec(),
                record.improvements(),
            )
        };

        let feedback = MutationFeedback {
            improvements_so_far: improvements,
            ..feedback.clone()
        };
        let prompt = prompts::mutation_prompt(&current, &specialty, &memory, &feedback);
        tracing::debug!(
            agent = %agent_id,
            memory = memory.len(),
            prompt_chars = prompt.len(),
            "Requesting configuration revision"
        );

        let reply = complete_with_timeout(self.llm, MUTATOR_SYSTEM_PROMPT, &prompt, &model, self.timeout)
            .await
            .map_err(|err| reject(&agent_id, RejectionReason::Backend(err)))?;

        let candidate = prompts::vet_candidate(&current, &reply).map_err(|reason| reject(&agent_id, reason))?;

        let mut record = slot.record.write();
        record.apply_configuration(candidate)?;
        let outcome = MutationOutcome {
            agent_id: agent_id.clone(),
            delta: record.history_delta(),
            improvements: record.improvements(),
        };
        drop(record);

        tracing::info!(
            agent = %agent_id,
            improvements = outcome.improvements,
            length_change = ?outcome.delta.as_ref().map(|d| d.length_change),
            "Configuration improved"
        );
        Ok(outcome)
    }
}

fn reject(agent_id: &AgentId, reason: RejectionReason) -> ResearchError {
    tracing::warn!(agent = %agent_id, "No improvement proposed: {}", reason);
    ResearchError::NoImprovementProposed {
        agent_id: agent_id.clone(),
        reason,
    }
}
