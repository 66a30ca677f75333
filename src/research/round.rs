//! Collaboration rounds: brainstorm, research and discussion.
//!
//! Brainstorm and research calls are independent per agent and run through a
//! bounded `buffered` stream, which yields results in roster order whatever
//! the completion order is. Discussion is strictly sequential because every
//! speaker sees the contributions made earlier in the same round.
//!
//! A failed, timed out or empty call skips that agent with a warning and the
//! round carries on with the rest of the roster.

use crate::llm::{complete_with_timeout, LLMClient};
use crate::research::artifact::{Artifact, EntryBody};
use crate::research::prompts;
use crate::research::session::{AgentSlot, SessionSettings};
use crate::tools::{search_with_timeout, SearchHit, SearchTool};
use crate::types::{AgentId, AgentWarning, ExternalCallError, OperationReport, WarningKind};
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Protocol executed by one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum RoundVariant {
    Brainstorm,
    Research,
    Discussion { sub_topic: String },
}

impl fmt::Display for RoundVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundVariant::Brainstorm => f.write_str("brainstorm"),
            RoundVariant::Research => f.write_str("research"),
            RoundVariant::Discussion { sub_topic } => write!(f, "discussion ({})", sub_topic),
        }
    }
}

/// What one round did to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: u64,
    pub variant: RoundVariant,
    /// Artifact indices appended by this round, in order.
    pub entries: Vec<usize>,
    /// Agents that added at least one entry.
    pub contributed: Vec<AgentId>,
    /// Agents whose contribution was skipped after a failure.
    pub skipped: Vec<AgentId>,
    /// Agents never asked because the round was cancelled first.
    pub not_reached: Vec<AgentId>,
    pub cancelled: bool,
}

impl RoundOutcome {
    fn new(round: u64, variant: RoundVariant) -> Self {
        Self {
            round,
            variant,
            entries: Vec::new(),
            contributed: Vec::new(),
            skipped: Vec::new(),
            not_reached: Vec::new(),
            cancelled: false,
        }
    }

    pub fn entries_appended(&self) -> usize {
        self.entries.len()
    }
}

/// Copy of the agent fields a prompt needs, taken before any external call so
/// no lock is held across an await.
#[derive(Debug, Clone)]
pub(crate) struct AgentView {
    pub id: AgentId,
    pub display_name: String,
    pub specialty: String,
    pub model: String,
    pub configuration: String,
}

impl AgentView {
    pub(crate) fn of(slot: &AgentSlot) -> Self {
        let record = slot.record.read();
        Self {
            id: record.id().clone(),
            display_name: record.display_name().to_string(),
            specialty: record.specialty().to_string(),
            model: record.model().to_string(),
            configuration: record.configuration().to_string(),
        }
    }
}

enum Failure {
    Retrieval(ExternalCallError),
    Inference(ExternalCallError),
    EmptyReply,
}

impl Failure {
    fn into_warning(self, agent_id: AgentId) -> AgentWarning {
        match self {
            Failure::Retrieval(err) => AgentWarning::new(
                agent_id,
                WarningKind::RetrievalFailed,
                format!("retrieval failed, contribution skipped: {}", err),
            ),
            Failure::Inference(err) => AgentWarning::new(
                agent_id,
                WarningKind::SkippedContribution,
                format!("contribution skipped: {}", err),
            ),
            Failure::EmptyReply => AgentWarning::new(
                agent_id,
                WarningKind::SkippedContribution,
                "contribution skipped: empty reply",
            ),
        }
    }
}

struct Findings {
    query: String,
    note: String,
    sources: Vec<SearchHit>,
}

/// One execution of a protocol variant over a roster snapshot.
pub struct CollaborationRound<'a> {
    pub(crate) topic: &'a str,
    pub(crate) round: u64,
    pub(crate) roster: &'a [Arc<AgentSlot>],
    pub(crate) artifact: &'a RwLock<Artifact>,
    pub(crate) llm: &'a dyn LLMClient,
    pub(crate) search: &'a dyn SearchTool,
    pub(crate) settings: &'a SessionSettings,
    pub(crate) cancel: &'a CancellationToken,
}

impl<'a> CollaborationRound<'a> {
    pub async fn run(&self, variant: RoundVariant) -> OperationReport<RoundOutcome> {
        tracing::info!(
            round = self.round,
            variant = %variant,
            agents = self.roster.len(),
            "Starting collaboration round"
        );

        let report = match &variant {
            RoundVariant::Brainstorm => self.brainstorm(variant.clone()).await,
            RoundVariant::Research => self.research(variant.clone()).await,
            RoundVariant::Discussion { sub_topic } => {
                self.discussion(sub_topic, variant.clone()).await
            }
        };

        tracing::info!(
            round = self.round,
            variant = %variant,
            entries = report.value.entries_appended(),
            skipped = report.value.skipped.len(),
            cancelled = report.value.cancelled,
            "Collaboration round finished"
        );
        report
    }

    fn views(&self) -> Vec<AgentView> {
        self.roster.iter().map(|slot| AgentView::of(slot)).collect()
    }

    fn slot(&self, index: usize) -> &AgentSlot {
        &self.roster[index]
    }

    async fn brainstorm(&self, variant: RoundVariant) -> OperationReport<RoundOutcome> {
        let views = self.views();
        let prior_ideas: Vec<String> = {
            let artifact = self.artifact.read();
            let ideas: Vec<String> = artifact.ideas().map(|e| e.text().to_string()).collect();
            let start = ideas.len().saturating_sub(self.settings.max_idea_context);
            ideas[start..].to_vec()
        };

        let calls = stream::iter(views.iter().enumerate())
            .map(|(position, view)| {
                let prompt =
                    prompts::brainstorm_prompt(self.topic, self.round, &view.specialty, &prior_ideas);
                async move {
                    tracing::debug!(agent = %view.id, prompt_chars = prompt.len(), "Brainstorm call");
                    (position, self.infer(view, &prompt).await)
                }
            })
            .buffered(self.settings.max_concurrency.max(1));
        let calls = std::pin::pin!(calls);

        let mut outcome = RoundOutcome::new(self.round, variant);
        let mut warnings = Vec::new();
        let answered = self
            .drain(calls, &mut outcome, |position, result| {
                let view = &views[position];
                let reply = match result {
                    Ok(reply) => reply,
                    Err(failure) => return Err(failure.into_warning(view.id.clone())),
                };
                let ideas = prompts::parse_ideas(&reply);
                if ideas.is_empty() {
                    return Err(Failure::EmptyReply.into_warning(view.id.clone()));
                }

                let mut indices = Vec::with_capacity(ideas.len());
                {
                    let mut artifact = self.artifact.write();
                    for text in ideas {
                        indices.push(artifact.append(self.round, view.id.clone(), EntryBody::Idea { text }));
                    }
                }
                self.slot(position).record.write().record_utterance(reply);
                Ok(indices)
            }, &mut warnings)
            .await;

        self.mark_not_reached(&views, answered, &mut outcome);
        OperationReport::new(outcome, warnings)
    }

    async fn research(&self, variant: RoundVariant) -> OperationReport<RoundOutcome> {
        let views = self.views();

        let calls = stream::iter(views.iter().enumerate())
            .map(|(position, view)| async move { (position, self.gather(view).await) })
            .buffered(self.settings.max_concurrency.max(1));
        let calls = std::pin::pin!(calls);

        let mut outcome = RoundOutcome::new(self.round, variant);
        let mut warnings = Vec::new();
        let answered = self
            .drain(calls, &mut outcome, |position, result| {
                let view = &views[position];
                let findings = result.map_err(|failure| failure.into_warning(view.id.clone()))?;

                let index = self.artifact.write().append(
                    self.round,
                    view.id.clone(),
                    EntryBody::Evidence {
                        query: findings.query.clone(),
                        text: findings.note.clone(),
                        sources: findings.sources,
                    },
                );
                self.slot(position)
                    .record
                    .write()
                    .record_note(format!("Search: {}\nFindings: {}", findings.query, findings.note));
                Ok(vec![index])
            }, &mut warnings)
            .await;

        self.mark_not_reached(&views, answered, &mut outcome);
        OperationReport::new(outcome, warnings)
    }

    async fn discussion(&self, sub_topic: &str, variant: RoundVariant) -> OperationReport<RoundOutcome> {
        let views = self.views();
        let mut outcome = RoundOutcome::new(self.round, variant);
        let mut warnings = Vec::new();

        for (position, view) in views.iter().enumerate() {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                self.mark_not_reached(&views, position, &mut outcome);
                break;
            }

            // Peers are read from the artifact, never from other agents directly.
            let peers: Vec<(String, String)> = self
                .artifact
                .read()
                .discussion_in_round(self.round, sub_topic)
                .into_iter()
                .filter(|(id, _)| id != &view.id)
                .map(|(id, text)| (display_name(&views, &id), text))
                .collect();
            let prompt = prompts::discussion_prompt(
                self.topic,
                sub_topic,
                self.round,
                &view.specialty,
                &peers,
            );
            tracing::debug!(agent = %view.id, peers = peers.len(), "Discussion call");

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    outcome.cancelled = true;
                    self.mark_not_reached(&views, position, &mut outcome);
                    break;
                }
                result = self.infer(view, &prompt) => result,
            };

            match result {
                Ok(text) => {
                    let index = self.artifact.write().append(
                        self.round,
                        view.id.clone(),
                        EntryBody::Discussion {
                            sub_topic: sub_topic.to_string(),
                            text: text.clone(),
                        },
                    );
                    self.slot(position).record.write().record_utterance(text);
                    outcome.entries.push(index);
                    outcome.contributed.push(view.id.clone());
                }
                Err(failure) => {
                    let warning = failure.into_warning(view.id.clone());
                    tracing::warn!(agent = %view.id, round = self.round, "{}", warning.message);
                    outcome.skipped.push(view.id.clone());
                    warnings.push(warning);
                }
            }
        }

        OperationReport::new(outcome, warnings)
    }

    /// Pull results in roster order, stopping early on cancellation.
    ///
    /// Returns how many agents were handled.
    async fn drain<S, T, F>(
        &self,
        mut calls: std::pin::Pin<&mut S>,
        outcome: &mut RoundOutcome,
        mut apply: F,
        warnings: &mut Vec<AgentWarning>,
    ) -> usize
    where
        S: futures::Stream<Item = (usize, Result<T, Failure>)>,
        F: FnMut(usize, Result<T, Failure>) -> Result<Vec<usize>, AgentWarning>,
    {
        let mut handled = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    outcome.cancelled = true;
                    break;
                }
                next = calls.next() => next,
            };
            let Some((position, result)) = next else {
                break;
            };
            handled += 1;

            let agent_id = self.roster[position].record.read().id().clone();
            match apply(position, result) {
                Ok(indices) => {
                    outcome.entries.extend(indices);
                    outcome.contributed.push(agent_id);
                }
                Err(warning) => {
                    tracing::warn!(agent = %agent_id, round = self.round, "{}", warning.message);
                    outcome.skipped.push(agent_id);
                    warnings.push(warning);
                }
            }
        }
        handled
    }

    fn mark_not_reached(&self, views: &[AgentView], from: usize, outcome: &mut RoundOutcome) {
        outcome
            .not_reached
            .extend(views.iter().skip(from).map(|view| view.id.clone()));
    }

    async fn infer(&self, view: &AgentView, prompt: &str) -> Result<String, Failure> {
        let reply = complete_with_timeout(
            self.llm,
            &view.configuration,
            prompt,
            &view.model,
            self.settings.inference_timeout,
        )
        .await
        .map_err(Failure::Inference)?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(Failure::EmptyReply);
        }
        Ok(reply.to_string())
    }

    async fn gather(&self, view: &AgentView) -> Result<Findings, Failure> {
        let query = prompts::research_query(self.topic, &view.specialty);
        let sources = search_with_timeout(self.search, &query, self.settings.retrieval_timeout)
            .await
            .map_err(Failure::Retrieval)?;
        tracing::debug!(agent = %view.id, query = %query, hits = sources.len(), "Retrieval done");

        let prompt = prompts::research_prompt(self.topic, &query, &sources);
        let note = self.infer(view, &prompt).await?;
        Ok(Findings {
            query,
            note,
            sources,
        })
    }
}

fn display_name(views: &[AgentView], id: &AgentId) -> String {
    views
        .iter()
        .find(|view| &view.id == id)
        .map(|view| view.display_name.clone())
        .unwrap_or_else(|| id.to_string())
}
