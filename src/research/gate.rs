//! Satisfaction snapshots and the convergence decision.

use crate::llm::{complete_with_timeout, LLMClient};
use crate::research::artifact::ArtifactEntry;
use crate::research::prompts;
use crate::research::round::AgentView;
use crate::research::session::{AgentSlot, SessionSettings};
use crate::types::{AgentId, AgentWarning, OperationReport, WarningKind};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Ratings collected in one convergence check. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatisfactionSnapshot {
    pub taken_at: DateTime<Utc>,
    /// Round counter at the time of the check.
    pub after_round: u64,
    /// Parsed ratings in roster order.
    pub ratings: Vec<(AgentId, u8)>,
    /// Agents whose rating could not be obtained.
    pub skipped: Vec<AgentId>,
}

impl SatisfactionSnapshot {
    pub fn new(after_round: u64, ratings: Vec<(AgentId, u8)>, skipped: Vec<AgentId>) -> Self {
        Self {
            taken_at: Utc::now(),
            after_round,
            ratings,
            skipped,
        }
    }

    /// Arithmetic mean over parsed ratings; `None` when every rating was skipped.
    pub fn mean(&self) -> Option<f64> {
        if self.ratings.is_empty() {
            return None;
        }
        let total: u32 = self.ratings.iter().map(|(_, r)| u32::from(*r)).sum();
        Some(f64::from(total) / self.ratings.len() as f64)
    }

    pub fn rating_for(&self, agent_id: &AgentId) -> Option<u8> {
        self.ratings
            .iter()
            .find(|(id, _)| id == agent_id)
            .map(|(_, r)| *r)
    }

    /// Agents accounted for, rated or skipped.
    pub fn polled(&self) -> usize {
        self.ratings.len() + self.skipped.len()
    }
}

/// True iff at least one rating was parsed and their mean reaches `threshold`.
pub fn is_converged(snapshot: &SatisfactionSnapshot, threshold: f64) -> bool {
    snapshot.mean().is_some_and(|mean| mean >= threshold)
}

/// Result of a gate check as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub snapshot: SatisfactionSnapshot,
    pub threshold: f64,
    pub mean: Option<f64>,
    pub converged: bool,
    pub cancelled: bool,
}

impl GateVerdict {
    pub fn new(snapshot: SatisfactionSnapshot, threshold: f64, cancelled: bool) -> Self {
        Self {
            mean: snapshot.mean(),
            converged: is_converged(&snapshot, threshold),
            snapshot,
            threshold,
            cancelled,
        }
    }
}

pub struct ConvergenceGate<'a> {
    pub(crate) topic: &'a str,
    pub(crate) after_round: u64,
    pub(crate) roster: &'a [Arc<AgentSlot>],
    pub(crate) entries: &'a [ArtifactEntry],
    pub(crate) llm: &'a dyn LLMClient,
    pub(crate) settings: &'a SessionSettings,
    pub(crate) cancel: &'a CancellationToken,
}

impl<'a> ConvergenceGate<'a> {
    /// Ask every agent for a rating and record the parsed ones in memory.
    pub async fn collect_snapshot(&self) -> OperationReport<GateVerdict> {
        let views: Vec<AgentView> = self.roster.iter().map(|slot| AgentView::of(slot)).collect();
        let prompt = prompts::rating_prompt(self.topic, self.entries);
        tracing::debug!(prompt_chars = prompt.len(), agents = views.len(), "Collecting satisfaction");

        let calls = stream::iter(views.iter().enumerate())
            .map(|(position, view)| {
                let prompt = prompt.as_str();
                async move {
                    let reply = complete_with_timeout(
                        self.llm,
                        &view.configuration,
                        prompt,
                        &view.model,
                        self.settings.inference_timeout,
                    )
                    .await;
                    (position, reply)
                }
            })
            .buffered(self.settings.max_concurrency.max(1));
        let mut calls = std::pin::pin!(calls);

        let mut ratings = Vec::new();
        let mut skipped = Vec::new();
        let mut warnings = Vec::new();
        let mut handled = 0;
        let mut cancelled = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = calls.next() => next,
            };
            let Some((position, reply)) = next else {
                break;
            };
            handled += 1;
            let view = &views[position];

            let parsed = match reply {
                Ok(text) => prompts::parse_rating(&text).ok_or_else(|| {
                    format!("no single rating in [1, 10] found in reply {:?}", excerpt(&text))
                }),
                Err(err) => Err(format!("rating call failed: {}", err)),
            };

            match parsed {
                Ok(value) => {
                    if let Err(err) = self.roster[position].record.write().record_rating(i64::from(value)) {
                        tracing::warn!(agent = %view.id, "Could not record rating: {}", err);
                    }
                    ratings.push((view.id.clone(), value));
                }
                Err(message) => {
                    tracing::warn!(agent = %view.id, "Skipped rating: {}", message);
                    skipped.push(view.id.clone());
                    warnings.push(AgentWarning::new(view.id.clone(), WarningKind::SkippedRating, message));
                }
            }
        }

        for view in views.iter().skip(handled) {
            skipped.push(view.id.clone());
            warnings.push(AgentWarning::new(
                view.id.clone(),
                WarningKind::SkippedRating,
                "rating not collected: check cancelled",
            ));
        }

        let snapshot = SatisfactionSnapshot::new(self.after_round, ratings, skipped);
        let verdict = GateVerdict::new(snapshot, self.settings.satisfaction_threshold, cancelled);
        tracing::info!(
            round = self.after_round,
            mean = ?verdict.mean,
            threshold = verdict.threshold,
            converged = verdict.converged,
            "Satisfaction snapshot collected"
        );
        OperationReport::new(verdict, warnings)
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(80).collect()
}
