//! Research session: the roster, the topic, the artifact and the operations
//! that drive them.
//!
//! The session enforces two preconditions only. Rounds need a topic, and a
//! gate check needs at least one artifact entry. Everything else may interleave
//! in whatever order the caller chooses.
//!
//! Locking:
//! - rounds and snapshots take the session's round lock, so they run one at a time
//! - each agent slot has its own mutation lock; improvement and rollback take it
//! - `parking_lot` locks guard in-memory state and are never held across an await

use crate::llm::LLMClient;
use crate::render::DocumentRenderer;
use crate::research::agent::{AgentRecord, AgentSummary, ConfigurationDelta};
use crate::research::artifact::{ArchivedCycle, Artifact, ArtifactExport, Author};
use crate::research::gate::{self, ConvergenceGate, GateVerdict, SatisfactionSnapshot};
use crate::research::mutator::{MutationOutcome, PromptMutator};
use crate::research::persistence::{SessionState, STATE_FORMAT_VERSION};
use crate::research::prompts::{self, MutationFeedback};
use crate::research::round::{CollaborationRound, RoundOutcome, RoundVariant};
use crate::tools::SearchTool;
use crate::types::{AgentId, AgentWarning, ConfigurationError, OperationReport, ResearchError, Result, WarningKind};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Tunables a session runs with. Built from `[session]`, `[inference]` and
/// `[retrieval]` in the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub satisfaction_threshold: f64,
    /// Most recent memory records shown to the mutator.
    pub mutation_memory_window: usize,
    /// Most recent ideas shown in a brainstorm prompt.
    pub max_idea_context: usize,
    /// Per-agent calls allowed in flight at once.
    pub max_concurrency: usize,
    /// Model for agents added without one.
    pub default_model: String,
    pub inference_timeout: Duration,
    pub retrieval_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            satisfaction_threshold: 8.0,
            mutation_memory_window: 10,
            max_idea_context: 20,
            max_concurrency: 4,
            default_model: "llama3.1".to_string(),
            inference_timeout: Duration::from_secs(120),
            retrieval_timeout: Duration::from_secs(30),
        }
    }
}

/// How to add an agent to the roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Derived from the display name when absent.
    pub id: Option<AgentId>,
    pub display_name: String,
    pub specialty: String,
    /// Falls back to the session's default model.
    pub model: Option<String>,
    /// Falls back to the research persona template.
    pub configuration: Option<String>,
}

impl AgentSpec {
    pub fn new(display_name: impl Into<String>, specialty: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            specialty: specialty.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(AgentId::new(id));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }

    pub fn agent_id(&self) -> AgentId {
        self.id
            .clone()
            .unwrap_or_else(|| AgentId::slugify(&self.display_name))
    }
}

/// The built-in five-member research team.
pub fn default_team() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new("Dr. Neural", "Neural Networks and Deep Learning"),
        AgentSpec::new("Dr. Ethics", "AI Ethics and Safety"),
        AgentSpec::new("Dr. NLP", "Natural Language Processing"),
        AgentSpec::new("Dr. Vision", "Computer Vision and Multimodal AI"),
        AgentSpec::new("Dr. RL", "Reinforcement Learning"),
    ]
}

/// One roster entry.
#[derive(Debug)]
pub struct AgentSlot {
    pub(crate) record: RwLock<AgentRecord>,
    pub(crate) mutation: tokio::sync::Mutex<()>,
}

impl AgentSlot {
    pub(crate) fn new(record: AgentRecord) -> Self {
        Self {
            record: RwLock::new(record),
            mutation: tokio::sync::Mutex::new(()),
        }
    }
}

/// Outcome of one agent's improvement attempt inside [`ResearchSession::improve_all`].
#[derive(Debug)]
pub struct ImprovementAttempt {
    pub agent_id: AgentId,
    pub result: Result<MutationOutcome>,
}

#[derive(Debug, Default)]
struct SessionMeta {
    topic: Option<String>,
    round_counter: u64,
    cycles: Vec<ArchivedCycle>,
    snapshots: Vec<SatisfactionSnapshot>,
}

pub struct ResearchSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    settings: SessionSettings,
    llm: Arc<dyn LLMClient>,
    search: Arc<dyn SearchTool>,
    meta: RwLock<SessionMeta>,
    artifact: RwLock<Artifact>,
    roster: RwLock<Vec<Arc<AgentSlot>>>,
    round_lock: tokio::sync::Mutex<()>,
}

impl ResearchSession {
    pub fn new(llm: Arc<dyn LLMClient>, search: Arc<dyn SearchTool>, settings: SessionSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            settings,
            llm,
            search,
            meta: RwLock::new(SessionMeta::default()),
            artifact: RwLock::new(Artifact::new()),
            roster: RwLock::new(Vec::new()),
            round_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    // ============= Roster =============

    /// Add one agent at the end of the turn order.
    pub fn add_agent(&self, spec: AgentSpec) -> Result<AgentId> {
        let record = self.build_record(spec)?;
        let id = record.id().clone();

        let mut roster = self.roster.write();
        if roster.iter().any(|slot| slot.record.read().id() == &id) {
            return Err(ConfigurationError::DuplicateAgent(id).into());
        }
        roster.push(Arc::new(AgentSlot::new(record)));
        tracing::info!(agent = %id, position = roster.len(), "Agent added to roster");
        Ok(id)
    }

    /// Add several agents in order. Nothing is added if any of them is invalid.
    pub fn add_team(&self, specs: Vec<AgentSpec>) -> Result<Vec<AgentId>> {
        let records = specs
            .into_iter()
            .map(|spec| self.build_record(spec))
            .collect::<Result<Vec<_>>>()?;

        let mut roster = self.roster.write();
        let mut taken: HashSet<AgentId> = roster.iter().map(|slot| slot.record.read().id().clone()).collect();
        for record in &records {
            if !taken.insert(record.id().clone()) {
                return Err(ConfigurationError::DuplicateAgent(record.id().clone()).into());
            }
        }

        let ids: Vec<AgentId> = records.iter().map(|r| r.id().clone()).collect();
        roster.extend(records.into_iter().map(|r| Arc::new(AgentSlot::new(r))));
        tracing::info!(added = ids.len(), roster = roster.len(), "Team added to roster");
        Ok(ids)
    }

    pub fn add_default_team(&self) -> Result<Vec<AgentId>> {
        self.add_team(default_team())
    }

    fn build_record(&self, spec: AgentSpec) -> Result<AgentRecord> {
        let display_name = spec.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(ConfigurationError::InvalidArgument("agent display name must not be empty".to_string()).into());
        }
        let id = spec.agent_id();
        if id.as_str().is_empty() {
            return Err(ConfigurationError::InvalidArgument(format!(
                "cannot derive an agent id from '{}'; give one explicitly",
                display_name
            ))
            .into());
        }
        let specialty = spec.specialty.trim().to_string();
        let configuration = spec
            .configuration
            .unwrap_or_else(|| prompts::default_configuration(&display_name, &specialty));
        let model = spec
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.settings.default_model.clone());

        Ok(AgentRecord::new(id, display_name, specialty, model, configuration)?)
    }

    fn slot(&self, agent_id: &AgentId) -> Result<Arc<AgentSlot>> {
        self.roster
            .read()
            .iter()
            .find(|slot| slot.record.read().id() == agent_id)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownAgent(agent_id.clone()).into())
    }

    fn roster_snapshot(&self) -> Result<Vec<Arc<AgentSlot>>> {
        let roster = self.roster.read().clone();
        if roster.is_empty() {
            return Err(ConfigurationError::EmptyRoster.into());
        }
        Ok(roster)
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.roster
            .read()
            .iter()
            .map(|slot| slot.record.read().id().clone())
            .collect()
    }

    /// Copies of every agent record in turn order.
    pub fn agents(&self) -> Vec<AgentRecord> {
        self.roster
            .read()
            .iter()
            .map(|slot| slot.record.read().clone())
            .collect()
    }

    pub fn agent(&self, agent_id: &AgentId) -> Option<AgentRecord> {
        self.slot(agent_id).ok().map(|slot| slot.record.read().clone())
    }

    pub fn agent_summaries(&self) -> Vec<AgentSummary> {
        self.roster
            .read()
            .iter()
            .map(|slot| slot.record.read().summary())
            .collect()
    }

    // ============= Topic =============

    pub fn topic(&self) -> Option<String> {
        self.meta.read().topic.clone()
    }

    /// Set the topic of the current cycle. Fails if one is already set.
    pub fn set_topic(&self, topic: &str) -> Result<()> {
        let topic = normalize_topic(topic)?;
        let mut meta = self.meta.write();
        if meta.topic.is_some() {
            return Err(ConfigurationError::TopicAlreadySet.into());
        }
        tracing::info!(topic = %topic, "Research topic set");
        meta.topic = Some(topic);
        Ok(())
    }

    /// Start a new cycle on `topic`.
    ///
    /// The current artifact is archived with its topic and a fresh one begins.
    /// The round counter carries on. Refused while a round or snapshot runs.
    pub fn reset_topic(&self, topic: &str) -> Result<Option<ArchivedCycle>> {
        let topic = normalize_topic(topic)?;
        let _turn = self.round_lock.try_lock().map_err(|_| {
            ConfigurationError::InvalidArgument(
                "cannot reset the topic while a round or snapshot is running".to_string(),
            )
        })?;

        let mut meta = self.meta.write();
        let archived = match meta.topic.take() {
            Some(previous) => {
                let artifact = std::mem::take(&mut *self.artifact.write());
                let cycle = ArchivedCycle {
                    topic: previous,
                    closed_at: Utc::now(),
                    last_round: meta.round_counter,
                    artifact,
                };
                meta.cycles.push(cycle.clone());
                Some(cycle)
            }
            None => None,
        };
        tracing::info!(
            topic = %topic,
            archived = archived.is_some(),
            "Research topic reset"
        );
        meta.topic = Some(topic);
        Ok(archived)
    }

    fn require_topic(&self) -> Result<String> {
        self.topic().ok_or_else(|| ConfigurationError::NoTopicSet.into())
    }

    pub fn cycles(&self) -> Vec<ArchivedCycle> {
        self.meta.read().cycles.clone()
    }

    // ============= Rounds =============

    pub fn round_counter(&self) -> u64 {
        self.meta.read().round_counter
    }

    pub async fn run_round(&self, variant: RoundVariant) -> Result<OperationReport<RoundOutcome>> {
        self.run_round_with_cancel(variant, &CancellationToken::new()).await
    }

    /// Run one round; `cancel` stops it between per-agent calls.
    ///
    /// The round number is consumed even when the round is cancelled.
    pub async fn run_round_with_cancel(
        &self,
        variant: RoundVariant,
        cancel: &CancellationToken,
    ) -> Result<OperationReport<RoundOutcome>> {
        if let RoundVariant::Discussion { sub_topic } = &variant {
            if sub_topic.trim().is_empty() {
                return Err(ConfigurationError::InvalidArgument(
                    "a discussion round needs a sub-topic".to_string(),
                )
                .into());
            }
        }

        let _turn = self.round_lock.lock().await;
        let topic = self.require_topic()?;
        let roster = self.roster_snapshot()?;
        let round = {
            let mut meta = self.meta.write();
            meta.round_counter += 1;
            meta.round_counter
        };

        let round = CollaborationRound {
            topic: &topic,
            round,
            roster: &roster,
            artifact: &self.artifact,
            llm: self.llm.as_ref(),
            search: self.search.as_ref(),
            settings: &self.settings,
            cancel,
        };
        Ok(round.run(variant).await)
    }

    pub async fn brainstorm(&self) -> Result<OperationReport<RoundOutcome>> {
        self.run_round(RoundVariant::Brainstorm).await
    }

    pub async fn research(&self) -> Result<OperationReport<RoundOutcome>> {
        self.run_round(RoundVariant::Research).await
    }

    pub async fn discuss(&self, sub_topic: &str) -> Result<OperationReport<RoundOutcome>> {
        self.run_round(RoundVariant::Discussion {
            sub_topic: sub_topic.trim().to_string(),
        })
        .await
    }

    // ============= Convergence =============

    pub async fn collect_snapshot(&self) -> Result<OperationReport<GateVerdict>> {
        self.collect_snapshot_with_cancel(&CancellationToken::new()).await
    }

    /// Poll every agent for a satisfaction rating.
    ///
    /// Non-convergence is an ordinary verdict, not an error.
    pub async fn collect_snapshot_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<OperationReport<GateVerdict>> {
        let _turn = self.round_lock.lock().await;
        let topic = self.require_topic()?;
        let roster = self.roster_snapshot()?;
        let entries = self.artifact.read().entries().to_vec();
        if entries.is_empty() {
            return Err(ConfigurationError::NoArtifactEntries.into());
        }

        let gate = ConvergenceGate {
            topic: &topic,
            after_round: self.round_counter(),
            roster: &roster,
            entries: &entries,
            llm: self.llm.as_ref(),
            settings: &self.settings,
            cancel,
        };
        let report = gate.collect_snapshot().await;
        self.meta.write().snapshots.push(report.value.snapshot.clone());
        Ok(report)
    }

    /// Convergence of `snapshot` under this session's threshold.
    pub fn is_converged(&self, snapshot: &SatisfactionSnapshot) -> bool {
        gate::is_converged(snapshot, self.settings.satisfaction_threshold)
    }

    pub fn snapshots(&self) -> Vec<SatisfactionSnapshot> {
        self.meta.read().snapshots.clone()
    }

    pub fn latest_snapshot(&self) -> Option<SatisfactionSnapshot> {
        self.meta.read().snapshots.last().cloned()
    }

    // ============= Self-improvement =============

    fn mutator(&self) -> PromptMutator<'_> {
        PromptMutator::new(
            self.llm.as_ref(),
            self.settings.mutation_memory_window,
            self.settings.inference_timeout,
        )
    }

    fn mutation_feedback(&self) -> MutationFeedback {
        MutationFeedback {
            topic: self.topic(),
            artifact_entries: self.artifact.read().len(),
            improvements_so_far: 0,
        }
    }

    /// Ask the mutator for a better configuration for one agent.
    pub async fn improve_agent(&self, agent_id: &AgentId) -> Result<OperationReport<MutationOutcome>> {
        let slot = self.slot(agent_id)?;
        let feedback = self.mutation_feedback();
        let outcome = self.mutator().improve(&slot, &feedback).await?;
        Ok(OperationReport::clean(outcome))
    }

    /// Run the mutator for every agent concurrently, results in turn order.
    pub async fn improve_all(&self) -> Result<OperationReport<Vec<ImprovementAttempt>>> {
        let roster = self.roster_snapshot()?;
        let feedback = self.mutation_feedback();
        let mutator = self.mutator();

        let attempts = stream::iter(roster.iter())
            .map(|slot| {
                let mutator = &mutator;
                let feedback = &feedback;
                async move {
                    let agent_id = slot.record.read().id().clone();
                    let result = mutator.improve(slot, feedback).await;
                    ImprovementAttempt { agent_id, result }
                }
            })
            .buffered(self.settings.max_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let warnings = attempts
            .iter()
            .filter_map(|attempt| match &attempt.result {
                Ok(_) => None,
                Err(err) => Some(AgentWarning::new(
                    attempt.agent_id.clone(),
                    WarningKind::ImprovementRejected,
                    err.to_string(),
                )),
            })
            .collect::<Vec<_>>();
        tracing::info!(
            applied = attempts.len() - warnings.len(),
            attempted = attempts.len(),
            "Roster self-improvement finished"
        );
        Ok(OperationReport::new(attempts, warnings))
    }

    /// Re-activate an agent's previous configuration.
    pub async fn rollback_agent(&self, agent_id: &AgentId) -> Result<Option<ConfigurationDelta>> {
        let slot = self.slot(agent_id)?;
        let _guard = slot.mutation.lock().await;
        let mut record = slot.record.write();
        record.rollback()?;
        tracing::info!(agent = %agent_id, "Configuration rolled back");
        Ok(record.history_delta())
    }

    // ============= Export =============

    pub fn artifact(&self) -> Artifact {
        self.artifact.read().clone()
    }

    pub fn export_artifact(&self) -> ArtifactExport {
        let authors = self
            .roster
            .read()
            .iter()
            .map(|slot| {
                let record = slot.record.read();
                Author {
                    id: record.id().clone(),
                    display_name: record.display_name().to_string(),
                    specialty: record.specialty().to_string(),
                }
            })
            .collect();
        let meta = self.meta.read();
        ArtifactExport {
            topic: meta.topic.clone(),
            authors,
            round_counter: meta.round_counter,
            exported_at: Utc::now(),
            artifact: self.artifact.read().clone(),
        }
    }

    /// Render the current artifact. Needs a topic for the title.
    pub fn render(&self, renderer: &dyn DocumentRenderer) -> Result<String> {
        let export = self.export_artifact();
        if export.topic.is_none() {
            return Err(ConfigurationError::NoTopicSet.into());
        }
        Ok(renderer.render(&export))
    }

    /// Full serializable state of the session.
    pub fn export_state(&self) -> SessionState {
        let agents = self.agents();
        let meta = self.meta.read();
        SessionState {
            format_version: STATE_FORMAT_VERSION,
            id: self.id,
            created_at: self.created_at,
            saved_at: Utc::now(),
            topic: meta.topic.clone(),
            round_counter: meta.round_counter,
            agents,
            artifact: self.artifact.read().clone(),
            cycles: meta.cycles.clone(),
            snapshots: meta.snapshots.clone(),
        }
    }

    /// Rebuild a session from exported state after validating it.
    pub fn from_state(
        state: SessionState,
        llm: Arc<dyn LLMClient>,
        search: Arc<dyn SearchTool>,
        settings: SessionSettings,
    ) -> Result<Self> {
        state.validate().map_err(ResearchError::Persistence)?;

        let roster = state
            .agents
            .into_iter()
            .map(|record| Arc::new(AgentSlot::new(record)))
            .collect();
        Ok(Self {
            id: state.id,
            created_at: state.created_at,
            settings,
            llm,
            search,
            meta: RwLock::new(SessionMeta {
                topic: state.topic,
                round_counter: state.round_counter,
                cycles: state.cycles,
                snapshots: state.snapshots,
            }),
            artifact: RwLock::new(state.artifact),
            roster: RwLock::new(roster),
            round_lock: tokio::sync::Mutex::new(()),
        })
    }
}

fn normalize_topic(topic: &str) -> Result<String> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(ConfigurationError::InvalidArgument("topic must not be empty".to_string()).into());
    }
    Ok(topic.to_string())
}
