//! Multi-Agent Research Orchestration
//!
//! A fixed roster of stateful agents collaborates on a research topic through
//! rounds, decides readiness through a satisfaction gate, and revises its own
//! priming text from observed behavior.
//!
//! # Architecture
//!
//! - [`agent::AgentRecord`] - identity, configuration, append-only history and memory
//! - [`artifact::Artifact`] - append-only research record built by the rounds
//! - [`round::CollaborationRound`] - brainstorm, research and discussion protocols
//! - [`gate::ConvergenceGate`] - satisfaction snapshots and the convergence test
//! - [`mutator::PromptMutator`] - the self-improvement loop
//! - [`session::ResearchSession`] - owns all of the above and sequences operations
//! - [`persistence`] - session state to and from JSON on disk
//!
//! # Usage
//!
//! ```ignore
//! use agora::research::{ResearchSession, SessionSettings};
//!
//! let session = ResearchSession::new(llm, search, SessionSettings::default());
//! session.add_default_team()?;
//! session.set_topic("Efficient attention for long documents")?;
//!
//! session.brainstorm().await?;
//! session.research().await?;
//! session.discuss("evaluation methodology").await?;
//!
//! let verdict = session.collect_snapshot().await?;
//! if !verdict.value.converged {
//!     session.improve_all().await?;
//! }
//! ```
//!
//! # Failure model
//!
//! Session-wide preconditions (no topic, empty roster, nothing to rate) fail
//! the whole operation before any external call. A failure affecting one agent
//! becomes an [`AgentWarning`](crate::types::AgentWarning) in the returned
//! [`OperationReport`](crate::types::OperationReport) and the rest of the
//! roster carries on.

/// Agent state and its append-only invariants.
pub mod agent;
/// The accumulated research record.
pub mod artifact;
/// Satisfaction snapshots and convergence.
pub mod gate;
/// Configuration self-improvement.
pub mod mutator;
/// Saving and restoring sessions.
pub mod persistence;
/// Prompt builders and reply parsers.
pub mod prompts;
/// Collaboration round protocols.
pub mod round;
/// Session state and operations.
pub mod session;

pub use agent::{AgentRecord, AgentSummary, ConfigurationDelta, MemoryEntry, MemoryRecord};
pub use artifact::{ArchivedCycle, Artifact, ArtifactEntry, ArtifactExport, Author, EntryBody, EntryKind};
pub use gate::{is_converged, GateVerdict, SatisfactionSnapshot};
pub use mutator::MutationOutcome;
pub use persistence::{load_session, save_session, SessionState};
pub use round::{RoundOutcome, RoundVariant};
pub use session::{default_team, AgentSpec, ImprovementAttempt, ResearchSession, SessionSettings};
