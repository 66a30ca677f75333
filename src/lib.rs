//! # Agora - Multi-Agent Research Orchestration
//!
//! A team of stateful, specialized agents collaborates on a research topic
//! through brainstorm, research and discussion rounds, checks its own
//! satisfaction against a convergence threshold, and rewrites its own
//! instructions from observed behavior. The accumulated artifact renders to
//! Markdown or LaTeX.
//!
//! ## Overview
//!
//! Agora can be used in two ways:
//!
//! 1. **As a command-line tool** - Run the `agora` binary against a session file
//! 2. **As a library** - Drive a [`ResearchSession`] from your own code
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use agora::{Provider, ResearchSession, SessionSettings};
//! use agora::tools::WebSearch;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let llm = Provider::Ollama {
//!         base_url: "http://localhost:11434".to_string(),
//!     }
//!     .create_client()?;
//!
//!     let session = ResearchSession::new(Arc::from(llm), Arc::new(WebSearch::default()), SessionSettings::default());
//!     session.add_default_team()?;
//!     session.set_topic("Efficient attention for long documents")?;
//!
//!     let round = session.brainstorm().await?;
//!     for warning in &round.warnings {
//!         eprintln!("{}", warning);
//!     }
//!
//!     let verdict = session.collect_snapshot().await?.value;
//!     println!("converged: {}", verdict.converged);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `minimal` | No optional features |
//!
//! ## Modules
//!
//! - [`research`] - Agents, rounds, the convergence gate, self-improvement, sessions
//! - [`llm`] - Inference backend contract and clients
//! - [`tools`] - Retrieval tools for research rounds
//! - [`render`] - Markdown and LaTeX document renderers
//! - [`types`] - Error taxonomy, warnings and operation reports
//! - [`utils`] - TOML configuration
//! - [`cli`] - Command-line parsing and terminal output

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line parsing and colored output.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Document renderers.
pub mod render;
/// Multi-agent research orchestration.
pub mod research;
/// Retrieval tools (web search, offline).
pub mod tools;
/// Core types (errors, warnings, reports).
pub mod types;
/// Configuration utilities (TOML).
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, Provider};
pub use render::{DocumentRenderer, LatexRenderer, MarkdownRenderer};
pub use research::{AgentSpec, ResearchSession, RoundVariant, SessionSettings};
pub use tools::SearchTool;
pub use types::{AgentId, OperationReport, ResearchError, Result};
pub use utils::toml_config::{AgoraConfig, AgoraConfigManager};
