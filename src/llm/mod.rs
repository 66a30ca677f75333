//! LLM Provider Clients and Abstractions
//!
//! This module hides the inference backend behind the [`LLMClient`] trait so the
//! orchestration engine never depends on a backend's wire protocol.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `ollama` - Local Ollama server (default)
//!
//! # Example
//!
//! ```ignore
//! use agora::llm::Provider;
//!
//! let client = Provider::Ollama { base_url: "http://localhost:11434".into() }.create_client()?;
//! let reply = client.complete("You are Dr. Neural.", "Name one open problem.", "llama3.1").await?;
//! ```

/// Core LLM client trait and provider selection.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use client::{complete_with_timeout, LLMClient, Provider};
