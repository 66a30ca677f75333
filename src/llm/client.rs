//! LLM client abstraction and provider selection
//!
//! The orchestration engine needs exactly one capability from an inference
//! backend: turn a priming text plus a prompt into a completion for a named
//! model. Any backend exposing that operation can drive a session.
//!
//! - **Ollama**: local inference through the Ollama server (feature `ollama`)

use crate::types::{ExternalCallError, ExternalResult, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Generic LLM client trait for provider abstraction
///
/// All inference backends implement this trait, allowing sessions to swap
/// providers (or test doubles) without changing orchestration code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Complete `prompt` for `model`, primed with the agent configuration in `system`.
    async fn complete(&self, system: &str, prompt: &str, model: &str) -> ExternalResult<String>;

    /// Human-readable backend name, used in logs.
    fn provider_name(&self) -> &str;
}

/// Run one completion with a deadline.
///
/// Expiry is reported as [`ExternalCallError::Timeout`], the same way any other
/// failed call is, so callers handle both paths identically.
pub async fn complete_with_timeout(
    client: &dyn LLMClient,
    system: &str,
    prompt: &str,
    model: &str,
    limit: Duration,
) -> ExternalResult<String> {
    match tokio::time::timeout(limit, client.complete(system, prompt, model)).await {
        Ok(result) => result,
        Err(_) => Err(ExternalCallError::Timeout(limit)),
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone, PartialEq)]
pub enum Provider {
    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    /// };
    /// ```
    Ollama { base_url: String },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the provider was compiled out.
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url } => {
                Ok(Box::new(super::ollama::OllamaClient::new(base_url)))
            }

            #[cfg(not(feature = "ollama"))]
            Provider::Ollama { .. } => Err(crate::types::ResearchError::Configuration(
                crate::types::ConfigurationError::InvalidArgument(
                    "the 'ollama' feature is disabled in this build".to_string(),
                ),
            )),
        }
    }

    /// Check if this provider is compiled into the current build
    pub fn is_available(&self) -> bool {
        match self {
            Provider::Ollama { .. } => cfg!(feature = "ollama"),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Ollama { .. } => "Ollama",
        }
    }
}
