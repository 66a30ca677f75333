//! Mock implementations for testing.
//!
//! This module provides a scripted LLM client and a scripted search tool that
//! can be shared across the integration test files.
//!
//! Agents built with [`tagged`] carry an `[agent:NAME]` marker in their
//! configuration. The mock reads it back from the priming text (or, for a
//! mutation call, from the instructions quoted in the prompt) to decide which
//! agent is speaking.

use agora::llm::LLMClient;
use agora::research::prompts::MUTATOR_SYSTEM_PROMPT;
use agora::research::{AgentSpec, ResearchSession, SessionSettings};
use agora::tools::{SearchHit, SearchTool};
use agora::types::{ExternalCallError, ExternalResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Which engine operation issued a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Brainstorm,
    Research,
    Discussion,
    Rating,
    Mutation,
    Other,
}

impl CallKind {
    pub fn classify(system: &str, prompt: &str) -> Self {
        if system == MUTATOR_SYSTEM_PROMPT {
            CallKind::Mutation
        } else if prompt.contains("Brainstorming round") {
            CallKind::Brainstorm
        } else if prompt.starts_with("You searched for") {
            CallKind::Research
        } else if prompt.starts_with("Discussion topic:") {
            CallKind::Discussion
        } else if prompt.contains("Rate your satisfaction") {
            CallKind::Rating
        } else {
            CallKind::Other
        }
    }
}

/// One completion request as the mock saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub agent: Option<String>,
    pub kind: CallKind,
    pub system: String,
    pub prompt: String,
    pub model: String,
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(ExternalCallError),
    Hang,
}

#[derive(Debug, Clone)]
struct Rule {
    agent: Option<String>,
    kind: Option<CallKind>,
    reply: Reply,
}

impl Rule {
    /// Match score; agent-specific rules beat kind-only rules.
    fn score(&self, agent: Option<&str>, kind: CallKind) -> Option<u8> {
        let mut score = 0;
        if let Some(wanted) = &self.agent {
            if agent != Some(wanted.as_str()) {
                return None;
            }
            score += 2;
        }
        if let Some(wanted) = self.kind {
            if wanted != kind {
                return None;
            }
            score += 1;
        }
        Some(score)
    }
}

/// Mock LLM client with per-agent and per-operation scripted replies.
///
/// # Examples
///
/// ```ignore
/// let llm = MockLLMClient::new("1. an idea")
///     .on(CallKind::Rating, "8")
///     .on_agent("Beta", CallKind::Rating, "no idea")
///     .fail_agent("Gamma")
///     .delay_agent("Alpha", Duration::from_millis(50));
/// ```
#[derive(Clone)]
pub struct MockLLMClient {
    default_reply: Reply,
    rules: Vec<Rule>,
    delays: Vec<(String, Duration)>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockLLMClient {
    /// Create a client that answers every call with `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_reply: Reply::Text(response.into()),
            rules: Vec::new(),
            delays: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a client whose backend is always unavailable.
    pub fn failing() -> Self {
        let mut client = Self::new("");
        client.default_reply = Reply::Fail(ExternalCallError::Unavailable("connection refused".to_string()));
        client
    }

    /// Reply with `response` to every call of `kind`.
    pub fn on(mut self, kind: CallKind, response: impl Into<String>) -> Self {
        self.rules.push(Rule {
            agent: None,
            kind: Some(kind),
            reply: Reply::Text(response.into()),
        });
        self
    }

    /// Reply with `response` to calls of `kind` made for `agent`.
    pub fn on_agent(mut self, agent: &str, kind: CallKind, response: impl Into<String>) -> Self {
        self.rules.push(Rule {
            agent: Some(agent.to_string()),
            kind: Some(kind),
            reply: Reply::Text(response.into()),
        });
        self
    }

    /// Fail every call made for `agent`.
    pub fn fail_agent(mut self, agent: &str) -> Self {
        self.rules.push(Rule {
            agent: Some(agent.to_string()),
            kind: None,
            reply: Reply::Fail(ExternalCallError::Unavailable(format!("{} backend down", agent))),
        });
        self
    }

    /// Never answer calls made for `agent`.
    pub fn hang_agent(mut self, agent: &str) -> Self {
        self.rules.push(Rule {
            agent: Some(agent.to_string()),
            kind: None,
            reply: Reply::Hang,
        });
        self
    }

    /// Sleep before answering calls made for `agent`.
    pub fn delay_agent(mut self, agent: &str, delay: Duration) -> Self {
        self.delays.push((agent.to_string(), delay));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<RecordedCall> {
        self.calls.lock().iter().filter(|c| c.kind == kind).cloned().collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Most calls that were in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn pick(&self, agent: Option<&str>, kind: CallKind) -> Reply {
        let mut best: Option<(u8, &Rule)> = None;
        for rule in &self.rules {
            if let Some(score) = rule.score(agent, kind) {
                if best.is_none_or(|(top, _)| score > top) {
                    best = Some((score, rule));
                }
            }
        }
        best.map(|(_, rule)| rule.reply.clone())
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn complete(&self, system: &str, prompt: &str, model: &str) -> ExternalResult<String> {
        let kind = CallKind::classify(system, prompt);
        let agent = if kind == CallKind::Mutation {
            agent_marker(prompt)
        } else {
            agent_marker(system)
        };
        self.calls.lock().push(RecordedCall {
            agent: agent.clone(),
            kind,
            system: system.to_string(),
            prompt: prompt.to_string(),
            model: model.to_string(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = agent
            .as_deref()
            .and_then(|a| self.delays.iter().find(|(name, _)| name == a))
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = match self.pick(agent.as_deref(), kind) {
            Reply::Text(text) => Ok(text),
            Reply::Fail(err) => Err(err),
            Reply::Hang => std::future::pending().await,
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

fn agent_marker(text: &str) -> Option<String> {
    let start = text.find("[agent:")? + "[agent:".len();
    let end = text[start..].find(']')?;
    Some(text[start..start + end].to_string())
}

/// Configuration text carrying the marker the mock looks for.
pub fn persona(name: &str) -> String {
    format!("[agent:{}] You are {}, a careful researcher.", name, name)
}

/// An agent spec whose calls the mock can attribute to `name`.
pub fn tagged(name: &str, specialty: &str) -> AgentSpec {
    AgentSpec::new(name, specialty).with_configuration(persona(name))
}

/// Settings with short deadlines for tests.
pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        inference_timeout: Duration::from_secs(2),
        retrieval_timeout: Duration::from_secs(2),
        ..SessionSettings::default()
    }
}

/// A session over the given mocks with `names` on the roster and `topic` set.
pub fn session_with(
    llm: &MockLLMClient,
    search: &MockSearchTool,
    names: &[&str],
    topic: &str,
) -> ResearchSession {
    let session = ResearchSession::new(Arc::new(llm.clone()), Arc::new(search.clone()), fast_settings());
    for name in names {
        session
            .add_agent(tagged(name, &format!("{} studies", name)))
            .expect("agent should be added");
    }
    session.set_topic(topic).expect("topic should be set");
    session
}

/// Mock retrieval tool with fixed hits and optional per-query failures.
#[derive(Clone, Default)]
pub struct MockSearchTool {
    hits: Vec<SearchHit>,
    fail_all: bool,
    fail_when: Vec<String>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockSearchTool {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }

    /// Fail queries that contain `needle`, e.g. an agent's specialty.
    pub fn fail_when_query_contains(mut self, needle: &str) -> Self {
        self.fail_when.push(needle.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchTool for MockSearchTool {
    async fn search(&self, query: &str) -> ExternalResult<Vec<SearchHit>> {
        self.queries.lock().push(query.to_string());
        if self.fail_all || self.fail_when.iter().any(|needle| query.contains(needle.as_str())) {
            return Err(ExternalCallError::Unavailable("search engine unreachable".to_string()));
        }
        Ok(self.hits.clone())
    }

    fn name(&self) -> &str {
        "mock_search"
    }
}

/// A search hit with a derived snippet.
pub fn hit(title: &str, source: &str) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        snippet: format!("Summary of {}", title),
        source: source.to_string(),
    }
}
