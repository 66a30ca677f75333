use crate::llm::client::LLMClient;
use crate::types::{ExternalCallError, ExternalResult};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    Ollama,
};

const DEFAULT_OLLAMA_PORT: u16 = 11434;

pub struct OllamaClient {
    client: Ollama,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        let (host, port) = split_base_url(base_url);
        let client = Ollama::new(host, port);

        Self {
            client,
            base_url: base_url.to_string(),
        }
    }
}

/// Split `scheme://host:port` into (`scheme://host`, port), defaulting both parts.
fn split_base_url(base_url: &str) -> (String, u16) {
    let (scheme, rest) = match base_url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", base_url),
    };
    let rest = rest.trim_end_matches('/');

    match rest.rsplit_once(':') {
        Some((host, port)) => (
            format!("{}://{}", scheme, host),
            port.parse().unwrap_or(DEFAULT_OLLAMA_PORT),
        ),
        None if rest.is_empty() => (format!("{}://localhost", scheme), DEFAULT_OLLAMA_PORT),
        None => (format!("{}://{}", scheme, rest), DEFAULT_OLLAMA_PORT),
    }
}

fn classify_error(base_url: &str, message: String) -> ExternalCallError {
    let lowered = message.to_lowercase();
    if lowered.contains("json") || lowered.contains("decode") || lowered.contains("deserialize")
    {
        ExternalCallError::Malformed(format!("Ollama at {}: {}", base_url, message))
    } else {
        ExternalCallError::Unavailable(format!("Ollama at {}: {}", base_url, message))
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn complete(&self, system: &str, prompt: &str, model: &str) -> ExternalResult<String> {
        let messages = vec![
            ChatMessage::system(system.to_string()),
            ChatMessage::user(prompt.to_string()),
        ];

        let request = ChatMessageRequest::new(model.to_string(), messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| classify_error(&self.base_url, e.to_string()))?;

        Ok(response.message.content)
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}
