//! Retrieval tools
//!
//! [`WebSearch`] uses the daedra crate, which queries DuckDuckGo.
//! [`NoSearch`] returns nothing and lets a session run fully offline.

use crate::types::{ExternalCallError, ExternalResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One ranked retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    /// Where the hit came from, usually a URL.
    pub source: String,
}

/// Retrieval tool contract: query in, ranked hits out (possibly none).
#[async_trait]
pub trait SearchTool: Send + Sync {
    async fn search(&self, query: &str) -> ExternalResult<Vec<SearchHit>>;

    fn name(&self) -> &str;
}

/// Run one search with a deadline; expiry becomes [`ExternalCallError::Timeout`].
pub async fn search_with_timeout(
    tool: &dyn SearchTool,
    query: &str,
    limit: Duration,
) -> ExternalResult<Vec<SearchHit>> {
    match tokio::time::timeout(limit, tool.search(query)).await {
        Ok(result) => result,
        Err(_) => Err(ExternalCallError::Timeout(limit)),
    }
}

/// Web search tool powered by daedra
pub struct WebSearch {
    num_results: usize,
}

impl WebSearch {
    pub fn new(num_results: usize) -> Self {
        Self { num_results }
    }
}

impl Default for WebSearch {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl SearchTool for WebSearch {
    async fn search(&self, query: &str) -> ExternalResult<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: self.num_results,
                ..Default::default()
            }),
        };

        match daedra::tools::search::perform_search(&search_args).await {
            Ok(response) => Ok(response
                .data
                .iter()
                .take(self.num_results)
                .map(|r| SearchHit {
                    title: r.title.clone(),
                    snippet: r.description.clone(),
                    source: r.url.clone(),
                })
                .collect()),
            Err(e) => Err(ExternalCallError::Unavailable(format!(
                "Search failed: {}",
                e
            ))),
        }
    }

    fn name(&self) -> &str {
        "web_search"
    }
}

/// Retrieval tool that never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSearch;

#[async_trait]
impl SearchTool for NoSearch {
    async fn search(&self, _query: &str) -> ExternalResult<Vec<SearchHit>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "none"
    }
}
