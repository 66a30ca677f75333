//! Retrieval Tools for Research Rounds
//!
//! Agents ground their research-round notes in retrieved snippets. This module
//! defines the retrieval contract and the built-in implementations.
//!
//! # Module Structure
//!
//! - [`search`](crate::tools::search) - [`SearchTool`] contract, web search, offline no-op
//!
//! # Example
//!
//! ```ignore
//! let tool = WebSearch::new(5);
//! for hit in tool.search("sparse attention efficiency").await? {
//!     println!("{}: {}", hit.title, hit.source);
//! }
//! ```

/// Retrieval contract and search implementations.
pub mod search;

pub use search::{search_with_timeout, NoSearch, SearchHit, SearchTool, WebSearch};
