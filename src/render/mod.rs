//! Document Rendering
//!
//! Renderers turn an [`ArtifactExport`] into document text. They only decide
//! structure (title, authors, one section per entry kind, references) and
//! escaping; there are no typesetting rules here.
//!
//! - [`MarkdownRenderer`] - a readable research log
//! - [`LatexRenderer`] - a paper skeleton with a bibliography built from evidence sources

/// LaTeX paper output.
pub mod latex;
/// Markdown output.
pub mod markdown;

pub use latex::LatexRenderer;
pub use markdown::MarkdownRenderer;

use crate::research::artifact::ArtifactExport;
use crate::types::ConfigurationError;
use std::str::FromStr;

/// Document renderer contract.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, export: &ArtifactExport) -> String;

    /// Conventional file extension, without the dot.
    fn extension(&self) -> &'static str;
}

/// Output formats known to the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Markdown,
    Latex,
}

impl DocumentFormat {
    pub fn renderer(self) -> Box<dyn DocumentRenderer> {
        match self {
            DocumentFormat::Markdown => Box::new(MarkdownRenderer),
            DocumentFormat::Latex => Box::new(LatexRenderer),
        }
    }
}

impl FromStr for DocumentFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(DocumentFormat::Markdown),
            "latex" | "tex" => Ok(DocumentFormat::Latex),
            other => Err(ConfigurationError::InvalidArgument(format!(
                "unknown document format '{}' (expected markdown or latex)",
                other
            ))),
        }
    }
}
