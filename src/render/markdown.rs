use crate::render::DocumentRenderer;
use crate::research::artifact::{ArtifactEntry, ArtifactExport, EntryBody};
use std::fmt::Write;

/// Renders the artifact as a Markdown research log.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownRenderer;

impl DocumentRenderer for MarkdownRenderer {
    fn render(&self, export: &ArtifactExport) -> String {
        let mut out = String::new();
        let topic = export.topic.as_deref().unwrap_or("Untitled research");

        let _ = writeln!(out, "# {}\n", topic);
        let names: Vec<String> = export
            .authors
            .iter()
            .map(|a| format!("{} ({})", a.display_name, a.specialty))
            .collect();
        let _ = writeln!(out, "**Authors:** {}\n", names.join(", "));
        let _ = writeln!(
            out,
            "_Rounds completed: {} | Exported: {}_\n",
            export.round_counter,
            export.exported_at.format("%Y-%m-%d %H:%M UTC")
        );

        section(&mut out, "Ideas", export, export.artifact.ideas());
        section(&mut out, "Evidence", export, export.artifact.evidence());
        section(&mut out, "Discussion", export, export.artifact.discussion());

        let sources = export.sources();
        if !sources.is_empty() {
            let _ = writeln!(out, "## References\n");
            for (i, hit) in sources.iter().enumerate() {
                let _ = writeln!(out, "{}. [{}]({})", i + 1, hit.title, hit.source);
            }
        }
        out
    }

    fn extension(&self) -> &'static str {
        "md"
    }
}

fn section<'a>(
    out: &mut String,
    title: &str,
    export: &ArtifactExport,
    entries: impl Iterator<Item = &'a ArtifactEntry>,
) {
    let entries: Vec<&ArtifactEntry> = entries.collect();
    if entries.is_empty() {
        return;
    }

    let _ = writeln!(out, "## {}\n", title);
    for entry in entries {
        let author = export.display_name(&entry.agent_id);
        match &entry.body {
            EntryBody::Idea { text } => {
                let _ = writeln!(out, "- **{}** (round {}): {}", author, entry.round, text);
            }
            EntryBody::Evidence { query, text, .. } => {
                let _ = writeln!(out, "### {} (round {})\n", author, entry.round);
                let _ = writeln!(out, "_Query:_ `{}`\n", query);
                let _ = writeln!(out, "{}\n", text);
            }
            EntryBody::Discussion { sub_topic, text } => {
                let _ = writeln!(out, "### {} on {} (round {})\n", author, sub_topic, entry.round);
                let _ = writeln!(out, "{}\n", text);
            }
        }
    }
    out.push('\n');
}
