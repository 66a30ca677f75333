use crate::render::DocumentRenderer;
use crate::research::artifact::{ArtifactEntry, ArtifactExport, EntryBody};
use std::fmt::Write;

/// Renders the artifact as a LaTeX article with a bibliography.
#[derive(Debug, Default, Clone, Copy)]
pub struct LatexRenderer;

impl DocumentRenderer for LatexRenderer {
    fn render(&self, export: &ArtifactExport) -> String {
        let mut out = String::new();
        let topic = escape(export.topic.as_deref().unwrap_or("Untitled research"));
        let authors: Vec<String> = export
            .authors
            .iter()
            .map(|a| escape(&a.display_name))
            .collect();

        out.push_str("\\documentclass[11pt]{article}\n");
        out.push_str("\\usepackage[utf8]{inputenc}\n");
        out.push_str("\\usepackage{hyperref}\n\n");
        let _ = writeln!(out, "\\title{{{}}}", topic);
        let _ = writeln!(out, "\\author{{{}}}", authors.join(" \\and "));
        let _ = writeln!(out, "\\date{{{}}}\n", export.exported_at.format("%B %-d, %Y"));
        out.push_str("\\begin{document}\n\\maketitle\n\n");

        let sources = export.sources();
        section(&mut out, "Research Directions", export, export.artifact.ideas(), &sources);
        section(&mut out, "Evidence", export, export.artifact.evidence(), &sources);
        section(&mut out, "Discussion", export, export.artifact.discussion(), &sources);

        if !sources.is_empty() {
            let _ = writeln!(out, "\\begin{{thebibliography}}{{{}}}", sources.len());
            for (i, hit) in sources.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "\\bibitem{{src{}}} {}. \\url{{{}}}",
                    i + 1,
                    escape(&hit.title),
                    url_argument(&hit.source)
                );
            }
            out.push_str("\\end{thebibliography}\n\n");
        }

        out.push_str("\\end{document}\n");
        out
    }

    fn extension(&self) -> &'static str {
        "tex"
    }
}

fn section<'a>(
    out: &mut String,
    title: &str,
    export: &ArtifactExport,
    entries: impl Iterator<Item = &'a ArtifactEntry>,
    sources: &[&crate::tools::SearchHit],
) {
    let entries: Vec<&ArtifactEntry> = entries.collect();
    if entries.is_empty() {
        return;
    }

    let _ = writeln!(out, "\\section{{{}}}\n", title);
    let ideas = matches!(entries[0].body, EntryBody::Idea { .. });
    if ideas {
        out.push_str("\\begin{itemize}\n");
    }
    for entry in entries {
        let author = escape(&export.display_name(&entry.agent_id));
        match &entry.body {
            EntryBody::Idea { text } => {
                let _ = writeln!(out, "  \\item {} \\emph{{({})}}", escape(text), author);
            }
            EntryBody::Evidence { text, sources: hits, .. } => {
                let cites: Vec<String> = hits
                    .iter()
                    .filter_map(|hit| sources.iter().position(|s| s.source == hit.source))
                    .map(|i| format!("src{}", i + 1))
                    .collect();
                let _ = writeln!(out, "\\paragraph{{{}}}", author);
                if cites.is_empty() {
                    let _ = writeln!(out, "{}\n", escape(text));
                } else {
                    let _ = writeln!(out, "{} \\cite{{{}}}\n", escape(text), cites.join(","));
                }
            }
            EntryBody::Discussion { sub_topic, text } => {
                let _ = writeln!(out, "\\paragraph{{{} on {}}}", author, escape(sub_topic));
                let _ = writeln!(out, "{}\n", escape(text));
            }
        }
    }
    if ideas {
        out.push_str("\\end{itemize}\n");
    }
    out.push('\n');
}

/// Escape LaTeX special characters in plain text.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Make a link target safe inside `\url{..}`.
///
/// Braces, backslashes and spaces are percent-encoded. Every `%` and `#` is
/// written with the backslash `\url` accepts for them.
fn url_argument(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for c in source.chars() {
        match c {
            '{' => out.push_str("\\%7B"),
            '}' => out.push_str("\\%7D"),
            '\\' => out.push_str("\\%5C"),
            ' ' => out.push_str("\\%20"),
            '%' | '#' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
