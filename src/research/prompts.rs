//! Prompt construction and reply parsing for every inference call the engine makes.
//!
//! Builders are pure functions over plain data so that the round, gate and
//! mutator code never formats text inline, and so parsing rules can be tested
//! without a backend.

use crate::research::agent::{MemoryEntry, MemoryRecord};
use crate::research::artifact::{ArtifactEntry, EntryBody};
use crate::tools::SearchHit;
use crate::types::RejectionReason;

/// Priming text used for the mutator's own call.
pub const MUTATOR_SYSTEM_PROMPT: &str =
    "You are a meta-agent that revises the behavioral instructions of research agents. \
     You answer with the revised instructions only.";

/// Initial configuration for an agent added without one.
pub fn default_configuration(display_name: &str, specialty: &str) -> String {
    format!(
        r#"You are {name}, an expert researcher specializing in {specialty}.

Your role in this research team:
- Collaborate with the other researchers to produce a high-quality research paper
- Contribute insights from your specialty
- Critically evaluate ideas and proposals, including your own
- Ground claims in evidence and say when evidence is missing
- Be concise but thorough

Specialty: {specialty}
Research approach: rigorous, evidence-based, collaborative"#,
        name = display_name,
        specialty = specialty
    )
}

pub fn brainstorm_prompt(topic: &str, round: u64, specialty: &str, prior_ideas: &[String]) -> String {
    let context = if prior_ideas.is_empty() {
        "No ideas have been proposed yet. Open the brainstorm.".to_string()
    } else {
        format!(
            "Ideas proposed so far by the team:\n{}",
            prior_ideas
                .iter()
                .map(|idea| format!("- {}", idea))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    format!(
        r#"Research topic: {topic}
Brainstorming round {round}

{context}

As an expert in {specialty}, propose 1-3 specific research directions or hypotheses.
Build on earlier ideas where relevant instead of repeating them.
Answer with a numbered list, one idea per item."#,
    )
}

/// Search query for an agent's research contribution.
pub fn research_query(topic: &str, specialty: &str) -> String {
    format!("{} {}", topic.trim(), specialty.trim())
}

pub fn research_prompt(topic: &str, query: &str, hits: &[SearchHit]) -> String {
    let results = if hits.is_empty() {
        "The search returned no results. Work from what you know and flag uncertain claims."
            .to_string()
    } else {
        hits.iter()
            .enumerate()
            .map(|(i, hit)| format!("{}. {}\n   {}\n   Source: {}", i + 1, hit.title, hit.snippet, hit.source))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You searched for: "{query}"

Search results:
{results}

Extract the findings most relevant to our research on: {topic}
Write a concise research note with the key insights and cite sources by number."#,
    )
}

/// Discussion prompt; `peers` holds (display name, text) of earlier speakers in this round.
pub fn discussion_prompt(
    topic: &str,
    sub_topic: &str,
    round: u64,
    specialty: &str,
    peers: &[(String, String)],
) -> String {
    let (context, instruction) = if peers.is_empty() {
        (
            "You open this discussion.".to_string(),
            "Give your opening position.",
        )
    } else {
        (
            format!(
                "Contributions so far in this round:\n{}",
                peers
                    .iter()
                    .map(|(name, text)| format!("[{}]: {}", name, text))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            ),
            "Respond to your peers: challenge weak points and build on strong ones.",
        )
    };

    format!(
        r#"Discussion topic: {sub_topic}
Round {round}
Research context: {topic}

{context}

Give your perspective from {specialty}. Be analytical and critical.
{instruction}"#,
    )
}

pub fn rating_prompt(topic: &str, entries: &[ArtifactEntry]) -> String {
    let record = if entries.is_empty() {
        "(no entries)".to_string()
    } else {
        entries
            .iter()
            .map(describe_entry)
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"Evaluate the research progress on: {topic}

Research record so far:
{record}

Rate your satisfaction with the quality, depth, collaboration, and readiness to publish.
1-3: needs significant work
4-6: progressing but incomplete
7-8: good, minor refinements needed
9-10: excellent, ready to publish

Respond with ONLY a single integer from 1 to 10."#,
    )
}

/// Extra context the mutation prompt may carry about the session.
#[derive(Debug, Clone, Default)]
pub struct MutationFeedback {
    pub topic: Option<String>,
    pub artifact_entries: usize,
    pub improvements_so_far: usize,
}

pub fn mutation_prompt(
    configuration: &str,
    specialty: &str,
    memory: &[MemoryRecord],
    feedback: &MutationFeedback,
) -> String {
    let observed = if memory.is_empty() {
        "(no recorded behavior yet)".to_string()
    } else {
        memory
            .iter()
            .map(|record| match &record.entry {
                MemoryEntry::Utterance(text) => format!("- said: {}", excerpt(text, 400)),
                MemoryEntry::ResearchNote(text) => format!("- noted: {}", excerpt(text, 400)),
                MemoryEntry::SatisfactionRating(value) => format!("- rated progress {}/10", value),
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let topic_line = feedback
        .topic
        .as_deref()
        .map(|topic| format!("Current research topic: {}\n", topic))
        .unwrap_or_default();

    format!(
        r#"Critique the instructions below against the agent's observed behavior and write an improved version.

Current instructions:
{configuration}

Observed behavior (most recent last):
{observed}

{topic_line}Specialty: {specialty}
Team record size: {entries} entries
Previous revisions: {revisions}

The improved instructions should make the agent better at:
1. Contributing specialized knowledge
2. Collaborating with and responding to peers
3. Critical, evidence-based analysis
4. Research paper writing

Respond with ONLY the new instructions, nothing else."#,
        entries = feedback.artifact_entries,
        revisions = feedback.improvements_so_far,
    )
}

/// Split a brainstorm reply into individual ideas.
///
/// Numbered (`1.`, `2)`) and bulleted (`-`, `*`, `•`) lines start a new idea and
/// unmarked lines continue the current one. A reply with no markers is one idea.
pub fn parse_ideas(reply: &str) -> Vec<String> {
    let mut ideas: Vec<String> = Vec::new();
    let mut preamble: Vec<&str> = Vec::new();
    let mut saw_marker = false;

    for line in reply.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match strip_list_marker(trimmed) {
            Some(body) => {
                saw_marker = true;
                ideas.push(body.to_string());
            }
            None if saw_marker => {
                if let Some(current) = ideas.last_mut() {
                    current.push(' ');
                    current.push_str(trimmed);
                }
            }
            None => preamble.push(trimmed),
        }
    }

    if !saw_marker {
        let whole = preamble.join(" ");
        return if whole.is_empty() { Vec::new() } else { vec![whole] };
    }

    ideas.retain(|idea| !idea.trim().is_empty());
    ideas
}

fn strip_list_marker(line: &str) -> Option<&str> {
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest.trim());
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 3 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix(". ")
        .or_else(|| rest.strip_prefix(") "))
        .map(str::trim)
}

/// Extract a satisfaction rating from a free-text reply.
///
/// Numbers that only describe the scale (`1-10`, `1 to 10`, the `10` of `/10`
/// or `out of 10`) are ignored. Decimals round to nearest. The reply yields a
/// rating only when exactly one remaining number lies in [1, 10]; otherwise
/// `None` and the caller records a skipped rating.
pub fn parse_rating(reply: &str) -> Option<u8> {
    let tokens = number_tokens(reply);
    let mut scale = vec![false; tokens.len()];

    for (i, pair) in tokens.windows(2).enumerate() {
        let between = reply[pair[0].end..pair[1].start].trim();
        if matches!(between, "-" | "\u{2013}") || between.eq_ignore_ascii_case("to") {
            scale[i] = true;
            scale[i + 1] = true;
        } else if between == "/" {
            scale[i + 1] = true;
        }
    }
    for (i, token) in tokens.iter().enumerate() {
        if reply[..token.start].trim_end().to_ascii_lowercase().ends_with("out of") {
            scale[i] = true;
        }
    }

    let mut candidates = tokens
        .iter()
        .zip(&scale)
        .filter(|(_, on_scale)| !**on_scale)
        .filter_map(|(token, _)| token.rating());
    let rating = candidates.next()?;
    if candidates.next().is_some() {
        return None;
    }
    Some(rating)
}

struct NumberToken {
    start: usize,
    end: usize,
    value: Option<f64>,
    negative: bool,
}

impl NumberToken {
    fn rating(&self) -> Option<u8> {
        let rounded = self.value?.round();
        if self.negative || !(1.0..=10.0).contains(&rounded) {
            return None;
        }
        Some(rounded as u8)
    }
}

/// Runs of ASCII digits (with decimal points) in `text`, left to right.
fn number_tokens(text: &str) -> Vec<NumberToken> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
            i += 1;
        }
        let raw = text[start..i].trim_end_matches('.');
        // A minus sign right after another number is a range, not a sign.
        let negative = text[..start].ends_with('-')
            && !text[..start - 1].trim_end().ends_with(|c: char| c.is_ascii_digit());
        tokens.push(NumberToken {
            start,
            end: start + raw.len(),
            value: raw.parse().ok(),
            negative,
        });
    }
    tokens
}

/// Normalize a proposed configuration and decide whether it may be applied.
///
/// Code fences around the reply are removed. The candidate is rejected when it
/// is empty or equal to `current` once whitespace runs are collapsed.
pub fn vet_candidate(current: &str, reply: &str) -> Result<String, RejectionReason> {
    let candidate = strip_code_fence(reply.trim()).trim().to_string();

    if candidate.is_empty() {
        return Err(RejectionReason::EmptyCandidate);
    }
    if collapse_whitespace(&candidate) == collapse_whitespace(current) {
        return Err(RejectionReason::TrivialChange);
    }
    Ok(candidate)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = inner.strip_suffix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line.
    match inner.split_once('\n') {
        Some((first, rest)) if !first.trim().contains(' ') => rest,
        _ => inner,
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn describe_entry(entry: &ArtifactEntry) -> String {
    let (label, text) = match &entry.body {
        EntryBody::Idea { text } => ("idea", text.as_str()),
        EntryBody::Evidence { text, .. } => ("evidence", text.as_str()),
        EntryBody::Discussion { text, .. } => ("discussion", text.as_str()),
    };
    format!(
        "- round {} {} from {}: {}",
        entry.round,
        label,
        entry.agent_id,
        excerpt(text, 600)
    )
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = collapse_whitespace(text);
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_ideas_numbered() {
        let reply = "Here are my ideas:\n1. Sparse attention for long documents\n2) Curriculum pretraining\n   with synthetic data\n3. Evaluate robustness";
        let ideas = parse_ideas(reply);
        assert_eq!(
            ideas,
            vec![
                "Sparse attention for long documents".to_string(),
                "Curriculum pretraining with synthetic data".to_string(),
                "Evaluate robustness".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_ideas_bullets() {
        let ideas = parse_ideas("- first\n* second\n• third");
        assert_eq!(ideas, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_parse_ideas_plain_text_is_single_idea() {
        let ideas = parse_ideas("Study mixture-of-experts routing\nunder distribution shift.");
        assert_eq!(
            ideas,
            vec!["Study mixture-of-experts routing under distribution shift.".to_string()]
        );
    }

    #[test]
    fn test_parse_ideas_empty() {
        assert!(parse_ideas("").is_empty());
        assert!(parse_ideas("  \n\n ").is_empty());
    }

    #[test]
    fn test_year_is_not_a_list_marker() {
        let ideas = parse_ideas("2024. was a big year for agents");
        assert_eq!(ideas.len(), 1);
        assert!(ideas[0].starts_with("2024."));
    }

    #[rstest]
    #[case("8", Some(8))]
    #[case("Rating: 7", Some(7))]
    #[case("9/10 - nearly ready", Some(9))]
    #[case("10", Some(10))]
    #[case("1", Some(1))]
    #[case("7.6", Some(8))]
    #[case("8.", Some(8))]
    #[case("0", None)]
    #[case("11", None)]
    #[case("-3", None)]
    #[case("I am quite satisfied", None)]
    #[case("", None)]
    #[case("Rating (1-10): 7", Some(7))]
    #[case("On a scale of 1 to 10, I would give it an 8.", Some(8))]
    #[case("I'd say 6 out of 10", Some(6))]
    #[case("10/10", Some(10))]
    #[case("Scale 1\u{2013}10. My score: 9", Some(9))]
    #[case("Rating (1-10): not sure yet", None)]
    #[case("Somewhere between 6 and 7", None)]
    #[case("7, up from 5 last round", None)]
    fn test_parse_rating(#[case] reply: &str, #[case] expected: Option<u8>) {
        assert_eq!(parse_rating(reply), expected);
    }

    #[test]
    fn test_vet_candidate_rejects_whitespace_only_change() {
        let current = "You are Dr. Neural.\nBe rigorous.";
        let reply = "  You are   Dr. Neural.\n\n  Be rigorous.  ";
        assert_eq!(
            vet_candidate(current, reply),
            Err(RejectionReason::TrivialChange)
        );
    }

    #[test]
    fn test_vet_candidate_rejects_empty() {
        assert_eq!(
            vet_candidate("anything", "   \n"),
            Err(RejectionReason::EmptyCandidate)
        );
        assert_eq!(
            vet_candidate("anything", "```\n```"),
            Err(RejectionReason::EmptyCandidate)
        );
    }

    #[test]
    fn test_vet_candidate_strips_fence() {
        let reply = "```text\nYou are Dr. Neural. Cite sources.\n```";
        assert_eq!(
            vet_candidate("You are Dr. Neural.", reply).unwrap(),
            "You are Dr. Neural. Cite sources."
        );
    }

    #[test]
    fn test_default_configuration_mentions_identity() {
        let text = default_configuration("Dr. Ethics", "AI Ethics and Safety");
        assert!(text.contains("Dr. Ethics"));
        assert!(text.contains("AI Ethics and Safety"));
    }

    #[test]
    fn test_discussion_prompt_includes_peers() {
        let peers = vec![("Dr. Neural".to_string(), "Scaling is enough.".to_string())];
        let prompt = discussion_prompt("LLMs", "scaling laws", 3, "Ethics", &peers);
        assert!(prompt.contains("[Dr. Neural]: Scaling is enough."));
        assert!(prompt.contains("Respond to your peers"));

        let opening = discussion_prompt("LLMs", "scaling laws", 3, "Ethics", &[]);
        assert!(opening.contains("opening position"));
    }

    #[test]
    fn test_research_query() {
        assert_eq!(
            research_query(" Transformers ", "Computer Vision"),
            "Transformers Computer Vision"
        );
    }
}
